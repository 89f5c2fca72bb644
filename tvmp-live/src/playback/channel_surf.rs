//! Channel surfing
//!
//! Channel up/down first shows a preview of the target channel with a
//! countdown. Reaching zero, or an explicit confirm, commits the preview
//! through the [`LiveController`]; cancel drops it. Starting a new surf
//! while one is active restarts the countdown from the preview channel.
//!
//! At most one countdown is live. Each surf carries a token, and a
//! countdown task only acts while its token is still the active one.

use crate::config::SurfSettings;
use crate::error::{Error, Result};
use crate::playback::adjacency;
use crate::playback::controller::{LiveController, TuneOutcome};
use crate::state::SharedState;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tvmp_common::events::{SurfDirection, TvmpEvent};
use tvmp_common::{Channel, ChannelId};

/// Preview in progress
#[derive(Debug, Clone, Serialize)]
pub struct SurfState {
    /// Channel that was on screen when surfing started
    pub source_channel_id: ChannelId,
    pub preview_channel: Channel,
    pub countdown_remaining: u32,
}

struct ActiveSurf {
    state: SurfState,
    token: u64,
    countdown: JoinHandle<()>,
}

pub struct ChannelSurfCoordinator {
    controller: Arc<LiveController>,
    state: Arc<SharedState>,
    settings: SurfSettings,
    active: Arc<Mutex<Option<ActiveSurf>>>,
    next_token: AtomicU64,
}

impl ChannelSurfCoordinator {
    pub fn new(controller: Arc<LiveController>, state: Arc<SharedState>, settings: SurfSettings) -> Self {
        Self {
            controller,
            state,
            settings,
            active: Arc::new(Mutex::new(None)),
            next_token: AtomicU64::new(1),
        }
    }

    /// Start (or continue) surfing one channel in `direction`
    pub async fn begin_surf(&self, direction: SurfDirection) -> Result<SurfState> {
        let mut active = self.active.lock().await;

        let (source, base) = match active.as_ref() {
            Some(surf) => (surf.state.source_channel_id.clone(), surf.state.preview_channel.id.clone()),
            None => {
                let current = self
                    .controller
                    .current_channel()
                    .await
                    .ok_or_else(|| Error::InvalidOperation("surf requires a tuned channel".to_string()))?;
                (current.id.clone(), current.id)
            }
        };

        let ordered = self.controller.active_channels(&base);
        if ordered.is_empty() {
            return Err(Error::InvalidOperation("channel list is empty".to_string()));
        }
        let preview = adjacency::step(&base, direction.delta(), &ordered)
            .ok_or_else(|| Error::InvalidOperation(format!("channel {} is not in the channel list", base)))?;

        if let Some(previous) = active.take() {
            previous.countdown.abort();
        }

        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let state = SurfState {
            source_channel_id: source,
            preview_channel: preview,
            countdown_remaining: self.settings.countdown_secs,
        };

        debug!(
            "Surf preview {} -> {} ({}s)",
            state.source_channel_id, state.preview_channel.id, state.countdown_remaining
        );
        publish_preview(&self.state, &state);

        let countdown = tokio::spawn(run_countdown(
            self.active.clone(),
            self.controller.clone(),
            self.state.clone(),
            self.settings.tick(),
            token,
        ));

        *active = Some(ActiveSurf {
            state: state.clone(),
            token,
            countdown,
        });
        Ok(state)
    }

    /// Commit the preview now
    pub async fn confirm_now(&self) -> Result<TuneOutcome> {
        let surf = self
            .active
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::InvalidOperation("no surf in progress".to_string()))?;
        surf.countdown.abort();

        commit(&self.controller, &self.state, &surf.state.preview_channel).await
    }

    /// Drop the preview; the source channel keeps playing
    pub async fn cancel(&self) -> bool {
        let Some(surf) = self.active.lock().await.take() else {
            return false;
        };
        surf.countdown.abort();

        debug!("Surf canceled, staying on {}", surf.state.source_channel_id);
        self.state.broadcast_event(TvmpEvent::SurfCanceled {
            preview_channel_id: surf.state.preview_channel.id,
            timestamp: chrono::Utc::now(),
        });
        true
    }

    pub async fn status(&self) -> Option<SurfState> {
        self.active.lock().await.as_ref().map(|surf| surf.state.clone())
    }
}

impl Drop for ChannelSurfCoordinator {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.try_lock() {
            if let Some(surf) = active.take() {
                surf.countdown.abort();
            }
        }
    }
}

fn publish_preview(shared: &SharedState, state: &SurfState) {
    shared.broadcast_event(TvmpEvent::SurfPreview {
        source_channel_id: state.source_channel_id.clone(),
        preview_channel_id: state.preview_channel.id.clone(),
        countdown_remaining: state.countdown_remaining,
        timestamp: chrono::Utc::now(),
    });
}

async fn commit(controller: &LiveController, shared: &SharedState, preview: &Channel) -> Result<TuneOutcome> {
    info!("Surf commit: {} ({})", preview.id, preview.name);
    let outcome = controller.tune(&preview.id).await?;
    shared.broadcast_event(TvmpEvent::SurfCommitted {
        channel_id: preview.id.clone(),
        timestamp: chrono::Utc::now(),
    });
    Ok(outcome)
}

/// One countdown; claims and commits the surf when it reaches zero
async fn run_countdown(
    active: Arc<Mutex<Option<ActiveSurf>>>,
    controller: Arc<LiveController>,
    shared: Arc<SharedState>,
    tick: std::time::Duration,
    token: u64,
) {
    loop {
        tokio::time::sleep(tick).await;

        let mut guard = active.lock().await;
        let Some(surf) = guard.as_mut().filter(|surf| surf.token == token) else {
            return;
        };

        surf.state.countdown_remaining = surf.state.countdown_remaining.saturating_sub(1);
        if surf.state.countdown_remaining > 0 {
            publish_preview(&shared, &surf.state);
            continue;
        }

        let Some(claimed) = guard.take() else {
            return;
        };
        drop(guard);

        if let Err(e) = commit(&controller, &shared, &claimed.state.preview_channel).await {
            warn!("Surf commit to {} failed: {}", claimed.state.preview_channel.id, e);
        }
        return;
    }
}
