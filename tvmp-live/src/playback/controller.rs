//! Live controller
//!
//! Owns the current channel and the foreground session. Tuning hands a
//! Ready pre-buffered session over from the [`BufferManager`] when there is
//! one (instant start) and otherwise opens a fresh session; either way the
//! adjacent channels are pre-buffered around the new channel afterwards.

use crate::catalog::{CatalogChange, ChannelCatalog};
use crate::engine::{SessionOptions, StreamEngine};
use crate::error::{Error, Result};
use crate::playback::buffer_manager::BufferManager;
use crate::playback::session::{observe_readiness, PlaybackSession};
use crate::state::SharedState;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tvmp_common::events::{FailureKind, SessionReadiness, TvmpEvent};
use tvmp_common::{Channel, ChannelId};
use uuid::Uuid;

/// Result of a successful tune
#[derive(Debug, Clone, Serialize)]
pub struct TuneOutcome {
    pub channel_id: ChannelId,
    pub session_id: Uuid,
    /// The session came from the pre-buffer
    pub instant_start: bool,
}

/// Foreground status for queries
#[derive(Debug, Clone, Serialize)]
pub struct LiveStatus {
    pub channel: Option<Channel>,
    pub session_id: Option<Uuid>,
    pub readiness: Option<SessionReadiness>,
    pub last_error: Option<String>,
}

struct MainSession {
    session: PlaybackSession,
    observer: JoinHandle<()>,
}

impl MainSession {
    fn release(self) {
        self.observer.abort();
        self.session.release();
    }
}

#[derive(Default)]
struct LiveInner {
    current: Option<Channel>,
    main: Option<MainSession>,
    last_error: Option<String>,
}

pub struct LiveController {
    engine: Arc<dyn StreamEngine>,
    catalog: Arc<dyn ChannelCatalog>,
    state: Arc<SharedState>,
    buffer: Arc<BufferManager>,
    favorites_only: bool,
    inner: Arc<Mutex<LiveInner>>,
    catalog_task: Mutex<Option<JoinHandle<()>>>,
}

impl LiveController {
    pub fn new(
        engine: Arc<dyn StreamEngine>,
        catalog: Arc<dyn ChannelCatalog>,
        state: Arc<SharedState>,
        buffer: Arc<BufferManager>,
        favorites_only: bool,
    ) -> Self {
        Self {
            engine,
            catalog,
            state,
            buffer,
            favorites_only,
            inner: Arc::new(Mutex::new(LiveInner::default())),
            catalog_task: Mutex::new(None),
        }
    }

    pub fn buffer(&self) -> &Arc<BufferManager> {
        &self.buffer
    }

    /// Ordered list that adjacency and surfing walk around `current`
    pub fn active_channels(&self, current: &ChannelId) -> Vec<Channel> {
        if self.favorites_only {
            let favorites = self.catalog.favorites();
            if favorites.iter().any(|c| &c.id == current) {
                return favorites;
            }
        }
        self.catalog.ordered_channels()
    }

    /// Switch the foreground to `channel_id`
    ///
    /// Tuning to the channel already playing (and not failed) is a no-op.
    pub async fn tune(&self, channel_id: &ChannelId) -> Result<TuneOutcome> {
        let channel = self
            .catalog
            .channel(channel_id)
            .ok_or_else(|| Error::InvalidOperation(format!("unknown channel {}", channel_id)))?;
        self.switch_to(channel, false).await
    }

    /// Fresh load of the current channel; the only retry there is
    pub async fn retry(&self) -> Result<TuneOutcome> {
        let current = self.inner.lock().await.current.clone();
        let channel = current.ok_or_else(|| Error::InvalidOperation("no channel tuned".to_string()))?;
        info!("Retrying channel {}", channel.id);
        self.switch_to(channel, true).await
    }

    async fn switch_to(&self, channel: Channel, force: bool) -> Result<TuneOutcome> {
        let mut inner = self.inner.lock().await;

        if !force {
            if let (Some(current), Some(main)) = (&inner.current, &inner.main) {
                if current.id == channel.id && !main.session.readiness().is_failed() {
                    debug!("Already tuned to {}", channel.id);
                    return Ok(TuneOutcome {
                        channel_id: channel.id.clone(),
                        session_id: main.session.instance_id(),
                        instant_start: false,
                    });
                }
            }
        }

        let (session, instant_start) = match self.take_prebuffered(&channel.id).await {
            Some(session) => (session, true),
            None => match self.open_foreground(&channel).await {
                Ok(session) => (session, false),
                Err(e) => {
                    if let Some(old) = inner.main.take() {
                        old.release();
                    }
                    warn!("Tune to {} failed: {}", channel.id, e);
                    inner.last_error = Some(e.to_string());
                    self.state.broadcast_event(TvmpEvent::PlaybackFailed {
                        channel_id: channel.id.clone(),
                        slot: None,
                        kind: e.failure_kind().unwrap_or(FailureKind::StreamUnavailable),
                        message: e.to_string(),
                        retryable: e.is_retryable(),
                        timestamp: chrono::Utc::now(),
                    });
                    self.buffer
                        .preload_adjacent(&channel.id, &self.active_channels(&channel.id))
                        .await;
                    inner.current = Some(channel);
                    return Err(e);
                }
            },
        };

        if let Some(old) = inner.main.take() {
            old.release();
        }

        let outcome = TuneOutcome {
            channel_id: channel.id.clone(),
            session_id: session.instance_id(),
            instant_start,
        };

        let observer = self.spawn_observer(&session);
        inner.last_error = session.readiness().is_failed().then(|| session.readiness().to_string());
        inner.main = Some(MainSession { session, observer });
        inner.current = Some(channel.clone());

        if instant_start {
            info!("⚡ Instant start on {} ({})", channel.id, channel.name);
        } else {
            info!("Tuned to {} ({})", channel.id, channel.name);
        }

        self.state.broadcast_event(TvmpEvent::ChannelTuned {
            channel_id: channel.id.clone(),
            instant_start,
            timestamp: chrono::Utc::now(),
        });

        // Still under the lock, so preloads are issued in tune order
        self.buffer
            .preload_adjacent(&channel.id, &self.active_channels(&channel.id))
            .await;

        Ok(outcome)
    }

    async fn take_prebuffered(&self, channel_id: &ChannelId) -> Option<PlaybackSession> {
        self.buffer.get_ready(channel_id).await?;
        let mut session = self.buffer.promote(channel_id).await?;
        session.set_muted(false);
        session.play();
        Some(session)
    }

    async fn open_foreground(&self, channel: &Channel) -> Result<PlaybackSession> {
        let url = self.catalog.stream_url(channel)?;
        PlaybackSession::open(self.engine.as_ref(), channel, &url, SessionOptions::foreground()).await
    }

    fn spawn_observer(&self, session: &PlaybackSession) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let state = self.state.clone();
        let instance_id = session.instance_id();
        let channel_id = session.channel_id().clone();

        observe_readiness(session.readiness_events(), move |readiness| {
            let weak = weak.clone();
            let state = state.clone();
            let channel_id = channel_id.clone();
            async move { apply_main_readiness(weak, &state, &channel_id, instance_id, readiness).await }
        })
    }

    pub async fn current_channel(&self) -> Option<Channel> {
        self.inner.lock().await.current.clone()
    }

    pub async fn main_session_state(&self) -> LiveStatus {
        let inner = self.inner.lock().await;
        LiveStatus {
            channel: inner.current.clone(),
            session_id: inner.main.as_ref().map(|m| m.session.instance_id()),
            readiness: inner.main.as_ref().map(|m| m.session.readiness().clone()),
            last_error: inner.last_error.clone(),
        }
    }

    pub async fn last_error(&self) -> Option<String> {
        self.inner.lock().await.last_error.clone()
    }

    /// Republish catalog changes and keep the pre-buffer in step with the
    /// active ordering
    pub async fn watch_catalog(self: &Arc<Self>) {
        let mut rx = self.catalog.subscribe();
        let weak: Weak<Self> = Arc::downgrade(self);

        let task = tokio::spawn(async move {
            loop {
                let change = match rx.recv().await {
                    Ok(change) => change,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Catalog watcher lagged by {} changes, treating as reload", skipped);
                        CatalogChange::Reloaded
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                controller.on_catalog_change(change).await;
            }
        });

        if let Some(previous) = self.catalog_task.lock().await.replace(task) {
            previous.abort();
        }
    }

    async fn on_catalog_change(&self, change: CatalogChange) {
        self.state.broadcast_event(TvmpEvent::CatalogChanged {
            channel_id: change.channel_id().cloned(),
            timestamp: chrono::Utc::now(),
        });

        let reorder = match change {
            CatalogChange::Reloaded => true,
            CatalogChange::FavoriteChanged(_) => self.favorites_only,
            CatalogChange::NowPlayingChanged(_) => false,
        };
        if !reorder {
            return;
        }

        let inner = self.inner.lock().await;
        if let Some(current) = &inner.current {
            debug!("Ordering changed, re-running pre-buffer around {}", current.id);
            self.buffer
                .preload_adjacent(&current.id, &self.active_channels(&current.id))
                .await;
        }
    }

    /// Release the foreground session and every pre-buffered one
    pub async fn shutdown(&self) {
        if let Some(task) = self.catalog_task.lock().await.take() {
            task.abort();
        }
        self.buffer.cleanup().await;

        let mut inner = self.inner.lock().await;
        if let Some(main) = inner.main.take() {
            info!("Releasing foreground session for {}", main.session.channel_id());
            main.release();
        }
    }
}

impl Drop for LiveController {
    fn drop(&mut self) {
        if let Some(task) = self.catalog_task.get_mut().take() {
            task.abort();
        }
    }
}

async fn apply_main_readiness(
    weak: Weak<Mutex<LiveInner>>,
    state: &SharedState,
    channel_id: &ChannelId,
    instance_id: Uuid,
    readiness: SessionReadiness,
) -> bool {
    let Some(inner) = weak.upgrade() else {
        return false;
    };
    let mut inner = inner.lock().await;

    let changed = match inner.main.as_mut() {
        Some(main) if main.session.instance_id() == instance_id => main.session.set_readiness(readiness.clone()),
        _ => return false,
    };
    if !changed {
        return true;
    }

    match readiness {
        SessionReadiness::Ready => {
            debug!("Foreground ready: {}", channel_id);
            inner.last_error = None;
        }
        SessionReadiness::Failed { kind, message } => {
            warn!("Foreground playback failed on {}: {}", channel_id, message);
            inner.last_error = Some(message.clone());
            state.broadcast_event(TvmpEvent::PlaybackFailed {
                channel_id: channel_id.clone(),
                slot: None,
                kind,
                message,
                retryable: true,
                timestamp: chrono::Utc::now(),
            });
        }
        SessionReadiness::Loading => {}
    }
    true
}
