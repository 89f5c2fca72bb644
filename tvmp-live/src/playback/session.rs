//! Playback session
//!
//! One engine handle bound to a channel's stream URL, plus the state the
//! managers track for it. A session has exactly one owner at a time and is
//! destroyed exactly once: either through [`PlaybackSession::release`] or,
//! if an owner drops it without releasing, in `Drop`.

use crate::engine::{EngineHandle, SessionOptions, StreamEngine};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tvmp_common::events::SessionReadiness;
use tvmp_common::{Channel, ChannelId};
use uuid::Uuid;

pub struct PlaybackSession {
    /// Identity of this engine instance (a channel may be opened many times)
    instance_id: Uuid,
    channel_id: ChannelId,
    handle: Box<dyn EngineHandle>,
    readiness: SessionReadiness,
    muted: bool,
    created_at: DateTime<Utc>,
    released: bool,
}

impl PlaybackSession {
    /// Open a session for `channel` at `url`
    ///
    /// Awaits only the engine's URL/manifest fetch; readiness arrives later
    /// through [`PlaybackSession::readiness_events`].
    pub async fn open(
        engine: &dyn StreamEngine,
        channel: &Channel,
        url: &str,
        options: SessionOptions,
    ) -> Result<Self> {
        let handle = engine.create(url, options).await?;
        let readiness = handle.readiness().borrow().clone();

        let session = Self {
            instance_id: Uuid::new_v4(),
            channel_id: channel.id.clone(),
            handle,
            readiness,
            muted: options.muted,
            created_at: Utc::now(),
            released: false,
        };

        debug!(
            "Opened session {} for channel {} (low_buffer={}, auto_play={})",
            session.instance_id, session.channel_id, options.low_buffer, options.auto_play
        );
        Ok(session)
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    pub fn readiness(&self) -> &SessionReadiness {
        &self.readiness
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Record a readiness value received from the engine.
    /// Returns true if it differs from the previous one.
    pub fn set_readiness(&mut self, readiness: SessionReadiness) -> bool {
        if self.readiness == readiness {
            return false;
        }
        self.readiness = readiness;
        true
    }

    /// Fresh receiver for the engine's readiness events
    pub fn readiness_events(&self) -> watch::Receiver<SessionReadiness> {
        self.handle.readiness()
    }

    pub fn play(&self) {
        self.handle.play();
    }

    pub fn pause(&self) {
        self.handle.pause();
    }

    pub fn seek(&self, offset_secs: u32) {
        self.handle.seek(offset_secs);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.handle.set_muted(muted);
    }

    /// Stop playback, detach the renderer and destroy the engine handle.
    ///
    /// Observers are owned by whichever manager spawned them and must be
    /// aborted by it before or after this call.
    pub fn release(mut self) {
        self.destroy_handle();
    }

    fn destroy_handle(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.handle.pause();
        self.handle.destroy();
        debug!("Released session {} for channel {}", self.instance_id, self.channel_id);
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.destroy_handle();
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("instance_id", &self.instance_id)
            .field("channel_id", &self.channel_id)
            .field("readiness", &self.readiness)
            .field("muted", &self.muted)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Forward readiness events from an engine receiver to `on_change`.
///
/// The current value is delivered first, so nothing published between
/// `open` and observer start is lost. `on_change` returns `false` to stop.
/// The returned task is the observer handle; aborting it removes the
/// observer.
pub fn observe_readiness<F, Fut>(
    mut rx: watch::Receiver<SessionReadiness>,
    mut on_change: F,
) -> JoinHandle<()>
where
    F: FnMut(SessionReadiness) -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    tokio::spawn(async move {
        let current = rx.borrow_and_update().clone();
        if !on_change(current).await {
            return;
        }
        while rx.changed().await.is_ok() {
            let readiness = rx.borrow_and_update().clone();
            if !on_change(readiness).await {
                return;
            }
        }
    })
}
