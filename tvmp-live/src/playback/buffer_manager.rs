//! Buffer Manager
//!
//! Keeps background sessions pre-loaded for the channels adjacent to the
//! one on screen, so that channel up/down can start instantly.
//!
//! - At most `max_buffer_count` (2) background sessions, keyed by channel
//! - The foreground channel is never buffered
//! - One cancelable preload task at a time (last call wins)
//! - Readiness events from the engine are applied under the manager's lock;
//!   events for sessions no longer held are dropped
//! - Background failures are absorbed: a failed session is simply never
//!   handed out

use crate::catalog::ChannelCatalog;
use crate::config::BufferSettings;
use crate::engine::{SessionOptions, StreamEngine};
use crate::playback::adjacency;
use crate::playback::session::{observe_readiness, PlaybackSession};
use crate::state::SharedState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use tvmp_common::events::{BufferedChannelInfo, SessionReadiness, TvmpEvent};
use tvmp_common::{Channel, ChannelId};
use uuid::Uuid;

/// Background session plus the task observing its readiness
struct BufferSlot {
    session: PlaybackSession,
    observer: JoinHandle<()>,
}

impl BufferSlot {
    /// Remove the observer and hand the session out
    fn into_session(self) -> PlaybackSession {
        self.observer.abort();
        self.session
    }

    /// Remove the observer and destroy the session
    fn dispose(self) {
        self.into_session().release();
    }

    fn info(&self) -> BufferedChannelInfo {
        BufferedChannelInfo {
            channel_id: self.session.channel_id().clone(),
            session_id: self.session.instance_id(),
            readiness: self.session.readiness().clone(),
            created_at: self.session.created_at(),
        }
    }
}

struct BufferInner {
    engine: Arc<dyn StreamEngine>,
    catalog: Arc<dyn ChannelCatalog>,
    state: Arc<SharedState>,
    settings: BufferSettings,

    /// Map of channel_id -> background session
    slots: Mutex<HashMap<ChannelId, BufferSlot>>,

    /// In-flight preload task; the lock also serializes `preload_adjacent`
    preload_task: Mutex<Option<JoinHandle<()>>>,

    /// Bumped by every `preload_adjacent`/`cleanup`; a task holding an
    /// older value must not touch `slots`
    generation: AtomicU64,
}

impl BufferInner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Apply an engine readiness event to the slot holding `instance_id`.
    ///
    /// Returns false once the session is no longer buffered, which stops
    /// the observer.
    async fn apply_readiness(&self, channel_id: &ChannelId, instance_id: Uuid, readiness: SessionReadiness) -> bool {
        let mut slots = self.slots.lock().await;

        let Some(slot) = slots.get_mut(channel_id) else {
            return false;
        };
        if slot.session.instance_id() != instance_id {
            return false;
        }

        if !slot.session.set_readiness(readiness.clone()) {
            return true;
        }

        match &readiness {
            SessionReadiness::Ready => debug!("Pre-buffer ready: {}", channel_id),
            SessionReadiness::Failed { kind, message } => {
                // Opportunistic: no retry, no user-visible error
                debug!("Pre-buffer failed for {} ({}): {}", channel_id, kind, message);
                self.state.record_absorbed_prebuffer_failure();
            }
            SessionReadiness::Loading => {}
        }

        self.publish(&slots);
        true
    }

    fn publish(&self, slots: &HashMap<ChannelId, BufferSlot>) {
        let mut buffered: Vec<ChannelId> = slots.keys().cloned().collect();
        buffered.sort();
        let mut ready: Vec<ChannelId> = slots
            .iter()
            .filter(|(_, slot)| slot.session.is_ready())
            .map(|(id, _)| id.clone())
            .collect();
        ready.sort();

        self.state.broadcast_event(TvmpEvent::BufferReadinessChanged {
            buffered,
            ready,
            timestamp: chrono::Utc::now(),
        });
    }

    fn spawn_observer(self: &Arc<Self>, session: &PlaybackSession) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let channel_id = session.channel_id().clone();
        let instance_id = session.instance_id();

        observe_readiness(session.readiness_events(), move |readiness| {
            let weak = weak.clone();
            let channel_id = channel_id.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => inner.apply_readiness(&channel_id, instance_id, readiness).await,
                    None => false,
                }
            }
        })
    }

    /// Body of the preload task
    async fn run_preload(weak: Weak<Self>, generation: u64, targets: Vec<Channel>) {
        let settle_delay = match weak.upgrade() {
            Some(inner) => inner.settings.settle_delay(),
            None => return,
        };

        // Let the foreground session's start-up bandwidth stabilize
        tokio::time::sleep(settle_delay).await;

        for channel in targets {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.is_current(generation) {
                return;
            }
            if inner.slots.lock().await.contains_key(&channel.id) {
                continue;
            }
            inner.load(generation, &channel).await;
        }
    }

    /// Create one background session and insert it, unless superseded
    async fn load(self: &Arc<Self>, generation: u64, channel: &Channel) {
        let url = match self.catalog.stream_url(channel) {
            Ok(url) => url,
            Err(e) => {
                debug!("Skipping pre-buffer for {}: {}", channel.id, e);
                self.state.record_absorbed_prebuffer_failure();
                return;
            }
        };

        let options = SessionOptions::prebuffer(self.settings.low_buffer_target());
        let session = match PlaybackSession::open(self.engine.as_ref(), channel, &url, options).await {
            Ok(session) => session,
            Err(e) => {
                debug!("Pre-buffer open failed for {}: {}", channel.id, e);
                self.state.record_absorbed_prebuffer_failure();
                return;
            }
        };

        // Back on the manager's state: re-check everything the await may have changed
        let mut slots = self.slots.lock().await;
        if !self.is_current(generation) {
            debug!("Discarding superseded pre-buffer for {}", channel.id);
            drop(slots);
            session.release();
            return;
        }
        if slots.contains_key(&channel.id) || slots.len() >= self.settings.max_buffer_count {
            drop(slots);
            session.release();
            return;
        }

        let observer = self.spawn_observer(&session);
        info!("Pre-buffering channel {} ({})", channel.id, channel.name);
        slots.insert(channel.id.clone(), BufferSlot { session, observer });
        self.publish(&slots);
    }
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        if let Some(task) = self.preload_task.get_mut().take() {
            task.abort();
        }
        for (_, slot) in self.slots.get_mut().drain() {
            slot.dispose();
        }
    }
}

/// Manages background pre-buffer sessions
pub struct BufferManager {
    inner: Arc<BufferInner>,
}

impl BufferManager {
    pub fn new(
        engine: Arc<dyn StreamEngine>,
        catalog: Arc<dyn ChannelCatalog>,
        state: Arc<SharedState>,
        settings: BufferSettings,
    ) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                engine,
                catalog,
                state,
                settings,
                slots: Mutex::new(HashMap::new()),
                preload_task: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Pre-buffer the channels either side of `current`
    ///
    /// Cancels any in-flight preload, evicts every buffered session that is
    /// not the previous/next channel (including one for `current` itself),
    /// then after the settle delay loads whichever neighbours are missing.
    pub async fn preload_adjacent(&self, current: &ChannelId, ordered: &[Channel]) {
        let mut preload_task = self.inner.preload_task.lock().await;

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(task) = preload_task.take() {
            task.abort();
        }

        let mut targets = adjacency::neighbours(current, ordered);
        targets.truncate(self.inner.settings.max_buffer_count);

        // Evict before scheduling, so stale buffers never outlive the new set
        {
            let mut slots = self.inner.slots.lock().await;
            let stale: Vec<ChannelId> = slots
                .keys()
                .filter(|id| !targets.iter().any(|t| &t.id == *id))
                .cloned()
                .collect();

            if !stale.is_empty() {
                for id in &stale {
                    if let Some(slot) = slots.remove(id) {
                        debug!("Evicting pre-buffer for {}", id);
                        slot.dispose();
                    }
                }
                self.inner.publish(&slots);
            }
        }

        if targets.is_empty() {
            return;
        }

        debug!(
            "Scheduling pre-buffer around {}: {:?} (generation {})",
            current,
            targets.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            generation
        );

        let weak = Arc::downgrade(&self.inner);
        *preload_task = Some(tokio::spawn(BufferInner::run_preload(weak, generation, targets)));
    }

    /// Snapshot of the buffered session for `channel_id`, only if Ready.
    /// Never starts a load.
    pub async fn get_ready(&self, channel_id: &ChannelId) -> Option<BufferedChannelInfo> {
        let slots = self.inner.slots.lock().await;
        slots
            .get(channel_id)
            .filter(|slot| slot.session.is_ready())
            .map(BufferSlot::info)
    }

    /// Hand the buffered session for `channel_id` to the caller.
    ///
    /// The session is not destroyed; ownership moves out of the manager. A
    /// failed background session is never promoted.
    pub async fn promote(&self, channel_id: &ChannelId) -> Option<PlaybackSession> {
        let mut slots = self.inner.slots.lock().await;

        if slots
            .get(channel_id)
            .is_some_and(|slot| slot.session.readiness().is_failed())
        {
            return None;
        }

        let slot = slots.remove(channel_id)?;
        let session = slot.into_session();
        info!(
            "⚡ Promoting pre-buffered session {} for {} ({})",
            session.instance_id(),
            channel_id,
            session.readiness()
        );
        self.inner.publish(&slots);
        Some(session)
    }

    /// Release the buffered session for `channel_id`, if any
    pub async fn evict(&self, channel_id: &ChannelId) -> bool {
        let mut slots = self.inner.slots.lock().await;
        match slots.remove(channel_id) {
            Some(slot) => {
                debug!("Evicting pre-buffer for {}", channel_id);
                slot.dispose();
                self.inner.publish(&slots);
                true
            }
            None => false,
        }
    }

    /// Cancel the preload task and release every buffered session
    pub async fn cleanup(&self) {
        let mut preload_task = self.inner.preload_task.lock().await;
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = preload_task.take() {
            task.abort();
        }

        let mut slots = self.inner.slots.lock().await;
        if slots.is_empty() {
            return;
        }
        let count = slots.len();
        for (_, slot) in slots.drain() {
            slot.dispose();
        }
        info!("Released {} pre-buffered sessions", count);
        self.inner.publish(&slots);
    }

    pub async fn is_buffered(&self, channel_id: &ChannelId) -> bool {
        self.inner.slots.lock().await.contains_key(channel_id)
    }

    /// Buffered channel ids, sorted
    pub async fn buffered_channels(&self) -> Vec<ChannelId> {
        let slots = self.inner.slots.lock().await;
        let mut ids: Vec<ChannelId> = slots.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All buffered sessions, sorted by channel id
    pub async fn snapshot(&self) -> Vec<BufferedChannelInfo> {
        let slots = self.inner.slots.lock().await;
        let mut infos: Vec<BufferedChannelInfo> = slots.values().map(BufferSlot::info).collect();
        infos.sort_by(|a, b| a.channel_id.cmp(&b.channel_id));
        infos
    }
}
