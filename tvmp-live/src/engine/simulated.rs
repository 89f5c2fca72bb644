//! Simulated stream engine
//!
//! Stands in for a real decoder: handles remember the control calls they
//! received and report readiness after a configurable delay. Used by the
//! binary when no hardware pipeline is attached, and by the tests.

use super::{EngineHandle, SessionOptions, StreamEngine};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;
use tvmp_common::events::{FailureKind, SessionReadiness};
use uuid::Uuid;

/// Record of one handle created by the simulated engine
#[derive(Debug)]
pub struct SimulatedHandleState {
    pub id: Uuid,
    pub url: String,
    pub options: SessionOptions,
    playing: AtomicBool,
    muted: AtomicBool,
    seek_offset_secs: AtomicU32,
    destroy_count: AtomicUsize,
    readiness_tx: watch::Sender<SessionReadiness>,
}

impl SimulatedHandleState {
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    /// Last requested offset behind live
    pub fn seek_offset_secs(&self) -> u32 {
        self.seek_offset_secs.load(Ordering::SeqCst)
    }

    pub fn destroy_count(&self) -> usize {
        self.destroy_count.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroy_count() > 0
    }

    pub fn readiness(&self) -> SessionReadiness {
        self.readiness_tx.borrow().clone()
    }

    /// Push a readiness event, as the decoder would. Ignored once destroyed.
    pub fn signal(&self, readiness: SessionReadiness) {
        if self.is_destroyed() {
            return;
        }
        self.readiness_tx.send_replace(readiness);
    }
}

type Registry = Mutex<Vec<Arc<SimulatedHandleState>>>;

struct SimulatedHandle {
    state: Arc<SimulatedHandleState>,
    /// Set when destroyed records should leave the engine's registry
    registry: Option<Weak<Registry>>,
}

impl EngineHandle for SimulatedHandle {
    fn play(&self) {
        self.state.playing.store(true, Ordering::SeqCst);
    }

    fn pause(&self) {
        self.state.playing.store(false, Ordering::SeqCst);
    }

    fn seek(&self, offset_secs: u32) {
        self.state.seek_offset_secs.store(offset_secs, Ordering::SeqCst);
    }

    fn set_muted(&self, muted: bool) {
        self.state.muted.store(muted, Ordering::SeqCst);
    }

    fn destroy(&self) {
        self.state.playing.store(false, Ordering::SeqCst);
        self.state.destroy_count.fetch_add(1, Ordering::SeqCst);
        if let Some(registry) = self.registry.as_ref().and_then(Weak::upgrade) {
            lock(&registry).retain(|record| record.id != self.state.id);
        }
        debug!("Simulated handle {} destroyed ({})", self.state.id, self.state.url);
    }

    fn readiness(&self) -> watch::Receiver<SessionReadiness> {
        self.state.readiness_tx.subscribe()
    }
}

/// Engine that fakes stream start-up
pub struct SimulatedEngine {
    /// `None`: readiness is only ever pushed manually via `signal`
    ready_delay: Option<Duration>,
    /// Latency of the URL/manifest fetch inside `create`
    create_delay: Duration,
    unavailable: Mutex<HashSet<String>>,
    undecodable: Mutex<HashSet<String>>,
    /// Live handles, plus destroyed ones when `keep_history` is set
    handles: Arc<Registry>,
    keep_history: bool,
    created: AtomicUsize,
}

impl SimulatedEngine {
    /// Handles become Ready (or Failed) `ready_delay` after creation
    pub fn new(ready_delay: Duration) -> Self {
        Self {
            ready_delay: Some(ready_delay),
            create_delay: Duration::ZERO,
            unavailable: Mutex::new(HashSet::new()),
            undecodable: Mutex::new(HashSet::new()),
            handles: Arc::new(Mutex::new(Vec::new())),
            keep_history: false,
            created: AtomicUsize::new(0),
        }
    }

    /// Handles stay Loading until a test signals them
    pub fn manual() -> Self {
        Self {
            ready_delay: None,
            ..Self::new(Duration::ZERO)
        }
    }

    /// Keep records of destroyed handles so tests can inspect them
    pub fn with_history(mut self) -> Self {
        self.keep_history = true;
        self
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// `create` for this URL fails with StreamUnavailable
    pub fn mark_unavailable(&self, url: &str) {
        lock(&self.unavailable).insert(url.to_string());
    }

    /// Handles for this URL report DecodeFailed instead of Ready
    pub fn mark_undecodable(&self, url: &str) {
        lock(&self.undecodable).insert(url.to_string());
    }

    pub fn clear_failures(&self) {
        lock(&self.unavailable).clear();
        lock(&self.undecodable).clear();
    }

    /// Recorded handles, oldest first (destroyed ones only with history)
    pub fn handles(&self) -> Vec<Arc<SimulatedHandleState>> {
        lock(&self.handles).clone()
    }

    pub fn handles_for(&self, url: &str) -> Vec<Arc<SimulatedHandleState>> {
        lock(&self.handles)
            .iter()
            .filter(|h| h.url == url)
            .cloned()
            .collect()
    }

    /// Handles ever created
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Records the engine still holds
    pub fn retained_count(&self) -> usize {
        lock(&self.handles).len()
    }

    /// Handles not yet destroyed
    pub fn live_count(&self) -> usize {
        lock(&self.handles).iter().filter(|h| !h.is_destroyed()).count()
    }
}

#[async_trait]
impl StreamEngine for SimulatedEngine {
    async fn create(&self, url: &str, options: SessionOptions) -> Result<Box<dyn EngineHandle>> {
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }

        if lock(&self.unavailable).contains(url) {
            return Err(Error::StreamUnavailable(format!("manifest fetch failed for {}", url)));
        }

        let (readiness_tx, _) = watch::channel(SessionReadiness::Loading);
        let state = Arc::new(SimulatedHandleState {
            id: Uuid::new_v4(),
            url: url.to_string(),
            options,
            playing: AtomicBool::new(false),
            muted: AtomicBool::new(options.muted),
            seek_offset_secs: AtomicU32::new(0),
            destroy_count: AtomicUsize::new(0),
            readiness_tx,
        });
        lock(&self.handles).push(Arc::clone(&state));
        self.created.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.ready_delay {
            let outcome = if lock(&self.undecodable).contains(url) {
                SessionReadiness::Failed {
                    kind: FailureKind::DecodeFailed,
                    message: format!("unsupported codec in {}", url),
                }
            } else {
                SessionReadiness::Ready
            };
            let auto_play = options.auto_play;
            let pending = Arc::clone(&state);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if outcome.is_ready() && auto_play {
                    pending.playing.store(true, Ordering::SeqCst);
                }
                pending.signal(outcome);
            });
        }

        debug!("Simulated handle {} created for {} ({:?})", state.id, url, options);
        let registry = (!self.keep_history).then(|| Arc::downgrade(&self.handles));
        Ok(Box::new(SimulatedHandle { state, registry }))
    }
}

/// Lock a std mutex, recovering the data if a panicking thread poisoned it
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
