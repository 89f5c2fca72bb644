//! Shared state
//!
//! Event distribution and diagnostics counters shared by the playback
//! managers and the HTTP layer. Playback state itself lives with the
//! manager that owns it.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tvmp_common::events::{EventBus, TvmpEvent};

/// Shared state accessible by all components
pub struct SharedState {
    /// Event bus for published state (SSE, UI observers)
    event_bus: EventBus,

    /// Background pre-buffer failures absorbed without surfacing
    absorbed_prebuffer_failures: AtomicU64,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            event_bus: EventBus::new(256),
            absorbed_prebuffer_failures: AtomicU64::new(0),
        }
    }

    /// Broadcast an event to all listeners (no receivers is OK)
    pub fn broadcast_event(&self, event: TvmpEvent) {
        self.event_bus.emit_lossy(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<TvmpEvent> {
        self.event_bus.subscribe()
    }

    pub fn record_absorbed_prebuffer_failure(&self) {
        self.absorbed_prebuffer_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn absorbed_prebuffer_failures(&self) -> u64 {
        self.absorbed_prebuffer_failures.load(Ordering::Relaxed)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
