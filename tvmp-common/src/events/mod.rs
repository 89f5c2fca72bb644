//! Event types for the TVMP event system
//!
//! Provides the published-state event definitions and the EventBus.

// Sub-modules (supporting types)
mod playback_types;
mod shared_types;

pub use playback_types::{FailureKind, MultiviewLayout, SessionReadiness, SurfDirection};
pub use shared_types::{BufferedChannelInfo, SlotInfo};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::dvr::DvrState;
use crate::models::ChannelId;

/// TVMP event types
///
/// Everything the playback core publishes to observers (UI, SSE clients).
/// Events can be serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TvmpEvent {
    /// Main (single-stream) player switched channels
    ChannelTuned {
        channel_id: ChannelId,
        /// True when a pre-buffered session was promoted
        instant_start: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A foreground session failed
    ///
    /// Only emitted for the main player and multiview slots; background
    /// pre-buffer failures are absorbed silently.
    PlaybackFailed {
        channel_id: ChannelId,
        /// Multiview slot index, `None` for the main player
        slot: Option<usize>,
        kind: FailureKind,
        message: String,
        /// Whether a fresh load of the same channel may succeed
        retryable: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Pre-buffer set changed (added, evicted, promoted, became ready)
    BufferReadinessChanged {
        buffered: Vec<ChannelId>,
        ready: Vec<ChannelId>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Multiview slot list or layout changed
    MultiviewChanged {
        layout: Option<MultiviewLayout>,
        slots: Vec<SlotInfo>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One slot's DVR state changed
    SlotDvrChanged {
        index: usize,
        dvr: DvrState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Surf preview shown or countdown ticked
    SurfPreview {
        source_channel_id: ChannelId,
        preview_channel_id: ChannelId,
        countdown_remaining: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Surf preview committed to the main player
    SurfCommitted {
        channel_id: ChannelId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Surf preview discarded
    SurfCanceled {
        preview_channel_id: ChannelId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Channel catalog changed (favorites, now playing, reload)
    CatalogChanged {
        channel_id: Option<ChannelId>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl TvmpEvent {
    /// Event type name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            TvmpEvent::ChannelTuned { .. } => "ChannelTuned",
            TvmpEvent::PlaybackFailed { .. } => "PlaybackFailed",
            TvmpEvent::BufferReadinessChanged { .. } => "BufferReadinessChanged",
            TvmpEvent::MultiviewChanged { .. } => "MultiviewChanged",
            TvmpEvent::SlotDvrChanged { .. } => "SlotDvrChanged",
            TvmpEvent::SurfPreview { .. } => "SurfPreview",
            TvmpEvent::SurfCommitted { .. } => "SurfCommitted",
            TvmpEvent::SurfCanceled { .. } => "SurfCanceled",
            TvmpEvent::CatalogChanged { .. } => "CatalogChanged",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use tvmp_common::events::{EventBus, TvmpEvent};
/// use tvmp_common::ChannelId;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(TvmpEvent::SurfCommitted {
///     channel_id: ChannelId::new("ch-7"),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TvmpEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TvmpEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TvmpEvent,
    ) -> Result<usize, broadcast::error::SendError<TvmpEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TvmpEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
