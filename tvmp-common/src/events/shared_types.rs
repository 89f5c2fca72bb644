//! Shared type definitions for event data
//!
//! Snapshot structs published to observers; plain data, no handles.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::playback_types::SessionReadiness;
use crate::dvr::DvrState;
use crate::models::ChannelId;

/// One multiview slot as seen by observers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotInfo {
    /// Slot index (contiguous 0..count-1)
    pub index: usize,
    pub channel_id: ChannelId,
    pub channel_name: String,
    /// Engine session instance bound to the slot
    pub session_id: Uuid,
    pub readiness: SessionReadiness,
    pub is_muted: bool,
    pub is_buffering: bool,
    pub dvr: DvrState,
}

/// One pre-buffered channel as seen by observers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BufferedChannelInfo {
    pub channel_id: ChannelId,
    pub session_id: Uuid,
    pub readiness: SessionReadiness,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
