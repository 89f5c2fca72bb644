//! Playback-related type definitions
//!
//! Supporting types for session readiness, multiview layout and surfing.

use serde::{Deserialize, Serialize};

/// Category of a playback failure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Stream URL or manifest could not be fetched
    StreamUnavailable,
    /// Engine reported a playback/decode error
    DecodeFailed,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::StreamUnavailable => write!(f, "stream_unavailable"),
            FailureKind::DecodeFailed => write!(f, "decode_failed"),
        }
    }
}

/// Readiness of a playback session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionReadiness {
    /// Engine is opening the stream / filling its buffer
    Loading,
    /// First frames available; playable
    Ready,
    /// Engine gave up on this stream
    Failed { kind: FailureKind, message: String },
}

impl SessionReadiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionReadiness::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SessionReadiness::Failed { .. })
    }
}

impl std::fmt::Display for SessionReadiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionReadiness::Loading => write!(f, "Loading"),
            SessionReadiness::Ready => write!(f, "Ready"),
            SessionReadiness::Failed { kind, message } => write!(f, "Failed({}: {})", kind, message),
        }
    }
}

/// Multiview grid arrangement, chosen solely from the slot count
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MultiviewLayout {
    /// One full-screen slot
    Single,
    /// Two side by side
    TwoUp,
    /// Two on top, one below
    ThreeGrid,
    /// 2x2
    TwoByTwo,
}

impl MultiviewLayout {
    /// Layout for `count` slots (1..=4)
    pub fn for_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(MultiviewLayout::Single),
            2 => Some(MultiviewLayout::TwoUp),
            3 => Some(MultiviewLayout::ThreeGrid),
            4 => Some(MultiviewLayout::TwoByTwo),
            _ => None,
        }
    }
}

/// Surf direction through the ordered channel list
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SurfDirection {
    Next,
    Previous,
}

impl SurfDirection {
    /// Index delta for circular adjacency arithmetic
    pub fn delta(self) -> isize {
        match self {
            SurfDirection::Next => 1,
            SurfDirection::Previous => -1,
        }
    }
}
