//! Channel and program value types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel identifier as assigned by the media server
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Reference to the program currently airing on a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramRef {
    /// Program identifier in the guide
    pub id: String,
    /// Program title
    pub title: String,
    /// Scheduled start
    pub start: Option<chrono::DateTime<chrono::Utc>>,
    /// Scheduled end
    pub end: Option<chrono::DateTime<chrono::Utc>>,
}

/// Live TV channel
///
/// Immutable value sourced from the channel catalog; identity is `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    /// Display number ("4", "4.1")
    pub number: String,
    pub name: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    pub stream_url: String,
    #[serde(default)]
    pub now_playing: Option<ProgramRef>,
    #[serde(default)]
    pub favorite: bool,
}

impl Channel {
    /// Minimal channel (used by tests and tooling)
    pub fn new(id: impl Into<String>, number: impl Into<String>, name: impl Into<String>, stream_url: impl Into<String>) -> Self {
        Self {
            id: ChannelId::new(id),
            number: number.into(),
            name: name.into(),
            logo_url: None,
            group: None,
            stream_url: stream_url.into(),
            now_playing: None,
            favorite: false,
        }
    }
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Channel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_identity_is_id() {
        let a = Channel::new("ch-1", "1", "One", "http://server/live/1.m3u8");
        let mut b = a.clone();
        b.name = "Renamed".to_string();
        b.favorite = true;
        assert_eq!(a, b);

        let c = Channel::new("ch-2", "1", "One", "http://server/live/1.m3u8");
        assert_ne!(a, c);
    }

    #[test]
    fn test_channel_id_serializes_transparently() {
        let id = ChannelId::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
