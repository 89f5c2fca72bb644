//! Channel catalog
//!
//! Read-only source of the ordered channel list and stream URLs. The
//! guide/metadata service behind it is external; [`StaticCatalog`] serves a
//! channel list loaded from a TOML file and supports the two mutations the
//! core reacts to (favorites, now playing).

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info};
use tvmp_common::{Channel, ChannelId, ProgramRef};

/// Catalog change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogChange {
    FavoriteChanged(ChannelId),
    NowPlayingChanged(ChannelId),
    /// Whole list replaced
    Reloaded,
}

impl CatalogChange {
    pub fn channel_id(&self) -> Option<&ChannelId> {
        match self {
            CatalogChange::FavoriteChanged(id) | CatalogChange::NowPlayingChanged(id) => Some(id),
            CatalogChange::Reloaded => None,
        }
    }
}

pub trait ChannelCatalog: Send + Sync + 'static {
    /// Channels in guide order
    fn ordered_channels(&self) -> Vec<Channel>;

    /// Playable stream URL for `channel`
    fn stream_url(&self, channel: &Channel) -> Result<String>;

    /// Change notifications (favorites, now playing, reload)
    fn subscribe(&self) -> broadcast::Receiver<CatalogChange>;

    fn channel(&self, id: &ChannelId) -> Option<Channel> {
        self.ordered_channels().into_iter().find(|c| &c.id == id)
    }

    /// Favorites in guide order
    fn favorites(&self) -> Vec<Channel> {
        self.ordered_channels().into_iter().filter(|c| c.favorite).collect()
    }
}

/// Channel list file format
///
/// ```toml
/// base_url = "http://media.local:8096/livetv"
///
/// [[channels]]
/// id = "ch-4"
/// number = "4"
/// name = "Channel Four"
/// stream_url = "4/stream.m3u8"
/// favorite = true
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelListFile {
    /// Prefix for relative `stream_url`s
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

/// In-memory catalog
pub struct StaticCatalog {
    channels: RwLock<Vec<Channel>>,
    base_url: Option<String>,
    change_tx: broadcast::Sender<CatalogChange>,
}

impl StaticCatalog {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self::with_base_url(channels, None)
    }

    pub fn with_base_url(channels: Vec<Channel>, base_url: Option<String>) -> Self {
        let (change_tx, _) = broadcast::channel(64);
        Self {
            channels: RwLock::new(channels),
            base_url,
            change_tx,
        }
    }

    /// Load a channel list file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read channel list {}: {}", path.display(), e)))?;
        let file: ChannelListFile = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse channel list {}: {}", path.display(), e)))?;

        info!("Loaded {} channels from {}", file.channels.len(), path.display());
        Ok(Self::with_base_url(file.channels, file.base_url))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns false if the channel is unknown
    pub fn set_favorite(&self, id: &ChannelId, favorite: bool) -> bool {
        let changed = self.update(id, |channel| {
            if channel.favorite == favorite {
                return false;
            }
            channel.favorite = favorite;
            true
        });
        if changed {
            self.notify(CatalogChange::FavoriteChanged(id.clone()));
        }
        changed
    }

    /// Returns false if the channel is unknown
    pub fn set_now_playing(&self, id: &ChannelId, program: Option<ProgramRef>) -> bool {
        let changed = self.update(id, |channel| {
            channel.now_playing = program.clone();
            true
        });
        if changed {
            self.notify(CatalogChange::NowPlayingChanged(id.clone()));
        }
        changed
    }

    /// Replace the whole list
    pub fn replace(&self, channels: Vec<Channel>) {
        *self.write() = channels;
        self.notify(CatalogChange::Reloaded);
    }

    fn update(&self, id: &ChannelId, apply: impl FnOnce(&mut Channel) -> bool) -> bool {
        let mut channels = self.write();
        match channels.iter_mut().find(|c| &c.id == id) {
            Some(channel) => apply(channel),
            None => false,
        }
    }

    fn notify(&self, change: CatalogChange) {
        debug!("Catalog change: {:?}", change);
        let _ = self.change_tx.send(change);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Channel>> {
        self.channels.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Channel>> {
        self.channels.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ChannelCatalog for StaticCatalog {
    fn ordered_channels(&self) -> Vec<Channel> {
        self.read().clone()
    }

    fn stream_url(&self, channel: &Channel) -> Result<String> {
        let url = channel.stream_url.trim();
        if url.is_empty() {
            return Err(Error::StreamUnavailable(format!("channel {} has no stream URL", channel.id)));
        }
        if url.contains("://") {
            return Ok(url.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/'))),
            None => Err(Error::StreamUnavailable(format!(
                "channel {} has relative stream URL '{}' and no base_url",
                channel.id, url
            ))),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<CatalogChange> {
        self.change_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> StaticCatalog {
        StaticCatalog::new(vec![
            Channel::new("a", "1", "A", "http://tv/a.m3u8"),
            Channel::new("b", "2", "B", "http://tv/b.m3u8"),
        ])
    }

    #[test]
    fn test_lookup_and_order() {
        let catalog = sample();
        let ordered = catalog.ordered_channels();
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].id.as_str(), "a");
        assert_eq!(catalog.channel(&ChannelId::new("b")).unwrap().name, "B");
        assert!(catalog.channel(&ChannelId::new("z")).is_none());
    }

    #[tokio::test]
    async fn test_favorite_change_notifies() {
        let catalog = sample();
        let mut rx = catalog.subscribe();

        assert!(catalog.set_favorite(&ChannelId::new("b"), true));
        assert_eq!(rx.recv().await.unwrap(), CatalogChange::FavoriteChanged(ChannelId::new("b")));
        assert_eq!(catalog.favorites().len(), 1);

        // Unchanged value: no notification
        assert!(!catalog.set_favorite(&ChannelId::new("b"), true));
        assert!(rx.try_recv().is_err());

        // Unknown channel
        assert!(!catalog.set_favorite(&ChannelId::new("nope"), true));
    }

    #[tokio::test]
    async fn test_now_playing_change_notifies() {
        let catalog = sample();
        let mut rx = catalog.subscribe();
        let program = ProgramRef {
            id: "p1".into(),
            title: "Evening News".into(),
            start: None,
            end: None,
        };

        assert!(catalog.set_now_playing(&ChannelId::new("a"), Some(program.clone())));
        assert_eq!(rx.recv().await.unwrap(), CatalogChange::NowPlayingChanged(ChannelId::new("a")));
        assert_eq!(catalog.channel(&ChannelId::new("a")).unwrap().now_playing, Some(program));
    }

    #[test]
    fn test_stream_url_resolution() {
        let catalog = StaticCatalog::with_base_url(vec![], Some("http://server/livetv/".into()));
        let relative = Channel::new("r", "1", "R", "/r/index.m3u8");
        assert_eq!(catalog.stream_url(&relative).unwrap(), "http://server/livetv/r/index.m3u8");

        let absolute = Channel::new("x", "2", "X", "rtsp://cam/live");
        assert_eq!(catalog.stream_url(&absolute).unwrap(), "rtsp://cam/live");

        let empty = Channel::new("e", "3", "E", "");
        assert!(matches!(catalog.stream_url(&empty), Err(Error::StreamUnavailable(_))));

        let no_base = sample();
        assert!(matches!(no_base.stream_url(&relative), Err(Error::StreamUnavailable(_))));
    }

    #[test]
    fn test_load_channel_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
base_url = "http://media.local/livetv"

[[channels]]
id = "ch-4"
number = "4"
name = "Four"
stream_url = "4/stream.m3u8"
favorite = true

[[channels]]
id = "ch-5"
number = "5"
name = "Five"
stream_url = "http://other/5.m3u8"
group = "News"
"#
        )
        .unwrap();

        let catalog = StaticCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        let four = catalog.channel(&ChannelId::new("ch-4")).unwrap();
        assert!(four.favorite);
        assert_eq!(catalog.stream_url(&four).unwrap(), "http://media.local/livetv/4/stream.m3u8");
        let five = catalog.channel(&ChannelId::new("ch-5")).unwrap();
        assert_eq!(five.group.as_deref(), Some("News"));
    }

    #[test]
    fn test_replace_notifies_reload() {
        let catalog = sample();
        let mut rx = catalog.subscribe();
        catalog.replace(vec![Channel::new("z", "9", "Z", "http://tv/z.m3u8")]);
        assert_eq!(rx.try_recv().unwrap(), CatalogChange::Reloaded);
        assert_eq!(catalog.len(), 1);
    }
}
