//! Stream engine capability
//!
//! The playback core never decodes or renders. It drives an opaque engine
//! through this capability set: create a handle for a URL, control it, and
//! observe its asynchronous readiness. Any engine implementing
//! [`StreamEngine`] is substitutable.

pub mod simulated;

pub use simulated::SimulatedEngine;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tvmp_common::events::SessionReadiness;

/// How a session should be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Small forward buffer for background pre-loading
    pub low_buffer: bool,
    /// Forward buffer the engine should aim for
    pub forward_buffer: Duration,
    /// Start playing as soon as ready
    pub auto_play: bool,
    /// Initial mute state
    pub muted: bool,
}

impl SessionOptions {
    /// Foreground playback: normal buffer, auto-play, audible
    pub fn foreground() -> Self {
        Self {
            low_buffer: false,
            forward_buffer: Duration::from_secs(30),
            auto_play: true,
            muted: false,
        }
    }

    /// Background pre-buffer: low buffer, no auto-play, muted
    pub fn prebuffer(forward_buffer: Duration) -> Self {
        Self {
            low_buffer: true,
            forward_buffer,
            auto_play: false,
            muted: true,
        }
    }

    /// Multiview tile: normal buffer, auto-play, with the given mute state
    pub fn tile(muted: bool) -> Self {
        Self {
            muted,
            ..Self::foreground()
        }
    }
}

/// Creates engine handles bound to stream URLs
///
/// `create` covers URL/manifest fetch; a failure there is
/// `Error::StreamUnavailable`. Decoder start-up continues in the background
/// and is reported through [`EngineHandle::readiness`].
#[async_trait]
pub trait StreamEngine: Send + Sync + 'static {
    async fn create(&self, url: &str, options: SessionOptions) -> Result<Box<dyn EngineHandle>>;
}

/// One decode/render pipeline owned by the engine
///
/// Control calls are fire-and-forget. `destroy` stops playback and detaches
/// the renderer; callers invoke it exactly once.
pub trait EngineHandle: Send + Sync {
    fn play(&self);

    fn pause(&self);

    /// Seek to `offset_secs` behind the live edge (0 = live)
    fn seek(&self, offset_secs: u32);

    fn set_muted(&self, muted: bool);

    fn destroy(&self);

    /// Readiness/error event stream ("status changed")
    ///
    /// The receiver may be polled from any task; consumers marshal the
    /// value onto their own state before acting on it.
    fn readiness(&self) -> watch::Receiver<SessionReadiness>;
}
