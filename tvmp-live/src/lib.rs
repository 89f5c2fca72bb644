//! # TVMP Live Playback Library (tvmp-live)
//!
//! Orchestration core for live TV playback.
//!
//! **Purpose:** Keep adjacent channels pre-buffered for instant channel
//! changes, run up to four simultaneous multiview tiles with per-slot DVR,
//! debounce channel surfing, and expose all of it over HTTP/SSE.
//!
//! **Architecture:** Decoding and rendering live behind the `StreamEngine`
//! capability; this crate only creates, controls, observes and releases
//! sessions.

pub mod api;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod playback;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
