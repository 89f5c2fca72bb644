//! # TVMP Common Library
//!
//! Shared code for the TVMP live-TV client crates:
//! - Channel and program value types
//! - Event types (TvmpEvent enum) and the EventBus
//! - Per-slot DVR state machine and multiview layouts
//! - Configuration file resolution
//! - Common error type

pub mod config;
pub mod dvr;
pub mod error;
pub mod events;
pub mod models;

pub use dvr::DvrState;
pub use error::{Error, Result};
pub use models::{Channel, ChannelId, ProgramRef};
