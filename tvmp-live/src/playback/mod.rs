//! Live playback orchestration
//!
//! Pre-buffering of adjacent channels, the foreground controller, surf
//! debouncing and the multiview grid. All of them drive sessions through
//! the [`crate::engine::StreamEngine`] capability and never decode anything
//! themselves.

pub mod adjacency;
pub mod buffer_manager;
pub mod channel_surf;
pub mod controller;
pub mod session;
pub mod slot_grid;

pub use buffer_manager::BufferManager;
pub use channel_surf::{ChannelSurfCoordinator, SurfState};
pub use controller::{LiveController, LiveStatus, TuneOutcome};
pub use session::PlaybackSession;
pub use slot_grid::{SlotGrid, MAX_SLOTS};
