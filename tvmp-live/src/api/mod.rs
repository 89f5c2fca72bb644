//! HTTP/SSE control surface
//!
//! Commands in, published state out. The playback core does no rendering;
//! whatever draws the tiles and overlays talks to it through here.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{build_router, run, AppContext};
