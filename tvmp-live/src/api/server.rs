//! HTTP server setup and routing
//!
//! Sets up the Axum server with the control endpoints and the SSE stream.

use crate::catalog::ChannelCatalog;
use crate::error::{Error, Result};
use crate::playback::{ChannelSurfCoordinator, LiveController, SlotGrid};
use crate::state::SharedState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub catalog: Arc<dyn ChannelCatalog>,
    pub controller: Arc<LiveController>,
    pub surf: Arc<ChannelSurfCoordinator>,
    pub grid: Arc<SlotGrid>,
}

/// Build the router with all routes attached to `ctx`
pub fn build_router(ctx: AppContext) -> Router {
    use super::handlers;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/channels", get(handlers::list_channels))

        // Live playback
        .route("/live", get(handlers::get_live))
        .route("/live/tune", post(handlers::tune))
        .route("/live/retry", post(handlers::retry))

        // Channel surfing
        .route("/surf", get(handlers::get_surf))
        .route("/surf/begin", post(handlers::surf_begin))
        .route("/surf/confirm", post(handlers::surf_confirm))
        .route("/surf/cancel", post(handlers::surf_cancel))

        // Pre-buffer
        .route("/buffer", get(handlers::get_buffer))

        // Multiview
        .route(
            "/multiview",
            get(handlers::get_multiview)
                .post(handlers::init_multiview)
                .delete(handlers::clear_multiview),
        )
        .route("/multiview/slots", post(handlers::add_slot))
        .route("/multiview/slots/:index", delete(handlers::remove_slot))
        .route("/multiview/slots/:index/channel", post(handlers::set_slot_channel))
        .route("/multiview/slots/:index/mute", post(handlers::toggle_slot_mute))
        .route("/multiview/slots/:index/focus", post(handlers::focus_slot))
        .route("/multiview/slots/:index/pause", post(handlers::pause_slot))
        .route("/multiview/slots/:index/resume", post(handlers::resume_slot))
        .route("/multiview/slots/:index/rewind", post(handlers::rewind_slot))
        .route("/multiview/slots/:index/fast_forward", post(handlers::fast_forward_slot))
        .route("/multiview/slots/:index/live", post(handlers::slot_to_live))
        .route("/multiview/pause_all", post(handlers::pause_all))
        .route("/multiview/resume_all", post(handlers::resume_all))
        .route("/multiview/live_all", post(handlers::live_all))
        .route("/multiview/sync", post(handlers::sync_all))

        // SSE event stream
        .route("/events", get(super::sse::event_stream))

        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Run the HTTP API server until `shutdown` resolves
pub async fn run<F>(port: u16, ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
