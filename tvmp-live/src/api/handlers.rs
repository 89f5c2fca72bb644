//! HTTP request handlers
//!
//! Commands map one-to-one onto the playback managers. Errors follow one
//! policy (see the `IntoResponse` impl below): invalid operations are
//! acknowledged as ignored, stream failures come back as 502 with a retry
//! hint.

use crate::api::server::AppContext;
use crate::error::Error;
use crate::playback::channel_surf::SurfState;
use crate::playback::controller::{LiveStatus, TuneOutcome};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use tvmp_common::events::{BufferedChannelInfo, MultiviewLayout, SlotInfo, SurfDirection};
use tvmp_common::{Channel, ChannelId, DvrState};

type ApiResult<T> = std::result::Result<Json<T>, Error>;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct ChannelsResponse {
    channels: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelRequest {
    channel_id: ChannelId,
}

#[derive(Debug, Deserialize)]
pub struct SurfRequest {
    direction: SurfDirection,
}

#[derive(Debug, Serialize)]
pub struct SurfStatusResponse {
    active: bool,
    surf: Option<SurfState>,
}

#[derive(Debug, Serialize)]
pub struct BufferStatusResponse {
    buffered: Vec<BufferedChannelInfo>,
    absorbed_failures: u64,
}

#[derive(Debug, Serialize)]
pub struct MultiviewResponse {
    layout: Option<MultiviewLayout>,
    slots: Vec<SlotInfo>,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    seconds: u32,
}

#[derive(Debug, Serialize)]
pub struct DvrResponse {
    index: usize,
    dvr: DvrState,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    offset_secs: Option<u32>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            // No-op guard: acknowledged, nothing changed
            Error::InvalidOperation(reason) => {
                debug!("Ignored command: {}", reason);
                (
                    StatusCode::OK,
                    Json(serde_json::json!({ "status": "ignored", "reason": reason })),
                )
                    .into_response()
            }
            Error::StreamUnavailable(_) | Error::DecodeFailed(_) => (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "status": "error",
                    "error": self.to_string(),
                    "retryable": self.is_retryable(),
                })),
            )
                .into_response(),
            _ => {
                error!("Request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "status": "error", "error": self.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

// ============================================================================
// Health / Catalog
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "tvmp-live".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /channels
pub async fn list_channels(State(ctx): State<AppContext>) -> Json<ChannelsResponse> {
    Json(ChannelsResponse {
        channels: ctx.catalog.ordered_channels(),
    })
}

// ============================================================================
// Live playback
// ============================================================================

/// GET /live
pub async fn get_live(State(ctx): State<AppContext>) -> Json<LiveStatus> {
    Json(ctx.controller.main_session_state().await)
}

/// POST /live/tune
pub async fn tune(State(ctx): State<AppContext>, Json(req): Json<ChannelRequest>) -> ApiResult<TuneOutcome> {
    info!("Tune request: {}", req.channel_id);
    Ok(Json(ctx.controller.tune(&req.channel_id).await?))
}

/// POST /live/retry
pub async fn retry(State(ctx): State<AppContext>) -> ApiResult<TuneOutcome> {
    Ok(Json(ctx.controller.retry().await?))
}

// ============================================================================
// Channel surfing
// ============================================================================

/// POST /surf/begin
pub async fn surf_begin(State(ctx): State<AppContext>, Json(req): Json<SurfRequest>) -> ApiResult<SurfState> {
    Ok(Json(ctx.surf.begin_surf(req.direction).await?))
}

/// POST /surf/confirm
pub async fn surf_confirm(State(ctx): State<AppContext>) -> ApiResult<TuneOutcome> {
    Ok(Json(ctx.surf.confirm_now().await?))
}

/// POST /surf/cancel
pub async fn surf_cancel(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    let status = if ctx.surf.cancel().await { "canceled" } else { "ignored" };
    Json(StatusResponse {
        status: status.to_string(),
    })
}

/// GET /surf
pub async fn get_surf(State(ctx): State<AppContext>) -> Json<SurfStatusResponse> {
    let surf = ctx.surf.status().await;
    Json(SurfStatusResponse {
        active: surf.is_some(),
        surf,
    })
}

// ============================================================================
// Pre-buffer
// ============================================================================

/// GET /buffer
pub async fn get_buffer(State(ctx): State<AppContext>) -> Json<BufferStatusResponse> {
    Json(BufferStatusResponse {
        buffered: ctx.controller.buffer().snapshot().await,
        absorbed_failures: ctx.state.absorbed_prebuffer_failures(),
    })
}

// ============================================================================
// Multiview
// ============================================================================

async fn multiview_snapshot(ctx: &AppContext) -> Json<MultiviewResponse> {
    Json(MultiviewResponse {
        layout: ctx.grid.layout().await,
        slots: ctx.grid.snapshot().await,
    })
}

/// GET /multiview
pub async fn get_multiview(State(ctx): State<AppContext>) -> Json<MultiviewResponse> {
    multiview_snapshot(&ctx).await
}

/// POST /multiview - (re)start the grid from the head of the channel list
pub async fn init_multiview(State(ctx): State<AppContext>) -> ApiResult<MultiviewResponse> {
    ctx.grid.initialize(&ctx.catalog.ordered_channels()).await?;
    Ok(multiview_snapshot(&ctx).await)
}

/// DELETE /multiview - release every slot
pub async fn clear_multiview(State(ctx): State<AppContext>) -> Json<MultiviewResponse> {
    ctx.grid.cleanup().await;
    multiview_snapshot(&ctx).await
}

/// POST /multiview/slots
pub async fn add_slot(State(ctx): State<AppContext>) -> ApiResult<MultiviewResponse> {
    ctx.grid.add_slot().await?;
    Ok(multiview_snapshot(&ctx).await)
}

/// DELETE /multiview/slots/:index
pub async fn remove_slot(State(ctx): State<AppContext>, Path(index): Path<usize>) -> ApiResult<MultiviewResponse> {
    ctx.grid.remove_slot(index).await?;
    Ok(multiview_snapshot(&ctx).await)
}

/// POST /multiview/slots/:index/channel
pub async fn set_slot_channel(
    State(ctx): State<AppContext>,
    Path(index): Path<usize>,
    Json(req): Json<ChannelRequest>,
) -> ApiResult<MultiviewResponse> {
    ctx.grid.set_channel(index, &req.channel_id).await?;
    Ok(multiview_snapshot(&ctx).await)
}

/// POST /multiview/slots/:index/mute
pub async fn toggle_slot_mute(State(ctx): State<AppContext>, Path(index): Path<usize>) -> ApiResult<MultiviewResponse> {
    ctx.grid.toggle_mute(index).await?;
    Ok(multiview_snapshot(&ctx).await)
}

/// POST /multiview/slots/:index/focus
pub async fn focus_slot(State(ctx): State<AppContext>, Path(index): Path<usize>) -> ApiResult<MultiviewResponse> {
    ctx.grid.set_audio_focus(index).await?;
    Ok(multiview_snapshot(&ctx).await)
}

/// POST /multiview/slots/:index/pause
pub async fn pause_slot(State(ctx): State<AppContext>, Path(index): Path<usize>) -> ApiResult<DvrResponse> {
    let dvr = ctx.grid.pause(index).await?;
    Ok(Json(DvrResponse { index, dvr }))
}

/// POST /multiview/slots/:index/resume
pub async fn resume_slot(State(ctx): State<AppContext>, Path(index): Path<usize>) -> ApiResult<DvrResponse> {
    let dvr = ctx.grid.resume(index).await?;
    Ok(Json(DvrResponse { index, dvr }))
}

/// POST /multiview/slots/:index/rewind
pub async fn rewind_slot(
    State(ctx): State<AppContext>,
    Path(index): Path<usize>,
    Json(req): Json<SeekRequest>,
) -> ApiResult<DvrResponse> {
    let dvr = ctx.grid.rewind(index, req.seconds).await?;
    Ok(Json(DvrResponse { index, dvr }))
}

/// POST /multiview/slots/:index/fast_forward
pub async fn fast_forward_slot(
    State(ctx): State<AppContext>,
    Path(index): Path<usize>,
    Json(req): Json<SeekRequest>,
) -> ApiResult<DvrResponse> {
    let dvr = ctx.grid.fast_forward(index, req.seconds).await?;
    Ok(Json(DvrResponse { index, dvr }))
}

/// POST /multiview/slots/:index/live
pub async fn slot_to_live(State(ctx): State<AppContext>, Path(index): Path<usize>) -> ApiResult<DvrResponse> {
    let dvr = ctx.grid.jump_to_live(index).await?;
    Ok(Json(DvrResponse { index, dvr }))
}

/// POST /multiview/pause_all
pub async fn pause_all(State(ctx): State<AppContext>) -> ApiResult<MultiviewResponse> {
    ctx.grid.pause_all().await?;
    Ok(multiview_snapshot(&ctx).await)
}

/// POST /multiview/resume_all
pub async fn resume_all(State(ctx): State<AppContext>) -> ApiResult<MultiviewResponse> {
    ctx.grid.resume_all().await?;
    Ok(multiview_snapshot(&ctx).await)
}

/// POST /multiview/live_all
pub async fn live_all(State(ctx): State<AppContext>) -> ApiResult<MultiviewResponse> {
    ctx.grid.jump_all_to_live().await?;
    Ok(multiview_snapshot(&ctx).await)
}

/// POST /multiview/sync
pub async fn sync_all(State(ctx): State<AppContext>) -> ApiResult<SyncResponse> {
    let offset_secs = ctx.grid.sync_all_streams().await?;
    Ok(Json(SyncResponse { offset_secs }))
}
