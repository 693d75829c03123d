//! REST surface: thin translators from HTTP calls to registry reads and queued jobs.
//!
//! Every handler answers `200` with an [`ApiResponse`] envelope; failures are
//! reported as `{success: false, error}`. Only the access guard uses other
//! status codes.

pub mod active;
pub mod middleware;
pub mod qm;

use crate::core::domain::error::SwapperError;
use crate::swapper::application::{
    response::api_response::ApiResponse,
    service::registry_service::RegistryService,
    worker::runtime::JobQueues,
};
use crate::swapper::context::SwapperContext;
use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared state of every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub ctx: SwapperContext,
    pub queues: JobQueues,
}

impl AppState {
    pub fn new(ctx: SwapperContext, queues: JobQueues) -> Self {
        Self { ctx, queues }
    }

    pub(crate) fn registry(&self) -> RegistryService {
        RegistryService::new(self.ctx.clone())
    }
}

pub type ApiJson<T> = Json<ApiResponse<T>>;

pub(crate) fn failure<T>(error: &SwapperError) -> ApiJson<T> {
    warn!(error = %error, "request failed");
    Json(ApiResponse::failure(error.to_string()))
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiInformation {
    pub version: &'static str,
    pub tested: TestedVersions,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestedVersions {
    #[serde(rename = "proxmox-ve")]
    pub proxmox_ve: &'static str,
}

async fn information() -> Json<ApiInformation> {
    Json(ApiInformation {
        version: "v1",
        tested: TestedVersions {
            proxmox_ve: "8.0...8.4.1",
        },
    })
}

/// Builds the `/api/v1` router behind the access guard.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1", get(information))
        .route("/api/v1/qm", get(qm::list))
        .route("/api/v1/qm/:id", get(qm::overview))
        .route("/api/v1/qm/:id/swap", post(qm::swap))
        .route("/api/v1/active", get(active::view))
        .route("/api/v1/active/sync", post(active::sync))
        .route("/api/v1/active/stop", post(active::stop))
        .route("/api/v1/active/halt", post(active::halt))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::access_guard,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
