use crate::api::{ApiJson, AppState, failure};
use crate::core::domain::{
    model::{
        job::RequestJob,
        vm::{VirtualMachine, VmOverview, VmStatus},
    },
    value_object::VmId,
};
use crate::swapper::application::response::api_response::ApiResponse;
use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;

const MACHINE_NOT_FOUND: &str = "Machine not found";
const ALREADY_ONLINE: &str = "Machine is already online! Use /api/v1/active/sync to sync devices, or /api/v1/qm/active/stop to stop machine";

/// `GET /api/v1/qm`
pub async fn list(State(state): State<AppState>) -> ApiJson<Vec<VirtualMachine>> {
    match state.registry().all(true).await {
        Ok(machines) => Json(ApiResponse::ok(machines)),
        Err(e) => failure(&e),
    }
}

/// `GET /api/v1/qm/:id`
pub async fn overview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiJson<VmOverview> {
    let id = match VmId::parse(&id) {
        Ok(id) => id,
        Err(e) => return failure(&e),
    };
    match state.registry().overview(id).await {
        Ok(Some(overview)) => Json(ApiResponse::ok(overview)),
        Ok(None) => Json(ApiResponse::failure(MACHINE_NOT_FOUND)),
        Err(e) => failure(&e),
    }
}

/// `POST /api/v1/qm/:id/swap`
pub async fn swap(State(state): State<AppState>, Path(id): Path<String>) -> ApiJson<()> {
    let id = match VmId::parse(&id) {
        Ok(id) => id,
        Err(e) => return failure(&e),
    };
    let overview = match state.registry().overview(id).await {
        Ok(Some(overview)) => overview,
        Ok(None) => return Json(ApiResponse::failure(MACHINE_NOT_FOUND)),
        Err(e) => return failure(&e),
    };
    if overview.status != VmStatus::Stopped {
        return Json(ApiResponse::failure(ALREADY_ONLINE));
    }

    let job = RequestJob {
        target: id.to_string(),
    };
    match state.queues.requests.add(job) {
        Ok(job_id) => {
            let name = overview.name().unwrap_or(overview.swapper.name.as_str());
            info!(vmid = %id, job_id, "swap request queued");
            Json(ApiResponse::message(format!(
                "Successfully queued swap request for {} ({})",
                name, id
            )))
        }
        Err(e) => failure(&e),
    }
}
