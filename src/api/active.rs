use crate::api::{ApiJson, AppState, failure};
use crate::core::domain::{
    error::{SwapperError, SwapperResult},
    model::{job::ActiveJob, vm::{VirtualMachine, VmOverview}},
};
use crate::swapper::application::response::api_response::ApiResponse;
use axum::{Json, extract::State};
use tracing::info;

const NO_ACTIVE: &str = "No active QM found";
const HALT_DISABLED: &str = "Halting is disabled";

/// `GET /api/v1/active`
pub async fn view(State(state): State<AppState>) -> ApiJson<VmOverview> {
    let active = match state.registry().active().await {
        Ok(Some(vm)) => vm,
        Ok(None) => return Json(ApiResponse::failure(NO_ACTIVE)),
        Err(e) => return failure(&e),
    };
    match state.registry().overview(active.id).await {
        Ok(Some(overview)) => Json(ApiResponse::ok(overview)),
        Ok(None) => Json(ApiResponse::failure(NO_ACTIVE)),
        Err(e) => failure(&e),
    }
}

/// `POST /api/v1/active/sync`
pub async fn sync(State(state): State<AppState>) -> ApiJson<()> {
    enqueue(&state, ActiveJob::DeviceSync).await
}

/// `POST /api/v1/active/stop`
pub async fn stop(State(state): State<AppState>) -> ApiJson<()> {
    enqueue(&state, ActiveJob::Stop).await
}

/// `POST /api/v1/active/halt`
///
/// Refused unless forced halting was opted into at startup.
pub async fn halt(State(state): State<AppState>) -> ApiJson<()> {
    if !state.ctx.options.power_halt {
        return failure(&SwapperError::SecurityDenied(HALT_DISABLED.to_string()));
    }
    enqueue(&state, ActiveJob::HangingStop).await
}

async fn enqueue(state: &AppState, job: ActiveJob) -> ApiJson<()> {
    match queue_for_active(state, job).await {
        Ok(Some(_)) => Json(ApiResponse::done()),
        Ok(None) => Json(ApiResponse::failure(NO_ACTIVE)),
        Err(e) => failure(&e),
    }
}

async fn queue_for_active(state: &AppState, job: ActiveJob) -> SwapperResult<Option<VirtualMachine>> {
    let Some(active) = state.registry().active().await? else {
        return Ok(None);
    };
    let job_id = state.queues.active.add(job)?;
    info!(vmid = %active.id, job_id, job = job.title(), "active job queued");
    Ok(Some(active))
}
