use crate::core::domain::{
    error::{SwapperError, SwapperResult},
    model::job::ActiveJob,
};
use crate::core::infrastructure::queue::{JobContext, JobHandler};
use crate::swapper::application::{
    response::{api_response::ApiResponse, outcome::ActiveOutcome},
    service::active_service::ActiveService,
};
use crate::swapper::context::SwapperContext;
use async_trait::async_trait;
use serde_json::Value;

/// Worker of the `active` queue.
#[derive(Debug, Clone)]
pub struct ActiveHandler {
    service: ActiveService,
}

impl ActiveHandler {
    pub fn new(ctx: SwapperContext) -> Self {
        Self {
            service: ActiveService::new(ctx),
        }
    }
}

#[async_trait]
impl JobHandler<ActiveJob> for ActiveHandler {
    async fn handle(&self, job: ActiveJob, ctx: &JobContext) -> SwapperResult<Value> {
        let response = match self.service.execute(job, ctx).await? {
            ActiveOutcome::NoActiveVm => {
                ApiResponse::failure(SwapperError::NoActiveVm.to_string())
            }
            outcome => ApiResponse::ok(outcome),
        };
        Ok(serde_json::to_value(response)?)
    }
}
