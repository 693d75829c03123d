use crate::core::domain::{error::SwapperResult, model::job::RequestJob};
use crate::core::infrastructure::queue::{JobContext, JobHandler};
use crate::swapper::application::{
    response::api_response::ApiResponse, service::swap_service::SwapService,
};
use crate::swapper::context::SwapperContext;
use async_trait::async_trait;
use serde_json::Value;

/// Worker of the `requests` queue: one swap at a time.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    swap: SwapService,
}

impl RequestHandler {
    pub fn new(ctx: SwapperContext) -> Self {
        Self {
            swap: SwapService::new(ctx),
        }
    }
}

#[async_trait]
impl JobHandler<RequestJob> for RequestHandler {
    async fn handle(&self, job: RequestJob, ctx: &JobContext) -> SwapperResult<Value> {
        let outcome = self.swap.execute(&job.target, ctx).await?;
        Ok(serde_json::to_value(ApiResponse::ok(outcome))?)
    }
}
