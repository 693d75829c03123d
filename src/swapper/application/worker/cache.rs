use crate::core::domain::{
    error::SwapperResult,
    model::job::{ActiveJob, CacheJob},
};
use crate::core::infrastructure::queue::{JobContext, JobHandler, Queue};
use crate::swapper::application::{
    response::{
        api_response::ApiResponse,
        progress::{CacheJobStatus, Progress},
    },
    service::{
        change_detection_service::ChangeDetectionService, registry_service::RegistryService,
    },
};
use crate::swapper::context::SwapperContext;
use async_trait::async_trait;
use serde_json::Value;

/// Worker of the `cache` queue: registry refreshes and change-detection ticks.
#[derive(Debug, Clone)]
pub struct CacheHandler {
    registry: RegistryService,
    detector: ChangeDetectionService,
}

impl CacheHandler {
    pub fn new(ctx: SwapperContext, active_queue: Queue<ActiveJob>) -> Self {
        Self {
            registry: RegistryService::new(ctx.clone()),
            detector: ChangeDetectionService::new(ctx, active_queue),
        }
    }
}

#[async_trait]
impl JobHandler<CacheJob> for CacheHandler {
    async fn handle(&self, job: CacheJob, ctx: &JobContext) -> SwapperResult<Value> {
        match job {
            CacheJob::UpdateCache => {
                ctx.progress(&Progress::Cache {
                    status: CacheJobStatus::ActiveQMsUpdate,
                });
                let report = self.registry.update_cache().await?;
                Ok(serde_json::to_value(ApiResponse::ok(report))?)
            }
            CacheJob::EventListener => {
                let changes = self.detector.execute(ctx).await?;
                Ok(serde_json::to_value(ApiResponse::ok(changes))?)
            }
        }
    }
}
