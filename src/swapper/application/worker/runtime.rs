use crate::core::domain::model::job::{
    ACTIVE_QUEUE, ActiveJob, CACHE_QUEUE, CacheJob, REQUESTS_QUEUE, RequestJob,
};
use crate::core::infrastructure::queue::{EventBus, Queue, Scheduler, Worker};
use crate::swapper::application::worker::{
    active::ActiveHandler, cache::CacheHandler, events::spawn_log_listener,
    requests::RequestHandler,
};
use crate::swapper::context::SwapperContext;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Producer handles of the three queues plus the shared event stream.
#[derive(Debug, Clone)]
pub struct JobQueues {
    pub requests: Queue<RequestJob>,
    pub active: Queue<ActiveJob>,
    pub cache: Queue<CacheJob>,
    pub events: EventBus,
}

/// The running workers, schedules and log listener.
#[derive(Debug)]
pub struct SwapperRuntime {
    queues: JobQueues,
    _scheduler: Scheduler,
    tasks: Vec<JoinHandle<()>>,
}

impl SwapperRuntime {
    /// Spawns one worker per queue and the two recurring cache jobs.
    pub fn start(ctx: SwapperContext) -> Self {
        let events = EventBus::new();
        let listener = spawn_log_listener(&events);

        let (requests, requests_rx) = Queue::new(REQUESTS_QUEUE);
        let (active, active_rx) = Queue::new(ACTIVE_QUEUE);
        let (cache, cache_rx) = Queue::new(CACHE_QUEUE);

        let tasks = vec![
            listener,
            Worker::spawn(
                requests_rx,
                Arc::new(RequestHandler::new(ctx.clone())),
                events.clone(),
            ),
            Worker::spawn(
                active_rx,
                Arc::new(ActiveHandler::new(ctx.clone())),
                events.clone(),
            ),
            Worker::spawn(
                cache_rx,
                Arc::new(CacheHandler::new(ctx.clone(), active.clone())),
                events.clone(),
            ),
        ];

        let mut scheduler = Scheduler::new();
        scheduler.every(cache.clone(), ctx.options.cache_interval, CacheJob::UpdateCache);
        scheduler.every(cache.clone(), ctx.options.event_interval, CacheJob::EventListener);
        info!(
            cache_interval_ms = ctx.options.cache_interval.as_millis() as u64,
            event_interval_ms = ctx.options.event_interval.as_millis() as u64,
            "workers and schedules started"
        );

        Self {
            queues: JobQueues {
                requests,
                active,
                cache,
                events,
            },
            _scheduler: scheduler,
            tasks,
        }
    }

    pub fn queues(&self) -> &JobQueues {
        &self.queues
    }

    /// Cancels schedules and workers; queued jobs are dropped.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!("swapper runtime stopped");
    }
}
