//! In-process job queues, recurring schedules and the progress event stream.
//!
//! Each [`Queue`] is drained by exactly one [`Worker`], so jobs of one queue run
//! strictly one after the other while different queues run concurrently.

use crate::core::domain::error::{SwapperError, SwapperResult};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, warn};

const EVENT_BUFFER_SIZE: usize = 256;

pub type JobId = u64;

/// What a worker reports while and after running a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum JobEvent {
    Progress {
        queue: &'static str,
        job_id: JobId,
        data: Value,
    },
    Completed {
        queue: &'static str,
        job_id: JobId,
        result: Value,
    },
    Failed {
        queue: &'static str,
        job_id: JobId,
        error: String,
    },
}

impl JobEvent {
    pub fn queue(&self) -> &'static str {
        match self {
            JobEvent::Progress { queue, .. }
            | JobEvent::Completed { queue, .. }
            | JobEvent::Failed { queue, .. } => queue,
        }
    }

    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::Progress { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Failed { job_id, .. } => *job_id,
        }
    }
}

/// Broadcast stream of [`JobEvent`]s shared by every queue.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    /// Publishes to current subscribers; an event nobody listens to is dropped.
    pub fn publish(&self, event: JobEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A job as delivered to a worker.
#[derive(Debug)]
pub struct Job<J> {
    pub id: JobId,
    pub payload: J,
    // Set while a recurring instance waits in the queue.
    pending: Option<Arc<AtomicBool>>,
}

/// Producer side of a named queue. Cheap to clone.
#[derive(Debug)]
pub struct Queue<J> {
    name: &'static str,
    sender: mpsc::UnboundedSender<Job<J>>,
    next_id: Arc<AtomicU64>,
}

impl<J> Clone for Queue<J> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            sender: self.sender.clone(),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

/// Consumer side of a queue, owned by its single worker.
#[derive(Debug)]
pub struct QueueReceiver<J> {
    name: &'static str,
    receiver: mpsc::UnboundedReceiver<Job<J>>,
}

impl<J> QueueReceiver<J> {
    pub async fn recv(&mut self) -> Option<Job<J>> {
        self.receiver.recv().await
    }

    /// Non-blocking variant, `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<Job<J>> {
        self.receiver.try_recv().ok()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<J: Send + 'static> Queue<J> {
    pub fn new(name: &'static str) -> (Self, QueueReceiver<J>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                name,
                sender,
                next_id: Arc::new(AtomicU64::new(1)),
            },
            QueueReceiver { name, receiver },
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueues a job for immediate processing.
    ///
    /// # Errors
    /// `Queue` when the worker of this queue has shut down.
    pub fn add(&self, payload: J) -> SwapperResult<JobId> {
        self.push(payload, None)
    }

    /// Enqueues a job that becomes visible to the worker after `delay`.
    ///
    /// The id is assigned immediately; a zero delay behaves like [`Queue::add`].
    pub fn add_delayed(&self, payload: J, delay: Duration) -> SwapperResult<JobId> {
        if delay.is_zero() {
            return self.add(payload);
        }
        if self.sender.is_closed() {
            return Err(self.closed());
        }
        let id = self.next_id();
        let sender = self.sender.clone();
        let name = self.name;
        tokio::spawn(async move {
            time::sleep(delay).await;
            let job = Job {
                id,
                payload,
                pending: None,
            };
            if sender.send(job).is_err() {
                warn!(queue = name, job_id = id, "delayed job dropped, queue closed");
            }
        });
        debug!(queue = name, job_id = id, delay_ms = delay.as_millis() as u64, "job delayed");
        Ok(id)
    }

    fn push(&self, payload: J, pending: Option<Arc<AtomicBool>>) -> SwapperResult<JobId> {
        let id = self.next_id();
        self.sender
            .send(Job {
                id,
                payload,
                pending,
            })
            .map_err(|_| self.closed())?;
        debug!(queue = self.name, job_id = id, "job added");
        Ok(id)
    }

    fn next_id(&self) -> JobId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn closed(&self) -> SwapperError {
        SwapperError::Queue(format!("queue '{}' is closed", self.name))
    }
}

/// Handle given to a job handler for reporting progress.
#[derive(Debug, Clone)]
pub struct JobContext {
    queue: &'static str,
    job_id: JobId,
    events: EventBus,
}

impl JobContext {
    pub fn new(queue: &'static str, job_id: JobId, events: EventBus) -> Self {
        Self {
            queue,
            job_id,
            events,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Publishes a progress payload; values that fail to serialize are reported as `null`.
    pub fn progress<P: Serialize>(&self, data: &P) {
        let data = serde_json::to_value(data).unwrap_or(Value::Null);
        self.events.publish(JobEvent::Progress {
            queue: self.queue,
            job_id: self.job_id,
            data,
        });
    }
}

/// Processes the payloads of one queue.
#[async_trait]
pub trait JobHandler<J>: Send + Sync {
    /// Runs one job; the returned value becomes the job's completion result.
    async fn handle(&self, job: J, ctx: &JobContext) -> SwapperResult<Value>;
}

/// The single sequential consumer of a queue.
pub struct Worker;

impl Worker {
    /// Spawns the loop that drains `receiver` until every producer is dropped.
    pub fn spawn<J, H>(mut receiver: QueueReceiver<J>, handler: Arc<H>, events: EventBus) -> JoinHandle<()>
    where
        J: Send + 'static,
        H: JobHandler<J> + ?Sized + 'static,
    {
        tokio::spawn(async move {
            let queue = receiver.name();
            while let Some(job) = receiver.recv().await {
                if let Some(pending) = &job.pending {
                    pending.store(false, Ordering::Release);
                }
                let ctx = JobContext::new(queue, job.id, events.clone());
                match handler.handle(job.payload, &ctx).await {
                    Ok(result) => events.publish(JobEvent::Completed {
                        queue,
                        job_id: job.id,
                        result,
                    }),
                    Err(e) => {
                        error!(queue, job_id = job.id, error = %e, "job failed");
                        events.publish(JobEvent::Failed {
                            queue,
                            job_id: job.id,
                            error: e.to_string(),
                        });
                    }
                }
            }
            debug!(queue, "worker stopped");
        })
    }
}

/// Owner of the recurring schedules; dropping it cancels them.
#[derive(Debug, Default)]
pub struct Scheduler {
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `payload` on `queue` every `period`, starting immediately.
    ///
    /// At most one instance of a schedule waits in the queue at any time, and
    /// ticks missed while the runtime was busy are skipped.
    pub fn every<J>(&mut self, queue: Queue<J>, period: Duration, payload: J)
    where
        J: Clone + Send + 'static,
    {
        let pending = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if pending.swap(true, Ordering::AcqRel) {
                    debug!(queue = queue.name(), "previous run still queued, tick skipped");
                    continue;
                }
                if queue.push(payload.clone(), Some(Arc::clone(&pending))).is_err() {
                    debug!(queue = queue.name(), "queue closed, schedule stopped");
                    break;
                }
            }
        });
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
