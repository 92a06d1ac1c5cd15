//! Task queue: worker pool, supervisor and submission.
//!
//! Jobs are dequeued in submission order by `max_workers` loops sharing one
//! bounded channel; with more than one worker they may finish out of order.
//! Workers wait on the channel with a poll timeout so they notice shutdown.
//!
//! A job that panics has its handle resolved with [`JobError::Panicked`] and
//! takes its worker down with it. The monitor respawns crashed workers under
//! the same id on its next tick; workers that stop normally stay stopped.
//!
//! Shutdown: [`TaskQueue::shutdown`] lets running jobs finish, joins every
//! worker and cancels the jobs still waiting in the queue.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use videval_core::Config;

use crate::error::JobError;

#[derive(Clone, Debug)]
pub struct TaskQueueConfig {
    pub max_workers: usize,
    /// Jobs that may wait in the queue before `submit` reports it full.
    pub capacity: usize,
    pub poll_interval_ms: u64,
    pub monitor_interval_ms: u64,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 2,
            capacity: 1000,
            poll_interval_ms: 100,
            monitor_interval_ms: 1000,
        }
    }
}

impl From<&Config> for TaskQueueConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_workers: config.task_queue_max_workers,
            capacity: config.task_queue_capacity,
            poll_interval_ms: config.task_queue_poll_interval_ms,
            monitor_interval_ms: config.task_queue_monitor_interval_ms,
        }
    }
}

enum JobOutcome {
    Completed,
    Panicked(String),
}

#[derive(Debug)]
enum WorkerExit {
    Stopped,
    Crashed(String),
}

struct QueuedJob {
    name: String,
    run: BoxFuture<'static, JobOutcome>,
}

struct Shared {
    receiver: Mutex<mpsc::Receiver<QueuedJob>>,
    shutdown: CancellationToken,
    poll_interval: Duration,
}

type Workers = Arc<Mutex<HashMap<usize, JoinHandle<WorkerExit>>>>;

/// Result of a submitted job.
#[must_use = "dropping the handle discards the job's result"]
pub struct JobHandle<T> {
    name: String,
    receiver: oneshot::Receiver<Result<T, JobError>>,
}

impl<T> JobHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the job to run.
    pub async fn wait(self) -> Result<T, JobError> {
        self.receiver.await.unwrap_or(Err(JobError::Cancelled))
    }
}

pub struct TaskQueue {
    sender: mpsc::Sender<QueuedJob>,
    shared: Arc<Shared>,
    workers: Workers,
    monitor: Mutex<Option<JoinHandle<()>>>,
    config: TaskQueueConfig,
}

impl TaskQueue {
    /// Start the workers and their monitor. Must be called within a tokio runtime.
    pub fn new(config: TaskQueueConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let shared = Arc::new(Shared {
            receiver: Mutex::new(receiver),
            shutdown: CancellationToken::new(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        });

        let workers: HashMap<usize, JoinHandle<WorkerExit>> = (0..config.max_workers)
            .map(|id| (id, spawn_worker(id, Arc::clone(&shared))))
            .collect();
        let workers = Arc::new(Mutex::new(workers));

        let monitor = tokio::spawn(supervise(
            Arc::clone(&shared),
            Arc::clone(&workers),
            Duration::from_millis(config.monitor_interval_ms),
        ));

        tracing::info!(
            max_workers = config.max_workers,
            capacity = config.capacity,
            poll_interval_ms = config.poll_interval_ms,
            monitor_interval_ms = config.monitor_interval_ms,
            "Task queue worker pool started"
        );

        Self {
            sender,
            shared,
            workers,
            monitor: Mutex::new(Some(monitor)),
            config,
        }
    }

    pub fn config(&self) -> &TaskQueueConfig {
        &self.config
    }

    /// Queue a job without waiting for it.
    pub fn submit<F, T>(&self, name: impl Into<String>, job: F) -> Result<JobHandle<T>, JobError>
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if self.shared.shutdown.is_cancelled() {
            return Err(JobError::ShuttingDown);
        }

        let name = name.into();
        let (tx, rx) = oneshot::channel();
        let job_name = name.clone();
        let run = async move {
            let start = Instant::now();
            match AssertUnwindSafe(job).catch_unwind().await {
                Ok(result) => {
                    let duration_ms = start.elapsed().as_millis() as u64;
                    match &result {
                        Ok(_) => tracing::info!(job = %job_name, duration_ms, "Job completed"),
                        Err(e) => tracing::warn!(
                            job = %job_name,
                            error = %e,
                            duration_ms,
                            "Job failed"
                        ),
                    }
                    let _ = tx.send(result.map_err(JobError::Failed));
                    JobOutcome::Completed
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    let _ = tx.send(Err(JobError::Panicked(message.clone())));
                    JobOutcome::Panicked(message)
                }
            }
        }
        .boxed();

        self.sender
            .try_send(QueuedJob {
                name: name.clone(),
                run,
            })
            .map_err(|e| match e {
                TrySendError::Full(_) => JobError::QueueFull,
                TrySendError::Closed(_) => JobError::ShuttingDown,
            })?;

        tracing::debug!(job = %name, "Job submitted to queue");
        Ok(JobHandle { name, receiver: rx })
    }

    /// Workers currently running.
    pub async fn worker_count(&self) -> usize {
        self.workers
            .lock()
            .await
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Stop taking jobs, wait for running ones and join every worker.
    ///
    /// Jobs still queued are dropped and their handles resolve to
    /// [`JobError::Cancelled`].
    pub async fn shutdown(&self) {
        tracing::info!("Initiating task queue shutdown");
        self.shared.shutdown.cancel();

        if let Some(monitor) = self.monitor.lock().await.take() {
            if let Err(e) = monitor.await {
                tracing::error!(error = %e, "Task queue monitor failed");
            }
        }

        let workers: Vec<(usize, JoinHandle<WorkerExit>)> =
            self.workers.lock().await.drain().collect();
        for (id, handle) in workers {
            match handle.await {
                Ok(WorkerExit::Stopped) => {}
                Ok(WorkerExit::Crashed(message)) => {
                    tracing::error!(worker_id = id, panic = %message, "Worker crashed during shutdown")
                }
                Err(e) => tracing::error!(worker_id = id, error = %e, "Worker failed during shutdown"),
            }
        }

        let mut receiver = self.shared.receiver.lock().await;
        receiver.close();
        let mut discarded = 0usize;
        while let Ok(job) = receiver.try_recv() {
            tracing::debug!(job = %job.name, "Queued job discarded");
            discarded += 1;
        }

        tracing::info!(discarded, "Task queue stopped");
    }
}

fn spawn_worker(id: usize, shared: Arc<Shared>) -> JoinHandle<WorkerExit> {
    tokio::spawn(worker_loop(id, shared))
}

async fn worker_loop(id: usize, shared: Arc<Shared>) -> WorkerExit {
    tracing::debug!(worker_id = id, "Worker started");
    loop {
        let next = tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => None,
            next = async {
                let mut receiver = shared.receiver.lock().await;
                tokio::time::timeout(shared.poll_interval, receiver.recv()).await
            } => Some(next),
        };

        let job = match next {
            None | Some(Ok(None)) => {
                tracing::debug!(worker_id = id, "Worker stopping");
                return WorkerExit::Stopped;
            }
            // poll timeout
            Some(Err(_)) => continue,
            Some(Ok(Some(job))) => job,
        };

        tracing::debug!(worker_id = id, job = %job.name, "Job started");
        if let JobOutcome::Panicked(message) = job.run.await {
            tracing::error!(worker_id = id, job = %job.name, panic = %message, "Job panicked");
            return WorkerExit::Crashed(message);
        }
    }
}

async fn supervise(shared: Arc<Shared>, workers: Workers, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = ticker.tick() => check_workers(&shared, &workers).await,
        }
    }
}

async fn check_workers(shared: &Arc<Shared>, workers: &Workers) {
    let mut workers = workers.lock().await;
    let finished: Vec<usize> = workers
        .iter()
        .filter(|(_, handle)| handle.is_finished())
        .map(|(id, _)| *id)
        .collect();

    for id in finished {
        let Some(handle) = workers.remove(&id) else {
            continue;
        };
        let restart = match handle.await {
            Ok(WorkerExit::Stopped) => {
                tracing::info!(worker_id = id, "Worker stopped");
                false
            }
            Ok(WorkerExit::Crashed(message)) => {
                tracing::error!(worker_id = id, panic = %message, "Worker crashed, restarting");
                true
            }
            Err(e) => {
                tracing::error!(worker_id = id, error = %e, "Worker task failed, restarting");
                true
            }
        };
        if restart && !shared.shutdown.is_cancelled() {
            workers.insert(id, spawn_worker(id, Arc::clone(shared)));
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn test_default_config() {
        let config = TaskQueueConfig::default();
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.capacity, 1000);
    }
}
