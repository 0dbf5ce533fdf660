//! Bounded background job dispatcher.
//!
//! Submissions go into an unbounded FIFO queue. A single dispatch loop takes
//! them in order, waits for one of `max_concurrent_jobs` permits and spawns
//! the job, so excess work queues instead of being rejected. Each job moves
//! its task from `Processing` to exactly one terminal status.

use std::any::Any;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sorawm_media::{ProgressCallback, WatermarkRemover};
use sorawm_models::{TaskId, TaskStatus};
use tokio::sync::{mpsc, oneshot, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::store::TaskStore;

/// Recorded on tasks that were still queued when the dispatcher stopped.
pub const SHUTDOWN_MESSAGE: &str = "Server shutting down before the task started";

/// Progress stays below this until the task completes.
const MAX_RUNNING_PROGRESS: u8 = 99;

struct QueuedJob {
    task_id: TaskId,
    done: oneshot::Sender<TaskStatus>,
}

/// Resolves to a submitted task's final status.
#[derive(Debug)]
pub struct JobHandle {
    task_id: TaskId,
    done: oneshot::Receiver<TaskStatus>,
}

impl JobHandle {
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Wait until the job reaches a terminal status.
    pub async fn wait(self) -> WorkerResult<TaskStatus> {
        self.done.await.map_err(|_| WorkerError::DispatcherClosed)
    }
}

struct JobContext {
    store: Arc<TaskStore>,
    remover: Arc<dyn WatermarkRemover>,
    config: WorkerConfig,
    queued: AtomicUsize,
    in_flight: AtomicUsize,
}

/// Runs removal jobs in the background with bounded concurrency.
pub struct JobDispatcher {
    ctx: Arc<JobContext>,
    max_jobs: usize,
    semaphore: Arc<Semaphore>,
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedJob>>>,
    shutdown: watch::Sender<bool>,
    dispatch_loop: Mutex<Option<JoinHandle<()>>>,
}

impl JobDispatcher {
    /// Start the dispatch loop. Must be called inside a tokio runtime.
    pub fn start(
        config: WorkerConfig,
        store: Arc<TaskStore>,
        remover: Arc<dyn WatermarkRemover>,
    ) -> Self {
        let max_jobs = config.max_concurrent_jobs.max(1);
        let semaphore = Arc::new(Semaphore::new(max_jobs));
        let (sender, receiver) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        info!(
            "Starting job dispatcher with {} max concurrent jobs ({} backend)",
            max_jobs,
            remover.name()
        );

        let ctx = Arc::new(JobContext {
            store,
            remover,
            config,
            queued: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
        });

        let dispatch_loop = tokio::spawn(dispatch(
            Arc::clone(&ctx),
            Arc::clone(&semaphore),
            receiver,
            shutdown_rx,
        ));

        Self {
            ctx,
            max_jobs,
            semaphore,
            sender: Mutex::new(Some(sender)),
            shutdown,
            dispatch_loop: Mutex::new(Some(dispatch_loop)),
        }
    }

    /// Queue a stored task for processing and return immediately.
    ///
    /// When the dispatcher is already shut down the task is failed on the
    /// spot so it never stays `Processing`.
    pub fn submit(&self, task_id: TaskId) -> WorkerResult<JobHandle> {
        let (done_tx, done_rx) = oneshot::channel();
        let job = QueuedJob {
            task_id: task_id.clone(),
            done: done_tx,
        };

        let accepted = {
            let sender = self.sender.lock();
            match sender.as_ref() {
                Some(tx) => {
                    self.ctx.queued.fetch_add(1, Ordering::SeqCst);
                    if tx.send(job).is_ok() {
                        true
                    } else {
                        self.ctx.queued.fetch_sub(1, Ordering::SeqCst);
                        false
                    }
                }
                None => false,
            }
        };

        if !accepted {
            warn!(task_id = %task_id, "Rejected job: dispatcher is shut down");
            if let Err(e) = self.ctx.store.fail(&task_id, SHUTDOWN_MESSAGE) {
                warn!(task_id = %task_id, "Failed to record rejection: {}", e);
            }
            return Err(WorkerError::DispatcherClosed);
        }

        let queued = self.queued();
        metrics::record_job_submitted();
        metrics::set_jobs_queued(queued);
        debug!(task_id = %task_id, queued, "Job queued");

        Ok(JobHandle {
            task_id,
            done: done_rx,
        })
    }

    /// Jobs accepted but not yet started.
    pub fn queued(&self) -> usize {
        self.ctx.queued.load(Ordering::SeqCst)
    }

    /// Jobs currently running.
    pub fn in_flight(&self) -> usize {
        self.ctx.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_jobs
    }

    pub fn backend(&self) -> &str {
        self.ctx.remover.name()
    }

    /// Stop accepting work and fail queued jobs, then wait up to `timeout`
    /// for running jobs. Returns false if jobs were still running.
    ///
    /// Running jobs are never cancelled.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let _ = self.shutdown.send(true);
        drop(self.sender.lock().take());

        let dispatch_loop = self.dispatch_loop.lock().take();
        if let Some(handle) = dispatch_loop {
            if let Err(e) = handle.await {
                warn!("Dispatch loop ended abnormally: {}", e);
            }
        }

        info!("Waiting for in-flight jobs to complete...");
        let drained = tokio::time::timeout(timeout, self.wait_for_jobs())
            .await
            .is_ok();
        if drained {
            info!("Job dispatcher stopped");
        } else {
            warn!(
                in_flight = self.in_flight(),
                "Shutdown timeout reached with jobs still running"
            );
        }
        drained
    }

    async fn wait_for_jobs(&self) {
        while self.semaphore.available_permits() < self.max_jobs {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

async fn dispatch(
    ctx: Arc<JobContext>,
    semaphore: Arc<Semaphore>,
    mut receiver: mpsc::UnboundedReceiver<QueuedJob>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            job = receiver.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let permit = tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                abandon(&ctx, job);
                break;
            }
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    abandon(&ctx, job);
                    break;
                }
            },
        };

        let queued = ctx.queued.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_jobs_queued(queued);
        tokio::spawn(run_job(Arc::clone(&ctx), job, permit));
    }

    receiver.close();
    while let Ok(job) = receiver.try_recv() {
        abandon(&ctx, job);
    }
    debug!("Dispatch loop exited");
}

/// Fail a job that never started.
fn abandon(ctx: &JobContext, job: QueuedJob) {
    let queued = ctx.queued.fetch_sub(1, Ordering::SeqCst) - 1;
    metrics::set_jobs_queued(queued);
    metrics::record_job_failed(ctx.remover.name(), WorkerError::DispatcherClosed.reason());

    if let Err(e) = ctx.store.fail(&job.task_id, SHUTDOWN_MESSAGE) {
        warn!(task_id = %job.task_id, "Failed to record abandoned job: {}", e);
    }
    let _ = job.done.send(current_status(ctx, &job.task_id));
}

async fn run_job(ctx: Arc<JobContext>, job: QueuedJob, permit: OwnedSemaphorePermit) {
    let _permit = permit;
    let in_flight = ctx.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_jobs_in_flight(in_flight);

    let logger = JobLogger::new(&job.task_id, ctx.remover.name());
    let status = execute(&ctx, &job.task_id, &logger)
        .instrument(logger.span())
        .await;

    let in_flight = ctx.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
    metrics::set_jobs_in_flight(in_flight);
    let _ = job.done.send(status);
}

async fn execute(ctx: &JobContext, task_id: &TaskId, logger: &JobLogger) -> TaskStatus {
    let backend = ctx.remover.name();
    metrics::record_job_started(backend);

    match remove_watermark(ctx, task_id, logger).await {
        Ok(()) => {
            let reference = ctx.config.download_reference(task_id.as_str());
            match ctx.store.complete(task_id, reference) {
                Ok(_) => metrics::record_job_completed(backend, logger.finished()),
                Err(e) => logger.outcome_not_recorded("completed", &e),
            }
        }
        Err(e) => {
            logger.failed(&e);
            metrics::record_job_failed(backend, e.reason());
            if let Err(store_err) = ctx.store.fail(task_id, e.to_string()) {
                logger.outcome_not_recorded("failed", &store_err);
            }
        }
    }

    current_status(ctx, task_id)
}

async fn remove_watermark(
    ctx: &JobContext,
    task_id: &TaskId,
    logger: &JobLogger,
) -> WorkerResult<()> {
    let task = ctx
        .store
        .get(task_id)
        .ok_or_else(|| WorkerError::TaskVanished(task_id.clone()))?;
    logger.started(&task.input_location, &task.output_location);

    let store = Arc::clone(&ctx.store);
    let progress_id = task_id.clone();
    let progress: ProgressCallback = Arc::new(move |p: u8| {
        store.set_progress(&progress_id, p.min(MAX_RUNNING_PROGRESS));
    });

    // Run on its own task so a panic surfaces as a JoinError.
    let remover = Arc::clone(&ctx.remover);
    let input = task.input_location.clone();
    let output = task.output_location.clone();
    let handle = tokio::spawn(
        async move { remover.run(&input, &output, progress).await }.in_current_span(),
    );
    let abort = handle.abort_handle();

    let joined = match ctx.config.job_timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                abort.abort();
                return Err(WorkerError::Timeout(limit));
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(result) => result?,
        Err(e) if e.is_panic() => return Err(WorkerError::Panicked(panic_message(e.into_panic()))),
        Err(e) => return Err(WorkerError::job_failed(e.to_string())),
    }

    verify_output(&task.output_location).await
}

async fn verify_output(path: &Path) -> WorkerResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        Ok(_) => Err(WorkerError::OutputMissing(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(WorkerError::OutputMissing(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn current_status(ctx: &JobContext, task_id: &TaskId) -> TaskStatus {
    ctx.store
        .get(task_id)
        .map(|task| task.status)
        .unwrap_or(TaskStatus::Failed)
}
