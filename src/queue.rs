//! Sequential batch queue.
//!
//! A [`BatchQueue`] holds detection jobs in FIFO order and runs them one at a
//! time on a single worker thread. Jobs can be appended while the queue is
//! running. [`BatchQueue::cancel_all`] cancels the running job and discards
//! every job still waiting; discarded jobs end as
//! [`JobState::Cancelled`](crate::JobState::Cancelled) without ever opening
//! their video.
//!
//! # Example
//!
//! ```no_run
//! use scenecut::{BatchQueue, DetectionConfig};
//!
//! let queue = BatchQueue::new();
//! for video in ["a.mp4", "b.mp4", "c.mp4"] {
//!     queue.enqueue_config(DetectionConfig::new(video, "shots"))?;
//! }
//!
//! let batch = queue.run_all()?;
//! let report = batch.wait();
//! println!("{} job(s) ran", report.jobs.len());
//! # Ok::<(), scenecut::ScenecutError>(())
//! ```

use std::{
    collections::VecDeque,
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::{Arc, Condvar, Mutex, PoisonError},
    thread,
    time::{Duration, Instant},
};

use crate::{
    configuration::DetectionConfig,
    error::ScenecutError,
    job::{DetectionJob, JobHandle, JobReport, JobState, lock},
};

/// Lifecycle of a [`BatchQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    /// Accepting jobs, not started.
    Idle,
    /// The worker is draining the queue.
    Running,
    /// Every job ran; no more jobs are accepted.
    Finished,
    /// [`BatchQueue::cancel_all`] was called; no more jobs are accepted.
    Cancelled,
}

/// Reports of every job that passed through a queue.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Jobs the worker ran, in the order they ran.
    pub jobs: Vec<JobReport>,
    /// Jobs dropped by [`BatchQueue::cancel_all`] before they started.
    pub discarded: Vec<JobReport>,
    /// Whether [`BatchQueue::cancel_all`] stopped the batch.
    pub cancelled: bool,
    /// Time from [`BatchQueue::run_all`] until the worker stopped.
    pub elapsed: Duration,
}

impl BatchReport {
    /// Number of jobs, ran or discarded, that ended in `state`.
    pub fn count(&self, state: JobState) -> usize {
        self.jobs
            .iter()
            .chain(&self.discarded)
            .filter(|report| report.state == state)
            .count()
    }

    /// Total keyframes exported across the batch.
    pub fn keyframes(&self) -> usize {
        self.jobs.iter().map(|report| report.boundaries.len()).sum()
    }
}

struct QueueInner {
    status: QueueStatus,
    pending: VecDeque<DetectionJob>,
    current: Option<JobHandle>,
    report: BatchReport,
    worker_done: bool,
}

struct QueueShared {
    inner: Mutex<QueueInner>,
    worker_done: Condvar,
}

/// FIFO queue of detection jobs processed one at a time.
#[derive(Clone)]
pub struct BatchQueue {
    shared: Arc<QueueShared>,
}

impl Debug for BatchQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let inner = lock(&self.shared.inner);
        f.debug_struct("BatchQueue")
            .field("status", &inner.status)
            .field("pending", &inner.pending.len())
            .field("current", &inner.current.as_ref().map(JobHandle::id))
            .finish_non_exhaustive()
    }
}

impl Default for BatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchQueue {
    /// An empty, idle queue.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(QueueShared {
                inner: Mutex::new(QueueInner {
                    status: QueueStatus::Idle,
                    pending: VecDeque::new(),
                    current: None,
                    report: BatchReport::default(),
                    worker_done: false,
                }),
                worker_done: Condvar::new(),
            }),
        }
    }

    /// Append `job` and return its handle.
    ///
    /// # Errors
    ///
    /// Returns [`ScenecutError::QueueClosed`] once the queue has finished or
    /// been cancelled.
    pub fn enqueue(&self, job: DetectionJob) -> Result<JobHandle, ScenecutError> {
        let mut inner = lock(&self.shared.inner);
        match inner.status {
            QueueStatus::Idle | QueueStatus::Running => {
                let handle = job.handle();
                log::debug!(
                    "Queued job {} ({})",
                    handle.id(),
                    handle.input_path().display()
                );
                inner.pending.push_back(job);
                Ok(handle)
            }
            QueueStatus::Finished | QueueStatus::Cancelled => Err(ScenecutError::QueueClosed),
        }
    }

    /// Build a job from `config` and append it.
    ///
    /// # Errors
    ///
    /// - [`ScenecutError::InvalidConfiguration`] if `config` does not validate.
    /// - [`ScenecutError::QueueClosed`] if the queue no longer accepts jobs.
    pub fn enqueue_config(&self, config: DetectionConfig) -> Result<JobHandle, ScenecutError> {
        self.enqueue(DetectionJob::new(config)?)
    }

    /// Number of jobs waiting to start.
    pub fn len(&self) -> usize {
        lock(&self.shared.inner).pending.len()
    }

    /// Returns `true` when no job is waiting to start.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current lifecycle state.
    pub fn status(&self) -> QueueStatus {
        lock(&self.shared.inner).status
    }

    /// Handle of the job the worker is running, if any.
    pub fn current_job(&self) -> Option<JobHandle> {
        lock(&self.shared.inner).current.clone()
    }

    /// Start the worker thread and return immediately.
    ///
    /// # Errors
    ///
    /// - [`ScenecutError::QueueAlreadyStarted`] if `run_all` was called before.
    /// - [`ScenecutError::IoError`] if the worker thread cannot be spawned.
    pub fn run_all(&self) -> Result<BatchHandle, ScenecutError> {
        {
            let mut inner = lock(&self.shared.inner);
            if inner.status != QueueStatus::Idle {
                return Err(ScenecutError::QueueAlreadyStarted);
            }
            inner.status = QueueStatus::Running;
            log::info!("Starting batch of {} job(s)", inner.pending.len());
        }

        let shared = Arc::clone(&self.shared);
        let started = Instant::now();
        if let Err(error) = thread::Builder::new()
            .name("scenecut-queue".to_string())
            .spawn(move || work(&shared, started))
        {
            lock(&self.shared.inner).status = QueueStatus::Idle;
            return Err(error.into());
        }

        Ok(BatchHandle {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Cancel the running job and discard every job still waiting.
    ///
    /// The queue stops accepting jobs. Discarded jobs finish as `Cancelled`
    /// and never open their video. Cancelling a queue that was never started
    /// discards everything in it.
    pub fn cancel_all(&self) {
        let (current, discarded) = {
            let mut inner = lock(&self.shared.inner);
            if inner.status == QueueStatus::Idle {
                // No worker will ever run: nothing else can mark it done.
                inner.worker_done = true;
            }
            if matches!(inner.status, QueueStatus::Idle | QueueStatus::Running) {
                inner.status = QueueStatus::Cancelled;
                inner.report.cancelled = true;
            }
            let discarded: Vec<_> = inner
                .pending
                .drain(..)
                .map(DetectionJob::discard)
                .collect();
            inner
                .report
                .discarded
                .extend(discarded.iter().map(|(_, report)| report.clone()));
            (inner.current.clone(), discarded)
        };

        log::info!(
            "Cancelling batch: {} running, {} discarded",
            usize::from(current.is_some()),
            discarded.len()
        );

        if let Some(current) = current {
            current.cancel();
        }
        for (handle, report) in &discarded {
            handle.finish(report);
        }
        self.shared.worker_done.notify_all();
    }
}

/// Worker loop: pop, run, record, until the queue is empty or cancelled.
fn work(shared: &QueueShared, started: Instant) {
    loop {
        let job = {
            let mut inner = lock(&shared.inner);
            let next = match inner.status {
                QueueStatus::Running => inner.pending.pop_front(),
                _ => None,
            };
            match next {
                Some(job) => {
                    inner.current = Some(job.handle());
                    job
                }
                None => {
                    if inner.status == QueueStatus::Running {
                        inner.status = QueueStatus::Finished;
                    }
                    break;
                }
            }
        };

        let report = job.run();

        let mut inner = lock(&shared.inner);
        inner.current = None;
        inner.report.jobs.push(report);
    }

    let mut inner = lock(&shared.inner);
    inner.report.elapsed = started.elapsed();
    inner.worker_done = true;
    log::info!(
        "Batch finished: {} job(s) ran, {} discarded, {:.2?}",
        inner.report.jobs.len(),
        inner.report.discarded.len(),
        inner.report.elapsed
    );
    drop(inner);
    shared.worker_done.notify_all();
}

/// Handle on a running batch.
#[derive(Clone)]
pub struct BatchHandle {
    shared: Arc<QueueShared>,
}

impl Debug for BatchHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("BatchHandle")
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

impl BatchHandle {
    /// Returns `true` once the worker has stopped.
    pub fn is_finished(&self) -> bool {
        lock(&self.shared.inner).worker_done
    }

    /// Block until the worker stops and return the batch report.
    pub fn wait(&self) -> BatchReport {
        let inner = lock(&self.shared.inner);
        let inner = self
            .shared
            .worker_done
            .wait_while(inner, |inner| !inner.worker_done)
            .unwrap_or_else(PoisonError::into_inner);
        inner.report.clone()
    }

    /// Block for at most `timeout`; `None` if the worker is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<BatchReport> {
        let inner = lock(&self.shared.inner);
        let (inner, _) = self
            .shared
            .worker_done
            .wait_timeout_while(inner, timeout, |inner| !inner.worker_done)
            .unwrap_or_else(PoisonError::into_inner);
        inner.worker_done.then(|| inner.report.clone())
    }
}
