//! Progress reporting and cancellation support.
//!
//! A job pushes its events into [`ProgressReporter`]s owned by the caller:
//! a [`ProgressInfo`] after every frame, the [`ShotBoundary`] of every
//! exported keyframe, and a final [`JobReport`]. All events of one job are
//! delivered from the single thread running it, in increasing frame order.
//!
//! [`CancellationToken`] is the shared flag a job polls once per frame.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use scenecut::{DetectionConfig, DetectionJob, ProgressInfo, ProgressReporter, ShotBoundary};
//!
//! struct PrintProgress;
//!
//! impl ProgressReporter for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:.1}% ({} keyframes)", info.percentage, info.keyframes);
//!     }
//!
//!     fn on_keyframe(&self, boundary: &ShotBoundary) {
//!         println!("cut at frame {} -> {}", boundary.frame_index, boundary.path.display());
//!     }
//! }
//!
//! let job = DetectionJob::new(DetectionConfig::new("input.mp4", "out"))?;
//! job.handle().subscribe(Arc::new(PrintProgress));
//! let report = job.run();
//! println!("{:?}", report.state);
//! # Ok::<(), scenecut::ScenecutError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use crate::job::{JobReport, ShotBoundary};

/// A snapshot of one job's progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Identifier of the job, see [`JobHandle::id`](crate::JobHandle::id).
    pub job_id: u64,
    /// Index of the frame just processed.
    pub current_frame: u64,
    /// Total frames expected, if the source knows.
    pub total_frames: Option<u64>,
    /// Completion percentage (0.0 – 100.0). Stays below 100 until the job
    /// completes, and is 0 while the total is unknown.
    pub percentage: f32,
    /// Keyframes exported so far.
    pub keyframes: usize,
    /// Wall-clock time since the job started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
}

/// Receives the events of a running job.
///
/// Implementations must be [`Send`] and [`Sync`] because they are called from
/// the job's worker thread. Reporters observe but cannot halt the job; use
/// [`CancellationToken`] or [`JobHandle::cancel`](crate::JobHandle::cancel)
/// for that.
pub trait ProgressReporter: Send + Sync {
    /// Called after every processed frame.
    fn on_progress(&self, _info: &ProgressInfo) {}

    /// Called after a keyframe has been written.
    fn on_keyframe(&self, _boundary: &ShotBoundary) {}

    /// Called once, when the job reaches a terminal state.
    fn on_finish(&self, _report: &JobReport) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone the token and share it between threads; calling
/// [`cancel`](CancellationToken::cancel) on any clone is observed by the job
/// before it reads its next frame.
///
/// # Example
///
/// ```
/// use scenecut::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_view = token.clone();
/// assert!(!worker_view.is_cancelled());
///
/// token.cancel();
/// assert!(worker_view.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Percentage reported while a job is still running.
///
/// Clamped to the last frame of the reported total so that 100 is reserved
/// for completion even when the container underestimates its length.
pub(crate) fn running_percentage(frame_index: u64, total_frames: u64) -> f32 {
    if total_frames == 0 {
        return 0.0;
    }
    let position = frame_index.min(total_frames - 1);
    (position as f64 / total_frames as f64 * 100.0) as f32
}

/// Tracks timing and keyframe counts for one job and builds snapshots.
pub(crate) struct ProgressTracker {
    job_id: u64,
    total_frames: u64,
    start_time: Instant,
    last_percentage: f32,
    keyframes: usize,
}

impl ProgressTracker {
    pub(crate) fn new(job_id: u64, total_frames: u64) -> Self {
        Self {
            job_id,
            total_frames,
            start_time: Instant::now(),
            last_percentage: 0.0,
            keyframes: 0,
        }
    }

    pub(crate) fn record_keyframe(&mut self) {
        self.keyframes += 1;
    }

    /// Snapshot after processing `frame_index`.
    pub(crate) fn advance(&mut self, frame_index: u64) -> ProgressInfo {
        let percentage =
            running_percentage(frame_index, self.total_frames).max(self.last_percentage);
        self.snapshot(frame_index, percentage)
    }

    /// Final snapshot for a completed job.
    pub(crate) fn complete(&mut self, last_frame: u64) -> ProgressInfo {
        self.snapshot(last_frame, 100.0)
    }

    fn snapshot(&mut self, frame_index: u64, percentage: f32) -> ProgressInfo {
        self.last_percentage = percentage;
        let elapsed = self.start_time.elapsed();

        let processed = frame_index + 1;
        let estimated_remaining = (self.total_frames > processed).then(|| {
            let per_frame = elapsed.as_secs_f64() / processed as f64;
            Duration::from_secs_f64(per_frame * (self.total_frames - processed) as f64)
        });

        ProgressInfo {
            job_id: self.job_id,
            current_frame: frame_index,
            total_frames: (self.total_frames > 0).then_some(self.total_frames),
            percentage,
            keyframes: self.keyframes,
            elapsed,
            estimated_remaining,
        }
    }
}
