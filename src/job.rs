//! Detection jobs.
//!
//! A [`DetectionJob`] runs the whole pipeline for one video: open the
//! source, take the first frame as baseline, then for every following frame
//! poll cancellation, measure the change, export a keyframe when a boundary
//! is accepted, and report progress. The job ends in exactly one terminal
//! [`JobState`] and produces a [`JobReport`].
//!
//! A [`JobHandle`] is the thread-safe view of a job: it exposes the current
//! state, cancellation, event subscriptions, and blocking waits for the
//! final report.
//!
//! # Example
//!
//! ```no_run
//! use scenecut::{DetectionConfig, JobState};
//!
//! let handle = scenecut::start_job(
//!     DetectionConfig::new("input.mp4", "shots").with_change_threshold(40.0),
//! )?;
//! handle.on_keyframe(|boundary| println!("{}", boundary.path.display()));
//!
//! let report = handle.wait();
//! assert_eq!(report.state, JobState::Completed);
//! # Ok::<(), scenecut::ScenecutError>(())
//! ```

use std::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    configuration::{DecodeErrorPolicy, DetectionConfig},
    detector::ShotBoundaryDetector,
    error::ScenecutError,
    export::KeyframeExporter,
    progress::{CancellationToken, ProgressInfo, ProgressReporter, ProgressTracker},
    source::{FrameSource, VideoSource},
};

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a detection job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Built but not started.
    Pending,
    /// Picked up by a worker.
    Running,
    /// Cancellation was requested and has not been observed yet.
    CancelRequested,
    /// The source was read to its end.
    Completed,
    /// The source could not be opened or read, or a keyframe could not be written.
    Failed,
    /// Cancellation was observed before the source was exhausted.
    Cancelled,
}

impl JobState {
    /// Returns `true` for `Completed`, `Failed` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::CancelRequested => "cancel requested",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// An accepted scene change and the keyframe written for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotBoundary {
    /// Decode index of the first frame of the new shot.
    pub frame_index: u64,
    /// Presentation timestamp of that frame, when known.
    pub timestamp: Option<Duration>,
    /// Changed pixels relative to the previous frame, in percent.
    pub change_percentage: f64,
    /// Path of the exported keyframe.
    pub path: PathBuf,
}

/// Final outcome of a job.
#[derive(Debug, Clone)]
pub struct JobReport {
    /// Identifier of the job.
    pub job_id: u64,
    /// Video the job analysed.
    pub input_path: PathBuf,
    /// `Output_<video>` directory keyframes were (or would have been) written to.
    pub output_directory: PathBuf,
    /// Terminal state.
    pub state: JobState,
    /// Accepted boundaries, in frame order. Kept on every exit path.
    pub boundaries: Vec<ShotBoundary>,
    /// Frames read from the source, baseline included.
    pub frames_processed: u64,
    /// Frame count reported by the source (0 if unknown or never opened).
    pub total_frames: u64,
    /// Why the job failed, or the decode error that cut a completed job short.
    pub error: Option<String>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl JobReport {
    /// Returns `true` when a decode error ended an otherwise completed job early.
    pub fn is_truncated(&self) -> bool {
        self.state == JobState::Completed && self.error.is_some()
    }
}

/// Opens the frame source of a job, on the thread that runs it.
pub type SourceOpener =
    Box<dyn FnOnce(&Path) -> Result<Box<dyn FrameSource>, ScenecutError> + Send>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct JobStatus {
    state: JobState,
    report: Option<JobReport>,
}

struct JobShared {
    id: u64,
    input_path: PathBuf,
    token: CancellationToken,
    status: Mutex<JobStatus>,
    finished: Condvar,
    reporters: Mutex<Vec<Arc<dyn ProgressReporter>>>,
}

/// Shared, cloneable view of a job.
#[derive(Clone)]
pub struct JobHandle {
    shared: Arc<JobShared>,
}

impl Debug for JobHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("JobHandle")
            .field("id", &self.shared.id)
            .field("input_path", &self.shared.input_path)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl JobHandle {
    fn new(input_path: PathBuf) -> Self {
        Self {
            shared: Arc::new(JobShared {
                id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
                input_path,
                token: CancellationToken::new(),
                status: Mutex::new(JobStatus {
                    state: JobState::Pending,
                    report: None,
                }),
                finished: Condvar::new(),
                reporters: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Process-unique identifier of the job.
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Video the job analyses.
    pub fn input_path(&self) -> &Path {
        &self.shared.input_path
    }

    /// Current state.
    pub fn state(&self) -> JobState {
        lock(&self.shared.status).state
    }

    /// Returns `true` once the job reached a terminal state and its report
    /// is available.
    pub fn is_finished(&self) -> bool {
        lock(&self.shared.status).report.is_some()
    }

    /// The final report, if the job has finished.
    pub fn report(&self) -> Option<JobReport> {
        lock(&self.shared.status).report.clone()
    }

    /// The token the job polls; cancelling it is the same as [`cancel`](Self::cancel).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.token.clone()
    }

    /// Request cancellation.
    ///
    /// The job observes the request before reading its next frame, so it
    /// may still finish the frame in flight. Has no effect on a finished job.
    pub fn cancel(&self) {
        self.shared.token.cancel();
        let mut status = lock(&self.shared.status);
        if matches!(status.state, JobState::Pending | JobState::Running) {
            status.state = JobState::CancelRequested;
            log::info!(
                "Cancellation requested for job {} ({})",
                self.shared.id,
                self.shared.input_path.display()
            );
        }
    }

    /// Register a reporter for this job's events.
    ///
    /// Subscribe before the job starts to see every event.
    pub fn subscribe(&self, reporter: Arc<dyn ProgressReporter>) {
        lock(&self.shared.reporters).push(reporter);
    }

    /// Call `callback` after every processed frame.
    pub fn on_progress<F>(&self, callback: F)
    where
        F: Fn(&ProgressInfo) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(ProgressFn(callback)));
    }

    /// Call `callback` after every exported keyframe.
    pub fn on_keyframe<F>(&self, callback: F)
    where
        F: Fn(&ShotBoundary) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(KeyframeFn(callback)));
    }

    /// Call `callback` once with the final report, whatever the terminal state.
    pub fn on_completion<F>(&self, callback: F)
    where
        F: Fn(&JobReport) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(CompletionFn(callback)));
    }

    /// Block until the job finishes and return its report.
    pub fn wait(&self) -> JobReport {
        let mut status = lock(&self.shared.status);
        loop {
            if let Some(report) = &status.report {
                return report.clone();
            }
            status = self
                .shared
                .finished
                .wait(status)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block for at most `timeout`; `None` if the job is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<JobReport> {
        let status = lock(&self.shared.status);
        let (status, _) = self
            .shared
            .finished
            .wait_timeout_while(status, timeout, |status| status.report.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        status.report.clone()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    fn mark_running(&self) {
        let mut status = lock(&self.shared.status);
        if status.state == JobState::Pending {
            status.state = JobState::Running;
        }
    }

    fn reporters(&self) -> Vec<Arc<dyn ProgressReporter>> {
        lock(&self.shared.reporters).clone()
    }

    fn emit_progress(&self, info: &ProgressInfo) {
        for reporter in self.reporters() {
            reporter.on_progress(info);
        }
    }

    fn emit_keyframe(&self, boundary: &ShotBoundary) {
        for reporter in self.reporters() {
            reporter.on_keyframe(boundary);
        }
    }

    /// Publish the terminal state and report together, release waiters, then
    /// notify reporters. A reporter may query or wait on the handle.
    pub(crate) fn finish(&self, report: &JobReport) {
        {
            let mut status = lock(&self.shared.status);
            status.state = report.state;
            status.report = Some(report.clone());
        }
        self.shared.finished.notify_all();
        for reporter in self.reporters() {
            reporter.on_finish(report);
        }
    }
}

struct ProgressFn<F>(F);

impl<F: Fn(&ProgressInfo) + Send + Sync> ProgressReporter for ProgressFn<F> {
    fn on_progress(&self, info: &ProgressInfo) {
        (self.0)(info);
    }
}

struct KeyframeFn<F>(F);

impl<F: Fn(&ShotBoundary) + Send + Sync> ProgressReporter for KeyframeFn<F> {
    fn on_keyframe(&self, boundary: &ShotBoundary) {
        (self.0)(boundary);
    }
}

struct CompletionFn<F>(F);

impl<F: Fn(&JobReport) + Send + Sync> ProgressReporter for CompletionFn<F> {
    fn on_finish(&self, report: &JobReport) {
        (self.0)(report);
    }
}

/// How the frame loop ended without an error.
enum StreamEnd {
    Exhausted,
    Truncated(ScenecutError),
    Cancelled,
}

/// Partial results, kept whichever way the run ends.
#[derive(Default)]
struct RunProgress {
    boundaries: Vec<ShotBoundary>,
    frames_processed: u64,
    total_frames: u64,
}

/// One unit of work: shot detection over a single video.
pub struct DetectionJob {
    config: DetectionConfig,
    handle: JobHandle,
    opener: SourceOpener,
}

impl Debug for DetectionJob {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DetectionJob")
            .field("config", &self.config)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl DetectionJob {
    /// A job that decodes `config.input_path()` with FFmpeg.
    ///
    /// # Errors
    ///
    /// Returns [`ScenecutError::InvalidConfiguration`] if `config` does not validate.
    pub fn new(config: DetectionConfig) -> Result<Self, ScenecutError> {
        Self::with_source_opener(config, |path| {
            VideoSource::open(path).map(|source| Box::new(source) as Box<dyn FrameSource>)
        })
    }

    /// A job whose frames come from `opener` instead of FFmpeg.
    ///
    /// `opener` runs on the job's thread when the job starts.
    ///
    /// # Errors
    ///
    /// Returns [`ScenecutError::InvalidConfiguration`] if `config` does not validate.
    pub fn with_source_opener<F>(config: DetectionConfig, opener: F) -> Result<Self, ScenecutError>
    where
        F: FnOnce(&Path) -> Result<Box<dyn FrameSource>, ScenecutError> + Send + 'static,
    {
        config.validate()?;
        Ok(Self {
            handle: JobHandle::new(config.input_path.clone()),
            config,
            opener: Box::new(opener),
        })
    }

    /// A job reading from an already-built `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ScenecutError::InvalidConfiguration`] if `config` does not validate.
    pub fn with_source<S>(config: DetectionConfig, source: S) -> Result<Self, ScenecutError>
    where
        S: FrameSource + Send + 'static,
    {
        Self::with_source_opener(config, move |_| Ok(Box::new(source) as Box<dyn FrameSource>))
    }

    /// Handle for observing and cancelling this job.
    pub fn handle(&self) -> JobHandle {
        self.handle.clone()
    }

    /// The job's configuration.
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Run the job on a new thread and return its handle immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ScenecutError::IoError`] if the thread cannot be spawned.
    pub fn spawn(self) -> Result<JobHandle, ScenecutError> {
        let handle = self.handle();
        thread::Builder::new()
            .name(format!("scenecut-job-{}", handle.id()))
            .spawn(move || {
                self.run();
            })?;
        Ok(handle)
    }

    /// Run the job on the current thread until it reaches a terminal state.
    pub fn run(self) -> JobReport {
        let DetectionJob {
            config,
            handle,
            opener,
        } = self;
        let started = Instant::now();
        let mut exporter = KeyframeExporter::from_config(&config);
        let mut progress = RunProgress::default();

        let (state, error) = if handle.is_cancelled() {
            log::info!(
                "Job {} cancelled before start ({})",
                handle.id(),
                config.input_path.display()
            );
            (JobState::Cancelled, None)
        } else {
            handle.mark_running();
            log::info!(
                "Job {} started: {} (threshold {:.1}%)",
                handle.id(),
                config.input_path.display(),
                config.change_threshold
            );
            match drive(&config, &handle, opener, &mut exporter, &mut progress) {
                Ok(StreamEnd::Exhausted) => (JobState::Completed, None),
                Ok(StreamEnd::Truncated(error)) => (JobState::Completed, Some(error.to_string())),
                Ok(StreamEnd::Cancelled) => (JobState::Cancelled, None),
                Err(error) => (JobState::Failed, Some(error.to_string())),
            }
        };

        let report = JobReport {
            job_id: handle.id(),
            input_path: config.input_path.clone(),
            output_directory: exporter.directory().to_path_buf(),
            state,
            boundaries: progress.boundaries,
            frames_processed: progress.frames_processed,
            total_frames: progress.total_frames,
            error,
            elapsed: started.elapsed(),
        };

        match (&report.state, &report.error) {
            (JobState::Failed, Some(error)) => {
                log::error!("Job {} failed: {error}", report.job_id);
            }
            (state, _) => log::info!(
                "Job {} {state}: {} keyframe(s) from {} frame(s) in {:.2?}",
                report.job_id,
                report.boundaries.len(),
                report.frames_processed,
                report.elapsed
            ),
        }

        handle.finish(&report);
        report
    }

    /// Mark a job that will never run as `Cancelled` without opening its
    /// source. Listeners are not notified until [`JobHandle::finish`] is
    /// called with the returned report.
    pub(crate) fn discard(self) -> (JobHandle, JobReport) {
        self.handle.shared.token.cancel();
        let report = JobReport {
            job_id: self.handle.id(),
            input_path: self.config.input_path.clone(),
            output_directory: KeyframeExporter::from_config(&self.config)
                .directory()
                .to_path_buf(),
            state: JobState::Cancelled,
            boundaries: Vec::new(),
            frames_processed: 0,
            total_frames: 0,
            error: None,
            elapsed: Duration::ZERO,
        };
        log::debug!("Job {} discarded before start", report.job_id);
        (self.handle, report)
    }
}

/// The frame loop. The source is dropped, releasing the decoder, on every
/// exit path.
fn drive(
    config: &DetectionConfig,
    handle: &JobHandle,
    opener: SourceOpener,
    exporter: &mut KeyframeExporter,
    progress: &mut RunProgress,
) -> Result<StreamEnd, ScenecutError> {
    let mut source = opener(&config.input_path)?;
    progress.total_frames = source.total_frames();

    let mut baseline = match source.read_next() {
        Ok(Some(frame)) => frame,
        Ok(None) => {
            return Err(ScenecutError::EmptyOrCorruptSource {
                path: config.input_path.clone(),
            });
        }
        Err(error) => {
            log::debug!("First frame of {} unreadable: {error}", config.input_path.display());
            return Err(ScenecutError::EmptyOrCorruptSource {
                path: config.input_path.clone(),
            });
        }
    };
    progress.frames_processed = 1;

    let mut detector = ShotBoundaryDetector::from_config(config);
    let mut tracker = ProgressTracker::new(handle.id(), progress.total_frames);
    handle.emit_progress(&tracker.advance(baseline.index()));

    let end = loop {
        if handle.is_cancelled() {
            break StreamEnd::Cancelled;
        }

        let current = match source.read_next() {
            Ok(Some(frame)) => frame,
            Ok(None) => break StreamEnd::Exhausted,
            Err(error) => match config.decode_error_policy {
                DecodeErrorPolicy::Truncate => {
                    log::warn!(
                        "Stopping {} early after frame {}: {error}",
                        config.input_path.display(),
                        baseline.index()
                    );
                    break StreamEnd::Truncated(error);
                }
                DecodeErrorPolicy::Fail => return Err(error),
            },
        };
        progress.frames_processed += 1;

        if let Some(measurement) = detector.process(&baseline, &current)? {
            let path = exporter.export(&current)?;
            let boundary = ShotBoundary {
                frame_index: current.index(),
                timestamp: current.timestamp(),
                change_percentage: measurement.percentage,
                path,
            };
            log::info!(
                "Shot boundary at frame {} ({:.1}% changed)",
                boundary.frame_index,
                boundary.change_percentage
            );
            tracker.record_keyframe();
            handle.emit_keyframe(&boundary);
            progress.boundaries.push(boundary);
        }

        handle.emit_progress(&tracker.advance(current.index()));
        baseline = current;
    };

    if !matches!(end, StreamEnd::Cancelled) {
        handle.emit_progress(&tracker.complete(baseline.index()));
    }
    Ok(end)
}

/// Validate `config` and run its job on a new thread.
///
/// # Errors
///
/// - [`ScenecutError::InvalidConfiguration`] if `config` does not validate.
/// - [`ScenecutError::IoError`] if the worker thread cannot be spawned.
pub fn start_job(config: DetectionConfig) -> Result<JobHandle, ScenecutError> {
    DetectionJob::new(config)?.spawn()
}
