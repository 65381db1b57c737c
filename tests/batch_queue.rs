//! Batch queue integration tests.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
        mpsc::{self, Sender},
    },
    thread,
    time::Duration,
};

use image::{DynamicImage, Rgb, RgbImage};
use scenecut::{
    BatchQueue, DetectionConfig, DetectionJob, Frame, FrameSource, JobState, MemorySource,
    QueueStatus, ScenecutError,
};

const WAIT: Duration = Duration::from_secs(10);

fn solid(value: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([value, value, value])))
}

fn two_shot_video() -> Vec<DynamicImage> {
    (0..20)
        .map(|index| solid(if index < 8 { 0 } else { 255 }))
        .collect()
}

fn config(name: &str, output_root: &Path) -> DetectionConfig {
    DetectionConfig::new(format!("{name}.mp4"), output_root)
}

/// A job whose opener counts how often it ran.
fn counted_job(name: &str, output_root: &Path, opened: &Arc<AtomicUsize>) -> DetectionJob {
    let opened = Arc::clone(opened);
    DetectionJob::with_source_opener(config(name, output_root), move |_| {
        opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySource::new(two_shot_video())) as Box<dyn FrameSource>)
    })
    .unwrap()
}

/// Identical frames forever; announces the first read.
struct EndlessSource {
    position: u64,
    started: Option<Sender<()>>,
}

impl FrameSource for EndlessSource {
    fn total_frames(&self) -> u64 {
        0
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn read_next(&mut self) -> Result<Option<Frame>, ScenecutError> {
        if let Some(started) = self.started.take() {
            let _ = started.send(());
        }
        thread::sleep(Duration::from_millis(1));
        let frame = Frame::new(self.position, solid(0));
        self.position += 1;
        Ok(Some(frame))
    }
}

/// Counts live sources so overlapping jobs can be detected.
struct TrackedSource {
    inner: MemorySource,
    live: Arc<AtomicUsize>,
}

impl FrameSource for TrackedSource {
    fn total_frames(&self) -> u64 {
        self.inner.total_frames()
    }

    fn position(&self) -> u64 {
        self.inner.position()
    }

    fn read_next(&mut self) -> Result<Option<Frame>, ScenecutError> {
        self.inner.read_next()
    }
}

impl Drop for TrackedSource {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── Ordering ──────────────────────────────────────────────────────

#[test]
fn jobs_run_in_enqueue_order() {
    let output = tempfile::tempdir().unwrap();
    let queue = BatchQueue::new();
    let order = Arc::new(Mutex::new(Vec::<PathBuf>::new()));

    for name in ["a", "b", "c"] {
        let handle = queue
            .enqueue(DetectionJob::with_source(config(name, output.path()), MemorySource::new(two_shot_video())).unwrap())
            .unwrap();
        let order = Arc::clone(&order);
        handle.on_completion(move |report| order.lock().unwrap().push(report.input_path.clone()));
    }
    assert_eq!(queue.len(), 3);

    let report = queue.run_all().unwrap().wait();
    let expected: Vec<_> = ["a.mp4", "b.mp4", "c.mp4"].map(PathBuf::from).to_vec();

    assert_eq!(*order.lock().unwrap(), expected);
    assert_eq!(
        report.jobs.iter().map(|job| job.input_path.clone()).collect::<Vec<_>>(),
        expected
    );
    assert_eq!(report.count(JobState::Completed), 3);
    assert_eq!(report.keyframes(), 3);
    assert!(!report.cancelled);
    assert_eq!(queue.status(), QueueStatus::Finished);
    assert!(queue.is_empty());
    assert!(queue.current_job().is_none());
}

#[test]
fn at_most_one_job_runs_at_a_time() {
    let output = tempfile::tempdir().unwrap();
    let queue = BatchQueue::new();
    let live = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for name in ["a", "b", "c", "d"] {
        let live = Arc::clone(&live);
        let peak = Arc::clone(&peak);
        let job = DetectionJob::with_source_opener(config(name, output.path()), move |_| {
            let now = live.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            Ok(Box::new(TrackedSource {
                inner: MemorySource::new(two_shot_video()),
                live,
            }) as Box<dyn FrameSource>)
        })
        .unwrap();
        queue.enqueue(job).unwrap();
    }

    let report = queue.run_all().unwrap().wait();
    assert_eq!(report.jobs.len(), 4);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[test]
fn failed_job_does_not_stop_the_batch() {
    let output = tempfile::tempdir().unwrap();
    let queue = BatchQueue::new();
    let broken = DetectionJob::with_source_opener(config("broken", output.path()), |path| {
        Err(ScenecutError::CannotOpenSource {
            path: path.to_path_buf(),
            reason: "unsupported container".to_string(),
        })
    })
    .unwrap();
    queue.enqueue(broken).unwrap();
    queue
        .enqueue(DetectionJob::with_source(config("fine", output.path()), MemorySource::new(two_shot_video())).unwrap())
        .unwrap();

    let report = queue.run_all().unwrap().wait();
    assert_eq!(report.jobs[0].state, JobState::Failed);
    assert_eq!(report.jobs[1].state, JobState::Completed);
    assert_eq!(report.count(JobState::Failed), 1);
}

#[test]
fn completion_callback_may_wait_on_its_job() {
    let output = tempfile::tempdir().unwrap();
    let queue = BatchQueue::new();
    let reported = Arc::new(AtomicUsize::new(0));

    for name in ["a", "b"] {
        let handle = queue
            .enqueue(DetectionJob::with_source(config(name, output.path()), MemorySource::new(two_shot_video())).unwrap())
            .unwrap();
        let observed = handle.clone();
        let reported = Arc::clone(&reported);
        handle.on_completion(move |_| {
            if observed.wait().state == JobState::Completed {
                reported.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    let report = queue.run_all().unwrap().wait_timeout(WAIT).expect("batch stalled");
    assert_eq!(report.count(JobState::Completed), 2);
    assert_eq!(reported.load(Ordering::SeqCst), 2);
}

// ── Cancellation ──────────────────────────────────────────────────

#[test]
fn cancel_all_while_first_job_runs() {
    let output = tempfile::tempdir().unwrap();
    let queue = BatchQueue::new();
    let (started_sender, started) = mpsc::channel();

    let job_a = DetectionJob::with_source(
        config("a", output.path()),
        EndlessSource {
            position: 0,
            started: Some(started_sender),
        },
    )
    .unwrap();
    let handle_a = queue.enqueue(job_a).unwrap();

    let opened_b = Arc::new(AtomicUsize::new(0));
    let opened_c = Arc::new(AtomicUsize::new(0));
    let handle_b = queue.enqueue(counted_job("b", output.path(), &opened_b)).unwrap();
    let handle_c = queue.enqueue(counted_job("c", output.path(), &opened_c)).unwrap();

    let batch = queue.run_all().unwrap();
    started.recv_timeout(WAIT).expect("job A never started");
    assert_eq!(queue.current_job().map(|job| job.id()), Some(handle_a.id()));

    queue.cancel_all();
    let report = batch.wait_timeout(WAIT).expect("batch did not stop");

    assert!(report.cancelled);
    assert_eq!(report.jobs.len(), 1);
    assert_eq!(report.jobs[0].state, JobState::Cancelled);
    assert!(report.jobs[0].frames_processed > 0);
    assert_eq!(report.discarded.len(), 2);
    assert_eq!(report.count(JobState::Cancelled), 3);

    assert_eq!(opened_b.load(Ordering::SeqCst), 0);
    assert_eq!(opened_c.load(Ordering::SeqCst), 0);
    assert_eq!(handle_a.state(), JobState::Cancelled);
    assert_eq!(handle_b.wait().state, JobState::Cancelled);
    assert_eq!(handle_c.wait().frames_processed, 0);

    assert_eq!(queue.status(), QueueStatus::Cancelled);
    assert!(queue.is_empty());
    assert!(batch.is_finished());
}

#[test]
fn cancelled_queue_is_closed() {
    let output = tempfile::tempdir().unwrap();
    let queue = BatchQueue::new();
    let opened = Arc::new(AtomicUsize::new(0));
    let handle = queue.enqueue(counted_job("a", output.path(), &opened)).unwrap();

    queue.cancel_all();
    assert_eq!(handle.state(), JobState::Cancelled);
    assert_eq!(opened.load(Ordering::SeqCst), 0);

    let result = queue.enqueue(counted_job("b", output.path(), &opened));
    assert!(matches!(result, Err(ScenecutError::QueueClosed)));
    assert!(matches!(queue.run_all(), Err(ScenecutError::QueueAlreadyStarted)));
}

// ── Lifecycle ─────────────────────────────────────────────────────

#[test]
fn finished_queue_rejects_new_jobs() {
    let output = tempfile::tempdir().unwrap();
    let queue = BatchQueue::new();
    assert_eq!(queue.status(), QueueStatus::Idle);

    let report = queue.run_all().unwrap().wait();
    assert!(report.jobs.is_empty());

    let opened = Arc::new(AtomicUsize::new(0));
    let result = queue.enqueue(counted_job("late", output.path(), &opened));
    assert!(matches!(result, Err(ScenecutError::QueueClosed)));
    assert!(matches!(queue.run_all(), Err(ScenecutError::QueueAlreadyStarted)));
}

#[test]
fn enqueue_config_validates() {
    let queue = BatchQueue::new();
    let result = queue.enqueue_config(DetectionConfig::new("clip.mp4", ""));
    assert!(matches!(result, Err(ScenecutError::InvalidConfiguration(_))));
    assert!(queue.is_empty());
}
