//! # scenecut
//!
//! Detect shot boundaries in videos and export one keyframe per shot.
//!
//! `scenecut` decodes a video frame by frame with FFmpeg (via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate), compares
//! every frame with the one before it, and writes the first frame of every
//! new shot as an image under `<output root>/Output_<video>/`. Jobs run on
//! their own worker thread, report progress through caller-owned callbacks,
//! and can be cancelled cooperatively. A [`BatchQueue`] runs many jobs one
//! after another.
//!
//! ## Quick Start
//!
//! ### Detect shots in one video
//!
//! ```no_run
//! use scenecut::{DetectionConfig, JobState};
//!
//! let handle = scenecut::start_job(
//!     DetectionConfig::new("input.mp4", "shots").with_change_threshold(50.0),
//! )?;
//! handle.on_progress(|info| eprint!("\r{:5.1}%", info.percentage));
//!
//! let report = handle.wait();
//! if report.state == JobState::Completed {
//!     for boundary in &report.boundaries {
//!         println!("frame {} -> {}", boundary.frame_index, boundary.path.display());
//!     }
//! }
//! # Ok::<(), scenecut::ScenecutError>(())
//! ```
//!
//! ### Process a directory tree
//!
//! ```no_run
//! use std::path::Path;
//!
//! use scenecut::{BatchQueue, DetectionConfig, discovery};
//!
//! let template = DetectionConfig::new("unused", "unused");
//! let queue = BatchQueue::new();
//! for config in discovery::plan_batch(Path::new("videos"), Path::new("shots"), &template)? {
//!     queue.enqueue_config(config)?;
//! }
//! let report = queue.run_all()?.wait();
//! println!("{} keyframe(s)", report.keyframes());
//! # Ok::<(), scenecut::ScenecutError>(())
//! ```
//!
//! ### Measure two frames directly
//!
//! ```
//! use image::{DynamicImage, RgbImage};
//! use scenecut::{ChangeMetric, Frame};
//!
//! let a = Frame::new(0, DynamicImage::ImageRgb8(RgbImage::new(2, 2)));
//! let b = Frame::new(1, DynamicImage::ImageRgb8(RgbImage::new(2, 2)));
//! assert_eq!(ChangeMetric::default().compare(&a, &b)?.percentage, 0.0);
//! # Ok::<(), scenecut::ScenecutError>(())
//! ```
//!
//! ## How a boundary is decided
//!
//! Both frames are reduced to BT.601 intensity. A pixel counts as changed
//! when its intensity moves by more than [`PIXEL_DELTA_THRESHOLD`] levels. A frame
//! starts a new shot when the changed share of the picture is strictly above
//! the configured threshold and the frame lies strictly more than
//! [`MIN_BOUNDARY_SPACING`] frames after the previous boundary.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | Counts changed pixels of one comparison on the rayon pool |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod configuration;
mod conversion;
pub mod detector;
pub mod discovery;
pub mod error;
pub mod export;
pub mod frame;
pub mod job;
pub mod logging;
pub mod metric;
pub mod progress;
pub mod queue;
pub mod source;

pub use configuration::{
    DEFAULT_CHANGE_THRESHOLD, DecodeErrorPolicy, DetectionConfig, MIN_BOUNDARY_SPACING,
    PIXEL_DELTA_THRESHOLD, VIDEO_EXTENSIONS,
};
pub use detector::ShotBoundaryDetector;
pub use error::ScenecutError;
pub use export::{KeyframeExporter, KeyframeFormat};
pub use frame::Frame;
pub use job::{DetectionJob, JobHandle, JobReport, JobState, ShotBoundary, start_job};
pub use logging::{FfmpegLogLevel, get_ffmpeg_log_level, init_logging, set_ffmpeg_log_level};
pub use metric::{ChangeMeasurement, ChangeMetric};
pub use progress::{CancellationToken, ProgressInfo, ProgressReporter};
pub use queue::{BatchHandle, BatchQueue, BatchReport, QueueStatus};
pub use source::{FrameSource, MemorySource, VideoSource};
