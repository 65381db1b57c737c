//! Detection job configuration.
//!
//! [`DetectionConfig`] is a builder that carries everything one job needs:
//! where the video lives, where keyframes go, how sensitive the detector is,
//! and how mid-stream decode failures are treated. A config is validated
//! when a [`DetectionJob`](crate::DetectionJob) is built from it and is
//! immutable afterwards.
//!
//! # Example
//!
//! ```
//! use scenecut::{DecodeErrorPolicy, DetectionConfig, KeyframeFormat};
//!
//! let config = DetectionConfig::new("movie.mkv", "shots")
//!     .with_change_threshold(35.0)
//!     .with_keyframe_format(KeyframeFormat::Png)
//!     .with_decode_error_policy(DecodeErrorPolicy::Fail);
//!
//! assert!(config.validate().is_ok());
//! ```

use std::path::{Path, PathBuf};

use crate::{error::ScenecutError, export::KeyframeFormat};

/// Per-pixel intensity delta (out of 255) above which a pixel counts as changed.
pub const PIXEL_DELTA_THRESHOLD: u8 = 30;

/// Minimum number of frames between two accepted shot boundaries.
///
/// A candidate is accepted only when it lies *strictly more* than this many
/// frames after the previously accepted boundary.
pub const MIN_BOUNDARY_SPACING: u64 = 10;

/// Percentage of changed pixels used when no threshold is given.
pub const DEFAULT_CHANGE_THRESHOLD: f64 = 50.0;

/// File extensions recognised as videos when walking a directory tree.
///
/// Matched case-insensitively.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "m4v", "webm"];

/// What a job does when a frame after the first fails to decode.
///
/// Either way the keyframes exported so far are kept and the decode error is
/// recorded in the [`JobReport`](crate::JobReport).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeErrorPolicy {
    /// Treat the error as the end of the stream; the job reaches
    /// [`JobState::Completed`](crate::JobState::Completed).
    #[default]
    Truncate,
    /// Stop the job in [`JobState::Failed`](crate::JobState::Failed).
    Fail,
}

/// Configuration for a single detection job.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    pub(crate) input_path: PathBuf,
    pub(crate) output_root: PathBuf,
    pub(crate) change_threshold: f64,
    pub(crate) pixel_delta: u8,
    pub(crate) min_spacing: u64,
    pub(crate) keyframe_format: KeyframeFormat,
    pub(crate) decode_error_policy: DecodeErrorPolicy,
}

impl DetectionConfig {
    /// Create a configuration for `input_path` writing under `output_root`.
    ///
    /// Defaults: change threshold [`DEFAULT_CHANGE_THRESHOLD`], pixel delta
    /// [`PIXEL_DELTA_THRESHOLD`], spacing [`MIN_BOUNDARY_SPACING`], JPEG
    /// keyframes, [`DecodeErrorPolicy::Truncate`].
    pub fn new<I: AsRef<Path>, O: AsRef<Path>>(input_path: I, output_root: O) -> Self {
        Self {
            input_path: input_path.as_ref().to_path_buf(),
            output_root: output_root.as_ref().to_path_buf(),
            change_threshold: DEFAULT_CHANGE_THRESHOLD,
            pixel_delta: PIXEL_DELTA_THRESHOLD,
            min_spacing: MIN_BOUNDARY_SPACING,
            keyframe_format: KeyframeFormat::default(),
            decode_error_policy: DecodeErrorPolicy::default(),
        }
    }

    /// Set the percentage (0–100) of changed pixels required for a boundary.
    ///
    /// A frame is a boundary only when its measurement is strictly greater
    /// than this value.
    #[must_use]
    pub fn with_change_threshold(mut self, threshold: f64) -> Self {
        self.change_threshold = threshold;
        self
    }

    /// Override the per-pixel intensity delta. Defaults to [`PIXEL_DELTA_THRESHOLD`].
    #[must_use]
    pub fn with_pixel_delta(mut self, delta: u8) -> Self {
        self.pixel_delta = delta;
        self
    }

    /// Override the boundary debounce spacing. Defaults to [`MIN_BOUNDARY_SPACING`].
    #[must_use]
    pub fn with_min_spacing(mut self, frames: u64) -> Self {
        self.min_spacing = frames;
        self
    }

    /// Set the image format used for exported keyframes.
    #[must_use]
    pub fn with_keyframe_format(mut self, format: KeyframeFormat) -> Self {
        self.keyframe_format = format;
        self
    }

    /// Set how mid-stream decode errors end the job.
    #[must_use]
    pub fn with_decode_error_policy(mut self, policy: DecodeErrorPolicy) -> Self {
        self.decode_error_policy = policy;
        self
    }

    /// Path of the video to analyse.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Directory under which `Output_<video>` is created.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Change threshold in percent.
    pub fn change_threshold(&self) -> f64 {
        self.change_threshold
    }

    /// Per-pixel intensity delta.
    pub fn pixel_delta(&self) -> u8 {
        self.pixel_delta
    }

    /// Minimum spacing between accepted boundaries, in frames.
    pub fn min_spacing(&self) -> u64 {
        self.min_spacing
    }

    /// Format of exported keyframes.
    pub fn keyframe_format(&self) -> KeyframeFormat {
        self.keyframe_format
    }

    /// Policy applied to mid-stream decode errors.
    pub fn decode_error_policy(&self) -> DecodeErrorPolicy {
        self.decode_error_policy
    }

    /// Check the configuration before a job is built from it.
    ///
    /// # Errors
    ///
    /// Returns [`ScenecutError::InvalidConfiguration`] when either path is
    /// empty or the change threshold is not a finite value in `0..=100`.
    pub fn validate(&self) -> Result<(), ScenecutError> {
        if self.input_path.as_os_str().is_empty() {
            return Err(ScenecutError::InvalidConfiguration(
                "input path must not be empty".to_string(),
            ));
        }
        if self.output_root.as_os_str().is_empty() {
            return Err(ScenecutError::InvalidConfiguration(
                "output directory must not be empty".to_string(),
            ));
        }
        if !self.change_threshold.is_finite() || !(0.0..=100.0).contains(&self.change_threshold)
        {
            return Err(ScenecutError::InvalidConfiguration(format!(
                "change threshold must be between 0 and 100, got {}",
                self.change_threshold
            )));
        }
        Ok(())
    }
}

/// Returns `true` when `path` has one of the [`VIDEO_EXTENSIONS`].
pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(extension))
        })
}
