//! Error types for the `scenecut` crate.
//!
//! This module defines [`ScenecutError`], the unified error type returned by
//! all fallible operations in the crate. Variants carry the file paths,
//! frame dimensions, and upstream messages needed to diagnose a failure
//! without additional logging at the call site.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `scenecut` operations.
///
/// Jobs never surface these to a [`BatchQueue`](crate::BatchQueue): a job
/// converts any error into a terminal [`JobState`](crate::JobState) and
/// records the message in its [`JobReport`](crate::JobReport).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScenecutError {
    /// The job configuration was rejected before the job started.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The video source could not be opened.
    #[error("Failed to open video source at {path}: {reason}")]
    CannotOpenSource {
        /// Path of the video that was opened.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The source opened but its first frame could not be read.
    #[error("Video source at {path} is empty or corrupt (no first frame)")]
    EmptyOrCorruptSource {
        /// Path of the video that was opened.
        path: PathBuf,
    },

    /// Two frames handed to the change metric have different dimensions.
    #[error("Frame resolution changed from {expected:?} to {found:?} (width, height)")]
    ResolutionMismatch {
        /// `(width, height)` of the previous frame.
        expected: (u32, u32),
        /// `(width, height)` of the current frame.
        found: (u32, u32),
    },

    /// A frame after the first one could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    DecodeError(String),

    /// An I/O error occurred while creating output directories.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// A keyframe could not be encoded or written.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// The batch queue was cancelled or has drained and accepts no more work.
    #[error("Batch queue is closed")]
    QueueClosed,

    /// [`BatchQueue::run_all`](crate::BatchQueue::run_all) was called twice.
    #[error("Batch queue is already running")]
    QueueAlreadyStarted,
}

impl From<FfmpegError> for ScenecutError {
    fn from(error: FfmpegError) -> Self {
        ScenecutError::FfmpegError(error.to_string())
    }
}
