//! Keyframe export.
//!
//! Every accepted shot boundary is written as one still image under
//! `<output_root>/Output_<video>/`, named `<video>_<frame:04>.<ext>`. The
//! directory is created (with parents) on the first export, so a job that
//! finds no boundary, or cannot open its source, leaves nothing behind.
//! Re-running a job into an existing directory is fine: files from earlier
//! runs stay, and an identical path is simply overwritten.

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{DynamicImage, ImageFormat};

use crate::{configuration::DetectionConfig, error::ScenecutError, frame::Frame};

/// Prefix of the per-video output directory.
pub const OUTPUT_DIRECTORY_PREFIX: &str = "Output_";

/// Image format of exported keyframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyframeFormat {
    /// JPEG (`.jpg`). This is the default.
    #[default]
    Jpeg,
    /// PNG (`.png`).
    Png,
    /// BMP (`.bmp`).
    Bmp,
    /// TIFF (`.tiff`).
    Tiff,
    /// Lossless WebP (`.webp`).
    WebP,
}

impl KeyframeFormat {
    /// Parse a file extension such as `"jpg"` or `".PNG"`.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension
            .trim_start_matches('.')
            .to_ascii_lowercase()
            .as_str()
        {
            "jpg" | "jpeg" => Some(KeyframeFormat::Jpeg),
            "png" => Some(KeyframeFormat::Png),
            "bmp" => Some(KeyframeFormat::Bmp),
            "tif" | "tiff" => Some(KeyframeFormat::Tiff),
            "webp" => Some(KeyframeFormat::WebP),
            _ => None,
        }
    }

    /// File extension written for this format, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            KeyframeFormat::Jpeg => "jpg",
            KeyframeFormat::Png => "png",
            KeyframeFormat::Bmp => "bmp",
            KeyframeFormat::Tiff => "tiff",
            KeyframeFormat::WebP => "webp",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            KeyframeFormat::Jpeg => ImageFormat::Jpeg,
            KeyframeFormat::Png => ImageFormat::Png,
            KeyframeFormat::Bmp => ImageFormat::Bmp,
            KeyframeFormat::Tiff => ImageFormat::Tiff,
            KeyframeFormat::WebP => ImageFormat::WebP,
        }
    }
}

/// Base name of a video: its file name without the extension.
pub fn video_base_name(video_path: &Path) -> String {
    video_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "video".to_string())
}

/// `<output_root>/Output_<video base name>`.
pub fn output_directory(output_root: &Path, video_path: &Path) -> PathBuf {
    output_root.join(format!(
        "{OUTPUT_DIRECTORY_PREFIX}{}",
        video_base_name(video_path)
    ))
}

/// Writes keyframes for one video.
#[derive(Debug, Clone)]
pub struct KeyframeExporter {
    directory: PathBuf,
    video_name: String,
    format: KeyframeFormat,
    directory_ready: bool,
}

impl KeyframeExporter {
    /// An exporter for `video_path` writing under `output_root`.
    pub fn new(output_root: &Path, video_path: &Path, format: KeyframeFormat) -> Self {
        Self {
            directory: output_directory(output_root, video_path),
            video_name: video_base_name(video_path),
            format,
            directory_ready: false,
        }
    }

    /// An exporter for the video and output root of `config`.
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(&config.output_root, &config.input_path, config.keyframe_format)
    }

    /// The per-video output directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Where the keyframe for `frame_index` is written.
    pub fn keyframe_path(&self, frame_index: u64) -> PathBuf {
        self.directory.join(format!(
            "{}_{frame_index:04}.{}",
            self.video_name,
            self.format.extension()
        ))
    }

    /// Write `frame` and return the path of the new file.
    ///
    /// # Errors
    ///
    /// - [`ScenecutError::IoError`] if the output directory cannot be created.
    /// - [`ScenecutError::ImageError`] if the image cannot be encoded or written.
    pub fn export(&mut self, frame: &Frame) -> Result<PathBuf, ScenecutError> {
        if !self.directory_ready {
            fs::create_dir_all(&self.directory)?;
            self.directory_ready = true;
        }

        let path = self.keyframe_path(frame.index());
        let image = frame.image();
        match self.format {
            // The JPEG encoder has no alpha or high-depth support.
            KeyframeFormat::Jpeg
                if !matches!(
                    image,
                    DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_)
                ) =>
            {
                image
                    .to_rgb8()
                    .save_with_format(&path, ImageFormat::Jpeg)?;
            }
            format => image.save_with_format(&path, format.image_format())?,
        }

        log::debug!("Wrote keyframe {}", path.display());
        Ok(path)
    }
}
