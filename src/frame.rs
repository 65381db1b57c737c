//! Decoded video frames.
//!
//! A [`Frame`] is an immutable picture plus the position at which it was
//! decoded. The single-channel intensity plane used by the change metric is
//! computed on first use and cached, so a frame that is compared twice (once
//! as the current frame, once as the baseline) is only converted once.
//!
//! Intensity is BT.601 luma (`0.299 R + 0.587 G + 0.114 B`) in 14-bit fixed
//! point with rounding, the same weighting OpenCV applies for `BGR2GRAY`.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::OnceLock,
    time::Duration,
};

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

/// One decoded video frame.
#[derive(Clone)]
pub struct Frame {
    index: u64,
    timestamp: Option<Duration>,
    image: DynamicImage,
    intensity: OnceLock<GrayImage>,
}

impl Debug for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("timestamp", &self.timestamp)
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish_non_exhaustive()
    }
}

impl Frame {
    /// Wrap a decoded picture at decode position `index` (0-based).
    pub fn new(index: u64, image: DynamicImage) -> Self {
        Self {
            index,
            timestamp: None,
            image,
            intensity: OnceLock::new(),
        }
    }

    /// Attach the presentation timestamp reported by the decoder.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Decode position of this frame, starting at 0.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Presentation timestamp, when the source knows it.
    pub fn timestamp(&self) -> Option<Duration> {
        self.timestamp
    }

    /// The decoded picture.
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Single-channel BT.601 intensity plane of this frame.
    pub fn intensity(&self) -> &GrayImage {
        self.intensity.get_or_init(|| match &self.image {
            DynamicImage::ImageLuma8(gray) => gray.clone(),
            DynamicImage::ImageRgb8(rgb) => luma_plane(rgb),
            other => luma_plane(&other.to_rgb8()),
        })
    }
}

const LUMA_SHIFT: u32 = 14;
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;

/// BT.601 luma of one RGB pixel.
fn bt601_luma(red: u8, green: u8, blue: u8) -> u8 {
    let weighted = LUMA_R * u32::from(red) + LUMA_G * u32::from(green) + LUMA_B * u32::from(blue);
    // Weights sum to 1 << 14, so the result never exceeds 255.
    ((weighted + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8
}

fn luma_plane(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let Rgb([red, green, blue]) = *rgb.get_pixel(x, y);
        Luma([bt601_luma(red, green, blue)])
    })
}
