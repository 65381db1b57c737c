//! Frame-to-frame change measurement.
//!
//! Both frames are reduced to single-channel intensity, differenced pixel by
//! pixel, and every pixel whose absolute delta exceeds the configured
//! intensity threshold counts as changed. The measurement is the changed
//! share of the frame, in percent.
//!
//! With the `rayon` feature the changed-pixel count of one comparison is
//! split across the rayon pool; frames are still compared one pair at a time.

use image::GrayImage;

use crate::{configuration::PIXEL_DELTA_THRESHOLD, error::ScenecutError, frame::Frame};

/// Result of comparing two adjacent frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeMeasurement {
    /// Number of pixels whose intensity delta exceeded the threshold.
    pub changed_pixels: u64,
    /// Number of pixels compared (`width × height`).
    pub total_pixels: u64,
    /// `changed_pixels / total_pixels × 100`, in `0.0..=100.0`.
    pub percentage: f64,
}

impl ChangeMeasurement {
    fn from_counts(changed_pixels: u64, total_pixels: u64) -> Self {
        let percentage = if total_pixels == 0 {
            0.0
        } else {
            changed_pixels as f64 / total_pixels as f64 * 100.0
        };
        Self {
            changed_pixels,
            total_pixels,
            percentage,
        }
    }
}

/// Computes the percentage of changed pixels between two frames.
#[derive(Debug, Clone, Copy)]
pub struct ChangeMetric {
    pixel_delta: u8,
}

impl Default for ChangeMetric {
    fn default() -> Self {
        Self::new(PIXEL_DELTA_THRESHOLD)
    }
}

impl ChangeMetric {
    /// A metric that counts a pixel as changed when its intensity moves by
    /// more than `pixel_delta` levels.
    pub fn new(pixel_delta: u8) -> Self {
        Self { pixel_delta }
    }

    /// The per-pixel intensity delta in use.
    pub fn pixel_delta(&self) -> u8 {
        self.pixel_delta
    }

    /// Compare two adjacent frames.
    ///
    /// # Errors
    ///
    /// Returns [`ScenecutError::ResolutionMismatch`] if the frames differ in size.
    ///
    /// # Example
    ///
    /// ```
    /// use image::{DynamicImage, RgbImage};
    /// use scenecut::{ChangeMetric, Frame};
    ///
    /// let dark = Frame::new(0, DynamicImage::ImageRgb8(RgbImage::new(8, 8)));
    /// let light = Frame::new(
    ///     1,
    ///     DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]))),
    /// );
    ///
    /// let measurement = ChangeMetric::default().compare(&dark, &light)?;
    /// assert_eq!(measurement.percentage, 100.0);
    /// # Ok::<(), scenecut::ScenecutError>(())
    /// ```
    pub fn compare(
        &self,
        previous: &Frame,
        current: &Frame,
    ) -> Result<ChangeMeasurement, ScenecutError> {
        self.compare_intensity(previous.intensity(), current.intensity())
    }

    /// Compare two intensity planes directly.
    ///
    /// # Errors
    ///
    /// Returns [`ScenecutError::ResolutionMismatch`] if the planes differ in size.
    pub fn compare_intensity(
        &self,
        previous: &GrayImage,
        current: &GrayImage,
    ) -> Result<ChangeMeasurement, ScenecutError> {
        if previous.dimensions() != current.dimensions() {
            return Err(ScenecutError::ResolutionMismatch {
                expected: previous.dimensions(),
                found: current.dimensions(),
            });
        }

        let (width, height) = current.dimensions();
        let total_pixels = u64::from(width) * u64::from(height);
        let changed_pixels = count_changed(previous.as_raw(), current.as_raw(), self.pixel_delta);

        Ok(ChangeMeasurement::from_counts(changed_pixels, total_pixels))
    }
}

#[cfg(not(feature = "rayon"))]
fn count_changed(previous: &[u8], current: &[u8], pixel_delta: u8) -> u64 {
    count_changed_sequential(previous, current, pixel_delta)
}

#[cfg(feature = "rayon")]
fn count_changed(previous: &[u8], current: &[u8], pixel_delta: u8) -> u64 {
    use rayon::prelude::*;

    const CHUNK_PIXELS: usize = 64 * 1024;

    previous
        .par_chunks(CHUNK_PIXELS)
        .zip(current.par_chunks(CHUNK_PIXELS))
        .map(|(previous, current)| count_changed_sequential(previous, current, pixel_delta))
        .sum()
}

fn count_changed_sequential(previous: &[u8], current: &[u8], pixel_delta: u8) -> u64 {
    previous
        .iter()
        .zip(current)
        .filter(|&(&before, &after)| before.abs_diff(after) > pixel_delta)
        .count() as u64
}
