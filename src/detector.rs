//! Shot boundary decision policy.
//!
//! [`ShotBoundaryDetector`] walks the frame stream of one job. Each adjacent
//! pair is measured with a [`ChangeMetric`]; a boundary is accepted when the
//! measurement exceeds the change threshold and the frame lies strictly more
//! than the debounce spacing past the previously accepted boundary.
//!
//! # Example
//!
//! ```
//! use scenecut::{ChangeMeasurement, ShotBoundaryDetector};
//!
//! let mut detector = ShotBoundaryDetector::new(50.0);
//! let cut = ChangeMeasurement { changed_pixels: 90, total_pixels: 100, percentage: 90.0 };
//!
//! assert!(detector.decide(5, &cut));
//! assert!(!detector.decide(15, &cut)); // exactly 10 frames later
//! assert!(detector.decide(16, &cut));
//! ```

use crate::{
    configuration::{DetectionConfig, MIN_BOUNDARY_SPACING},
    error::ScenecutError,
    frame::Frame,
    metric::{ChangeMeasurement, ChangeMetric},
};

/// Stateful boundary detector for a single frame stream.
#[derive(Debug, Clone)]
pub struct ShotBoundaryDetector {
    metric: ChangeMetric,
    change_threshold: f64,
    min_spacing: u64,
    last_accepted: Option<u64>,
}

impl ShotBoundaryDetector {
    /// A detector with the default metric and spacing.
    pub fn new(change_threshold: f64) -> Self {
        Self {
            metric: ChangeMetric::default(),
            change_threshold,
            min_spacing: MIN_BOUNDARY_SPACING,
            last_accepted: None,
        }
    }

    /// A detector using the threshold, pixel delta and spacing of `config`.
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self {
            metric: ChangeMetric::new(config.pixel_delta),
            change_threshold: config.change_threshold,
            min_spacing: config.min_spacing,
            last_accepted: None,
        }
    }

    /// Replace the debounce spacing.
    #[must_use]
    pub fn with_min_spacing(mut self, frames: u64) -> Self {
        self.min_spacing = frames;
        self
    }

    /// Index of the most recently accepted boundary.
    pub fn last_accepted(&self) -> Option<u64> {
        self.last_accepted
    }

    /// Measure `previous → current` and decide whether `current` starts a
    /// new shot.
    ///
    /// Returns the measurement when the boundary is accepted, `None`
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ScenecutError::ResolutionMismatch`] if the frames differ in size.
    pub fn process(
        &mut self,
        previous: &Frame,
        current: &Frame,
    ) -> Result<Option<ChangeMeasurement>, ScenecutError> {
        let measurement = self.metric.compare(previous, current)?;
        log::trace!(
            "frame {}: {:.2}% changed",
            current.index(),
            measurement.percentage
        );
        Ok(self
            .decide(current.index(), &measurement)
            .then_some(measurement))
    }

    /// Apply the acceptance rule to a measurement taken at frame `index`.
    ///
    /// Updates the last accepted index when the boundary is accepted.
    pub fn decide(&mut self, index: u64, measurement: &ChangeMeasurement) -> bool {
        if measurement.percentage <= self.change_threshold {
            return false;
        }

        let far_enough = self
            .last_accepted
            .is_none_or(|last| index.saturating_sub(last) > self.min_spacing);
        if far_enough {
            self.last_accepted = Some(index);
        }
        far_enough
    }
}
