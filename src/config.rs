//! Named tunables for the segmentation pipeline.
//!
//! All amplitudes are in the numeric domain of the filtered signal (raw ADC
//! counts scaled by the kernel gain); all lengths are in samples.
//!
//! # Example
//!
//! ```
//! use muapscan::{DetectorConfig, PipelineConfig};
//!
//! // Smaller windows for a lower sample rate, same amplitude floor
//! let detector = DetectorConfig {
//!     window_size: 600,
//!     left_margin: 300,
//!     right_margin: 300,
//!     ..DetectorConfig::default()
//! };
//! let config = PipelineConfig { detector, inference_margin: 150, ..PipelineConfig::default() };
//! assert!(config.validate().is_ok());
//! ```

use crate::error::Error;
use crate::schedule::YieldPolicy;

/// Leading samples excluded from the baseline mean (settling transient).
pub const DEFAULT_BASELINE_SKIP: usize = 192;
/// Detector sliding-window length.
pub const DEFAULT_WINDOW_SIZE: usize = 1200;
/// Event span to the left of a detected peak.
pub const DEFAULT_LEFT_MARGIN: usize = 600;
/// Event span to the right of a detected peak.
pub const DEFAULT_RIGHT_MARGIN: usize = 600;
/// Minimum local-mean-adjusted peak for a window to count as an event.
pub const DEFAULT_AMPLITUDE_FLOOR: f32 = 15000.0;
/// Maximum number of events retained per detection pass.
pub const DEFAULT_EVENT_CAPACITY: usize = 100;
/// Tap count of the production band-pass kernel.
pub const DEFAULT_KERNEL_LEN: usize = 513;
/// Samples trimmed from each side of an event span before inference.
pub const DEFAULT_INFERENCE_MARGIN: usize = 300;
/// Inference counter wraps after this many windows.
pub const DEFAULT_INFERENCES_PER_CYCLE: u32 = 20;
/// Samples processed between scheduler checkpoints.
pub const DEFAULT_CHUNK_SAMPLES: usize = 64;
/// Every Nth checkpoint requests a long pause.
pub const DEFAULT_LONG_PAUSE_EVERY: u32 = 10;

/// Adaptive threshold derived from global amplitude statistics.
///
/// If `max > peak_ratio * avg_abs` the signal is in the sharp-peak regime and the
/// threshold is `sharp_gain * avg_abs`; otherwise it is `max / flat_divisor`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThresholdRule {
    /// Max-to-mean ratio above which the signal counts as sharply peaked
    pub peak_ratio: f32,
    /// Multiple of `avg_abs` used in the sharp-peak regime
    pub sharp_gain: f32,
    /// Divisor of `max` used in the flat regime
    pub flat_divisor: f32,
}

impl ThresholdRule {
    /// Rejects non-positive or non-finite parameters.
    pub fn validate(&self) -> Result<(), Error> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(self.peak_ratio) {
            return Err(Error::InvalidConfig("peak_ratio must be positive"));
        }
        if !positive(self.sharp_gain) {
            return Err(Error::InvalidConfig("sharp_gain must be positive"));
        }
        if !positive(self.flat_divisor) {
            return Err(Error::InvalidConfig("flat_divisor must be positive"));
        }
        Ok(())
    }
}

impl Default for ThresholdRule {
    fn default() -> Self {
        Self {
            peak_ratio: 30.0,
            sharp_gain: 5.0,
            flat_divisor: 5.0,
        }
    }
}

/// MUAP detector parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectorConfig {
    /// Sliding-window length; the candidate peak must sit at `window_size / 2`
    pub window_size: usize,
    /// Event span left of the peak
    pub left_margin: usize,
    /// Event span right of the peak
    pub right_margin: usize,
    /// Fixed amplitude floor a peak must exceed
    pub amplitude_floor: f32,
    /// Adaptive threshold a peak must also exceed
    pub threshold: ThresholdRule,
}

impl DetectorConfig {
    /// Checks that windows are non-empty and spans are non-degenerate.
    pub fn validate(&self) -> Result<(), Error> {
        if self.window_size < 2 {
            return Err(Error::InvalidConfig("window_size must be at least 2"));
        }
        match self.left_margin.checked_add(self.right_margin) {
            None => return Err(Error::InvalidConfig("event span overflows usize")),
            Some(0) => return Err(Error::InvalidConfig("event span must be non-empty")),
            Some(_) => {}
        }
        if self.amplitude_floor.is_nan() {
            return Err(Error::InvalidConfig("amplitude_floor is NaN"));
        }
        self.threshold.validate()
    }

    /// Total length of an accepted event window, saturating at `usize::MAX`.
    #[inline]
    pub const fn span(&self) -> usize {
        self.left_margin.saturating_add(self.right_margin)
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            left_margin: DEFAULT_LEFT_MARGIN,
            right_margin: DEFAULT_RIGHT_MARGIN,
            amplitude_floor: DEFAULT_AMPLITUDE_FLOOR,
            threshold: ThresholdRule::default(),
        }
    }
}

/// Parameters for a whole conditioning, filtering and detection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineConfig {
    /// Baseline skip for centering; gap-fill starts at the same offset
    pub baseline_skip: usize,
    /// Detector parameters
    pub detector: DetectorConfig,
    /// Samples trimmed from each side of an event before inference
    pub inference_margin: usize,
    /// Cooperative yield cadence
    pub schedule: YieldPolicy,
}

impl PipelineConfig {
    /// Validates every nested section and the inference trim.
    pub fn validate(&self) -> Result<(), Error> {
        self.detector.validate()?;
        self.schedule.validate()?;
        let trim = self
            .inference_margin
            .checked_mul(2)
            .ok_or(Error::InvalidConfig("inference margin overflows usize"))?;
        if trim >= self.detector.span() {
            return Err(Error::InvalidConfig(
                "inference margins consume the whole event span",
            ));
        }
        Ok(())
    }

    /// Number of samples handed to the inference engine per event.
    #[inline]
    pub const fn model_window(&self) -> usize {
        self.detector
            .span()
            .saturating_sub(self.inference_margin.saturating_mul(2))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            baseline_skip: DEFAULT_BASELINE_SKIP,
            detector: DetectorConfig::default(),
            inference_margin: DEFAULT_INFERENCE_MARGIN,
            schedule: YieldPolicy::default(),
        }
    }
}
