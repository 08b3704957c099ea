use crate::config::ThresholdRule;

/// Amplitude regime selected by the adaptive threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    /// Few tall spikes over a quiet background
    SharpPeak,
    /// Broad or dense activity
    Flat,
}

/// Global amplitude statistics of a signal.
///
/// `max` is the signed maximum clamped below at zero, so an all-negative signal
/// reports `0.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmplitudeStats {
    avg_abs: f32,
    max: f32,
    count: usize,
}

impl AmplitudeStats {
    /// Computes `avg_abs` and `max` over `signal`.
    ///
    /// Returns `None` for an empty signal.
    ///
    /// # Example
    /// ```
    /// # use muapscan::AmplitudeStats;
    /// let stats = AmplitudeStats::from_signal(&[1.0, -3.0, 2.0]).unwrap();
    /// assert_eq!(stats.avg_abs(), 2.0);
    /// assert_eq!(stats.max(), 2.0);
    /// ```
    pub fn from_signal(signal: &[f32]) -> Option<Self> {
        if signal.is_empty() {
            return None;
        }

        let mut abs_sum = 0.0f64;
        let mut max = 0.0f32;
        for &x in signal {
            abs_sum += libm::fabsf(x) as f64;
            if x > max {
                max = x;
            }
        }

        Some(Self {
            avg_abs: (abs_sum / signal.len() as f64) as f32,
            max,
            count: signal.len(),
        })
    }

    pub fn avg_abs(&self) -> f32 {
        self.avg_abs
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn regime(&self, rule: &ThresholdRule) -> Regime {
        if self.max > rule.peak_ratio * self.avg_abs {
            Regime::SharpPeak
        } else {
            Regime::Flat
        }
    }

    /// Adaptive detection threshold under `rule`.
    pub fn threshold(&self, rule: &ThresholdRule) -> f32 {
        match self.regime(rule) {
            Regime::SharpPeak => rule.sharp_gain * self.avg_abs,
            Regime::Flat => self.max / rule.flat_divisor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_signal() {
        assert!(AmplitudeStats::from_signal(&[]).is_none());
    }

    #[test]
    fn test_sharp_peak_regime() {
        let mut signal = [1.0f32; 100];
        signal[50] = 1000.0;
        let stats = AmplitudeStats::from_signal(&signal).unwrap();
        let rule = ThresholdRule::default();

        // avg_abs = (99 + 1000) / 100
        assert!((stats.avg_abs() - 10.99).abs() < 1e-4);
        assert_eq!(stats.regime(&rule), Regime::SharpPeak);
        assert!((stats.threshold(&rule) - 54.95).abs() < 1e-3);
    }

    #[test]
    fn test_flat_regime() {
        let signal = [-2.0, 4.0, -6.0, 8.0];
        let stats = AmplitudeStats::from_signal(&signal).unwrap();
        let rule = ThresholdRule::default();

        assert_eq!(stats.avg_abs(), 5.0);
        assert_eq!(stats.max(), 8.0);
        assert_eq!(stats.regime(&rule), Regime::Flat);
        assert!((stats.threshold(&rule) - 1.6).abs() < 1e-6);
    }

    #[test]
    fn test_all_negative_max_clamped() {
        let stats = AmplitudeStats::from_signal(&[-5.0, -1.0]).unwrap();
        assert_eq!(stats.max(), 0.0);
        assert_eq!(stats.threshold(&ThresholdRule::default()), 0.0);
    }

    #[test]
    fn test_zero_signal_threshold_is_zero() {
        let stats = AmplitudeStats::from_signal(&[0.0; 16]).unwrap();
        assert_eq!(stats.avg_abs(), 0.0);
        assert_eq!(stats.threshold(&ThresholdRule::default()), 0.0);
        assert_eq!(stats.count(), 16);
    }
}
