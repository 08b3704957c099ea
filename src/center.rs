//! Baseline centering.
//!
//! Removes the DC offset of a capture by subtracting the mean of its trailing
//! region. The first `skip` samples cover the amplifier settling transient, so
//! they are excluded from the estimate but still shifted by the same mean.

/// Mean of `signal[skip..]`, accumulated in `f64`.
///
/// Returns `None` when the region is empty (`signal.len() <= skip`).
///
/// # Example
/// ```
/// # use muapscan::baseline_mean;
/// assert_eq!(baseline_mean(&[100.0, 1.0, 3.0], 1), Some(2.0));
/// assert_eq!(baseline_mean(&[1.0, 2.0], 2), None);
/// ```
pub fn baseline_mean(signal: &[f32], skip: usize) -> Option<f32> {
    let region = signal.get(skip..)?;
    if region.is_empty() {
        return None;
    }

    let sum: f64 = region.iter().map(|&x| x as f64).sum();
    log::debug!("baseline sum {} over {} samples", sum, region.len());
    Some((sum / region.len() as f64) as f32)
}

/// Subtracts the baseline mean of `signal[skip..]` from every sample in place.
///
/// Returns the mean that was removed. If `signal.len() <= skip` the buffer is
/// left untouched and `0.0` is returned.
///
/// # Example
/// ```
/// # use muapscan::center;
/// let mut signal = [9.0, 4.0, 6.0];
/// let mean = center(&mut signal, 1);
/// assert_eq!(mean, 5.0);
/// assert_eq!(signal, [4.0, -1.0, 1.0]);
/// ```
pub fn center(signal: &mut [f32], skip: usize) -> f32 {
    let Some(mean) = baseline_mean(signal, skip) else {
        return 0.0;
    };

    for sample in signal.iter_mut() {
        *sample -= mean;
    }
    mean
}

#[cfg(test)]
mod tests {
    use super::*;
    extern crate alloc;
    use alloc::vec::Vec;

    #[test]
    fn test_trailing_mean_is_zero_after_centering() {
        let mut signal: Vec<f32> = (0..500).map(|i| 1000.0 + (i % 7) as f32 * 3.5).collect();
        center(&mut signal, 192);

        let tail = &signal[192..];
        let mean: f64 = tail.iter().map(|&x| x as f64).sum::<f64>() / tail.len() as f64;
        assert!(mean.abs() < 1e-3, "trailing mean should vanish, got {}", mean);
    }

    #[test]
    fn test_skipped_region_shifted_by_same_mean() {
        let mut signal = [50.0, 50.0, 10.0, 20.0];
        let mean = center(&mut signal, 2);
        assert_eq!(mean, 15.0);
        assert_eq!(signal, [35.0, 35.0, -5.0, 5.0]);
    }

    #[test]
    fn test_short_buffer_untouched() {
        let mut signal = [3.0, 4.0, 5.0];
        assert_eq!(center(&mut signal, 3), 0.0);
        assert_eq!(signal, [3.0, 4.0, 5.0]);

        assert_eq!(center(&mut signal, 10), 0.0);
        assert_eq!(signal, [3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_empty_buffer() {
        let mut signal: [f32; 0] = [];
        assert_eq!(center(&mut signal, 0), 0.0);
    }

    #[test]
    fn test_zero_signal_stays_zero() {
        let mut signal = [0.0f32; 256];
        center(&mut signal, 192);
        assert!(signal.iter().all(|&x| x == 0.0));
    }
}
