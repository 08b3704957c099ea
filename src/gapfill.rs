//! Sample-and-hold repair of masked samples.
//!
//! Dropped or saturated ADC samples are flagged invalid by the acquisition
//! layer. Each invalid sample takes the value of the sample immediately before
//! it, which has already been repaired, so runs of invalid samples hold the last
//! valid value. Nothing from the future leaks backwards.

use crate::error::Error;

/// Replaces every invalid sample in `signal[start..]` with its predecessor.
///
/// # Seeding
///
/// For `start > 0`, `signal[start - 1]` seeds the fill and is trusted as-is.
/// For `start == 0` the first sample has no predecessor, so it must be valid.
///
/// # Returns
///
/// Number of samples that were replaced.
///
/// # Errors
///
/// - [`Error::LengthMismatch`] if `valid.len() != signal.len()`
/// - [`Error::MissingSeed`] if `start == 0` and `valid[0]` is false
///
/// # Example
/// ```
/// # use muapscan::fill_gaps;
/// let mut signal = [1.0, 2.0, 0.0, 0.0, 5.0];
/// let valid = [true, true, false, false, true];
/// assert_eq!(fill_gaps(&mut signal, &valid, 1), Ok(2));
/// assert_eq!(signal, [1.0, 2.0, 2.0, 2.0, 5.0]);
/// ```
pub fn fill_gaps(signal: &mut [f32], valid: &[bool], start: usize) -> Result<usize, Error> {
    if valid.len() != signal.len() {
        return Err(Error::length_mismatch(signal.len(), valid.len()));
    }
    if start >= signal.len() {
        return Ok(0);
    }
    if start == 0 && !valid[0] {
        return Err(Error::MissingSeed { index: 0 });
    }

    let mut filled = 0;
    for i in start.max(1)..signal.len() {
        if !valid[i] {
            signal[i] = signal[i - 1];
            filled += 1;
        }
    }

    if filled > 0 {
        log::debug!("gap-filled {} of {} samples", filled, signal.len() - start);
    }
    Ok(filled)
}
