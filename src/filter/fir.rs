use crate::error::Error;
use crate::schedule::Step;

static UNIT_TAP: [f32; 1] = [1.0];

/// Read-only FIR tap weights `[b0, b1, ..., b_{M-1}]`.
///
/// Borrowed rather than owned so a 513-tap production kernel can live in
/// flash as a `static` array.
///
/// # Example
/// ```
/// # use muapscan::FilterKernel;
/// static TAPS: [f32; 3] = [0.25, 0.5, 0.25];
/// let kernel = FilterKernel::new(&TAPS);
/// assert_eq!(kernel.len(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterKernel<'a> {
    taps: &'a [f32],
}

impl<'a> FilterKernel<'a> {
    pub const fn new(taps: &'a [f32]) -> Self {
        Self { taps }
    }

    pub const fn taps(&self) -> &'a [f32] {
        self.taps
    }

    pub const fn len(&self) -> usize {
        self.taps.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Sum of the taps, i.e. the DC gain.
    pub fn dc_gain(&self) -> f64 {
        self.taps.iter().map(|&b| b as f64).sum()
    }
}

impl FilterKernel<'static> {
    /// Single unit tap; output equals input.
    pub const fn identity() -> Self {
        Self::new(&UNIT_TAP)
    }
}

/// Computes `y[i] = sum(b[j] * x[i - j])` over taps with `i - j >= 0`.
///
/// Products are accumulated in `f64` and narrowed on return.
#[inline]
fn output_sample(taps: &[f32], input: &[f32], i: usize) -> f32 {
    let reach = taps.len().min(i + 1);
    let mut acc = 0.0f64;
    for (j, &b) in taps[..reach].iter().enumerate() {
        acc += b as f64 * input[i - j] as f64;
    }
    acc as f32
}

/// Causal direct-form convolution of a whole buffer.
///
/// History before index 0 is taken as zero, so `output[i]` depends only on
/// `input[..=i]`. O(N·M); use [`Convolver`] to split the work into chunks.
///
/// # Errors
///
/// [`Error::LengthMismatch`] if `output.len() != input.len()`.
///
/// # Example
/// ```
/// # use muapscan::{convolve, FilterKernel};
/// static TAPS: [f32; 2] = [1.0, 2.0];
/// let input = [1.0, 0.0, 0.0];
/// let mut output = [0.0; 3];
/// convolve(FilterKernel::new(&TAPS), &input, &mut output).unwrap();
/// assert_eq!(output, [1.0, 2.0, 0.0]);
/// ```
pub fn convolve(kernel: FilterKernel<'_>, input: &[f32], output: &mut [f32]) -> Result<(), Error> {
    let mut job = Convolver::new(kernel, input.len());
    job.resume(input, output, usize::MAX).map(|_| ())
}

/// Resumable block convolution.
///
/// Each [`resume`](Convolver::resume) computes at most `budget` output samples
/// and remembers where it stopped. Samples before
/// [`position`](Convolver::position) are final; nothing is written past it.
///
/// # Example
/// ```
/// # use muapscan::{Convolver, FilterKernel, Step};
/// let input = [1.0f32; 10];
/// let mut output = [0.0f32; 10];
/// let mut job = Convolver::new(FilterKernel::identity(), input.len());
///
/// assert_eq!(job.resume(&input, &mut output, 4).unwrap(), Step::Yield { position: 4 });
/// assert_eq!(job.resume(&input, &mut output, 100).unwrap(), Step::Complete);
/// assert_eq!(output, input);
/// ```
#[derive(Debug, Clone)]
pub struct Convolver<'k> {
    kernel: FilterKernel<'k>,
    len: usize,
    position: usize,
}

impl<'k> Convolver<'k> {
    /// Prepares a convolution of a `len`-sample buffer.
    pub fn new(kernel: FilterKernel<'k>, len: usize) -> Self {
        Self {
            kernel,
            len,
            position: 0,
        }
    }

    /// Continues the convolution for up to `budget` samples.
    ///
    /// `input` and `output` must both be `len` samples long and the caller
    /// must not change `input` between calls.
    pub fn resume(&mut self, input: &[f32], output: &mut [f32], budget: usize) -> Result<Step, Error> {
        if input.len() != self.len {
            return Err(Error::length_mismatch(self.len, input.len()));
        }
        if output.len() != self.len {
            return Err(Error::length_mismatch(self.len, output.len()));
        }

        let taps = self.kernel.taps();
        let end = self.position.saturating_add(budget).min(self.len);
        for i in self.position..end {
            output[i] = output_sample(taps, input, i);
        }
        self.position = end;

        if self.is_complete() {
            Ok(Step::Complete)
        } else {
            Ok(Step::Yield {
                position: self.position,
            })
        }
    }

    /// Next output sample to compute.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_complete(&self) -> bool {
        self.position >= self.len
    }

    pub fn kernel(&self) -> FilterKernel<'k> {
        self.kernel
    }

    /// Restarts from sample 0.
    pub fn reset(&mut self) {
        self.position = 0;
    }
}
