//! Boundary to the on-device classifier.
//!
//! The model runtime (arena allocation, op resolution, schema checks) stays
//! outside this crate. It is reached through [`InferenceEngine`]: fill a
//! fixed-length float input, invoke, read three scores. Scores are forwarded
//! to an [`OutputHandler`] for reporting and written into the caller's result
//! slots.
//!
//! # Example
//!
//! ```
//! use muapscan::{EventWindow, InferenceAdapter, InferenceEngine, InferenceError, Scores};
//!
//! /// Scores each window by its mean, peak and energy.
//! struct Summary {
//!     input: [f32; 4],
//! }
//!
//! impl InferenceEngine for Summary {
//!     fn input_len(&self) -> usize {
//!         self.input.len()
//!     }
//!     fn input_buffer(&mut self) -> Result<&mut [f32], InferenceError> {
//!         Ok(&mut self.input)
//!     }
//!     fn invoke(&mut self) -> Result<Scores, InferenceError> {
//!         let mean = self.input.iter().sum::<f32>() / 4.0;
//!         let peak = self.input.iter().cloned().fold(f32::MIN, f32::max);
//!         let energy = self.input.iter().map(|x| x * x).sum::<f32>();
//!         Ok(Scores([mean, peak, energy]))
//!     }
//! }
//!
//! let signal = [0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 0.0, 0.0];
//! let mut reported = 0;
//! let mut adapter = InferenceAdapter::new(Summary { input: [0.0; 4] }, |_: &Scores| reported += 1, 2);
//!
//! let mut scores = Scores::default();
//! adapter.infer(&signal, EventWindow::new(0, 8).unwrap(), &mut scores).unwrap();
//! assert_eq!(scores, Scores([2.5, 4.0, 30.0]));
//! # drop(adapter);
//! assert_eq!(reported, 1);
//! ```

use crate::config::DEFAULT_INFERENCES_PER_CYCLE;
use crate::error::{Error, InferenceError};
use crate::events::{EventList, EventWindow};

/// Number of scalars the classifier produces per window.
pub const SCORE_COUNT: usize = 3;

/// Classifier output for one event window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scores(pub [f32; SCORE_COUNT]);

impl Scores {
    pub fn as_array(&self) -> &[f32; SCORE_COUNT] {
        &self.0
    }

    /// Index of the highest score (first on ties).
    pub fn argmax(&self) -> usize {
        let mut best = 0;
        for (i, &s) in self.0.iter().enumerate() {
            if s > self.0[best] {
                best = i;
            }
        }
        best
    }
}

/// A model runtime with a fixed float input and a three-score output.
pub trait InferenceEngine {
    /// Declared length of the input tensor, in floats.
    fn input_len(&self) -> usize;

    /// Input tensor to fill before [`invoke`](InferenceEngine::invoke).
    ///
    /// Fails with [`InferenceError::Allocation`] if the tensors could not be
    /// allocated.
    fn input_buffer(&mut self) -> Result<&mut [f32], InferenceError>;

    /// Runs the model on the current input.
    fn invoke(&mut self) -> Result<Scores, InferenceError>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for &mut E {
    fn input_len(&self) -> usize {
        (**self).input_len()
    }

    fn input_buffer(&mut self) -> Result<&mut [f32], InferenceError> {
        (**self).input_buffer()
    }

    fn invoke(&mut self) -> Result<Scores, InferenceError> {
        (**self).invoke()
    }
}

/// Receives the scores of every successfully classified window.
pub trait OutputHandler {
    fn handle(&mut self, scores: &Scores);
}

impl<F> OutputHandler for F
where
    F: FnMut(&Scores),
{
    fn handle(&mut self, scores: &Scores) {
        self(scores)
    }
}

/// Handler that discards scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl OutputHandler for Discard {
    #[inline]
    fn handle(&mut self, _scores: &Scores) {}
}

/// Tally of a [`dispatch`](InferenceAdapter::dispatch) over an event list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// Windows classified successfully
    pub inferred: usize,
    /// Windows whose extraction or inference failed
    pub failed: usize,
    /// Windows with no result slot left
    pub skipped: usize,
}

/// Extracts model windows from event spans and runs them through an engine.
///
/// Each event `[left, right)` is trimmed by `margin` on both sides; the
/// remaining `right - left - 2 * margin` samples must equal the engine's input
/// length. Failures are reported per window and leave the adapter ready for the
/// next one.
pub struct InferenceAdapter<E, H> {
    engine: E,
    handler: H,
    margin: usize,
    inference_count: u32,
    inferences_per_cycle: u32,
}

impl<E: InferenceEngine, H: OutputHandler> InferenceAdapter<E, H> {
    /// Wraps `engine`, trimming `margin` samples from each side of every event.
    pub fn new(engine: E, handler: H, margin: usize) -> Self {
        Self {
            engine,
            handler,
            margin,
            inference_count: 0,
            inferences_per_cycle: DEFAULT_INFERENCES_PER_CYCLE,
        }
    }

    /// Sets the wrap point of [`inference_count`](Self::inference_count).
    pub fn with_cycle(mut self, inferences_per_cycle: u32) -> Self {
        self.inferences_per_cycle = inferences_per_cycle.max(1);
        self
    }

    /// Checks once, up front, that events of `span` samples fit the engine.
    pub fn check_span(&self, span: usize) -> Result<(), Error> {
        let actual = span.saturating_sub(self.margin.saturating_mul(2));
        let expected = self.engine.input_len();
        if actual != expected {
            return Err(Error::WindowLengthMismatch { expected, actual });
        }
        Ok(())
    }

    /// Classifies a single event window of `signal`.
    ///
    /// On success the scores are passed to the output handler and stored in
    /// `output`. On failure `output` is left untouched.
    pub fn infer(
        &mut self,
        signal: &[f32],
        window: EventWindow,
        output: &mut Scores,
    ) -> Result<(), Error> {
        let end = window.right().saturating_sub(self.margin);
        let Some(start) = window
            .left()
            .checked_add(self.margin)
            .filter(|&start| start < end && end <= signal.len())
        else {
            return Err(Error::WindowOutOfBounds {
                left: window.left(),
                right: window.right(),
                len: signal.len(),
            });
        };

        let expected = self.engine.input_len();
        let samples = &signal[start..end];
        if samples.len() != expected {
            return Err(Error::WindowLengthMismatch {
                expected,
                actual: samples.len(),
            });
        }

        let input = self.engine.input_buffer()?;
        if input.len() < samples.len() {
            return Err(Error::WindowLengthMismatch {
                expected: input.len(),
                actual: samples.len(),
            });
        }
        input[..samples.len()].copy_from_slice(samples);

        let scores = self.engine.invoke()?;
        self.handler.handle(&scores);
        *output = scores;

        self.inference_count += 1;
        if self.inference_count >= self.inferences_per_cycle {
            self.inference_count = 0;
        }
        Ok(())
    }

    /// Classifies every event in `events`, writing `results[i]` for event `i`.
    ///
    /// A failed window stores `None` and processing continues with the next.
    /// Events beyond `results.len()` are skipped.
    pub fn dispatch<const N: usize>(
        &mut self,
        signal: &[f32],
        events: &EventList<N>,
        results: &mut [Option<Scores>],
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (i, window) in events.iter().enumerate() {
            let Some(slot) = results.get_mut(i) else {
                report.skipped += 1;
                continue;
            };

            let mut scores = Scores::default();
            match self.infer(signal, *window, &mut scores) {
                Ok(()) => {
                    *slot = Some(scores);
                    report.inferred += 1;
                }
                Err(err) => {
                    log::warn!("event {}..{}: {}", window.left(), window.right(), err);
                    *slot = None;
                    report.failed += 1;
                }
            }
        }

        if report.skipped > 0 {
            log::warn!("{} events had no result slot", report.skipped);
        }
        report
    }

    /// Successful inferences in the current cycle.
    pub fn inference_count(&self) -> u32 {
        self.inference_count
    }

    pub fn margin(&self) -> usize {
        self.margin
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_parts(self) -> (E, H) {
        (self.engine, self.handler)
    }
}
