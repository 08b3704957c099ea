//! MUAP event segmentation for single-channel EMG captures.
//!
//! Detects motor-unit action potentials in a raw capture and hands fixed-size
//! windows around them to an on-device classifier. Everything runs on
//! caller-provided buffers with no allocation, so the crate is `no_std`.
//!
//! The stages, in order:
//!
//! 1. [`center`] removes the baseline mean, skipping the settling transient.
//! 2. [`fill_gaps`] holds the last valid sample across invalid stretches.
//! 3. [`convolve`] / [`Convolver`] apply a causal FIR kernel.
//! 4. [`MuapDetector`] finds centred peaks and emits an [`EventList`].
//! 5. [`InferenceAdapter`] trims each event and runs an [`InferenceEngine`].
//!
//! [`MuapPipeline`] ties stages 1 to 4 together and drives the long-running
//! ones through a [`Scheduler`], which can pause or cancel between chunks.

#![no_std]

pub mod config;
mod center;
mod detector;
mod error;
mod events;
pub mod filter;
mod gapfill;
mod inference;
mod pipeline;
pub mod schedule;
mod stats;

pub use center::{baseline_mean, center};
pub use config::{DetectorConfig, PipelineConfig, ThresholdRule};
pub use detector::{Candidate, MuapDetector, MuapScan, WindowPeak};
pub use error::{Error, InferenceError};
pub use events::{Append, EventList, EventWindow};
pub use filter::{convolve, Convolver, FilterKernel};
pub use gapfill::fill_gaps;
pub use inference::{
    Discard, DispatchReport, InferenceAdapter, InferenceEngine, OutputHandler, Scores, SCORE_COUNT,
};
pub use pipeline::MuapPipeline;
pub use schedule::{Checkpoint, Pause, RunToCompletion, Scheduler, Stage, Step, YieldPolicy};
pub use stats::{AmplitudeStats, Regime};
