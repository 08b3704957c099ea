//! End-to-end segmentation of one capture.
//!
//! [`MuapPipeline`] bundles the configuration and the filter kernel that used to
//! live in firmware globals. It owns no sample memory: the caller passes the raw
//! buffer, its validity mask and a filtered-output buffer of the same length,
//! and gets back an [`EventList`] referencing the filtered signal.
//!
//! # Stages
//!
//! ```text
//! raw ─► center ─► fill_gaps ─► FIR ─► detect ─► EventList ─► InferenceAdapter
//!        (in place) (in place)  (out)   (scan)
//! ```
//!
//! Filtering and detection run through the chunked-execution contract in
//! [`schedule`](crate::schedule), so the [`Scheduler`] passed to
//! [`run`](MuapPipeline::run) decides when to pause and may cancel between
//! chunks. Conditioning is a single linear pass and never yields.
//!
//! # Example
//!
//! ```
//! use muapscan::{EventList, FilterKernel, MuapPipeline, PipelineConfig, RunToCompletion};
//!
//! let pipeline = MuapPipeline::new(PipelineConfig::default(), FilterKernel::identity()).unwrap();
//!
//! let mut raw = vec![0.0f32; 2000];
//! raw[1000] = 20000.0;
//! let valid = vec![true; 2000];
//! let mut filtered = vec![0.0f32; 2000];
//!
//! let events: EventList = pipeline
//!     .run(&mut raw, &valid, &mut filtered, &mut RunToCompletion)
//!     .unwrap();
//! assert_eq!(events.len(), 1);
//! assert_eq!(events.as_slice()[0].left(), 400);
//! ```

use crate::center::center;
use crate::config::PipelineConfig;
use crate::detector::MuapDetector;
use crate::error::Error;
use crate::events::EventList;
use crate::filter::{Convolver, FilterKernel};
use crate::gapfill::fill_gaps;
use crate::inference::{DispatchReport, InferenceAdapter, InferenceEngine, OutputHandler, Scores};
use crate::schedule::{drive, Scheduler, Stage};

/// Explicit context for the conditioning, filtering and detection stages.
#[derive(Debug, Clone, Copy)]
pub struct MuapPipeline<'k> {
    config: PipelineConfig,
    kernel: FilterKernel<'k>,
    detector: MuapDetector,
}

impl<'k> MuapPipeline<'k> {
    /// Validates `config` and binds the filter kernel.
    pub fn new(config: PipelineConfig, kernel: FilterKernel<'k>) -> Result<Self, Error> {
        config.validate()?;
        let detector = MuapDetector::new(config.detector)?;
        if kernel.is_empty() {
            log::warn!("empty filter kernel: filtered output will be all zeros");
        }
        Ok(Self {
            config,
            kernel,
            detector,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn kernel(&self) -> FilterKernel<'k> {
        self.kernel
    }

    pub fn detector(&self) -> &MuapDetector {
        &self.detector
    }

    /// Centers `signal` on its baseline and repairs invalid samples in place.
    ///
    /// Returns the baseline mean that was removed.
    pub fn condition(&self, signal: &mut [f32], valid: &[bool]) -> Result<f32, Error> {
        if valid.len() != signal.len() {
            return Err(Error::length_mismatch(signal.len(), valid.len()));
        }
        let mean = center(signal, self.config.baseline_skip);
        fill_gaps(signal, valid, self.config.baseline_skip)?;
        Ok(mean)
    }

    /// Convolves `input` with the kernel into `output`, chunk by chunk.
    ///
    /// On cancellation `output` is valid up to the reported position.
    pub fn filter<S>(&self, input: &[f32], output: &mut [f32], scheduler: &mut S) -> Result<(), Error>
    where
        S: Scheduler + ?Sized,
    {
        let mut job = Convolver::new(self.kernel, input.len());
        drive(
            Stage::Filter,
            input.len(),
            &self.config.schedule,
            scheduler,
            |budget| job.resume(input, output, budget),
        )
    }

    /// Scans a filtered signal for MUAP events, chunk by chunk.
    ///
    /// On cancellation the events found so far are discarded. Drive
    /// [`MuapScan`](crate::MuapScan) from [`detector`](Self::detector) to keep
    /// them.
    pub fn detect<const N: usize, S>(
        &self,
        filtered: &[f32],
        scheduler: &mut S,
    ) -> Result<EventList<N>, Error>
    where
        S: Scheduler + ?Sized,
    {
        let mut scan = self.detector.scan::<N>(filtered);
        let total = scan.total();
        drive(
            Stage::Detect,
            total,
            &self.config.schedule,
            scheduler,
            |budget| scan.resume(filtered, budget),
        )?;
        Ok(scan.finish())
    }

    /// Runs conditioning, filtering and detection over one capture.
    ///
    /// `signal` is centered and gap-filled in place; `filtered` receives the
    /// FIR output and is the buffer the returned events index into.
    pub fn run<const N: usize, S>(
        &self,
        signal: &mut [f32],
        valid: &[bool],
        filtered: &mut [f32],
        scheduler: &mut S,
    ) -> Result<EventList<N>, Error>
    where
        S: Scheduler + ?Sized,
    {
        if filtered.len() != signal.len() {
            return Err(Error::length_mismatch(signal.len(), filtered.len()));
        }

        self.condition(signal, valid)?;
        self.filter(signal, filtered, scheduler)?;
        self.detect(filtered, scheduler)
    }

    /// Builds an adapter whose trim margin matches this pipeline, verifying
    /// once that event spans fit the engine's input.
    pub fn adapter<E, H>(&self, engine: E, handler: H) -> Result<InferenceAdapter<E, H>, Error>
    where
        E: InferenceEngine,
        H: OutputHandler,
    {
        let adapter = InferenceAdapter::new(engine, handler, self.config.inference_margin);
        adapter.check_span(self.config.detector.span())?;
        Ok(adapter)
    }

    /// Classifies every event against the filtered signal.
    pub fn classify<const N: usize, E, H>(
        &self,
        adapter: &mut InferenceAdapter<E, H>,
        filtered: &[f32],
        events: &EventList<N>,
        results: &mut [Option<Scores>],
    ) -> DispatchReport
    where
        E: InferenceEngine,
        H: OutputHandler,
    {
        let report = adapter.dispatch(filtered, events, results);
        log::debug!(
            "classified {} of {} events ({} failed)",
            report.inferred,
            events.len(),
            report.failed
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::error::InferenceError;
    use crate::events::EventWindow;
    use crate::schedule::{Checkpoint, RunToCompletion, Step, YieldPolicy};
    use core::ops::ControlFlow;
    extern crate alloc;
    use alloc::vec;
    use alloc::vec::Vec;

    fn default_pipeline() -> MuapPipeline<'static> {
        MuapPipeline::new(PipelineConfig::default(), FilterKernel::identity()).unwrap()
    }

    struct Recorder {
        input: Vec<f32>,
        fail: bool,
    }

    impl InferenceEngine for Recorder {
        fn input_len(&self) -> usize {
            self.input.len()
        }

        fn input_buffer(&mut self) -> Result<&mut [f32], InferenceError> {
            Ok(&mut self.input)
        }

        fn invoke(&mut self) -> Result<Scores, InferenceError> {
            if self.fail {
                return Err(InferenceError::Invocation);
            }
            let peak = self.input.iter().cloned().fold(f32::MIN, f32::max);
            Ok(Scores([peak, self.input[0], self.input.len() as f32]))
        }
    }

    #[test]
    fn test_scenario_single_sharp_peak() {
        let mut signal = vec![0.0f32; 2000];
        signal[1000] = 20000.0;
        let valid = vec![true; 2000];
        let mut filtered = vec![0.0f32; 2000];

        let events: EventList = default_pipeline()
            .run(&mut signal, &valid, &mut filtered, &mut RunToCompletion)
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events.as_slice()[0], EventWindow::new(400, 1600).unwrap());
        // Identity kernel: filtered equals the conditioned signal
        assert_eq!(filtered, signal);
    }

    #[test]
    fn test_scenario_invalid_region_holds_seed() {
        let pipeline = default_pipeline();
        let mut signal: Vec<f32> = (0..400).map(|i| if i < 192 { 10.0 } else { -999.0 }).collect();
        let mut valid = vec![false; 400];
        for v in valid.iter_mut().take(192) {
            *v = true;
        }

        let mean = pipeline.condition(&mut signal, &valid).unwrap();
        // Baseline covers only the invalid tail
        assert_eq!(mean, -999.0);
        let seed = signal[191];
        assert_eq!(seed, 1009.0);
        assert!(signal[192..].iter().all(|&x| x == seed));
    }

    #[test]
    fn test_scenario_zero_signal() {
        let taps: Vec<f32> = (0..513).map(|j| libm::sinf(j as f32 * 0.01)).collect();
        let pipeline = MuapPipeline::new(PipelineConfig::default(), FilterKernel::new(&taps)).unwrap();

        let mut signal = vec![0.0f32; 3000];
        let valid = vec![true; 3000];
        let mut filtered = vec![1.0f32; 3000];
        let events: EventList = pipeline
            .run(&mut signal, &valid, &mut filtered, &mut RunToCompletion)
            .unwrap();

        assert!(events.is_empty());
        assert!(signal.iter().all(|&x| x == 0.0));
        assert!(filtered.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_buffer_length_checks() {
        let pipeline = default_pipeline();
        let mut signal = vec![0.0f32; 100];
        let mut filtered = vec![0.0f32; 99];
        let valid = vec![true; 100];
        let result: Result<EventList<4>, Error> =
            pipeline.run(&mut signal, &valid, &mut filtered, &mut RunToCompletion);
        assert_eq!(result.unwrap_err(), Error::length_mismatch(100, 99));

        let short_mask = vec![true; 50];
        assert_eq!(
            pipeline.condition(&mut signal, &short_mask),
            Err(Error::length_mismatch(100, 50))
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig {
            schedule: YieldPolicy::new(0, 1),
            ..PipelineConfig::default()
        };
        assert!(MuapPipeline::new(config, FilterKernel::identity()).is_err());
    }

    #[test]
    fn test_scheduler_sees_both_stages() {
        let config = PipelineConfig {
            schedule: YieldPolicy::new(500, 2),
            ..PipelineConfig::default()
        };
        let pipeline = MuapPipeline::new(config, FilterKernel::identity()).unwrap();

        let mut signal = vec![0.0f32; 2000];
        signal[1000] = 20000.0;
        let valid = vec![true; 2000];
        let mut filtered = vec![0.0f32; 2000];

        let mut seen: Vec<Checkpoint> = Vec::new();
        let mut sched = |cp: &Checkpoint| -> ControlFlow<()> {
            seen.push(*cp);
            ControlFlow::Continue(())
        };
        let events: EventList = pipeline
            .run(&mut signal, &valid, &mut filtered, &mut sched)
            .unwrap();
        assert_eq!(events.len(), 1);

        // Filter: 2000 samples in chunks of 500 -> 3 checkpoints
        // Detect: 801 positions in chunks of 500 -> 1 checkpoint
        let filter: Vec<_> = seen.iter().filter(|cp| cp.stage == Stage::Filter).collect();
        let detect: Vec<_> = seen.iter().filter(|cp| cp.stage == Stage::Detect).collect();
        assert_eq!(filter.len(), 3);
        assert_eq!(detect.len(), 1);
        assert_eq!(filter[2].position, 1500);
        assert_eq!(detect[0].total, 801);
    }

    #[test]
    fn test_cancel_filter_keeps_prefix() {
        let config = PipelineConfig {
            schedule: YieldPolicy::new(100, 0),
            ..PipelineConfig::default()
        };
        let pipeline = MuapPipeline::new(config, FilterKernel::identity()).unwrap();

        let input: Vec<f32> = (0..1000).map(|i| i as f32).collect();
        let mut output = vec![f32::NAN; 1000];
        let mut stop_at_300 = |cp: &Checkpoint| -> ControlFlow<()> {
            if cp.position >= 300 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };

        let err = pipeline.filter(&input, &mut output, &mut stop_at_300).unwrap_err();
        assert_eq!(
            err,
            Error::Cancelled {
                stage: Stage::Filter,
                position: 300
            }
        );
        assert_eq!(output[..300], input[..300]);
        assert!(output[300..].iter().all(|x| x.is_nan()));
    }

    #[test]
    fn test_cancel_detect() {
        let pipeline = default_pipeline();
        let filtered = vec![0.0f32; 5000];
        let mut cancel = |_: &Checkpoint| -> ControlFlow<()> { ControlFlow::Break(()) };
        let result: Result<EventList, Error> = pipeline.detect(&filtered, &mut cancel);
        assert!(matches!(
            result,
            Err(Error::Cancelled {
                stage: Stage::Detect,
                ..
            })
        ));
    }

    #[test]
    fn test_direct_scan_keeps_events_after_stopping() {
        let pipeline = default_pipeline();
        let mut filtered = vec![0.0f32; 5000];
        filtered[1000] = 20000.0;
        filtered[3500] = 20000.0;

        // Stop once the first peak has been passed
        let mut scan = pipeline.detector().scan::<8>(&filtered);
        let mut stopped_at = None;
        while let Step::Yield { position } = scan.resume(&filtered, 500).unwrap() {
            if position >= 1000 {
                stopped_at = Some(position);
                break;
            }
        }

        assert_eq!(stopped_at, Some(1000));
        assert!(!scan.is_complete());
        assert_eq!(scan.events().len(), 1);
        assert_eq!(scan.events().as_slice()[0], EventWindow::new(400, 1600).unwrap());

        // Through the pipeline the same cancellation loses them
        let mut stop_at_1000 = |cp: &Checkpoint| -> ControlFlow<()> {
            if cp.position >= 1000 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };
        let result: Result<EventList<8>, Error> = pipeline.detect(&filtered, &mut stop_at_1000);
        assert!(matches!(
            result,
            Err(Error::Cancelled {
                stage: Stage::Detect,
                ..
            })
        ));
    }

    #[test]
    fn test_end_to_end_with_inference() {
        let pipeline = default_pipeline();

        let mut signal = vec![0.0f32; 4000];
        signal[1000] = 20000.0;
        signal[2800] = 18000.0;
        let valid = vec![true; 4000];
        let mut filtered = vec![0.0f32; 4000];
        let events: EventList<8> = pipeline
            .run(&mut signal, &valid, &mut filtered, &mut RunToCompletion)
            .unwrap();
        assert_eq!(events.len(), 2);

        let mut reported: Vec<Scores> = Vec::new();
        let engine = Recorder {
            input: vec![0.0; 600],
            fail: false,
        };
        let mut results = [None; 8];
        let report = {
            let mut adapter = pipeline
                .adapter(engine, |s: &Scores| reported.push(*s))
                .unwrap();
            pipeline.classify(&mut adapter, &filtered, &events, &mut results)
        };

        assert_eq!(report.inferred, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(reported.len(), 2);
        // The peak sits in the middle of each 600-sample model window
        let first = results[0].unwrap();
        assert!(libm::fabsf(first.0[0] - filtered[1000]) < 1e-3);
        assert_eq!(first.0[2], 600.0);
    }

    #[test]
    fn test_engine_failure_does_not_abort_batch() {
        let pipeline = default_pipeline();
        let mut events: EventList<4> = EventList::new();
        let _ = events.push(EventWindow::new(0, 1200).unwrap());
        let _ = events.push(EventWindow::new(1200, 2400).unwrap());
        let filtered = vec![1.0f32; 2400];

        let engine = Recorder {
            input: vec![0.0; 600],
            fail: true,
        };
        let mut adapter = pipeline.adapter(engine, crate::inference::Discard).unwrap();
        let mut results = [Some(Scores::default()); 4];
        let report = pipeline.classify(&mut adapter, &filtered, &events, &mut results);

        assert_eq!(report.failed, 2);
        assert!(results[0].is_none());
        assert!(results[1].is_none());

        adapter.engine_mut().fail = false;
        let report = pipeline.classify(&mut adapter, &filtered, &events, &mut results);
        assert_eq!(report.inferred, 2);
    }

    #[test]
    fn test_adapter_rejects_mismatched_engine() {
        let pipeline = default_pipeline();
        let engine = Recorder {
            input: vec![0.0; 512],
            fail: false,
        };
        assert!(matches!(
            pipeline.adapter(engine, crate::inference::Discard),
            Err(Error::WindowLengthMismatch {
                expected: 512,
                actual: 600
            })
        ));
    }

    #[test]
    fn test_custom_detector_through_pipeline() {
        let config = PipelineConfig {
            baseline_skip: 0,
            detector: DetectorConfig {
                window_size: 40,
                left_margin: 20,
                right_margin: 20,
                amplitude_floor: 500.0,
                ..DetectorConfig::default()
            },
            inference_margin: 5,
            schedule: YieldPolicy::default(),
        };
        let taps = [0.5f32, 0.5];
        let pipeline = MuapPipeline::new(config, FilterKernel::new(&taps)).unwrap();

        let mut signal = vec![0.0f32; 400];
        signal[100] = 2000.0;
        signal[300] = 2000.0;
        let valid = vec![true; 400];
        let mut filtered = vec![0.0f32; 400];
        let events: EventList<4> = pipeline
            .run(&mut signal, &valid, &mut filtered, &mut RunToCompletion)
            .unwrap();

        // Two-tap average spreads each peak over two equal samples; the first
        // of the pair is the detected centre.
        assert_eq!(events.len(), 2);
        assert_eq!(events.as_slice()[0], EventWindow::new(80, 120).unwrap());
        assert_eq!(events.as_slice()[1], EventWindow::new(280, 320).unwrap());
    }
}
