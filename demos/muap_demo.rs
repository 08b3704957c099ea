//! End-to-end segmentation of a synthetic EMG capture.
//!
//! **Pipeline:**
//! 1. Synthetic capture: uniform noise, a DC offset, a handful of MUAP-like
//!    biphasic bursts and one stretch of dropped samples
//! 2. Centering and gap repair
//! 3. 513-tap low-pass FIR, run in chunks through a scheduler closure
//! 4. MUAP detection
//! 5. Classification of each event with a toy three-class engine
//!
//! Run with: `RUST_LOG=info cargo run --example muap_demo`
//!
//! Output: event table on stdout and `output/muap_events.csv`

use muapscan::config::DEFAULT_KERNEL_LEN;
use muapscan::{
    Checkpoint, EventList, FilterKernel, InferenceEngine, InferenceError, MuapPipeline, Pause,
    PipelineConfig, Scores,
};
use std::error::Error;
use std::fs::File;
use std::io::Write;
use std::ops::ControlFlow;
use std::thread;
use std::time::Duration;

const SAMPLES: usize = 20_000;
const DC_OFFSET: f32 = 2048.0;
const BURSTS: [(usize, f32); 6] = [
    (2_500, 60_000.0),
    (5_100, -52_000.0),
    (7_000, 58_000.0),
    (7_400, 61_000.0), // too close to the previous burst
    (12_000, 70_000.0),
    (16_800, -64_000.0),
];
const DROPOUT: std::ops::Range<usize> = 9_000..9_400;

/// Uniform noise from a 64-bit LCG, in `[-amplitude, amplitude]`.
fn white_noise(samples: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut state = seed;
    (0..samples)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let normalized = (state >> 40) as f32 / (1u64 << 24) as f32 * 2.0 - 1.0;
            normalized * amplitude
        })
        .collect()
}

/// Derivative-of-Gaussian burst centred on `at`.
fn add_burst(signal: &mut [f32], at: usize, amplitude: f32) {
    let sigma = 6.0f32;
    for offset in -40i32..=40 {
        let t = offset as f32;
        let shape = -(t / sigma) * (-(t * t) / (2.0 * sigma * sigma)).exp() * 1.65;
        if let Some(x) = signal.get_mut((at as i32 + offset) as usize) {
            *x += amplitude * shape;
        }
    }
}

fn synthesize() -> (Vec<f32>, Vec<bool>) {
    let mut signal: Vec<f32> = white_noise(SAMPLES, 600.0, 42)
        .into_iter()
        .map(|x| x + DC_OFFSET)
        .collect();
    for &(at, amplitude) in &BURSTS {
        add_burst(&mut signal, at, amplitude);
    }

    let mut valid = vec![true; SAMPLES];
    for i in DROPOUT {
        signal[i] = 0.0;
        valid[i] = false;
    }
    (signal, valid)
}

/// Windowed-sinc low-pass with unit DC gain.
fn lowpass_taps(len: usize, step: f32) -> Vec<f32> {
    let mid = (len / 2) as f32;
    let raw: Vec<f32> = (0..len)
        .map(|j| {
            let n = j as f32 - mid;
            let hann = 0.5 + 0.5 * (std::f32::consts::PI * n / mid).cos();
            let x = n * step;
            let sinc = if x == 0.0 { 1.0 } else { x.sin() / x };
            sinc * hann
        })
        .collect();
    let sum: f32 = raw.iter().sum();
    raw.into_iter().map(|b| b / sum).collect()
}

/// Stand-in classifier: scores a window as positive-first, negative-first or
/// symmetric from the position of its extremes.
struct PolarityEngine {
    input: Vec<f32>,
}

impl InferenceEngine for PolarityEngine {
    fn input_len(&self) -> usize {
        self.input.len()
    }

    fn input_buffer(&mut self) -> Result<&mut [f32], InferenceError> {
        Ok(&mut self.input)
    }

    fn invoke(&mut self) -> Result<Scores, InferenceError> {
        let (mut argmin, mut argmax) = (0, 0);
        for (i, &x) in self.input.iter().enumerate() {
            if x < self.input[argmin] {
                argmin = i;
            }
            if x > self.input[argmax] {
                argmax = i;
            }
        }
        let (min, max) = (self.input[argmin], self.input[argmax]);
        let span = (max - min).max(f32::EPSILON);
        let asymmetry = (max + min) / span;

        let raw = if argmax < argmin {
            [1.0 + asymmetry.abs(), 0.2, 1.0 - asymmetry.abs()]
        } else {
            [0.2, 1.0 + asymmetry.abs(), 1.0 - asymmetry.abs()]
        };
        let total: f32 = raw.iter().sum();
        Ok(Scores(raw.map(|s| s / total)))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("=== MUAP Segmentation Demo ===\n");
    std::fs::create_dir_all("output")?;

    let (mut signal, valid) = synthesize();
    println!(
        "Capture: {} samples, {} bursts, {} dropped samples",
        SAMPLES,
        BURSTS.len(),
        DROPOUT.len()
    );

    let taps = lowpass_taps(DEFAULT_KERNEL_LEN, 0.35);
    let pipeline = MuapPipeline::new(PipelineConfig::default(), FilterKernel::new(&taps))?;
    println!(
        "Kernel: {} taps, DC gain {:.3}",
        taps.len(),
        pipeline.kernel().dc_gain()
    );

    let mut filtered = vec![0.0f32; SAMPLES];
    let mut checkpoints = 0usize;
    let mut long_pauses = 0usize;
    let mut scheduler = |cp: &Checkpoint| -> ControlFlow<()> {
        checkpoints += 1;
        if cp.pause == Pause::Long {
            long_pauses += 1;
            thread::sleep(Duration::from_micros(200));
        } else {
            thread::yield_now();
        }
        ControlFlow::Continue(())
    };

    let events: EventList = pipeline.run(&mut signal, &valid, &mut filtered, &mut scheduler)?;
    println!(
        "Ran with {} checkpoints ({} long pauses)",
        checkpoints, long_pauses
    );
    println!(
        "Detected {} events ({} dropped for capacity)\n",
        events.len(),
        events.dropped()
    );

    let engine = PolarityEngine {
        input: vec![0.0; pipeline.config().model_window()],
    };
    let mut adapter = pipeline.adapter(engine, |s: &Scores| log::debug!("scores {:?}", s))?;
    let mut results = vec![None; events.len()];
    let report = pipeline.classify(&mut adapter, &filtered, &events, &mut results);

    const LABELS: [&str; 3] = ["positive-first", "negative-first", "symmetric"];
    let mut csv = File::create("output/muap_events.csv")?;
    writeln!(csv, "left,right,peak,label,score0,score1,score2")?;

    println!("{:>6} {:>6} {:>10}  {}", "left", "right", "peak", "label");
    for (window, result) in events.iter().zip(&results) {
        let span = &filtered[window.left()..window.right()];
        let peak = span.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
        match result {
            Some(scores) => {
                let label = LABELS[scores.argmax()];
                println!(
                    "{:>6} {:>6} {:>10.1}  {}",
                    window.left(),
                    window.right(),
                    peak,
                    label
                );
                let [a, b, c] = *scores.as_array();
                writeln!(
                    csv,
                    "{},{},{},{},{},{},{}",
                    window.left(),
                    window.right(),
                    peak,
                    label,
                    a,
                    b,
                    c
                )?;
            }
            None => println!(
                "{:>6} {:>6} {:>10.1}  (failed)",
                window.left(),
                window.right(),
                peak
            ),
        }
    }

    println!(
        "\nClassified {} events, {} failed. Wrote output/muap_events.csv",
        report.inferred, report.failed
    );
    Ok(())
}
