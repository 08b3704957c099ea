//! MUAP detection by centred sliding-window peak search.
//!
//! A window of `window_size` samples slides one sample at a time over the
//! filtered signal. At every position the mean of `|x|` inside the window is
//! subtracted from `|x|`, and the window is a candidate when its largest
//! adjusted value sits exactly on the centre sample. Candidates must clear both
//! a fixed amplitude floor and an adaptive threshold derived from global
//! statistics (see [`AmplitudeStats`]).
//!
//! Accepted peaks become [`EventWindow`]s of `left_margin + right_margin`
//! samples. Windows that would leave the buffer, or that start before the
//! previous event ends, are skipped; the scan carries on regardless.

use crate::config::DetectorConfig;
use crate::error::Error;
use crate::events::{Append, EventList, EventWindow};
use crate::schedule::Step;
use crate::stats::{AmplitudeStats, Regime};

/// Detector state for a scan position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// Largest adjusted value is off-centre
    OffCentre,
    /// Centred, but at or below the gate
    BelowGate,
    /// Centred and above the gate
    Peak,
}

/// Location and height of the largest local-mean-adjusted value in a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPeak {
    /// Offset of the peak from the window start (first occurrence)
    pub offset: usize,
    /// `|x[peak]| - mean(|x|)` over the window
    pub value: f32,
    /// Mean of `|x|` over the window
    pub local_mean: f32,
}

impl WindowPeak {
    /// Measures `window`; `None` if it is empty.
    ///
    /// # Example
    /// ```
    /// # use muapscan::WindowPeak;
    /// let peak = WindowPeak::measure(&[1.0, -7.0, 1.0, 3.0]).unwrap();
    /// assert_eq!(peak.offset, 1);
    /// assert_eq!(peak.local_mean, 3.0);
    /// assert_eq!(peak.value, 4.0);
    /// ```
    pub fn measure(window: &[f32]) -> Option<Self> {
        if window.is_empty() {
            return None;
        }

        let mut sum = 0.0f64;
        let mut max_abs = f32::NEG_INFINITY;
        let mut offset = 0;
        for (i, &x) in window.iter().enumerate() {
            let a = libm::fabsf(x);
            sum += a as f64;
            if a > max_abs {
                max_abs = a;
                offset = i;
            }
        }

        let local_mean = (sum / window.len() as f64) as f32;
        Some(Self {
            offset,
            value: max_abs - local_mean,
            local_mean,
        })
    }
}

/// MUAP detector with validated parameters.
///
/// # Example
/// ```
/// use muapscan::{DetectorConfig, EventList, MuapDetector};
///
/// let config = DetectorConfig {
///     window_size: 20,
///     left_margin: 10,
///     right_margin: 10,
///     amplitude_floor: 50.0,
///     ..DetectorConfig::default()
/// };
/// let detector = MuapDetector::new(config).unwrap();
///
/// let mut signal = [0.0f32; 100];
/// signal[50] = 400.0;
/// let events: EventList<8> = detector.detect(&signal);
///
/// assert_eq!(events.len(), 1);
/// assert_eq!(events.as_slice()[0].left(), 40);
/// assert_eq!(events.as_slice()[0].right(), 60);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MuapDetector {
    config: DetectorConfig,
}

impl MuapDetector {
    /// Creates a detector, rejecting invalid configuration.
    pub fn new(config: DetectorConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Scans the whole of `signal` in one call.
    pub fn detect<const N: usize>(&self, signal: &[f32]) -> EventList<N> {
        let mut scan = self.scan(signal);
        scan.advance(signal, usize::MAX);
        scan.finish()
    }

    /// Starts a resumable scan over `signal`.
    pub fn scan<const N: usize>(&self, signal: &[f32]) -> MuapScan<N> {
        MuapScan::new(self.config, signal)
    }
}

impl Default for MuapDetector {
    fn default() -> Self {
        Self {
            config: DetectorConfig::default(),
        }
    }
}

/// A detection pass that can be paused between window positions.
///
/// Global statistics are computed once when the scan starts. Each
/// [`resume`](MuapScan::resume) examines up to `budget` window positions; the
/// event list only ever grows, so a cancelled scan still holds valid, ordered
/// events for the prefix it covered.
#[derive(Debug, Clone)]
pub struct MuapScan<const N: usize> {
    config: DetectorConfig,
    stats: Option<AmplitudeStats>,
    gate: f32,
    len: usize,
    next: usize,
    positions: usize,
    events: EventList<N>,
}

impl<const N: usize> MuapScan<N> {
    fn new(config: DetectorConfig, signal: &[f32]) -> Self {
        let stats = AmplitudeStats::from_signal(signal);
        let threshold = stats.map_or(0.0, |s| s.threshold(&config.threshold));
        let gate = config.amplitude_floor.max(threshold);
        let positions = if config.window_size == 0 {
            0
        } else {
            (signal.len() + 1).saturating_sub(config.window_size)
        };

        if let Some(s) = &stats {
            let regime = s.regime(&config.threshold);
            log::debug!(
                "scan {} positions: avg_abs {} max {} ({}) threshold {} gate {}",
                positions,
                s.avg_abs(),
                s.max(),
                match regime {
                    Regime::SharpPeak => "sharp",
                    Regime::Flat => "flat",
                },
                threshold,
                gate
            );
        }

        Self {
            config,
            stats,
            gate,
            len: signal.len(),
            next: 0,
            positions,
            events: EventList::new(),
        }
    }

    /// Examines up to `budget` further window positions.
    pub fn resume(&mut self, signal: &[f32], budget: usize) -> Result<Step, Error> {
        if signal.len() != self.len {
            return Err(Error::length_mismatch(self.len, signal.len()));
        }
        Ok(self.advance(signal, budget))
    }

    /// Scan loop; `signal` must be the buffer the scan was started on.
    fn advance(&mut self, signal: &[f32], budget: usize) -> Step {
        let end = self.next.saturating_add(budget).min(self.positions);
        for k in self.next..end {
            if self.classify(signal, k) == Candidate::Peak {
                self.accept(k);
            }
        }
        self.next = end;

        if self.next < self.positions {
            return Step::Yield {
                position: self.next,
            };
        }
        if self.events.is_truncated() {
            log::warn!(
                "event list full: kept {}, dropped {}",
                self.events.len(),
                self.events.dropped()
            );
        }
        log::debug!("detected {} events", self.events.len());
        Step::Complete
    }

    /// Classifies the window starting at `k` against this scan's gate.
    ///
    /// Positions whose window would run past the end of `signal` are
    /// [`Candidate::OffCentre`].
    pub fn classify(&self, signal: &[f32], k: usize) -> Candidate {
        let half = self.config.window_size / 2;
        let Some(peak) = signal
            .get(k..k.saturating_add(self.config.window_size))
            .and_then(WindowPeak::measure)
        else {
            return Candidate::OffCentre;
        };

        if peak.offset != half {
            Candidate::OffCentre
        } else if peak.value > self.gate {
            Candidate::Peak
        } else {
            Candidate::BelowGate
        }
    }

    fn accept(&mut self, k: usize) {
        let centre = k + self.config.window_size / 2;
        let Some(left) = centre.checked_sub(self.config.left_margin) else {
            return;
        };
        let Some(right) = centre
            .checked_add(self.config.right_margin)
            .filter(|&r| r <= self.len)
        else {
            return;
        };
        let Some(window) = EventWindow::new(left, right) else {
            return;
        };

        match self.events.push(window) {
            Append::Appended => log::trace!("event {}..{}", left, right),
            Append::Rejected => log::trace!("overlapping event {}..{} skipped", left, right),
            Append::Dropped => log::trace!("event {}..{} dropped, list full", left, right),
        }
    }

    /// Window positions examined so far.
    pub fn position(&self) -> usize {
        self.next
    }

    /// Total window positions in this scan.
    pub fn total(&self) -> usize {
        self.positions
    }

    pub fn is_complete(&self) -> bool {
        self.next >= self.positions
    }

    /// Global statistics; `None` for an empty signal.
    pub fn stats(&self) -> Option<&AmplitudeStats> {
        self.stats.as_ref()
    }

    /// Effective gate: the larger of the amplitude floor and the adaptive threshold.
    pub fn gate(&self) -> f32 {
        self.gate
    }

    /// Events accepted so far.
    pub fn events(&self) -> &EventList<N> {
        &self.events
    }

    /// Ends the scan and hands over its events.
    pub fn finish(self) -> EventList<N> {
        self.events
    }
}
