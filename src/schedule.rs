//! Chunked execution for the long-running stages.
//!
//! Convolving tens of thousands of samples against a 513-tap kernel, or sliding
//! a 1200-sample window across the same buffer, takes long enough on a
//! microcontroller to starve radio, display and sampling tasks. Instead of
//! sleeping inside the loops, each stage is a resumable job: it processes at
//! most a budget of samples and returns [`Step::Yield`] with its position. The
//! caller's [`Scheduler`] then decides how long to pause, or whether to stop.
//!
//! # Resumability
//!
//! Everything before the reported position is final. A job that is not resumed
//! can simply be dropped; partial convolution output and partial event lists
//! are never left half-written for a single sample.
//!
//! [`MuapPipeline`](crate::MuapPipeline) drops its jobs when cancelled. Filter
//! output up to the reported position remains in the caller's buffer, but the
//! events of an interrupted detection pass are lost. To keep them, drive a
//! [`MuapScan`](crate::MuapScan) directly and read its
//! [`events`](crate::MuapScan::events) after stopping.
//!
//! # Example
//!
//! ```
//! use core::ops::ControlFlow;
//! use muapscan::{Checkpoint, Pause};
//!
//! // Count long pauses, never cancel
//! let mut long_pauses = 0;
//! let mut scheduler = |cp: &Checkpoint| -> ControlFlow<()> {
//!     if cp.pause == Pause::Long {
//!         long_pauses += 1;
//!     }
//!     ControlFlow::Continue(())
//! };
//! # let _ = &mut scheduler;
//! ```

use core::fmt;
use core::ops::ControlFlow;

use crate::error::Error;

/// Stage that reached a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Stage {
    /// FIR convolution
    Filter,
    /// MUAP window scan
    Detect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Filter => f.write_str("filter"),
            Stage::Detect => f.write_str("detect"),
        }
    }
}

/// Result of resuming a job with a sample budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Budget spent; `position` is the next sample to process.
    Yield {
        /// Next unprocessed sample.
        position: usize,
    },
    /// The job has processed every sample.
    Complete,
}

impl Step {
    /// Returns true if the job has finished.
    #[inline]
    pub fn is_complete(&self) -> bool {
        matches!(self, Step::Complete)
    }
}

/// Length of the pause a scheduler should grant at a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// Regular pause after every chunk
    Short,
    /// Longer pause every `long_pause_every` chunks
    Long,
}

/// Progress report handed to a [`Scheduler`] between chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// Stage being executed
    pub stage: Stage,
    /// Next unprocessed sample
    pub position: usize,
    /// Total samples the stage will process
    pub total: usize,
    /// 1-based chunk counter
    pub chunk: u32,
    /// Suggested pause length
    pub pause: Pause,
}

impl Checkpoint {
    /// Completed share of the stage in whole percent (0-100).
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = (self.position.min(self.total) as u64 * 100) / self.total as u64;
        pct as u8
    }
}

/// Caller-side scheduling policy.
///
/// Called once after every chunk. Return [`ControlFlow::Break`] to cancel the
/// running stage; it then fails with [`Error::Cancelled`].
pub trait Scheduler {
    /// Yields to other tasks and reports whether to keep going.
    fn checkpoint(&mut self, checkpoint: &Checkpoint) -> ControlFlow<()>;
}

impl<F> Scheduler for F
where
    F: FnMut(&Checkpoint) -> ControlFlow<()>,
{
    fn checkpoint(&mut self, checkpoint: &Checkpoint) -> ControlFlow<()> {
        self(checkpoint)
    }
}

/// Scheduler that never pauses and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunToCompletion;

impl Scheduler for RunToCompletion {
    #[inline]
    fn checkpoint(&mut self, _checkpoint: &Checkpoint) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// How often long-running stages hand control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct YieldPolicy {
    /// Samples processed between checkpoints (min 1)
    pub chunk_samples: usize,
    /// Every Nth checkpoint asks for a long pause; 0 disables long pauses
    pub long_pause_every: u32,
}

impl YieldPolicy {
    /// Creates a policy.
    pub const fn new(chunk_samples: usize, long_pause_every: u32) -> Self {
        Self {
            chunk_samples,
            long_pause_every,
        }
    }

    /// Rejects a zero chunk size.
    pub fn validate(&self) -> Result<(), Error> {
        if self.chunk_samples == 0 {
            return Err(Error::InvalidConfig("chunk_samples must be at least 1"));
        }
        Ok(())
    }

    fn pause_for(&self, chunk: u32) -> Pause {
        if self.long_pause_every > 0 && chunk % self.long_pause_every == 0 {
            Pause::Long
        } else {
            Pause::Short
        }
    }
}

impl Default for YieldPolicy {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_CHUNK_SAMPLES,
            crate::config::DEFAULT_LONG_PAUSE_EVERY,
        )
    }
}

/// Runs a resumable job to completion, consulting `scheduler` between chunks.
pub(crate) fn drive<S, F>(
    stage: Stage,
    total: usize,
    policy: &YieldPolicy,
    scheduler: &mut S,
    mut resume: F,
) -> Result<(), Error>
where
    S: Scheduler + ?Sized,
    F: FnMut(usize) -> Result<Step, Error>,
{
    let budget = policy.chunk_samples.max(1);
    let mut chunk: u32 = 0;
    let mut last_decile = 0;

    loop {
        let position = match resume(budget)? {
            Step::Complete => return Ok(()),
            Step::Yield { position } => position,
        };

        chunk = chunk.wrapping_add(1);
        let checkpoint = Checkpoint {
            stage,
            position,
            total,
            chunk,
            pause: policy.pause_for(chunk),
        };

        let decile = checkpoint.percent() / 10;
        if decile > last_decile {
            last_decile = decile;
            log::info!("{} {} %", stage, checkpoint.percent());
        }
        log::trace!("{} checkpoint {} at {}/{}", stage, chunk, position, total);

        if scheduler.checkpoint(&checkpoint).is_break() {
            log::debug!("{} cancelled at {}", stage, position);
            return Err(Error::Cancelled { stage, position });
        }
    }
}
