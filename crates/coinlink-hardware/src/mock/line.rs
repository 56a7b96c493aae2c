//! Mock digital lines.

use crate::error::{HardwareError, Result};
use crate::traits::DigitalLine;
use crate::types::Level;

/// Line that replays a fixed sequence of levels, one per read.
///
/// Once the script is exhausted the line idles `High`. Scripts are indexed
/// by sample rather than wall-clock time, so decoding is deterministic no
/// matter how long each sleep actually takes.
///
/// # Examples
///
/// ```
/// use coinlink_hardware::DigitalLine;
/// use coinlink_hardware::mock::ScriptedLine;
/// use coinlink_hardware::types::Level;
///
/// let mut line = ScriptedLine::new(vec![Level::High, Level::Low]);
/// assert_eq!(line.read().unwrap(), Level::High);
/// assert_eq!(line.read().unwrap(), Level::Low);
/// assert_eq!(line.read().unwrap(), Level::High);
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedLine {
    levels: Vec<Level>,
    cursor: usize,
}

impl ScriptedLine {
    pub fn new(levels: Vec<Level>) -> Self {
        Self { levels, cursor: 0 }
    }

    /// Build a train of falling edges.
    ///
    /// The line stays high for `lead_in` samples, then drops low for
    /// `low_samples` samples at each offset of `edges` (relative to the end
    /// of the lead-in).
    pub fn pulse_train(edges: &[usize], low_samples: usize, lead_in: usize) -> Self {
        let end = edges.iter().max().map_or(0, |last| last + low_samples);
        let mut levels = vec![Level::High; lead_in + end + 1];

        for &edge in edges {
            let start = lead_in + edge;
            for level in &mut levels[start..start + low_samples] {
                *level = Level::Low;
            }
        }

        Self::new(levels)
    }

    /// Same as [`pulse_train`](Self::pulse_train) with offsets and pulse
    /// width in milliseconds at the given sampling interval.
    pub fn pulse_train_ms(edges_ms: &[u64], low_ms: u64, sample_interval_ms: u64) -> Self {
        let step = sample_interval_ms.max(1);
        let edges: Vec<usize> = edges_ms.iter().map(|ms| (ms / step) as usize).collect();
        let low = ((low_ms / step) as usize).max(1);
        Self::pulse_train(&edges, low, 5)
    }

    /// Number of samples taken so far.
    pub fn reads(&self) -> usize {
        self.cursor
    }
}

impl DigitalLine for ScriptedLine {
    fn read(&mut self) -> Result<Level> {
        let level = self.levels.get(self.cursor).copied().unwrap_or(Level::High);
        self.cursor += 1;
        Ok(level)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Line pinned at one level.
#[derive(Debug, Clone, Copy)]
pub struct StaticLine {
    level: Level,
}

impl StaticLine {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl DigitalLine for StaticLine {
    fn read(&mut self) -> Result<Level> {
        Ok(self.level)
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Line whose every read fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingLine;

impl DigitalLine for FailingLine {
    fn read(&mut self) -> Result<Level> {
        Err(HardwareError::other("simulated read failure"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}
