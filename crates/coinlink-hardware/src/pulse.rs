//! Coin pulse-train decoding.
//!
//! A coin acceptor reports a coin by pulling its signal line low once per
//! currency unit, a few tens of milliseconds apart. The decoder samples the
//! line, counts falling edges, and reports the train once the line has been
//! quiet for the silence window.
//!
//! ```text
//!   High ──┐  ┌──┐  ┌──┐  ┌─────────────── ... ─
//!          └──┘  └──┘  └──┘
//!          ^1    ^2    ^3   |<-- silence -->|  => 3
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use coinlink_core::constants::{PULSE_SAMPLE_INTERVAL_MS, PULSE_SILENCE_WINDOW_MS};
use tracing::{debug, trace};

use crate::traits::{DigitalLine, PulseObserver};
use crate::types::Level;

/// Blocking pulse-train decoder over a [`DigitalLine`].
pub struct PulseDecoder<L> {
    line: L,
    sample_interval: Duration,
    silence_window: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

impl<L: DigitalLine> PulseDecoder<L> {
    pub fn new(line: L) -> Self {
        Self {
            line,
            sample_interval: Duration::from_millis(PULSE_SAMPLE_INTERVAL_MS),
            silence_window: Duration::from_millis(PULSE_SILENCE_WINDOW_MS),
            cancel: None,
        }
    }

    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    pub fn with_silence_window(mut self, window: Duration) -> Self {
        self.silence_window = window;
        self
    }

    /// Flag that aborts the wait for a first edge when set.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Block until a pulse train arrives and return its length.
    ///
    /// `observer` is called synchronously at the first falling edge, before
    /// the rest of the train is counted. Returns `0` if cancelled before any
    /// edge was seen.
    pub fn await_pulse_train(&mut self, observer: Option<&dyn PulseObserver>) -> u32 {
        // Phase 1: wait for the first high -> low transition.
        let mut last = Level::High;
        loop {
            if self.cancelled() {
                return 0;
            }
            let level = self.sample();
            if level.is_low() && last == Level::High {
                break;
            }
            last = level;
            thread::sleep(self.sample_interval);
        }

        if let Some(observer) = observer {
            observer.on_pulse_detected();
        }

        // Phase 2: count further edges until the line stays quiet.
        let mut pulses = 1u32;
        let mut last_edge = Instant::now();
        let mut last = Level::Low;
        debug!(line = self.line.name(), "pulse 1 detected, collecting train");

        while last_edge.elapsed() < self.silence_window {
            let level = self.sample();
            if level.is_low() && last == Level::High {
                pulses += 1;
                last_edge = Instant::now();
                trace!(pulses, "pulse edge");

                if !self.wait_for_release() {
                    break;
                }
                last = Level::High;
            } else {
                last = level;
            }
            thread::sleep(self.sample_interval);
        }

        debug!(pulses, "pulse train complete");
        pulses
    }

    /// Recover the wrapped line.
    pub fn into_inner(self) -> L {
        self.line
    }

    /// Rising-edge debounce. Returns `false` if cancelled while held low.
    fn wait_for_release(&mut self) -> bool {
        while self.sample().is_low() {
            if self.cancelled() {
                return false;
            }
            thread::sleep(self.sample_interval);
        }
        true
    }

    fn sample(&mut self) -> Level {
        self.line.read().unwrap_or_else(|e| {
            trace!(error = %e, "line read failed, treating as high");
            Level::High
        })
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FailingLine, ScriptedLine, StaticLine};
    use std::sync::atomic::AtomicU32;

    struct CountingObserver(AtomicU32);

    impl PulseObserver for CountingObserver {
        fn on_pulse_detected(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast(line: ScriptedLine) -> PulseDecoder<ScriptedLine> {
        PulseDecoder::new(line)
            .with_sample_interval(Duration::from_millis(1))
            .with_silence_window(Duration::from_millis(200))
    }

    #[test]
    fn test_single_pulse() {
        let line = ScriptedLine::pulse_train(&[0], 5, 10);
        assert_eq!(fast(line).await_pulse_train(None), 1);
    }

    #[test]
    fn test_observer_called_once_per_train() {
        let observer = CountingObserver(AtomicU32::new(0));
        let line = ScriptedLine::pulse_train(&[0, 10, 20, 30], 5, 10);
        let count = fast(line).await_pulse_train(Some(&observer));
        assert_eq!(count, 4);
        assert_eq!(observer.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_held_low_counts_once() {
        // One long pulse must not be counted repeatedly.
        let line = ScriptedLine::pulse_train(&[0], 40, 10);
        assert_eq!(fast(line).await_pulse_train(None), 1);
    }

    #[test]
    fn test_cancel_before_edge_returns_zero() {
        let cancel = Arc::new(AtomicBool::new(true));
        let mut decoder = PulseDecoder::new(StaticLine::new(Level::High))
            .with_sample_interval(Duration::from_millis(1))
            .with_cancel(cancel);
        assert_eq!(decoder.await_pulse_train(None), 0);
    }

    #[test]
    fn test_read_failures_read_as_high() {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let handle = thread::spawn(move || {
            let mut decoder = PulseDecoder::new(FailingLine::default())
                .with_sample_interval(Duration::from_millis(1))
                .with_cancel(flag);
            decoder.await_pulse_train(None)
        });
        thread::sleep(Duration::from_millis(30));
        cancel.store(true, Ordering::Relaxed);
        assert_eq!(handle.join().unwrap(), 0);
    }
}
