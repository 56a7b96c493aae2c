//! Coin listener: pulse trains in, credits out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use coinlink_hardware::{DigitalLine, PulseDecoder, PulseObserver};
use tracing::{debug, info};

use crate::controller::{AccessController, CreditOutcome};
use crate::notify::Notification;

/// Tells the slot holder that coins are being counted.
struct HolderObserver<'a> {
    controller: &'a AccessController,
}

impl PulseObserver for HolderObserver<'_> {
    fn on_pulse_detected(&self) {
        if let Some(holder) = self.controller.slot().holder() {
            self.controller
                .notifier()
                .send(&holder, Notification::CoinCounting);
        }
    }
}

pub struct CoinListener<L> {
    decoder: PulseDecoder<L>,
    controller: Arc<AccessController>,
}

impl<L: DigitalLine> CoinListener<L> {
    pub fn new(decoder: PulseDecoder<L>, controller: Arc<AccessController>) -> Self {
        Self {
            decoder,
            controller,
        }
    }

    /// Wait for one pulse train and credit it.
    ///
    /// Returns `None` when nothing was counted (cancelled or noise).
    pub fn step(&mut self) -> Option<CreditOutcome> {
        let observer = HolderObserver {
            controller: &self.controller,
        };
        let pulses = self.decoder.await_pulse_train(Some(&observer));
        if pulses == 0 {
            return None;
        }
        Some(self.controller.credit_pulses(pulses, Utc::now()))
    }

    /// Loop until `shutdown` is set.
    ///
    /// The decoder should share the same flag (see
    /// [`PulseDecoder::with_cancel`]) so an idle wait ends promptly.
    pub fn run(mut self, shutdown: Arc<AtomicBool>) {
        info!("coin listener running");
        while !shutdown.load(Ordering::Relaxed) {
            match self.step() {
                Some(CreditOutcome::Credited { mac, amount }) => {
                    debug!(mac = %mac, amount, "pulse train credited");
                }
                Some(other) => debug!(outcome = ?other, "pulse train not credited"),
                None => {}
            }
        }
        info!("coin listener stopped");
    }
}
