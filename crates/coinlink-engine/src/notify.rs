//! Device notifications.
//!
//! Schedulers run on OS threads and must never block on delivery. They hold a
//! [`ChannelNotifier`], which only enqueues onto an unbounded channel; the
//! [`NotificationHub`] drains that channel on the async runtime and forwards
//! each message to the device's subscription, if it has one. Messages for
//! devices without a live subscription are dropped.

use std::collections::HashMap;
use std::sync::Arc;

use coinlink_core::{MacAddress, SessionStatus};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Message pushed to a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    SlotOpened {
        slot_seconds: u64,
        balance: u64,
        points: f64,
        coin_rates: String,
        time_remaining: u64,
    },
    SlotClosed,
    /// First pulse of a train seen; the count is not known yet.
    CoinCounting,
    CoinInserted {
        balance: u64,
        points: f64,
        slot_seconds: u64,
        pulse_value: u64,
    },
    Sync {
        status: SessionStatus,
        time_remaining: u64,
        balance: u64,
        points: f64,
    },
    SystemMessage {
        message: String,
    },
}

impl Notification {
    /// Wire form for the device channel.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Fire-and-forget delivery to one device.
pub trait Notifier: Send + Sync {
    fn send(&self, mac: &MacAddress, notification: Notification);
}

/// One queued message.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub mac: MacAddress,
    pub notification: Notification,
}

/// Thread-safe producer side of the hub.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl Notifier for ChannelNotifier {
    fn send(&self, mac: &MacAddress, notification: Notification) {
        let envelope = Envelope {
            mac: *mac,
            notification,
        };
        if self.tx.send(envelope).is_err() {
            trace!(mac = %mac, "hub stopped, notification dropped");
        }
    }
}

/// Registry of live device channels, shared with the request layer.
#[derive(Debug, Clone, Default)]
pub struct Subscriptions {
    inner: Arc<RwLock<HashMap<MacAddress, mpsc::UnboundedSender<Notification>>>>,
}

impl Subscriptions {
    /// Open a channel for `mac`, replacing any previous one.
    pub fn subscribe(&self, mac: MacAddress) -> mpsc::UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.write().insert(mac, tx);
        debug!(mac = %mac, "device subscribed");
        rx
    }

    pub fn unsubscribe(&self, mac: &MacAddress) {
        self.inner.write().remove(mac);
    }

    pub fn is_subscribed(&self, mac: &MacAddress) -> bool {
        self.inner.read().contains_key(mac)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn deliver(&self, envelope: Envelope) {
        let closed = match self.inner.read().get(&envelope.mac) {
            Some(tx) => tx.send(envelope.notification).is_err(),
            None => return,
        };
        if closed {
            self.inner.write().remove(&envelope.mac);
            debug!(mac = %envelope.mac, "device channel closed");
        }
    }
}

/// Consumer side: runs on the async runtime.
pub struct NotificationHub {
    rx: mpsc::UnboundedReceiver<Envelope>,
    subscriptions: Subscriptions,
}

impl NotificationHub {
    /// Create a connected notifier/hub pair.
    pub fn channel() -> (ChannelNotifier, NotificationHub) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = NotificationHub {
            rx,
            subscriptions: Subscriptions::default(),
        };
        (ChannelNotifier { tx }, hub)
    }

    pub fn subscriptions(&self) -> Subscriptions {
        self.subscriptions.clone()
    }

    /// Forward queued messages until every notifier is dropped.
    pub async fn run(mut self) {
        while let Some(envelope) = self.rx.recv().await {
            self.subscriptions.deliver(envelope);
        }
        debug!("notification hub stopped");
    }
}

/// Notifier that keeps every message, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(MacAddress, Notification)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(MacAddress, Notification)> {
        self.sent.lock().clone()
    }

    /// Messages sent to `mac`, oldest first.
    pub fn sent_to(&self, mac: &MacAddress) -> Vec<Notification> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| to == mac)
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, mac: &MacAddress, notification: Notification) {
        self.sent.lock().push((*mac, notification));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(last: u8) -> MacAddress {
        MacAddress::from_octets([2, 0, 0, 0, 0, last])
    }

    #[test]
    fn test_wire_format() {
        let json = Notification::Sync {
            status: SessionStatus::Paused,
            time_remaining: 30,
            balance: 0,
            points: 1.5,
        }
        .to_json()
        .unwrap();
        assert_eq!(
            json,
            r#"{"type":"sync","status":"paused","time_remaining":30,"balance":0,"points":1.5}"#
        );
        assert_eq!(Notification::SlotClosed.to_json().unwrap(), r#"{"type":"slot_closed"}"#);
    }

    #[tokio::test]
    async fn test_hub_delivers_to_subscribers_only() {
        let (notifier, hub) = NotificationHub::channel();
        let subscriptions = hub.subscriptions();
        let mut rx = subscriptions.subscribe(mac(1));
        let task = tokio::spawn(hub.run());

        notifier.send(&mac(2), Notification::SlotClosed);
        notifier.send(&mac(1), Notification::CoinCounting);
        drop(notifier);
        task.await.unwrap();

        assert_eq!(rx.recv().await, Some(Notification::CoinCounting));
        subscriptions.unsubscribe(&mac(1));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_closed_channel_is_pruned() {
        let (notifier, hub) = NotificationHub::channel();
        let subscriptions = hub.subscriptions();
        drop(subscriptions.subscribe(mac(3)));
        let task = tokio::spawn(hub.run());

        notifier.send(&mac(3), Notification::SlotClosed);
        drop(notifier);
        task.await.unwrap();

        assert!(!subscriptions.is_subscribed(&mac(3)));
    }

    #[test]
    fn test_send_after_hub_dropped_does_not_panic() {
        let (notifier, hub) = NotificationHub::channel();
        drop(hub);
        notifier.send(&mac(1), Notification::SlotClosed);
    }
}
