use crate::{Result, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hardware (MAC) address of a client device.
///
/// This is the durable identity of a session. The address is normalized to
/// lower-case, colon-separated form when displayed, which is the form the
/// packet filter's `--mac-source` match expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Create a MAC address from raw octets.
    #[must_use]
    pub const fn from_octets(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }

    /// Parse a MAC address written with `:` or `-` separators.
    ///
    /// # Errors
    /// Returns `Error::InvalidMacAddress` unless the input has exactly six
    /// two-digit hexadecimal groups.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let mut octets = [0u8; 6];
        let mut groups = trimmed.split([':', '-']);

        for octet in &mut octets {
            let group = groups
                .next()
                .ok_or_else(|| Error::InvalidMacAddress(trimmed.to_string()))?;
            if group.len() != 2 {
                return Err(Error::InvalidMacAddress(trimmed.to_string()));
            }
            *octet = u8::from_str_radix(group, 16)
                .map_err(|_| Error::InvalidMacAddress(trimmed.to_string()))?;
        }

        if groups.next().is_some() {
            return Err(Error::InvalidMacAddress(trimmed.to_string()));
        }

        Ok(MacAddress(octets))
    }

    /// Get the raw octets.
    #[must_use]
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Returns `true` for the all-zero placeholder address.
    ///
    /// ARP lookups that fail produce this address; it never identifies a
    /// real device.
    #[must_use]
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl std::str::FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MacAddress::parse(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        MacAddress::parse(&value)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

/// Lifecycle status of a device session.
///
/// # Valid Transitions
///
/// - `New | Paused | Expired` → `Connected`
/// - `Connected` → `Expired` (time ran out) or `Paused` (explicit or idle)
/// - any non-blocked status → `Blocked` (administrative)
/// - `Blocked` → `New` (administrative unblock only)
///
/// # Examples
///
/// ```
/// use coinlink_core::SessionStatus;
///
/// assert!(SessionStatus::Paused.can_transition_to(SessionStatus::Connected));
/// assert!(!SessionStatus::Blocked.can_transition_to(SessionStatus::Connected));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// First contact, nothing purchased yet.
    New,

    /// Internet access granted, time is ticking down.
    Connected,

    /// Access suspended with time left (explicit pause or idle timeout).
    Paused,

    /// Time ran out.
    Expired,

    /// Administratively blocked.
    Blocked,
}

impl SessionStatus {
    /// Check if transition to `target` is valid from this status.
    pub fn can_transition_to(self, target: SessionStatus) -> bool {
        matches!(
            (self, target),
            (
                SessionStatus::New | SessionStatus::Paused | SessionStatus::Expired,
                SessionStatus::Connected
            ) | (
                SessionStatus::Connected,
                SessionStatus::Expired | SessionStatus::Paused
            ) | (
                SessionStatus::New
                    | SessionStatus::Connected
                    | SessionStatus::Paused
                    | SessionStatus::Expired,
                SessionStatus::Blocked
            ) | (SessionStatus::Blocked, SessionStatus::New)
        )
    }

    /// Stable lower-case name, as persisted.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::New => "new",
            SessionStatus::Connected => "connected",
            SessionStatus::Paused => "paused",
            SessionStatus::Expired => "expired",
            SessionStatus::Blocked => "blocked",
        }
    }

    #[inline]
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, SessionStatus::Connected)
    }

    #[inline]
    #[must_use]
    pub fn is_blocked(self) -> bool {
        matches!(self, SessionStatus::Blocked)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "new" => Ok(SessionStatus::New),
            "connected" => Ok(SessionStatus::Connected),
            "paused" => Ok(SessionStatus::Paused),
            "expired" => Ok(SessionStatus::Expired),
            "blocked" => Ok(SessionStatus::Blocked),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// Cumulative traffic counters read from the packet filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficCounters {
    pub bytes: u64,
    pub packets: u64,
}

impl TrafficCounters {
    #[must_use]
    pub const fn new(bytes: u64, packets: u64) -> Self {
        Self { bytes, packets }
    }

    /// Per-field delta against an earlier sample.
    ///
    /// Counters that went backwards (directive re-created) yield zero.
    #[must_use]
    pub fn delta_since(&self, earlier: &TrafficCounters) -> TrafficCounters {
        TrafficCounters {
            bytes: self.bytes.saturating_sub(earlier.bytes),
            packets: self.packets.saturating_sub(earlier.packets),
        }
    }
}
