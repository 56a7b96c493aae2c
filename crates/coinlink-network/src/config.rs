//! Enforcer configuration.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use coinlink_core::Settings;

/// Interfaces and paths the enforcer works with.
///
/// # Example
///
/// ```
/// use coinlink_network::EnforcerConfig;
///
/// let config = EnforcerConfig::default().with_interfaces("br0", "eth1");
/// assert_eq!(config.lan, "br0");
/// assert_eq!(config.portal_ip.to_string(), "10.0.0.1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcerConfig {
    /// Client-facing interface; shaping happens here.
    pub lan: String,
    /// Upstream interface; masqueraded.
    pub wan: String,
    /// Address of the captive portal that DNS and HTTP are redirected to.
    pub portal_ip: Ipv4Addr,
    /// Kernel neighbour table.
    pub arp_table: PathBuf,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            lan: "eth0".to_string(),
            wan: "wlan0".to_string(),
            portal_ip: Ipv4Addr::new(10, 0, 0, 1),
            arp_table: PathBuf::from("/proc/net/arp"),
        }
    }
}

impl EnforcerConfig {
    pub fn with_interfaces(mut self, lan: impl Into<String>, wan: impl Into<String>) -> Self {
        self.lan = lan.into();
        self.wan = wan.into();
        self
    }

    pub fn with_portal_ip(mut self, portal_ip: Ipv4Addr) -> Self {
        self.portal_ip = portal_ip;
        self
    }

    pub fn with_arp_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.arp_table = path.into();
        self
    }
}

/// Bandwidth policy applied to each allowed device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapingPolicy {
    pub enabled: bool,
    /// Cap in megabits per second, both directions.
    pub rate_mbit: u32,
    /// Steer small UDP datagrams and ICMP into a high-priority band.
    pub priority_mode: bool,
}

impl Default for ShapingPolicy {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ShapingPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            enabled: settings.speed_limit_enabled,
            rate_mbit: settings.global_speed_limit,
            priority_mode: settings.gaming_mode_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_settings() {
        let settings = Settings {
            speed_limit_enabled: true,
            global_speed_limit: 12,
            gaming_mode_enabled: true,
            ..Settings::default()
        };
        let policy = ShapingPolicy::from_settings(&settings);
        assert!(policy.enabled);
        assert_eq!(policy.rate_mbit, 12);
        assert!(policy.priority_mode);
    }

    #[test]
    fn test_default_policy_is_unlimited() {
        let policy = ShapingPolicy::default();
        assert!(!policy.enabled);
        assert_eq!(policy.rate_mbit, 5);
    }
}
