//! Command-line arguments.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Parser;

/// Coin-operated network access controller.
#[derive(Parser, Debug, Clone)]
#[command(name = "coinlink")]
#[command(about = "Coin-operated network access controller")]
#[command(version)]
pub struct Cli {
    /// Runtime settings document.
    #[arg(long, env = "COINLINK_SETTINGS", default_value = "/etc/coinlink/settings.json")]
    pub settings: PathBuf,

    /// SQLite database holding sessions and sales.
    #[arg(long, env = "COINLINK_DATABASE", default_value = "/var/lib/coinlink/coinlink.db")]
    pub database: PathBuf,

    /// Client-facing interface.
    #[arg(long, default_value = "eth0")]
    pub lan: String,

    /// Upstream interface.
    #[arg(long, default_value = "wlan0")]
    pub wan: String,

    /// Captive portal address that DNS and HTTP are redirected to.
    #[arg(long, default_value = "10.0.0.1")]
    pub portal_ip: Ipv4Addr,

    /// Coin acceptor signal pin (wiringPi numbering).
    #[arg(long, default_value = "2")]
    pub coin_pin: String,

    /// Comma-separated relay pins of the slot gate.
    #[arg(long, value_delimiter = ',', default_value = "3")]
    pub relay_pins: Vec<String>,

    /// Leave the existing packet filter and shaping tree alone.
    #[arg(long)]
    pub skip_firewall_init: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let cli = Cli::parse_from(["coinlink"]);
        assert_eq!(cli.lan, "eth0");
        assert_eq!(cli.wan, "wlan0");
        assert_eq!(cli.portal_ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(cli.relay_pins, vec!["3".to_string()]);
        assert!(!cli.skip_firewall_init);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_relay_pin_list() {
        let cli = Cli::parse_from(["coinlink", "--relay-pins", "3,4,21", "--coin-pin", "7"]);
        assert_eq!(cli.relay_pins, vec!["3", "4", "21"]);
        assert_eq!(cli.coin_pin, "7");
    }

    #[test]
    fn test_invalid_portal_ip_rejected() {
        assert!(Cli::try_parse_from(["coinlink", "--portal-ip", "10.0.0"]).is_err());
    }
}
