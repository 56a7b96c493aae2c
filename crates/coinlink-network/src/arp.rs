//! Address lookups in the kernel neighbour table.
//!
//! `/proc/net/arp` looks like:
//!
//! ```text
//! IP address       HW type     Flags       HW address            Mask     Device
//! 10.0.0.23        0x1         0x2         aa:bb:cc:dd:ee:ff     *        eth0
//! ```

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use coinlink_core::MacAddress;

use crate::error::{NetworkError, Result};

/// One complete neighbour entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbour {
    pub ip: Ipv4Addr,
    pub mac: MacAddress,
}

/// Parse the table text. Incomplete entries (all-zero address) are skipped.
pub fn parse_table(contents: &str) -> Vec<Neighbour> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let ip = fields.next()?.parse().ok()?;
            let mac: MacAddress = fields.nth(2)?.parse().ok()?;
            (!mac.is_unspecified()).then_some(Neighbour { ip, mac })
        })
        .collect()
}

pub fn read_table(path: &Path) -> Result<Vec<Neighbour>> {
    let contents = fs::read_to_string(path).map_err(|source| NetworkError::ArpTable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_table(&contents))
}

/// Address currently associated with `mac`.
pub fn resolve_ip(path: &Path, mac: &MacAddress) -> Result<Option<Ipv4Addr>> {
    Ok(read_table(path)?
        .into_iter()
        .find(|n| n.mac == *mac)
        .map(|n| n.ip))
}

/// Hardware address currently associated with `ip`.
pub fn resolve_mac(path: &Path, ip: Ipv4Addr) -> Result<Option<MacAddress>> {
    Ok(read_table(path)?
        .into_iter()
        .find(|n| n.ip == ip)
        .map(|n| n.mac))
}
