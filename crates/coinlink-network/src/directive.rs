//! Per-device packet-filter directives.
//!
//! Every directive matches on the device's hardware address. Their relative
//! order in `FORWARD` is what makes a block effective:
//!
//! ```text
//! FORWARD
//!   1  REJECT tcp dpt:443 tcp-reset   <- blocked device
//!   2  DROP                           <- blocked device
//!   ...
//!   n  ACCEPT RELATED,ESTABLISHED     <- bootstrap
//! ```
//!
//! An allowed device instead has a single `ACCEPT` at the head of both
//! `FORWARD` and nat `PREROUTING` (the latter bypasses the portal redirect).

use coinlink_core::MacAddress;

/// Verdict of a per-device directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Drop,
    /// Reset encrypted web connections so clients notice the block at once.
    RejectTls,
}

/// One packet-filter directive for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    table: Option<&'static str>,
    chain: &'static str,
    spec: Vec<String>,
}

impl Directive {
    fn new(table: Option<&'static str>, chain: &'static str, mac: &MacAddress, verdict: Verdict) -> Self {
        let mac = mac.to_string();
        let mac = mac.as_str();
        let spec: Vec<String> = match verdict {
            Verdict::Accept => ["-m", "mac", "--mac-source", mac, "-j", "ACCEPT"]
                .map(String::from)
                .to_vec(),
            Verdict::Drop => ["-m", "mac", "--mac-source", mac, "-j", "DROP"]
                .map(String::from)
                .to_vec(),
            Verdict::RejectTls => [
                "-p",
                "tcp",
                "--dport",
                "443",
                "-m",
                "mac",
                "--mac-source",
                mac,
                "-j",
                "REJECT",
                "--reject-with",
                "tcp-reset",
            ]
            .map(String::from)
            .to_vec(),
        };
        Self { table, chain, spec }
    }

    pub fn forward_accept(mac: &MacAddress) -> Self {
        Self::new(None, "FORWARD", mac, Verdict::Accept)
    }

    pub fn nat_accept(mac: &MacAddress) -> Self {
        Self::new(Some("nat"), "PREROUTING", mac, Verdict::Accept)
    }

    pub fn forward_drop(mac: &MacAddress) -> Self {
        Self::new(None, "FORWARD", mac, Verdict::Drop)
    }

    pub fn forward_reject(mac: &MacAddress) -> Self {
        Self::new(None, "FORWARD", mac, Verdict::RejectTls)
    }

    /// Arguments deleting the first matching copy.
    pub fn delete_args(&self) -> Vec<String> {
        self.with_op(&["-D", self.chain])
    }

    /// Arguments inserting at the head of the chain.
    pub fn insert_head_args(&self) -> Vec<String> {
        self.with_op(&["-I", self.chain, "1"])
    }

    pub fn chain(&self) -> &str {
        self.chain
    }

    fn with_op(&self, op: &[&str]) -> Vec<String> {
        let mut args = Vec::with_capacity(self.spec.len() + 5);
        if let Some(table) = self.table {
            args.push("-t".to_string());
            args.push(table.to_string());
        }
        args.extend(op.iter().map(|s| s.to_string()));
        args.extend(self.spec.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac() -> MacAddress {
        "AA:BB:CC:00:11:22".parse().unwrap()
    }

    #[test]
    fn test_forward_accept_delete() {
        assert_eq!(
            Directive::forward_accept(&mac()).delete_args().join(" "),
            "-D FORWARD -m mac --mac-source aa:bb:cc:00:11:22 -j ACCEPT"
        );
    }

    #[test]
    fn test_nat_accept_insert() {
        assert_eq!(
            Directive::nat_accept(&mac()).insert_head_args().join(" "),
            "-t nat -I PREROUTING 1 -m mac --mac-source aa:bb:cc:00:11:22 -j ACCEPT"
        );
    }

    #[test]
    fn test_reject_directive() {
        assert_eq!(
            Directive::forward_reject(&mac()).insert_head_args().join(" "),
            "-I FORWARD 1 -p tcp --dport 443 -m mac --mac-source aa:bb:cc:00:11:22 \
             -j REJECT --reject-with tcp-reset"
        );
    }

    #[test]
    fn test_drop_directive() {
        let drop = Directive::forward_drop(&mac());
        assert_eq!(drop.chain(), "FORWARD");
        assert!(drop.delete_args().ends_with(&["-j".to_string(), "DROP".to_string()]));
    }
}
