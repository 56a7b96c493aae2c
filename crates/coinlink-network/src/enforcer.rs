//! Session state to packet-filter and shaping state.
//!
//! Every per-device operation is idempotent: it first removes whatever
//! directives a previous (possibly partial) run left behind, looping until
//! the packet filter reports no match, and then installs the new set. A
//! failing external command is therefore never an error here; removal
//! failures mean "already gone" and install failures are logged.
//!
//! # Example
//!
//! ```
//! use coinlink_network::{Enforcer, EnforcerConfig};
//! use coinlink_network::mock::SimulatedNetfilter;
//! use std::sync::Arc;
//!
//! let netfilter = Arc::new(SimulatedNetfilter::new());
//! let enforcer = Enforcer::new(netfilter.clone(), EnforcerConfig::default());
//! let mac = "aa:bb:cc:dd:ee:ff".parse().unwrap();
//!
//! enforcer.apply_block(&mac, None);
//! enforcer.apply_allow(&mac, None);
//! assert_eq!(netfilter.rules_for(&mac).len(), 2);
//! ```

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use coinlink_core::process::args;
use coinlink_core::{CommandOutcome, CommandRunner, MacAddress, TrafficCounters};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::arp;
use crate::config::{EnforcerConfig, ShapingPolicy};
use crate::directive::Directive;
use crate::error::{NetworkError, Result};
use crate::shaping::{self, ClassId};

const IPTABLES: &str = "iptables";
const TC: &str = "tc";
const CONNTRACK: &str = "conntrack";
const ETHTOOL: &str = "ethtool";

/// Upper bound on removal passes for one directive.
///
/// Each pass deletes one copy; a runner that keeps reporting success would
/// otherwise spin forever.
pub const MAX_REMOVAL_PASSES: usize = 256;

/// Drives the packet filter, the shaper and connection tracking.
pub struct Enforcer {
    runner: Arc<dyn CommandRunner>,
    config: EnforcerConfig,
    policy: RwLock<ShapingPolicy>,
    conntrack_missing: AtomicBool,
}

impl Enforcer {
    pub fn new(runner: Arc<dyn CommandRunner>, config: EnforcerConfig) -> Self {
        Self {
            runner,
            config,
            policy: RwLock::new(ShapingPolicy::default()),
            conntrack_missing: AtomicBool::new(false),
        }
    }

    pub fn with_policy(self, policy: ShapingPolicy) -> Self {
        *self.policy.write() = policy;
        self
    }

    pub fn config(&self) -> &EnforcerConfig {
        &self.config
    }

    pub fn policy(&self) -> ShapingPolicy {
        *self.policy.read()
    }

    /// Replace the shaping policy used by later calls.
    ///
    /// Existing classes are untouched; call [`refresh_all`](Self::refresh_all)
    /// to rebuild them.
    pub fn set_policy(&self, policy: ShapingPolicy) {
        *self.policy.write() = policy;
        info!(
            enabled = policy.enabled,
            rate_mbit = policy.rate_mbit,
            priority_mode = policy.priority_mode,
            "shaping policy updated"
        );
    }

    /// Block `mac`, and kill its open flows if an address is known.
    ///
    /// Leaves `REJECT` above `DROP` at the head of `FORWARD`, both above the
    /// established-connection accept installed at bootstrap.
    pub fn apply_block(&self, mac: &MacAddress, addr: Option<Ipv4Addr>) {
        info!(mac = %mac, "blocking device");

        self.remove_all(&Directive::forward_accept(mac));
        self.remove_all(&Directive::nat_accept(mac));
        self.remove_all(&Directive::forward_drop(mac));
        self.remove_all(&Directive::forward_reject(mac));

        self.install(&Directive::forward_drop(mac));
        self.install(&Directive::forward_reject(mac));

        let addr = addr.or_else(|| self.resolve_ip(mac));
        if let Some(addr) = addr {
            self.remove_rate_limit(addr);
            self.kill_flows(addr);
        } else {
            debug!(mac = %mac, "no address known, skipping flow kill");
        }
    }

    /// Allow `mac`, applying the bandwidth cap for `addr` if given.
    pub fn apply_allow(&self, mac: &MacAddress, addr: Option<Ipv4Addr>) {
        info!(mac = %mac, ip = ?addr, "allowing device");

        self.remove_all(&Directive::forward_drop(mac));
        self.remove_all(&Directive::forward_reject(mac));
        self.remove_all(&Directive::forward_accept(mac));
        self.remove_all(&Directive::nat_accept(mac));

        if let Some(addr) = addr {
            self.apply_rate_limit(addr);
        }

        self.install(&Directive::nat_accept(mac));
        self.install(&Directive::forward_accept(mac));
    }

    /// Remove, then (if shaping is enabled) install the cap for `addr`.
    pub fn apply_rate_limit(&self, addr: Ipv4Addr) {
        self.remove_rate_limit(addr);

        let policy = self.policy();
        if !policy.enabled {
            return;
        }

        if policy.priority_mode && ClassId::from_addr(addr).qdisc_handle().is_none() {
            warn!(ip = %addr, "class id 1 collides with the root qdisc, no priority band");
        }

        for command in shaping::install_commands(&self.config.lan, addr, &policy) {
            self.apply(TC, &command);
        }
        info!(ip = %addr, rate_mbit = policy.rate_mbit, "speed limit applied");
    }

    /// Remove the cap for `addr`. Missing state is a no-op.
    pub fn remove_rate_limit(&self, addr: Ipv4Addr) {
        let id = ClassId::from_addr(addr);
        for command in shaping::removal_commands(&self.config.lan, id) {
            let outcome = self.runner.run(TC, &command);
            if !outcome.is_success() {
                debug!(ip = %addr, class = %id, "nothing to remove");
            }
        }
    }

    /// Rebuild the ingress qdisc and every cap for the given addresses.
    pub fn refresh_all(&self, addrs: &[Ipv4Addr]) {
        info!(count = addrs.len(), "refreshing speed limits");
        for command in shaping::ingress_reset_commands(&self.config.lan) {
            self.runner.run(TC, &command);
        }
        for &addr in addrs {
            self.remove_rate_limit(addr);
            self.apply_rate_limit(addr);
        }
    }

    /// Cumulative counters of the device's `FORWARD` accept directive.
    ///
    /// `(0, 0)` when the device is not currently allowed.
    pub fn query_traffic(&self, mac: &MacAddress) -> TrafficCounters {
        let outcome = self
            .runner
            .run(IPTABLES, &args(["-L", "FORWARD", "-v", "-n", "-x"]));
        match outcome {
            CommandOutcome::Success { stdout } => parse_counters(&stdout, mac),
            other => {
                debug!(mac = %mac, outcome = ?other, "cannot list FORWARD");
                TrafficCounters::default()
            }
        }
    }

    /// Install the base ruleset and the root shaping tree.
    ///
    /// # Errors
    /// Fails only if the packet filter itself is missing; individual
    /// command failures are logged.
    pub fn initialize(&self) -> Result<()> {
        let lan = self.config.lan.as_str();
        let wan = self.config.wan.as_str();
        info!(lan, wan, "initializing firewall");

        let offload = self.runner.run(
            ETHTOOL,
            &args(["-K", lan, "tso", "off", "gso", "off", "gro", "off"]),
        );
        if !offload.is_success() {
            warn!(lan, outcome = ?offload, "could not disable offloading");
        }

        if self.runner.run(IPTABLES, &args(["-F"])).is_absent() {
            return Err(NetworkError::tool_unavailable(IPTABLES));
        }

        let dns = format!("{}:53", self.config.portal_ip);
        let http = format!("{}:80", self.config.portal_ip);
        let rules = [
            args(["-t", "nat", "-F"]),
            args(["-P", "FORWARD", "DROP"]),
            args(["-P", "INPUT", "ACCEPT"]),
            args(["-A", "INPUT", "-i", lan, "-p", "udp", "--dport", "67", "-j", "ACCEPT"]),
            args([
                "-A",
                "FORWARD",
                "-m",
                "state",
                "--state",
                "RELATED,ESTABLISHED",
                "-j",
                "ACCEPT",
            ]),
            args([
                "-t", "nat", "-A", "PREROUTING", "-i", lan, "-p", "udp", "--dport", "53", "-j",
                "DNAT", "--to-destination", dns.as_str(),
            ]),
            args([
                "-t", "nat", "-A", "PREROUTING", "-i", lan, "-p", "tcp", "--dport", "53", "-j",
                "DNAT", "--to-destination", dns.as_str(),
            ]),
            args([
                "-t", "nat", "-A", "PREROUTING", "-i", lan, "-p", "tcp", "--dport", "80", "-j",
                "DNAT", "--to-destination", http.as_str(),
            ]),
            args(["-t", "nat", "-A", "POSTROUTING", "-o", wan, "-j", "MASQUERADE"]),
        ];
        for rule in &rules {
            self.apply(IPTABLES, rule);
        }

        self.runner.run(TC, &args(["qdisc", "del", "dev", lan, "root"]));
        self.runner.run(TC, &args(["qdisc", "del", "dev", lan, "ingress"]));
        let root_class = format!("1:{:x}", shaping::ROOT_CLASS_MINOR);
        let tree = [
            args(["qdisc", "add", "dev", lan, "root", "handle", "1:", "htb", "default", "10"]),
            args([
                "class",
                "add",
                "dev",
                lan,
                "parent",
                "1:",
                "classid",
                root_class.as_str(),
                "htb",
                "rate",
                "1000mbit",
            ]),
            args(["qdisc", "add", "dev", lan, "ingress"]),
        ];
        for command in &tree {
            self.apply(TC, command);
        }

        info!("firewall ready");
        Ok(())
    }

    /// Address of `mac` in the neighbour table, if present and readable.
    pub fn resolve_ip(&self, mac: &MacAddress) -> Option<Ipv4Addr> {
        arp::resolve_ip(&self.config.arp_table, mac).unwrap_or_else(|e| {
            debug!(mac = %mac, error = %e, "neighbour lookup failed");
            None
        })
    }

    /// Hardware address of `ip` in the neighbour table.
    pub fn resolve_mac(&self, ip: Ipv4Addr) -> Option<MacAddress> {
        arp::resolve_mac(&self.config.arp_table, ip).unwrap_or_else(|e| {
            debug!(ip = %ip, error = %e, "neighbour lookup failed");
            None
        })
    }

    /// Delete every copy of `directive`. Returns how many were removed.
    fn remove_all(&self, directive: &Directive) -> usize {
        let delete = directive.delete_args();
        let mut removed = 0;
        while removed < MAX_REMOVAL_PASSES && self.runner.run(IPTABLES, &delete).is_success() {
            removed += 1;
        }
        if removed > 0 {
            debug!(chain = directive.chain(), removed, "stale directives removed");
        }
        removed
    }

    fn install(&self, directive: &Directive) {
        self.apply(IPTABLES, &directive.insert_head_args());
    }

    fn apply(&self, program: &str, command: &[String]) {
        match self.runner.run(program, command) {
            CommandOutcome::Success { .. } => debug!(program, args = ?command, "applied"),
            CommandOutcome::Failed { code, stderr } => warn!(
                program,
                args = ?command,
                code = ?code,
                stderr = stderr.trim(),
                "directive failed"
            ),
            CommandOutcome::Absent => warn!(program, "tool not installed"),
        }
    }

    fn kill_flows(&self, addr: Ipv4Addr) {
        if self.conntrack_missing.load(Ordering::Relaxed) {
            return;
        }
        let ip = addr.to_string();
        for direction in ["-s", "-d"] {
            let outcome = self
                .runner
                .run(CONNTRACK, &args(["-D", direction, ip.as_str()]));
            if outcome.is_absent() {
                if !self.conntrack_missing.swap(true, Ordering::Relaxed) {
                    warn!("conntrack not found, relying on packet filter alone");
                }
                return;
            }
        }
        debug!(ip = %addr, "flows killed");
    }
}

/// Find the `ACCEPT` line for `mac` in `iptables -L FORWARD -v -n -x`.
///
/// Columns are `pkts bytes target ...`; the MAC is printed upper-case.
pub fn parse_counters(listing: &str, mac: &MacAddress) -> TrafficCounters {
    let needle = mac.to_string().to_ascii_uppercase();

    for line in listing.lines() {
        let upper = line.to_ascii_uppercase();
        if !upper.contains(&needle) || !line.contains("ACCEPT") {
            continue;
        }
        let mut fields = line.split_whitespace();
        let packets = fields.next().and_then(|f| f.parse::<u64>().ok());
        let bytes = fields.next().and_then(|f| f.parse::<u64>().ok());
        if let (Some(packets), Some(bytes)) = (packets, bytes) {
            return TrafficCounters::new(bytes, packets);
        }
    }

    TrafficCounters::default()
}
