//! In-memory stand-in for the kernel's packet filter and shaper.
//!
//! [`SimulatedNetfilter`] implements [`CommandRunner`] and interprets the
//! `iptables`, `tc`, `conntrack` and `ethtool` invocations the enforcer
//! issues, keeping just enough state to check ordering and idempotence:
//! rule lists per chain with counters, HTB classes, u32 filters and qdiscs.
//! It fails where the kernel would (deleting a missing rule, adding a class
//! twice, deleting a class a filter still points at).

use std::collections::{BTreeMap, BTreeSet};

use coinlink_core::{CommandOutcome, CommandRunner, MacAddress};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
struct Rule {
    spec: Vec<String>,
    packets: u64,
    bytes: u64,
}

impl Rule {
    fn text(&self) -> String {
        self.spec.join(" ")
    }

    fn value_after(&self, flag: &str) -> Option<&str> {
        value_after(&self.spec, flag)
    }
}

/// A u32 filter as seen by the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimFilter {
    pub parent: String,
    pub prio: String,
    pub flowid: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    chains: BTreeMap<(String, String), Vec<Rule>>,
    policies: BTreeMap<String, String>,
    root_qdisc: bool,
    ingress_qdisc: bool,
    /// classid -> parent
    classes: BTreeMap<String, String>,
    /// qdisc handle -> parent class
    qdiscs: BTreeMap<String, String>,
    filters: Vec<SimFilter>,
    conntrack_calls: Vec<Vec<String>>,
    history: Vec<(String, Vec<String>)>,
}

/// Simulated kernel networking state.
#[derive(Debug)]
pub struct SimulatedNetfilter {
    state: Mutex<State>,
    iptables_present: bool,
    conntrack_present: bool,
}

impl Default for SimulatedNetfilter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedNetfilter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            iptables_present: true,
            conntrack_present: true,
        }
    }

    /// Report `conntrack` as not installed.
    pub fn without_conntrack(mut self) -> Self {
        self.conntrack_present = false;
        self
    }

    /// Report `iptables` as not installed.
    pub fn without_iptables(mut self) -> Self {
        self.iptables_present = false;
        self
    }

    /// Rules of one chain, head first, as space-joined specs.
    pub fn chain(&self, table: &str, chain: &str) -> Vec<String> {
        self.state
            .lock()
            .chains
            .get(&(table.to_string(), chain.to_string()))
            .map(|rules| rules.iter().map(Rule::text).collect())
            .unwrap_or_default()
    }

    /// Every rule in any chain that matches on `mac`.
    pub fn rules_for(&self, mac: &MacAddress) -> Vec<String> {
        let mac = mac.to_string();
        self.state
            .lock()
            .chains
            .values()
            .flatten()
            .filter(|rule| rule.value_after("--mac-source") == Some(mac.as_str()))
            .map(Rule::text)
            .collect()
    }

    /// Count `mac` rules ending in the given target across all chains.
    pub fn count_rules(&self, mac: &MacAddress, target: &str) -> usize {
        let mac = mac.to_string();
        self.state
            .lock()
            .chains
            .values()
            .flatten()
            .filter(|rule| {
                rule.value_after("--mac-source") == Some(mac.as_str())
                    && rule.value_after("-j") == Some(target)
            })
            .count()
    }

    /// Simulate forwarded traffic hitting the device's `FORWARD` accept.
    pub fn add_traffic(&self, mac: &MacAddress, bytes: u64, packets: u64) {
        let mac = mac.to_string();
        let mut state = self.state.lock();
        let key = ("filter".to_string(), "FORWARD".to_string());
        if let Some(rule) = state.chains.get_mut(&key).and_then(|rules| {
            rules.iter_mut().find(|r| {
                r.value_after("--mac-source") == Some(mac.as_str())
                    && r.value_after("-j") == Some("ACCEPT")
            })
        }) {
            rule.bytes += bytes;
            rule.packets += packets;
        }
    }

    pub fn classes(&self) -> Vec<String> {
        self.state.lock().classes.keys().cloned().collect()
    }

    pub fn filters(&self) -> Vec<SimFilter> {
        self.state.lock().filters.clone()
    }

    pub fn qdisc_handles(&self) -> Vec<String> {
        self.state.lock().qdiscs.keys().cloned().collect()
    }

    pub fn has_ingress(&self) -> bool {
        self.state.lock().ingress_qdisc
    }

    pub fn conntrack_calls(&self) -> Vec<Vec<String>> {
        self.state.lock().conntrack_calls.clone()
    }

    /// Every command seen, in order.
    pub fn history(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().history.clone()
    }
}

impl CommandRunner for SimulatedNetfilter {
    fn run(&self, program: &str, args: &[String]) -> CommandOutcome {
        let mut state = self.state.lock();
        state.history.push((program.to_string(), args.to_vec()));

        match program {
            "iptables" if self.iptables_present => iptables(&mut state, args),
            "tc" => tc(&mut state, args),
            "conntrack" => {
                state.conntrack_calls.push(args.to_vec());
                if self.conntrack_present {
                    ok("")
                } else {
                    CommandOutcome::Absent
                }
            }
            "ethtool" => ok(""),
            _ => CommandOutcome::Absent,
        }
    }
}

fn ok(stdout: &str) -> CommandOutcome {
    CommandOutcome::Success {
        stdout: stdout.to_string(),
    }
}

fn fail(code: i32, stderr: &str) -> CommandOutcome {
    CommandOutcome::Failed {
        code: Some(code),
        stderr: stderr.to_string(),
    }
}

fn value_after<'a>(tokens: &'a [String], flag: &str) -> Option<&'a str> {
    tokens
        .iter()
        .position(|t| t == flag)
        .and_then(|i| tokens.get(i + 1))
        .map(String::as_str)
}

fn iptables(state: &mut State, args: &[String]) -> CommandOutcome {
    let (table, rest) = match args {
        [flag, table, rest @ ..] if flag == "-t" => (table.as_str(), rest),
        rest => ("filter", rest),
    };

    match rest {
        [op] if op == "-F" => {
            for ((t, _), rules) in state.chains.iter_mut() {
                if t == table {
                    rules.clear();
                }
            }
            ok("")
        }
        [op, chain, policy] if op == "-P" => {
            state.policies.insert(chain.clone(), policy.clone());
            ok("")
        }
        [op, chain, spec @ ..] if op == "-A" => {
            chain_mut(state, table, chain).push(new_rule(spec));
            ok("")
        }
        [op, chain, pos, spec @ ..] if op == "-I" => {
            let Ok(pos) = pos.parse::<usize>() else {
                return fail(2, "invalid rule number");
            };
            let rules = chain_mut(state, table, chain);
            let index = pos.saturating_sub(1).min(rules.len());
            rules.insert(index, new_rule(spec));
            ok("")
        }
        [op, chain, spec @ ..] if op == "-D" => {
            let rules = chain_mut(state, table, chain);
            match rules.iter().position(|r| r.spec == spec) {
                Some(index) => {
                    rules.remove(index);
                    ok("")
                }
                None => fail(1, "Bad rule (does a matching rule exist in that chain?)."),
            }
        }
        [op, chain, ..] if op == "-L" => {
            let policy = state
                .policies
                .get(chain.as_str())
                .cloned()
                .unwrap_or_else(|| "ACCEPT".to_string());
            let rules = chain_mut(state, table, chain).clone();
            ok(&render_listing(chain, &policy, &rules))
        }
        _ => fail(2, "unsupported invocation"),
    }
}

fn chain_mut<'a>(state: &'a mut State, table: &str, chain: &str) -> &'a mut Vec<Rule> {
    state
        .chains
        .entry((table.to_string(), chain.to_string()))
        .or_default()
}

fn new_rule(spec: &[String]) -> Rule {
    Rule {
        spec: spec.to_vec(),
        packets: 0,
        bytes: 0,
    }
}

fn render_listing(chain: &str, policy: &str, rules: &[Rule]) -> String {
    let mut out = format!("Chain {chain} (policy {policy} 0 packets, 0 bytes)\n");
    out.push_str(
        "    pkts      bytes target     prot opt in     out     source               destination\n",
    );
    for rule in rules {
        let target = rule.value_after("-j").unwrap_or("");
        let prot = rule.value_after("-p").unwrap_or("all");
        let mut extra = Vec::new();
        if let Some(mac) = rule.value_after("--mac-source") {
            extra.push(format!("MAC {}", mac.to_ascii_uppercase()));
        }
        if let Some(state) = rule.value_after("--state") {
            extra.push(format!("state {state}"));
        }
        if let Some(port) = rule.value_after("--dport") {
            extra.push(format!("{prot} dpt:{port}"));
        }
        if let Some(reject) = rule.value_after("--reject-with") {
            extra.push(format!("reject-with {reject}"));
        }
        out.push_str(&format!(
            "{:>8} {:>10} {:<10} {:<4} --  *      *       0.0.0.0/0            0.0.0.0/0            {}\n",
            rule.packets,
            rule.bytes,
            target,
            prot,
            extra.join(" ")
        ));
    }
    out
}

fn tc(state: &mut State, args: &[String]) -> CommandOutcome {
    let Some((object, rest)) = args.split_first() else {
        return fail(1, "missing object");
    };
    let Some((verb, rest)) = rest.split_first() else {
        return fail(1, "missing verb");
    };
    let has = |word: &str| rest.iter().any(|t| t == word);

    match (object.as_str(), verb.as_str()) {
        ("qdisc", "add") if has("root") => {
            if state.root_qdisc {
                return fail(2, "RTNETLINK answers: File exists");
            }
            state.root_qdisc = true;
            ok("")
        }
        ("qdisc", "del") if has("root") => {
            if !state.root_qdisc {
                return fail(2, "RTNETLINK answers: No such file or directory");
            }
            state.root_qdisc = false;
            state.classes.clear();
            state.qdiscs.clear();
            state.filters.retain(|f| f.parent == "ffff:");
            ok("")
        }
        ("qdisc", "add") if has("ingress") => {
            if state.ingress_qdisc {
                return fail(2, "RTNETLINK answers: File exists");
            }
            state.ingress_qdisc = true;
            ok("")
        }
        ("qdisc", "del") if has("ingress") => {
            if !state.ingress_qdisc {
                return fail(2, "RTNETLINK answers: Invalid argument");
            }
            state.ingress_qdisc = false;
            state.filters.retain(|f| f.parent != "ffff:");
            ok("")
        }
        ("qdisc", "add") => {
            let (Some(parent), Some(handle)) = (value_after(rest, "parent"), value_after(rest, "handle"))
            else {
                return fail(1, "parent and handle required");
            };
            if !state.classes.contains_key(parent) || state.qdiscs.contains_key(handle) {
                return fail(2, "RTNETLINK answers: Invalid argument");
            }
            state.qdiscs.insert(handle.to_string(), parent.to_string());
            ok("")
        }
        ("class", "add") => {
            let (Some(parent), Some(classid)) = (value_after(rest, "parent"), value_after(rest, "classid"))
            else {
                return fail(1, "parent and classid required");
            };
            let parent_exists = if parent == "1:" {
                state.root_qdisc
            } else {
                state.classes.contains_key(parent)
            };
            if !parent_exists || state.classes.contains_key(classid) {
                return fail(2, "RTNETLINK answers: File exists");
            }
            state.classes.insert(classid.to_string(), parent.to_string());
            ok("")
        }
        ("class", "del") => {
            let Some(classid) = value_after(rest, "classid") else {
                return fail(1, "classid required");
            };
            if !state.classes.contains_key(classid) {
                return fail(2, "RTNETLINK answers: No such file or directory");
            }
            if state
                .filters
                .iter()
                .any(|f| f.flowid.as_deref() == Some(classid))
            {
                return fail(2, "RTNETLINK answers: Device or resource busy");
            }
            state.classes.remove(classid);
            let children: BTreeSet<String> = state
                .qdiscs
                .iter()
                .filter(|(_, parent)| parent.as_str() == classid)
                .map(|(handle, _)| handle.clone())
                .collect();
            state.qdiscs.retain(|handle, _| !children.contains(handle));
            state.filters.retain(|f| !children.contains(&f.parent));
            ok("")
        }
        ("filter", "add") => {
            let (Some(parent), Some(prio)) = (value_after(rest, "parent"), value_after(rest, "prio"))
            else {
                return fail(1, "parent and prio required");
            };
            let attached = match parent {
                "1:0" | "1:" => state.root_qdisc,
                "ffff:" => state.ingress_qdisc,
                handle => state.qdiscs.contains_key(handle),
            };
            if !attached {
                return fail(2, "RTNETLINK answers: Invalid argument");
            }
            state.filters.push(SimFilter {
                parent: parent.to_string(),
                prio: prio.to_string(),
                flowid: value_after(rest, "flowid").map(str::to_string),
            });
            ok("")
        }
        ("filter", "del") => {
            let (Some(parent), Some(prio)) = (value_after(rest, "parent"), value_after(rest, "prio"))
            else {
                return fail(1, "parent and prio required");
            };
            let before = state.filters.len();
            state.filters.retain(|f| !(f.parent == parent && f.prio == prio));
            if state.filters.len() == before {
                return fail(2, "RTNETLINK answers: No such file or directory");
            }
            ok("")
        }
        _ => fail(1, "unsupported invocation"),
    }
}
