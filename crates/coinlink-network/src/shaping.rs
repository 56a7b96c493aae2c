//! Per-address traffic shaping commands.
//!
//! Layout on the LAN interface:
//!
//! ```text
//! root 1: htb
//!  └─ 1:ffff  1000mbit                   shared root class
//!      └─ 1:<id>  rate R ceil R          one per limited address
//!          └─ <id>: prio bands 2         priority mode only
//! filter 1:0 prio <id>   ip dst <addr>  -> 1:<id>
//! ingress ffff: prio <id> ip src <addr> police R drop
//! ```
//!
//! The class id comes from the two low octets of the address, so one LAN
//! must not span more than a /16: `10.0.1.5` and `10.1.1.5` share id
//! `0x0105`.

use std::fmt;
use std::net::Ipv4Addr;

use coinlink_core::process::args;

use crate::config::ShapingPolicy;

/// Minor of the shared root class (`1:ffff`).
pub const ROOT_CLASS_MINOR: u16 = 0xffff;

/// Per-address identifier used as class minor, filter priority and
/// priority-qdisc major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u16);

impl ClassId {
    pub const MIN: u16 = 1;
    /// Stays below the root class minor and the ingress major.
    pub const MAX: u16 = ROOT_CLASS_MINOR - 1;

    /// `octet[2] * 256 + octet[3]`, clamped to `[MIN, MAX]`.
    pub fn from_addr(addr: Ipv4Addr) -> Self {
        let [_, _, hi, lo] = addr.octets();
        let raw = (u16::from(hi) << 8) | u16::from(lo);
        ClassId(raw.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> u16 {
        self.0
    }

    /// Class handle, `1:<hex>`.
    pub fn class_handle(self) -> String {
        format!("1:{:x}", self.0)
    }

    /// Filter priority, decimal.
    pub fn prio(self) -> String {
        self.0.to_string()
    }

    /// Handle of the priority sub-qdisc, `<hex>:`.
    ///
    /// `None` for id 1, whose major would collide with the root qdisc.
    pub fn qdisc_handle(self) -> Option<String> {
        (self.0 != 1).then(|| format!("{:x}:", self.0))
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commands tearing down the shaping state of `id`.
///
/// Filters go first: the kernel refuses to delete a class that a filter
/// still points at.
pub fn removal_commands(lan: &str, id: ClassId) -> Vec<Vec<String>> {
    let prio = id.prio();
    let prio = prio.as_str();
    let class = id.class_handle();
    vec![
        args(["filter", "del", "dev", lan, "protocol", "ip", "parent", "1:0", "prio", prio]),
        args(["filter", "del", "dev", lan, "protocol", "ip", "parent", "ffff:", "prio", prio]),
        args([
            "class",
            "del",
            "dev",
            lan,
            "parent",
            "1:ffff",
            "classid",
            class.as_str(),
        ]),
    ]
}

/// Commands installing the cap for `addr`. Empty when shaping is disabled.
pub fn install_commands(lan: &str, addr: Ipv4Addr, policy: &ShapingPolicy) -> Vec<Vec<String>> {
    if !policy.enabled {
        return Vec::new();
    }

    let id = ClassId::from_addr(addr);
    let class = id.class_handle();
    let class = class.as_str();
    let prio = id.prio();
    let prio = prio.as_str();
    let ip = addr.to_string();
    let ip = ip.as_str();
    let rate = format!("{}mbit", policy.rate_mbit);
    let rate = rate.as_str();
    let police = format!("{}kbit", u64::from(policy.rate_mbit) * 1024);
    let police = police.as_str();

    let mut commands = vec![args([
        "class", "add", "dev", lan, "parent", "1:ffff", "classid", class, "htb", "rate", rate,
        "ceil", rate, "burst", "15k", "cburst", "15k",
    ])];

    if policy.priority_mode
        && let Some(handle) = id.qdisc_handle()
    {
        let band = format!("{handle}1");
        let band = band.as_str();
        let handle = handle.as_str();
        let mut prio_qdisc = args([
            "qdisc", "add", "dev", lan, "parent", class, "handle", handle, "prio", "bands", "2",
            "priomap",
        ]);
        prio_qdisc.extend(std::iter::repeat_n("1".to_string(), 16));
        commands.push(prio_qdisc);
        // UDP with total length below 512 bytes
        commands.push(args([
            "filter", "add", "dev", lan, "protocol", "ip", "parent", handle, "prio", "1", "u32",
            "match", "ip", "protocol", "17", "0xff", "match", "u16", "0", "0xfe00", "at", "2",
            "flowid", band,
        ]));
        commands.push(args([
            "filter", "add", "dev", lan, "protocol", "ip", "parent", handle, "prio", "1", "u32",
            "match", "ip", "protocol", "1", "0xff", "flowid", band,
        ]));
    }

    commands.push(args([
        "filter", "add", "dev", lan, "protocol", "ip", "parent", "1:0", "prio", prio, "u32",
        "match", "ip", "dst", ip, "flowid", class,
    ]));
    commands.push(args([
        "filter", "add", "dev", lan, "parent", "ffff:", "protocol", "ip", "prio", prio, "u32",
        "match", "ip", "src", ip, "police", "rate", police, "burst", "12k", "drop", "flowid",
        ":1",
    ]));

    commands
}

/// Commands resetting the ingress qdisc, which drops every police filter.
pub fn ingress_reset_commands(lan: &str) -> Vec<Vec<String>> {
    vec![
        args(["qdisc", "del", "dev", lan, "ingress"]),
        args(["qdisc", "add", "dev", lan, "ingress"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Ipv4Addr::new(10, 0, 0, 23), 23)]
    #[case(Ipv4Addr::new(10, 0, 1, 5), 0x0105)]
    #[case(Ipv4Addr::new(10, 0, 0, 0), 1)]
    #[case(Ipv4Addr::new(10, 0, 255, 255), 0xfffe)]
    #[case(Ipv4Addr::new(192, 168, 3, 200), 3 * 256 + 200)]
    fn test_class_id_from_addr(#[case] addr: Ipv4Addr, #[case] expected: u16) {
        assert_eq!(ClassId::from_addr(addr).value(), expected);
    }

    #[test]
    fn test_addresses_above_slash16_alias() {
        assert_eq!(
            ClassId::from_addr(Ipv4Addr::new(10, 0, 1, 5)),
            ClassId::from_addr(Ipv4Addr::new(10, 1, 1, 5))
        );
    }

    #[test]
    fn test_handles() {
        let id = ClassId::from_addr(Ipv4Addr::new(10, 0, 1, 10));
        assert_eq!(id.class_handle(), "1:10a");
        assert_eq!(id.prio(), "266");
        assert_eq!(id.qdisc_handle().as_deref(), Some("10a:"));
        assert!(ClassId::from_addr(Ipv4Addr::new(10, 0, 0, 1)).qdisc_handle().is_none());
    }

    #[test]
    fn test_install_disabled_is_empty() {
        let policy = ShapingPolicy {
            enabled: false,
            rate_mbit: 5,
            priority_mode: true,
        };
        assert!(install_commands("eth0", Ipv4Addr::new(10, 0, 0, 9), &policy).is_empty());
    }

    #[test]
    fn test_install_commands() {
        let policy = ShapingPolicy {
            enabled: true,
            rate_mbit: 5,
            priority_mode: false,
        };
        let commands: Vec<String> = install_commands("eth0", Ipv4Addr::new(10, 0, 0, 9), &policy)
            .iter()
            .map(|c| c.join(" "))
            .collect();

        assert_eq!(
            commands,
            vec![
                "class add dev eth0 parent 1:ffff classid 1:9 htb rate 5mbit ceil 5mbit burst 15k cburst 15k",
                "filter add dev eth0 protocol ip parent 1:0 prio 9 u32 match ip dst 10.0.0.9 flowid 1:9",
                "filter add dev eth0 parent ffff: protocol ip prio 9 u32 match ip src 10.0.0.9 police rate 5120kbit burst 12k drop flowid :1",
            ]
        );
    }

    #[test]
    fn test_install_priority_mode() {
        let policy = ShapingPolicy {
            enabled: true,
            rate_mbit: 2,
            priority_mode: true,
        };
        let commands = install_commands("eth0", Ipv4Addr::new(10, 0, 0, 20), &policy);
        assert_eq!(commands.len(), 6);
        assert_eq!(
            commands[1].join(" "),
            "qdisc add dev eth0 parent 1:14 handle 14: prio bands 2 priomap 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1 1"
        );
        assert!(commands[2].join(" ").ends_with("match u16 0 0xfe00 at 2 flowid 14:1"));
        assert!(commands[3].join(" ").contains("match ip protocol 1 0xff"));
    }

    #[test]
    fn test_removal_commands_delete_filters_first() {
        let commands = removal_commands("eth0", ClassId::from_addr(Ipv4Addr::new(10, 0, 0, 9)));
        assert_eq!(commands[0][0], "filter");
        assert_eq!(commands[1][0], "filter");
        assert_eq!(
            commands[2].join(" "),
            "class del dev eth0 parent 1:ffff classid 1:9"
        );
    }
}
