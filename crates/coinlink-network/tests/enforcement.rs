//! Enforcement behaviour against the simulated kernel.

use std::net::Ipv4Addr;
use std::sync::Arc;

use coinlink_core::{CommandRunner, MacAddress};
use coinlink_network::directive::Directive;
use coinlink_network::mock::SimulatedNetfilter;
use coinlink_network::{ClassId, Enforcer, EnforcerConfig, ShapingPolicy};
use rstest::rstest;

fn mac() -> MacAddress {
    "de:ad:be:ef:00:01".parse().unwrap()
}

fn setup(policy: ShapingPolicy) -> (Arc<SimulatedNetfilter>, Enforcer) {
    let netfilter = Arc::new(SimulatedNetfilter::new());
    let config = EnforcerConfig::default().with_arp_table("/nonexistent/arp");
    let enforcer = Enforcer::new(netfilter.clone(), config).with_policy(policy);
    enforcer.initialize().unwrap();
    (netfilter, enforcer)
}

fn limited(priority_mode: bool) -> ShapingPolicy {
    ShapingPolicy {
        enabled: true,
        rate_mbit: 5,
        priority_mode,
    }
}

#[test]
fn test_repeated_allow_leaves_single_accept() {
    let (netfilter, enforcer) = setup(ShapingPolicy::default());

    for _ in 0..3 {
        enforcer.apply_allow(&mac(), None);
    }

    assert_eq!(netfilter.count_rules(&mac(), "ACCEPT"), 2);
    assert_eq!(netfilter.count_rules(&mac(), "DROP"), 0);
    assert_eq!(netfilter.count_rules(&mac(), "REJECT"), 0);
}

#[test]
fn test_repeated_block_leaves_single_pair() {
    let (netfilter, enforcer) = setup(ShapingPolicy::default());
    enforcer.apply_allow(&mac(), None);

    for _ in 0..3 {
        enforcer.apply_block(&mac(), None);
    }

    assert_eq!(netfilter.count_rules(&mac(), "ACCEPT"), 0);
    assert_eq!(netfilter.count_rules(&mac(), "DROP"), 1);
    assert_eq!(netfilter.count_rules(&mac(), "REJECT"), 1);
}

fn accepts_in(netfilter: &SimulatedNetfilter, table: &str, chain: &str) -> usize {
    let mac = mac().to_string();
    netfilter
        .chain(table, chain)
        .iter()
        .filter(|rule| rule.contains(&mac) && rule.ends_with("-j ACCEPT"))
        .count()
}

#[rstest]
#[case(3)]
#[case(7)]
fn test_single_allow_clears_stacked_blocks(#[case] blocks: usize) {
    let (netfilter, enforcer) = setup(ShapingPolicy::default());
    enforcer.apply_allow(&mac(), None);

    for _ in 0..blocks {
        enforcer.apply_block(&mac(), None);
    }
    enforcer.apply_allow(&mac(), None);

    assert_eq!(netfilter.count_rules(&mac(), "DROP"), 0);
    assert_eq!(netfilter.count_rules(&mac(), "REJECT"), 0);
    assert_eq!(accepts_in(&netfilter, "filter", "FORWARD"), 1);
    assert_eq!(accepts_in(&netfilter, "nat", "PREROUTING"), 1);
}

#[test]
fn test_allow_after_duplicated_directives() {
    let (netfilter, enforcer) = setup(ShapingPolicy::default());

    // A crash mid-sequence can leave copies behind.
    let drop = Directive::forward_drop(&mac()).insert_head_args();
    for _ in 0..4 {
        netfilter.run("iptables", &drop);
    }

    enforcer.apply_allow(&mac(), None);
    assert_eq!(netfilter.count_rules(&mac(), "DROP"), 0);
    assert_eq!(netfilter.count_rules(&mac(), "ACCEPT"), 2);
}

#[test]
fn test_block_then_allow_other_device_untouched() {
    let (netfilter, enforcer) = setup(ShapingPolicy::default());
    let other: MacAddress = "de:ad:be:ef:00:02".parse().unwrap();

    enforcer.apply_allow(&other, None);
    enforcer.apply_block(&mac(), None);

    assert_eq!(netfilter.count_rules(&other, "ACCEPT"), 2);
    assert_eq!(netfilter.count_rules(&mac(), "DROP"), 1);
}

#[test]
fn test_rate_limit_round_trip() {
    let (netfilter, enforcer) = setup(limited(false));
    let addr = Ipv4Addr::new(10, 0, 0, 42);
    let class = ClassId::from_addr(addr).class_handle();

    enforcer.apply_rate_limit(addr);
    assert!(netfilter.classes().contains(&class));
    assert_eq!(netfilter.filters().len(), 2);

    enforcer.remove_rate_limit(addr);
    assert!(!netfilter.classes().contains(&class));
    assert!(netfilter.filters().is_empty());

    enforcer.apply_rate_limit(addr);
    enforcer.apply_rate_limit(addr);
    assert_eq!(netfilter.classes().iter().filter(|c| **c == class).count(), 1);
    assert_eq!(netfilter.filters().len(), 2);
}

#[test]
fn test_priority_mode_round_trip() {
    let (netfilter, enforcer) = setup(limited(true));
    let addr = Ipv4Addr::new(10, 0, 0, 20);

    enforcer.apply_rate_limit(addr);
    assert_eq!(netfilter.qdisc_handles(), vec!["14:".to_string()]);
    assert_eq!(netfilter.filters().len(), 4);

    enforcer.apply_rate_limit(addr);
    assert_eq!(netfilter.qdisc_handles(), vec!["14:".to_string()]);
    assert_eq!(netfilter.filters().len(), 4);

    enforcer.remove_rate_limit(addr);
    assert!(netfilter.qdisc_handles().is_empty());
    assert!(netfilter.filters().is_empty());
}

#[test]
fn test_disabled_policy_only_removes() {
    let (netfilter, enforcer) = setup(limited(false));
    let addr = Ipv4Addr::new(10, 0, 0, 42);
    enforcer.apply_rate_limit(addr);

    enforcer.set_policy(ShapingPolicy::default());
    enforcer.apply_rate_limit(addr);

    assert_eq!(netfilter.classes(), vec!["1:ffff".to_string()]);
    assert!(netfilter.filters().is_empty());
}

#[test]
fn test_allow_with_address_applies_cap() {
    let (netfilter, enforcer) = setup(limited(false));
    let addr = Ipv4Addr::new(10, 0, 0, 7);

    enforcer.apply_allow(&mac(), Some(addr));
    assert!(netfilter.classes().contains(&"1:7".to_string()));

    enforcer.apply_block(&mac(), Some(addr));
    assert!(!netfilter.classes().contains(&"1:7".to_string()));
}

#[test]
fn test_refresh_all_rebuilds_ingress() {
    let (netfilter, enforcer) = setup(limited(false));
    let addrs = [Ipv4Addr::new(10, 0, 0, 7), Ipv4Addr::new(10, 0, 1, 9)];
    for addr in addrs {
        enforcer.apply_rate_limit(addr);
    }

    enforcer.set_policy(ShapingPolicy {
        rate_mbit: 10,
        ..limited(false)
    });
    enforcer.refresh_all(&addrs);

    assert!(netfilter.has_ingress());
    assert_eq!(netfilter.filters().len(), 4);
    let last_class_add = netfilter
        .history()
        .into_iter()
        .rev()
        .find(|(program, args)| program == "tc" && args[0] == "class" && args[1] == "add")
        .unwrap();
    assert!(last_class_add.1.contains(&"10mbit".to_string()));
}
