//! End-to-end lookup scenarios against the public `Table` API, one per
//! engine family, mirroring the way routing changes are actually staged:
//! a handful of rules landing in decreasing specificity.

use lpm_store::{
    create_ipv4_dir24, create_ipv4_stride8, create_ipv6_stride8, create_ipv6_wide16,
    TableConfig, INVALID_NH,
};

fn v4(a: u8, b: u8, c: u8, d: u8) -> [u8; 4] {
    [a, b, c, d]
}

fn v6(s: &str) -> [u8; 16] {
    let ip: std::net::Ipv6Addr = s.parse().unwrap();
    ip.octets()
}

#[test]
fn ipv4_four_rules_match_longest_prefix_on_every_engine() {
    for mut t in [
        create_ipv4_dir24(TableConfig::default()).unwrap(),
        create_ipv4_stride8(TableConfig::default()).unwrap(),
    ] {
        t.add(&v4(10, 0, 0, 0), 8, 100).unwrap();
        t.add(&v4(10, 1, 0, 0), 16, 200).unwrap();
        t.add(&v4(10, 1, 2, 0), 24, 300).unwrap();
        t.add(&v4(10, 1, 2, 3), 32, 400).unwrap();

        assert_eq!(t.lookup(&v4(10, 1, 2, 3)), 400);
        assert_eq!(t.lookup(&v4(10, 1, 2, 4)), 300);
        assert_eq!(t.lookup(&v4(10, 1, 3, 1)), 200);
        assert_eq!(t.lookup(&v4(10, 2, 0, 0)), 100);
        assert_eq!(t.lookup(&v4(192, 168, 1, 1)), INVALID_NH);
    }
}

#[test]
fn default_route_combined_with_specifics_on_every_engine() {
    for mut t in [
        create_ipv4_dir24(TableConfig::default()).unwrap(),
        create_ipv4_stride8(TableConfig::default()).unwrap(),
    ] {
        t.add(&v4(0, 0, 0, 0), 0, 999).unwrap();
        t.add(&v4(10, 0, 0, 0), 8, 100).unwrap();
        t.add(&v4(192, 168, 0, 0), 16, 200).unwrap();

        assert_eq!(t.lookup(&v4(10, 1, 2, 3)), 100);
        assert_eq!(t.lookup(&v4(192, 168, 1, 1)), 200);
        assert_eq!(t.lookup(&v4(8, 8, 8, 8)), 999);
        assert_eq!(t.lookup(&v4(172, 16, 0, 1)), 999);
    }
}

#[test]
fn delete_unwinds_to_less_specific_on_every_engine() {
    for mut t in [
        create_ipv4_dir24(TableConfig::default()).unwrap(),
        create_ipv4_stride8(TableConfig::default()).unwrap(),
    ] {
        t.add(&v4(10, 0, 0, 0), 8, 100).unwrap();
        t.add(&v4(10, 1, 0, 0), 16, 200).unwrap();
        t.add(&v4(10, 1, 2, 0), 24, 300).unwrap();
        t.add(&v4(10, 1, 2, 3), 32, 400).unwrap();

        t.delete(&v4(10, 1, 2, 3), 32).unwrap();
        assert_eq!(t.lookup(&v4(10, 1, 2, 3)), 300);

        t.delete(&v4(10, 1, 2, 0), 24).unwrap();
        assert_eq!(t.lookup(&v4(10, 1, 2, 3)), 200);
    }
}

#[test]
fn ipv6_three_rules_match_longest_prefix_on_every_engine() {
    for mut t in [
        create_ipv6_wide16(TableConfig::default()).unwrap(),
        create_ipv6_stride8(TableConfig::default()).unwrap(),
    ] {
        t.add(&v6("2001::"), 16, 100).unwrap();
        t.add(&v6("2001:db8::"), 32, 200).unwrap();
        t.add(&v6("2001:db8:0:1::"), 64, 300).unwrap();

        assert_eq!(t.lookup(&v6("2001:db8:0:1::1")), 300);
        assert_eq!(t.lookup(&v6("2001:db8:0:2::1")), 200);
        assert_eq!(t.lookup(&v6("2001:0e00::1")), 100);
        assert_eq!(t.lookup(&v6("2002::1")), INVALID_NH);
    }
}

#[test]
fn delete_of_absent_prefix_is_not_found_and_leaves_table_unchanged() {
    let mut t = create_ipv4_dir24(TableConfig::default()).unwrap();
    t.add(&v4(10, 0, 0, 0), 8, 100).unwrap();
    assert!(t.delete(&v4(192, 168, 0, 0), 16).is_err());
    assert_eq!(t.lookup(&v4(10, 1, 2, 3)), 100);
    assert_eq!(t.num_prefixes(), 1);
}
