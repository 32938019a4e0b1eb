//------------ Public Table surface ------------------------------------------
//
// The whole external interface of this crate: four `create_*` constructors
// and one small set of operations, polymorphic over whichever engine
// `create_*` produced. There is no explicit "destroy" method -- it is
// realized as `Table`'s ordinary `Drop`, which gives scoped, idempotent
// release on every exit path (including an early return from a failed
// `add`) for free. See DESIGN.md.

use crate::config::TableConfig;
use crate::dir24_8::Dir24_8Table;
use crate::errors::{AddError, CreateError, DeleteError};
use crate::stats::Stats;
use crate::stride_trie::StrideTrie;
use crate::wide16::Wide16Table;
use crate::af::{IPv4, IPv6};

/// An LPM table backed by one of the four engines. Which engine is active
/// is fixed at creation time and does not change over the table's
/// lifetime.
pub enum Table {
    /// E1 -- IPv4 DIR-24-8.
    Ipv4Dir24(Dir24_8Table),
    /// E2 -- IPv4 multibit trie, 8-bit stride.
    Ipv4Stride8(StrideTrie<IPv4>),
    /// E3 -- IPv6 wide-16 root + stride-8 tail.
    Ipv6Wide16(Wide16Table),
    /// E4 -- IPv6 multibit trie, 8-bit stride.
    Ipv6Stride8(StrideTrie<IPv6>),
}

/// E1 constructor.
pub fn create_ipv4_dir24(cfg: TableConfig) -> Result<Table, CreateError> {
    Ok(Table::Ipv4Dir24(Dir24_8Table::new(
        cfg.initial_capacity,
        cfg.growth_factor,
    )))
}

/// E2 constructor.
pub fn create_ipv4_stride8(cfg: TableConfig) -> Result<Table, CreateError> {
    Ok(Table::Ipv4Stride8(StrideTrie::new(
        cfg.initial_capacity,
        cfg.growth_factor,
    )))
}

/// E3 constructor.
pub fn create_ipv6_wide16(cfg: TableConfig) -> Result<Table, CreateError> {
    Ok(Table::Ipv6Wide16(Wide16Table::new(
        cfg.initial_capacity,
        cfg.growth_factor,
    )))
}

/// E4 constructor.
pub fn create_ipv6_stride8(cfg: TableConfig) -> Result<Table, CreateError> {
    Ok(Table::Ipv6Stride8(StrideTrie::new(
        cfg.initial_capacity,
        cfg.growth_factor,
    )))
}

impl Table {
    /// Insert or replace `(prefix_bytes, prefix_len) -> next_hop`.
    /// `prefix_bytes` is 4 bytes for an IPv4 engine, 16 for IPv6.
    pub fn add(
        &mut self,
        prefix_bytes: &[u8],
        prefix_len: u8,
        next_hop: u32,
    ) -> Result<(), AddError> {
        match self {
            Table::Ipv4Dir24(t) => t.add(prefix_bytes, prefix_len, next_hop),
            Table::Ipv4Stride8(t) => t.add(prefix_bytes, prefix_len, next_hop),
            Table::Ipv6Wide16(t) => t.add(prefix_bytes, prefix_len, next_hop),
            Table::Ipv6Stride8(t) => t.add(prefix_bytes, prefix_len, next_hop),
        }
    }

    /// Remove `(prefix_bytes, prefix_len)`.
    pub fn delete(
        &mut self,
        prefix_bytes: &[u8],
        prefix_len: u8,
    ) -> Result<(), DeleteError> {
        match self {
            Table::Ipv4Dir24(t) => t.delete(prefix_bytes, prefix_len),
            Table::Ipv4Stride8(t) => t.delete(prefix_bytes, prefix_len),
            Table::Ipv6Wide16(t) => t.delete(prefix_bytes, prefix_len),
            Table::Ipv6Stride8(t) => t.delete(prefix_bytes, prefix_len),
        }
    }

    /// Longest-prefix-match lookup; never fails, a miss is
    /// `INVALID_NH`.
    pub fn lookup(&self, addr_bytes: &[u8]) -> u32 {
        match self {
            Table::Ipv4Dir24(t) => t.lookup(addr_bytes),
            Table::Ipv4Stride8(t) => t.lookup(addr_bytes),
            Table::Ipv6Wide16(t) => t.lookup(addr_bytes),
            Table::Ipv6Stride8(t) => t.lookup(addr_bytes),
        }
    }

    /// Fast-path lookup for an IPv4 address already in a big-endian `u32`
    ///. Panics if called on an IPv6 engine -- unlike
    /// `lookup`, this entry point has no address-family tag to dispatch on,
    /// so mismatched use is a programming error the caller must not make,
    /// not a `lookup` miss.
    pub fn lookup_ipv4_u32(&self, addr: u32) -> u32 {
        match self {
            Table::Ipv4Dir24(t) => t.lookup_u32(addr),
            Table::Ipv4Stride8(t) => t.lookup(&addr.to_be_bytes()),
            Table::Ipv6Wide16(_) | Table::Ipv6Stride8(_) => {
                panic!("lookup_ipv4_u32 called on an IPv6 table")
            }
        }
    }

    /// Batch lookup; `results[i]` is the lookup of
    /// `addrs[i]`, with no ordering constraint between lanes.
    pub fn lookup_batch(&self, addrs: &[&[u8]], results: &mut [u32]) {
        match self {
            Table::Ipv4Dir24(t) => t.lookup_batch(addrs, results),
            Table::Ipv4Stride8(t) => t.lookup_batch(addrs, results),
            Table::Ipv6Wide16(t) => t.lookup_batch(addrs, results),
            Table::Ipv6Stride8(t) => t.lookup_batch(addrs, results),
        }
    }

    /// Number of prefixes currently held, including the default route.
    pub fn num_prefixes(&self) -> usize {
        match self {
            Table::Ipv4Dir24(t) => t.num_prefixes(),
            Table::Ipv4Stride8(t) => t.num_prefixes(),
            Table::Ipv6Wide16(t) => t.num_prefixes(),
            Table::Ipv6Stride8(t) => t.num_prefixes(),
        }
    }

    /// Size/diagnostics snapshot.
    pub fn stats(&self) -> Stats {
        match self {
            Table::Ipv4Dir24(t) => t.stats(),
            Table::Ipv4Stride8(t) => t.stats(),
            Table::Ipv6Wide16(t) => t.stats(),
            Table::Ipv6Stride8(t) => t.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_basic_lookup_each_engine() {
        for mut t in [
            create_ipv4_dir24(TableConfig::default()).unwrap(),
            create_ipv4_stride8(TableConfig::default()).unwrap(),
        ] {
            t.add(&[10, 0, 0, 0], 8, 42).unwrap();
            assert_eq!(t.lookup(&[10, 1, 2, 3]), 42);
            assert_eq!(t.num_prefixes(), 1);
        }
    }

    #[test]
    fn lookup_ipv4_u32_matches_byte_lookup() {
        let mut t = create_ipv4_dir24(TableConfig::default()).unwrap();
        t.add(&[10, 0, 0, 0], 8, 42).unwrap();
        let addr = u32::from_be_bytes([10, 1, 2, 3]);
        assert_eq!(t.lookup_ipv4_u32(addr), t.lookup(&[10, 1, 2, 3]));
    }

    #[test]
    #[should_panic]
    fn lookup_ipv4_u32_panics_on_ipv6_table() {
        let t = create_ipv6_stride8(TableConfig::default()).unwrap();
        let _ = t.lookup_ipv4_u32(0);
    }
}
