//------------ Wide-16 root + stride-8 tail (E3) -----------------------------
//
// The IPv6 "wide" trie: a single 65,536-entry root node consumes the first
// 16 address bits in one step, then 8-bit-stride interior nodes (the same
// shape used by the stride-8 tries) handle the remaining 112 bits, up to
// 14 more levels.

use std::collections::HashMap;

use log::debug;

use crate::af::{AddressFamily, IPv6};
use crate::arena::{Arena, Node};
use crate::bits::leaf_push_run;
use crate::entry::{INVALID_NH, NULL_CHILD};
use crate::errors::{AddError, DeleteError};
use crate::stats::Stats;

const ROOT_STRIDE: u8 = 16;
const ROOT_WIDTH: usize = 1 << ROOT_STRIDE;
const TAIL_STRIDE: u8 = 8;
const TAIL_WIDTH: usize = 256;

pub struct Wide16Table {
    root: Node<ROOT_WIDTH>,
    tail: Arena<TAIL_WIDTH>,
    has_default: bool,
    default_nh: u32,
    num_prefixes: usize,
    /// Every live (prefix, len) -> next_hop rule, keyed by its masked
    /// address bytes, consulted on `delete` to recover the rule a deleted
    /// entry was shadowing (root slots and tail slots alike only remember
    /// their current owner, not what it overwrote).
    rules: HashMap<(Vec<u8>, u8), u32>,
}

impl Wide16Table {
    pub fn new(initial_tail_capacity: usize, growth_factor: usize) -> Self {
        debug!("creating wide-16 IPv6 table, root has {ROOT_WIDTH} entries");
        Wide16Table {
            root: Node::empty(),
            tail: Arena::new(initial_tail_capacity, growth_factor),
            has_default: false,
            default_nh: INVALID_NH,
            num_prefixes: 0,
            rules: HashMap::new(),
        }
    }

    /// Longest remaining rule that is a strict ancestor of
    /// `(address, len)`, consulted after deleting the rule at `len`.
    fn find_ancestor(&self, address: IPv6, len: u8) -> Option<(u8, u32)> {
        for k in (1..len).rev() {
            let candidate = address.truncate_to_len(k).to_be_bytes();
            if let Some(&nh) = self.rules.get(&(candidate, k)) {
                return Some((k, nh));
            }
        }
        if self.has_default {
            Some((0, self.default_nh))
        } else {
            None
        }
    }

    pub fn add(
        &mut self,
        prefix_bytes: &[u8],
        prefix_len: u8,
        next_hop: u32,
    ) -> Result<(), AddError> {
        if prefix_len > 128 || prefix_bytes.len() != 16 {
            return Err(AddError::BadPrefixLength);
        }
        if prefix_len == 0 {
            self.has_default = true;
            self.default_nh = next_hop;
            self.num_prefixes += 1;
            return Ok(());
        }

        let address = IPv6::from_be_bytes(prefix_bytes);

        if prefix_len <= ROOT_STRIDE {
            let run = leaf_push_run(address.top16() as u32, ROOT_STRIDE, prefix_len);
            for i in run.base..run.base + run.count {
                self.root.slots[i].set_next_hop(next_hop, prefix_len);
            }
        } else {
            // Pre-validate worst-case arena headroom before any write.
            let descents = ((prefix_len - ROOT_STRIDE) / TAIL_STRIDE) as usize;
            if self.tail.pool_used() + descents >= crate::entry::MAX_ARENA_INDEX {
                return Err(AddError::OutOfSpace);
            }

            let top16 = address.top16() as usize;
            let mut node_idx = self.root.slots[top16].child();
            if node_idx == NULL_CHILD {
                node_idx = self.tail.alloc().ok_or(AddError::OutOfSpace)?;
                self.root.slots[top16].set_child(node_idx);
            }

            let mut depth = ROOT_STRIDE;
            loop {
                let remaining = prefix_len - depth;
                let byte = address.byte_at(depth) as u32;
                if remaining > TAIL_STRIDE {
                    let slot = &mut self.tail.node_mut(node_idx).slots[byte as usize];
                    let mut child = slot.child();
                    if child == NULL_CHILD {
                        child = self.tail.alloc().ok_or(AddError::OutOfSpace)?;
                        self.tail.node_mut(node_idx).slots[byte as usize].set_child(child);
                    }
                    node_idx = child;
                    depth += TAIL_STRIDE;
                } else {
                    let run = leaf_push_run(byte, TAIL_STRIDE, remaining);
                    let node = self.tail.node_mut(node_idx);
                    for i in run.base..run.base + run.count {
                        node.slots[i].set_next_hop(next_hop, prefix_len);
                    }
                    break;
                }
            }
        }

        let masked = address.truncate_to_len(prefix_len).to_be_bytes();
        if self.rules.insert((masked, prefix_len), next_hop).is_none() {
            self.num_prefixes += 1;
        }
        Ok(())
    }

    pub fn delete(
        &mut self,
        prefix_bytes: &[u8],
        prefix_len: u8,
    ) -> Result<(), DeleteError> {
        if prefix_len > 128 || prefix_bytes.len() != 16 {
            return Err(DeleteError::BadPrefixLength);
        }
        if prefix_len == 0 {
            if !self.has_default {
                return Err(DeleteError::NotFound);
            }
            self.has_default = false;
            self.default_nh = INVALID_NH;
            self.num_prefixes -= 1;
            return Ok(());
        }

        let address = IPv6::from_be_bytes(prefix_bytes);
        let masked = address.truncate_to_len(prefix_len).to_be_bytes();
        if self.rules.remove(&(masked, prefix_len)).is_none() {
            return Err(DeleteError::NotFound);
        }

        // The rule being deleted may have been shadowing a less specific
        // one; restore it instead of leaving the affected slots invalid.
        let fallback = self.find_ancestor(address, prefix_len);

        if prefix_len <= ROOT_STRIDE {
            let run = leaf_push_run(address.top16() as u32, ROOT_STRIDE, prefix_len);
            for i in run.base..run.base + run.count {
                if self.root.slots[i].owner_len != prefix_len {
                    continue;
                }
                self.root.slots[i].clear_valid();
                if let Some((flen, fnh)) = fallback {
                    self.root.slots[i].set_next_hop(fnh, flen);
                }
            }
            self.num_prefixes -= 1;
            return Ok(());
        }

        let top16 = address.top16() as usize;
        let mut node_idx = self.root.slots[top16].child();
        debug_assert!(node_idx != NULL_CHILD, "registry confirmed this prefix exists");

        let mut depth = ROOT_STRIDE;
        loop {
            let remaining = prefix_len - depth;
            let byte = address.byte_at(depth) as u32;
            if remaining > TAIL_STRIDE {
                let child = self.tail.node(node_idx).slots[byte as usize].child();
                debug_assert!(child != NULL_CHILD, "registry confirmed this prefix exists");
                node_idx = child;
                depth += TAIL_STRIDE;
            } else {
                let run = leaf_push_run(byte, TAIL_STRIDE, remaining);
                let node = self.tail.node_mut(node_idx);
                for i in run.base..run.base + run.count {
                    if node.slots[i].owner_len != prefix_len {
                        continue;
                    }
                    node.slots[i].clear_valid();
                    if let Some((flen, fnh)) = fallback {
                        node.slots[i].set_next_hop(fnh, flen);
                    }
                }
                break;
            }
        }
        self.num_prefixes -= 1;
        Ok(())
    }

    #[inline]
    pub fn lookup(&self, addr_bytes: &[u8]) -> u32 {
        let address = IPv6::from_be_bytes(addr_bytes);
        let top16 = address.top16() as usize;
        let root_slot = self.root.slots[top16];
        let mut best = if self.has_default {
            self.default_nh
        } else {
            INVALID_NH
        };
        if root_slot.is_valid() {
            best = root_slot.next_hop;
        }
        let mut node_idx = root_slot.child();
        let mut depth = ROOT_STRIDE;
        while node_idx != NULL_CHILD && depth < IPv6::BITS {
            let byte = address.byte_at(depth) as usize;
            let slot = self.tail.node(node_idx).slots[byte];
            if slot.is_valid() {
                best = slot.next_hop;
            }
            node_idx = slot.child();
            depth += TAIL_STRIDE;
        }
        best
    }

    pub fn lookup_batch(&self, addrs: &[&[u8]], results: &mut [u32]) {
        crate::lookup::batch_lookup(addrs, results, |bytes| self.lookup(bytes));
    }

    pub fn num_prefixes(&self) -> usize {
        self.num_prefixes
    }

    pub fn stats(&self) -> Stats {
        Stats {
            num_prefixes: self.num_prefixes,
            num_nodes: self.tail.pool_used() + 1,
            bytes_used: self.root.slots.len()
                * std::mem::size_of::<crate::entry::Entry>()
                + self.tail.bytes_used(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v6(s: &str) -> [u8; 16] {
        let ip: std::net::Ipv6Addr = s.parse().unwrap();
        ip.octets()
    }

    #[test]
    fn ipv6_three_level_longest_prefix_match() {
        let mut t = Wide16Table::new(4, 2);
        t.add(&v6("2001::"), 16, 100).unwrap();
        t.add(&v6("2001:db8::"), 32, 200).unwrap();
        t.add(&v6("2001:db8:0:1::"), 64, 300).unwrap();

        assert_eq!(t.lookup(&v6("2001:db8:0:1::1")), 300);
        assert_eq!(t.lookup(&v6("2001:db8:0:2::1")), 200);
        assert_eq!(t.lookup(&v6("2001:0e00::1")), 100);
        assert_eq!(t.lookup(&v6("2002::1")), INVALID_NH);
    }

    #[test]
    fn delete_root_level_prefix() {
        let mut t = Wide16Table::new(4, 2);
        t.add(&v6("2001::"), 16, 100).unwrap();
        t.delete(&v6("2001::"), 16).unwrap();
        assert_eq!(t.lookup(&v6("2001::1")), INVALID_NH);
    }

    #[test]
    fn delete_restores_value_shadowed_in_root_node() {
        // /8 and /12 both leaf-push into the same root run.
        let mut t = Wide16Table::new(4, 2);
        t.add(&v6("2000::"), 8, 100).unwrap();
        t.add(&v6("2010::"), 12, 200).unwrap();
        assert_eq!(t.lookup(&v6("2015::1")), 200);

        t.delete(&v6("2010::"), 12).unwrap();
        assert_eq!(t.lookup(&v6("2015::1")), 100);
    }

    #[test]
    fn delete_restores_value_shadowed_in_tail_node() {
        // /20 and /22 both leaf-push into the same tail-level node.
        let mut t = Wide16Table::new(4, 2);
        t.add(&v6("2001::"), 20, 100).unwrap();
        t.add(&v6("2001:0400::"), 22, 200).unwrap();
        assert_eq!(t.lookup(&v6("2001:0600::")), 200);

        t.delete(&v6("2001:0400::"), 22).unwrap();
        assert_eq!(t.lookup(&v6("2001:0600::")), 100);
        // An address under the /20 but outside the deleted /22 was never
        // touched.
        assert_eq!(t.lookup(&v6("2001:0e00::")), 100);
    }
}
