//------------ Stride-8 multibit trie (E2, E4) -------------------------------
//
// A uniform 8-bit-stride trie generic over the address family: 4 levels for
// IPv4 (E2), 16 for IPv6 (E4). Every node is a 256-slot `Arena` node; a
// lookup is a branchless walk that tracks "latest VALID slot seen".

use std::collections::HashMap;
use std::marker::PhantomData;

use log::{debug, trace};

use crate::af::AddressFamily;
use crate::arena::Arena;
use crate::bits::{leaf_push_run, validate_byte_len, validate_prefix_len};
use crate::entry::{INVALID_NH, NULL_CHILD};
use crate::errors::{AddError, DeleteError};
use crate::stats::Stats;

const STRIDE: u8 = 8;
const WIDTH: usize = 256;

pub struct StrideTrie<AF: AddressFamily> {
    arena: Arena<WIDTH>,
    has_default: bool,
    default_nh: u32,
    num_prefixes: usize,
    /// Every live (prefix, len) -> next_hop rule, keyed by its masked
    /// address bytes. `delete` consults this to find the next
    /// less-specific rule a deleted entry was shadowing, since a slot's
    /// `owner_len` only remembers the current owner, not what it
    /// overwrote.
    rules: HashMap<(Vec<u8>, u8), u32>,
    _af: PhantomData<AF>,
}

impl<AF: AddressFamily> StrideTrie<AF> {
    pub fn new(initial_capacity: usize, growth_factor: usize) -> Self {
        debug!("creating stride-8 trie for a {}-bit address family", AF::BITS);
        StrideTrie {
            arena: Arena::new(initial_capacity, growth_factor),
            has_default: false,
            default_nh: INVALID_NH,
            num_prefixes: 0,
            rules: HashMap::new(),
            _af: PhantomData,
        }
    }

    /// Find the longest remaining rule that is a strict ancestor of
    /// `(address, len)` -- the value a slot should fall back to once the
    /// owner at `len` is deleted. Falls back to the default route, then
    /// to `None` (miss).
    fn find_ancestor(&self, address: AF, len: u8) -> Option<(u8, u32)> {
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
        if !validate_prefix_len(prefix_len, AF::BITS)
            || !validate_byte_len::<AF>(prefix_bytes)
        {
            return Err(AddError::BadPrefixLength);
        }
        if prefix_len == 0 {
            self.has_default = true;
            self.default_nh = next_hop;
            self.num_prefixes += 1;
            return Ok(());
        }

        let descents = (prefix_len / STRIDE) as usize;
        if self.arena.pool_used() + descents >= crate::entry::MAX_ARENA_INDEX
        {
            return Err(AddError::OutOfSpace);
        }

        let address = AF::from_be_bytes(prefix_bytes);
        let mut node_idx = self.arena.root_index();
        let mut depth = 0u8;
        loop {
            let remaining = prefix_len - depth;
            let byte = address.byte_at(depth) as u32;
            if remaining > STRIDE {
                let slot = &mut self.arena.node_mut(node_idx).slots[byte as usize];
                let mut child = slot.child();
                if child == NULL_CHILD {
                    child = self.arena.alloc().ok_or(AddError::OutOfSpace)?;
                    self.arena.node_mut(node_idx).slots[byte as usize]
                        .set_child(child);
                }
                node_idx = child;
                depth += STRIDE;
            } else {
                let run = leaf_push_run(byte, STRIDE, remaining);
                let node = self.arena.node_mut(node_idx);
                for i in run.base..run.base + run.count {
                    node.slots[i].set_next_hop(next_hop, prefix_len);
                }
                break;
            }
        }

        let masked = address.truncate_to_len(prefix_len).to_be_bytes();
        if self.rules.insert((masked, prefix_len), next_hop).is_none() {
            self.num_prefixes += 1;
        }
        trace!("added /{prefix_len} -> {next_hop}");
        Ok(())
    }

    pub fn delete(
        &mut self,
        prefix_bytes: &[u8],
        prefix_len: u8,
    ) -> Result<(), DeleteError> {
        if !validate_prefix_len(prefix_len, AF::BITS)
            || !validate_byte_len::<AF>(prefix_bytes)
        {
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

        let address = AF::from_be_bytes(prefix_bytes);
        let masked = address.truncate_to_len(prefix_len).to_be_bytes();
        if self.rules.remove(&(masked, prefix_len)).is_none() {
            return Err(DeleteError::NotFound);
        }

        // The rule being deleted may have been shadowing a less specific
        // one over part or all of its leaf-pushed run; restore it instead
        // of leaving those slots invalid.
        let fallback = self.find_ancestor(address, prefix_len);

        let mut node_idx = self.arena.root_index();
        let mut depth = 0u8;
        loop {
            let remaining = prefix_len - depth;
            let byte = address.byte_at(depth) as u32;
            if remaining > STRIDE {
                let child = self.arena.node(node_idx).slots[byte as usize].child();
                debug_assert!(child != NULL_CHILD, "registry confirmed this prefix exists");
                node_idx = child;
                depth += STRIDE;
            } else {
                let run = leaf_push_run(byte, STRIDE, remaining);
                let node = self.arena.node_mut(node_idx);
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
        let address = AF::from_be_bytes(addr_bytes);
        self.lookup_address(address)
    }

    #[inline]
    pub fn lookup_address(&self, address: AF) -> u32 {
        let mut node_idx = self.arena.root_index();
        let mut best = if self.has_default {
            self.default_nh
        } else {
            INVALID_NH
        };
        let mut depth = 0u8;
        while depth < AF::BITS {
            let byte = address.byte_at(depth) as usize;
            let slot = self.arena.node(node_idx).slots[byte];
            if slot.is_valid() {
                best = slot.next_hop;
            }
            let child = slot.child();
            if child == NULL_CHILD {
                break;
            }
            node_idx = child;
            depth += STRIDE;
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
            num_nodes: self.arena.pool_used(),
            bytes_used: self.arena.bytes_used(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::af::IPv4;

    #[test]
    fn single_host_route() {
        let mut t = StrideTrie::<IPv4>::new(4, 2);
        t.add(&[10, 1, 2, 3], 32, 400).unwrap();
        assert_eq!(t.lookup(&[10, 1, 2, 3]), 400);
        assert_eq!(t.lookup(&[10, 1, 2, 4]), INVALID_NH);
    }

    #[test]
    fn longest_match_within_one_stride() {
        let mut t = StrideTrie::<IPv4>::new(4, 2);
        t.add(&[10, 0, 0, 0], 8, 100).unwrap();
        t.add(&[10, 1, 0, 0], 16, 200).unwrap();
        assert_eq!(t.lookup(&[10, 2, 0, 0]), 100);
        assert_eq!(t.lookup(&[10, 1, 5, 5]), 200);
    }

    #[test]
    fn delete_restores_less_specific() {
        let mut t = StrideTrie::<IPv4>::new(4, 2);
        t.add(&[10, 0, 0, 0], 8, 100).unwrap();
        t.add(&[10, 1, 2, 3], 32, 400).unwrap();
        t.delete(&[10, 1, 2, 3], 32).unwrap();
        assert_eq!(t.lookup(&[10, 1, 2, 3]), 100);
        assert_eq!(
            t.delete(&[10, 1, 2, 3], 32),
            Err(DeleteError::NotFound)
        );
    }

    #[test]
    fn delete_restores_value_shadowed_within_same_stride() {
        // /20 and /22 both leaf-push into the same third-octet node.
        let mut t = StrideTrie::<IPv4>::new(4, 2);
        t.add(&[10, 1, 16, 0], 20, 100).unwrap();
        t.add(&[10, 1, 20, 0], 22, 200).unwrap();
        assert_eq!(t.lookup(&[10, 1, 20, 5]), 200);

        t.delete(&[10, 1, 20, 0], 22).unwrap();
        assert_eq!(t.lookup(&[10, 1, 20, 5]), 100);
        // Unrelated slots under the same /20 were never touched.
        assert_eq!(t.lookup(&[10, 1, 17, 5]), 100);
    }

    #[test]
    fn default_route() {
        let mut t = StrideTrie::<IPv4>::new(4, 2);
        t.add(&[0, 0, 0, 0], 0, 999).unwrap();
        t.add(&[10, 0, 0, 0], 8, 100).unwrap();
        assert_eq!(t.lookup(&[8, 8, 8, 8]), 999);
        assert_eq!(t.lookup(&[10, 1, 2, 3]), 100);
    }

    #[test]
    fn bad_prefix_len_rejected() {
        let mut t = StrideTrie::<IPv4>::new(4, 2);
        assert_eq!(
            t.add(&[0, 0, 0, 0], 33, 1),
            Err(AddError::BadPrefixLength)
        );
    }
}
