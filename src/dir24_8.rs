//------------ DIR-24-8 table (E1) -------------------------------------------
//
// Two-level IPv4 scheme: a flat 16,777,216-entry `tbl24` indexed by the top
// 24 bits of the address, and a bump-allocated pool of 256-entry `tbl8`
// extension groups for prefixes longer than /24.

use std::collections::HashMap;

use log::{debug, trace};

use crate::entry::INVALID_NH;
use crate::errors::{AddError, DeleteError};
use crate::stats::Stats;

const TBL24_SIZE: usize = 1 << 24;
const TBL8_WIDTH: usize = 256;

/// `tbl24` entry layout: bit 31 is `EXT_FLAG`. If clear, bit 30 is `VALID`
/// and bits 0..29 hold a next-hop. If set, bits 0..23 hold a tbl8 group
/// index (group 0 is reserved/null, matching the arena convention elsewhere
/// in this crate).
const EXT_FLAG: u32 = 1 << 31;
const TBL24_VALID: u32 = 1 << 30;
const TBL24_NH_MASK: u32 = 0x3FFF_FFFF;
const GROUP_MASK: u32 = 0x00FF_FFFF;

/// `tbl8` entry layout: bit 31 is `VALID`; bits 0..30 hold a next-hop.
const TBL8_VALID: u32 = 1 << 31;
const TBL8_NH_MASK: u32 = 0x7FFF_FFFF;

/// Mask `addr`'s bits beyond `len` to zero, giving a canonical key for the
/// live-rule registry regardless of what the caller left in the low bits.
fn mask_v4(addr: u32, len: u8) -> u32 {
    match len {
        0 => 0,
        1..=31 => (addr >> (32 - len as u32)) << (32 - len as u32),
        32 => addr,
        _ => unreachable!("prefix_len already validated <= 32"),
    }
}

pub struct Dir24_8Table {
    tbl24: Vec<u32>,
    tbl24_owner: Vec<u8>,
    tbl8: Vec<u32>,
    tbl8_owner: Vec<u8>,
    tbl8_groups_used: usize,
    has_default: bool,
    default_nh: u32,
    num_prefixes: usize,
    growth_factor: usize,
    /// Every live (prefix, len) -> next_hop rule, keyed by its masked
    /// address. `delete` consults this to find the next less-specific
    /// rule a deleted entry was shadowing, since `tbl24`/`tbl8` only ever
    /// remember the current owner of a slot, not what it overwrote.
    rules: HashMap<(u32, u8), u32>,
}

impl Dir24_8Table {
    pub fn new(initial_tbl8_groups: usize, growth_factor: usize) -> Self {
        debug!("creating DIR-24-8 table, tbl24 has {TBL24_SIZE} entries");
        let mut tbl8 = Vec::with_capacity(initial_tbl8_groups.max(1) * TBL8_WIDTH);
        let mut tbl8_owner = Vec::with_capacity(tbl8.capacity());
        // group 0 is reserved/null, matching the null-index convention.
        tbl8.extend(std::iter::repeat(0u32).take(TBL8_WIDTH));
        tbl8_owner.extend(std::iter::repeat(0u8).take(TBL8_WIDTH));
        Dir24_8Table {
            tbl24: vec![0u32; TBL24_SIZE],
            tbl24_owner: vec![0u8; TBL24_SIZE],
            tbl8,
            tbl8_owner,
            tbl8_groups_used: 1,
            has_default: false,
            default_nh: INVALID_NH,
            num_prefixes: 0,
            growth_factor: growth_factor.max(2),
            rules: HashMap::new(),
        }
    }

    fn alloc_group(&mut self) -> Option<usize> {
        if self.tbl8_groups_used >= GROUP_MASK as usize {
            return None;
        }
        let group = self.tbl8_groups_used;
        self.tbl8_groups_used += 1;
        if self.tbl8.len() + TBL8_WIDTH > self.tbl8.capacity() {
            let target = self.tbl8.capacity().max(TBL8_WIDTH) * self.growth_factor;
            self.tbl8.reserve(target.saturating_sub(self.tbl8.capacity()));
            self.tbl8_owner
                .reserve(target.saturating_sub(self.tbl8_owner.capacity()));
        }
        self.tbl8.extend(std::iter::repeat(0u32).take(TBL8_WIDTH));
        self.tbl8_owner
            .extend(std::iter::repeat(0u8).take(TBL8_WIDTH));
        trace!("allocated tbl8 group {group}");
        Some(group)
    }

    /// Find the longest remaining rule that is a strict ancestor of
    /// `(addr, len)`, i.e. the value that should take over a slot once the
    /// owner at `len` is deleted. Falls back to the default route, then to
    /// `None` (miss).
    fn find_ancestor(&self, addr: u32, len: u8) -> Option<(u8, u32)> {
        for k in (1..len).rev() {
            let candidate = mask_v4(addr, k);
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

    fn restore_tbl24_slot(&mut self, i: usize, owner_len: u8, fallback: Option<(u8, u32)>) {
        if self.tbl24_owner[i] != owner_len {
            return;
        }
        match fallback {
            Some((len, nh)) => {
                self.tbl24[i] = TBL24_VALID | (nh & TBL24_NH_MASK);
                self.tbl24_owner[i] = len;
            }
            None => {
                self.tbl24[i] = 0;
                self.tbl24_owner[i] = 0;
            }
        }
    }

    fn restore_tbl8_range(
        &mut self,
        base: usize,
        count: usize,
        owner_len: u8,
        fallback: Option<(u8, u32)>,
    ) {
        for i in base..base + count {
            if self.tbl8_owner[i] != owner_len {
                continue;
            }
            match fallback {
                Some((len, nh)) => {
                    self.tbl8[i] = TBL8_VALID | (nh & TBL8_NH_MASK);
                    self.tbl8_owner[i] = len;
                }
                None => {
                    self.tbl8[i] = 0;
                    self.tbl8_owner[i] = 0;
                }
            }
        }
    }

    pub fn add(
        &mut self,
        prefix_bytes: &[u8],
        prefix_len: u8,
        next_hop: u32,
    ) -> Result<(), AddError> {
        if prefix_len > 32 || prefix_bytes.len() != 4 {
            return Err(AddError::BadPrefixLength);
        }
        if prefix_len == 0 {
            self.has_default = true;
            self.default_nh = next_hop;
            self.num_prefixes += 1;
            return Ok(());
        }

        let addr = u32::from_be_bytes(prefix_bytes.try_into().unwrap());

        if prefix_len <= 24 {
            let shift = 24 - prefix_len;
            let base = ((addr >> 8) & (!0u32 << shift)) as usize;
            let count = 1usize << shift;
            for i in base..base + count {
                if self.tbl24[i] & EXT_FLAG == 0 {
                    let owned_by_longer =
                        self.tbl24[i] & TBL24_VALID != 0 && self.tbl24_owner[i] > prefix_len;
                    if !owned_by_longer {
                        self.tbl24[i] = TBL24_VALID | (next_hop & TBL24_NH_MASK);
                        self.tbl24_owner[i] = prefix_len;
                    }
                } else {
                    let group = (self.tbl24[i] & GROUP_MASK) as usize;
                    self.propagate_into_group(group, next_hop, prefix_len);
                }
            }
        } else {
            let top24 = (addr >> 8) as usize;
            let group = if self.tbl24[top24] & EXT_FLAG == 0 {
                let migrated_valid = self.tbl24[top24] & TBL24_VALID != 0;
                let migrated_nh = self.tbl24[top24] & TBL24_NH_MASK;
                let migrated_owner = self.tbl24_owner[top24];
                let group = self.alloc_group().ok_or(AddError::OutOfSpace)?;
                if migrated_valid {
                    let base = group * TBL8_WIDTH;
                    for i in 0..TBL8_WIDTH {
                        self.tbl8[base + i] = TBL8_VALID | migrated_nh;
                        self.tbl8_owner[base + i] = migrated_owner;
                    }
                }
                self.tbl24[top24] = EXT_FLAG | group as u32;
                group
            } else {
                (self.tbl24[top24] & GROUP_MASK) as usize
            };
            let low8 = addr & 0xFF;
            let shift = 32 - prefix_len;
            let base = group * TBL8_WIDTH + ((low8 & (!0u32 << shift)) as usize);
            let count = 1usize << shift;
            for i in base..base + count {
                let owned_by_longer =
                    self.tbl8[i] & TBL8_VALID != 0 && self.tbl8_owner[i] > prefix_len;
                if !owned_by_longer {
                    self.tbl8[i] = TBL8_VALID | (next_hop & TBL8_NH_MASK);
                    self.tbl8_owner[i] = prefix_len;
                }
            }
        }

        let masked = mask_v4(addr, prefix_len);
        if self.rules.insert((masked, prefix_len), next_hop).is_none() {
            self.num_prefixes += 1;
        }
        Ok(())
    }

    fn propagate_into_group(&mut self, group: usize, next_hop: u32, prefix_len: u8) {
        let base = group * TBL8_WIDTH;
        for i in base..base + TBL8_WIDTH {
            let owned_by_longer =
                self.tbl8[i] & TBL8_VALID != 0 && self.tbl8_owner[i] > prefix_len;
            if !owned_by_longer {
                self.tbl8[i] = TBL8_VALID | (next_hop & TBL8_NH_MASK);
                self.tbl8_owner[i] = prefix_len;
            }
        }
    }

    pub fn delete(
        &mut self,
        prefix_bytes: &[u8],
        prefix_len: u8,
    ) -> Result<(), DeleteError> {
        if prefix_len > 32 || prefix_bytes.len() != 4 {
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

        let addr = u32::from_be_bytes(prefix_bytes.try_into().unwrap());
        let masked = mask_v4(addr, prefix_len);
        if self.rules.remove(&(masked, prefix_len)).is_none() {
            return Err(DeleteError::NotFound);
        }

        // The slot(s) this rule owns must fall back to whatever
        // less-specific rule it was shadowing, not to a miss.
        let fallback = self.find_ancestor(addr, prefix_len);

        if prefix_len <= 24 {
            let shift = 24 - prefix_len;
            let base = ((addr >> 8) & (!0u32 << shift)) as usize;
            let count = 1usize << shift;
            for i in base..base + count {
                if self.tbl24[i] & EXT_FLAG == 0 {
                    self.restore_tbl24_slot(i, prefix_len, fallback);
                } else {
                    // This /24 (or shorter) block was migrated to a tbl8
                    // group by some more specific prefix under it; only
                    // the sub-range this rule still owns gets restored.
                    let group = (self.tbl24[i] & GROUP_MASK) as usize;
                    self.restore_tbl8_range(group * TBL8_WIDTH, TBL8_WIDTH, prefix_len, fallback);
                }
            }
        } else {
            let top24 = (addr >> 8) as usize;
            debug_assert!(
                self.tbl24[top24] & EXT_FLAG != 0,
                "a >24-bit rule in the registry implies its /24 is already extended"
            );
            let group = (self.tbl24[top24] & GROUP_MASK) as usize;
            let low8 = addr & 0xFF;
            let shift = 32 - prefix_len;
            let base = group * TBL8_WIDTH + ((low8 & (!0u32 << shift)) as usize);
            let count = 1usize << shift;
            self.restore_tbl8_range(base, count, prefix_len, fallback);
        }
        self.num_prefixes -= 1;
        Ok(())
    }

    #[inline]
    pub fn lookup(&self, addr_bytes: &[u8]) -> u32 {
        let addr = u32::from_be_bytes(addr_bytes.try_into().unwrap());
        self.lookup_u32(addr)
    }

    #[inline]
    pub fn lookup_u32(&self, addr: u32) -> u32 {
        let top24 = (addr >> 8) as usize;
        let entry = self.tbl24[top24];
        if entry & EXT_FLAG == 0 {
            if entry & TBL24_VALID != 0 {
                return entry & TBL24_NH_MASK;
            }
        } else {
            let group = (entry & GROUP_MASK) as usize;
            let low8 = (addr & 0xFF) as usize;
            let slot = self.tbl8[group * TBL8_WIDTH + low8];
            if slot & TBL8_VALID != 0 {
                return slot & TBL8_NH_MASK;
            }
        }
        if self.has_default {
            self.default_nh
        } else {
            INVALID_NH
        }
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
            num_nodes: self.tbl8_groups_used,
            bytes_used: self.tbl24.len() * std::mem::size_of::<u32>()
                + self.tbl24_owner.len()
                + self.tbl8.len() * std::mem::size_of::<u32>()
                + self.tbl8_owner.len(),
        }
    }
}
