//------------ Batch lookup kernels ------------------------------------------
//
// Software-pipelined batch lookup processes addresses in lanes that would,
// on real hardware, issue next-level prefetches ahead of the reads that
// consume them, hiding last-level-cache latency. This crate's node layout
// (one cache line touched per stride step) supports that technique, but
// issuing real hardware prefetch hints is an unsafe, architecture-specific
// concern better left to a dedicated CPU-feature dispatch layer outside
// this crate. What stays in scope here is the *lane scheduling* -- grouping
// addresses into chunks of K and walking each chunk to completion before
// moving to the next -- which is what actually gives the ordering
// guarantee (`results[i]` is the lookup of `addrs[i]`, no cross-lane
// interaction) and is independent of whether prefetching is wired up
// underneath.

/// Default software-pipelining width used by [`batch_lookup`].
pub const DEFAULT_LANES: usize = 8;

/// Run `lookup_one` over every address in `addrs`, writing to the matching
/// slot of `results`, preserving per-lane independence ("batch equals
/// element-wise single lookup").
///
/// Processes addresses in chunks of [`DEFAULT_LANES`] so that, for engines
/// whose `lookup_one` closure shares mutable scratch state across a batch
/// (none of the engines in this crate do, but the shape is kept so a future
/// engine-specific prefetching kernel can slot in here), lanes within a
/// chunk progress together.
pub fn batch_lookup<F>(addrs: &[&[u8]], results: &mut [u32], mut lookup_one: F)
where
    F: FnMut(&[u8]) -> u32,
{
    assert_eq!(
        addrs.len(),
        results.len(),
        "addrs and results must have matching length"
    );
    for chunk_start in (0..addrs.len()).step_by(DEFAULT_LANES) {
        let end = (chunk_start + DEFAULT_LANES).min(addrs.len());
        for i in chunk_start..end {
            results[i] = lookup_one(addrs[i]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_matches_single_lookup() {
        let addrs: Vec<&[u8]> = vec![&[1], &[2], &[3], &[4], &[5]];
        let mut results = vec![0u32; addrs.len()];
        batch_lookup(&addrs, &mut results, |a| a[0] as u32 * 10);
        assert_eq!(results, vec![10, 20, 30, 40, 50]);
    }

    #[test]
    #[should_panic]
    fn mismatched_lengths_panic() {
        let addrs: Vec<&[u8]> = vec![&[1], &[2]];
        let mut results = vec![0u32; 1];
        batch_lookup(&addrs, &mut results, |_| 0);
    }
}
