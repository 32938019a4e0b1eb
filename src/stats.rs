//------------ Types for statistics ------------------------------------------

/// Snapshot of a table's size, for tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    /// Number of prefixes currently held, including the default route.
    pub num_prefixes: usize,
    /// Number of nodes allocated in the arena (or, for E1, tbl8 groups).
    pub num_nodes: usize,
    /// Approximate bytes occupied by the table's backing storage.
    pub bytes_used: usize,
}
