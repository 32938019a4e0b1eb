//------------ TableConfig ---------------------------------------------------

/// Sizing knobs for a table's node arena(s).
///
/// Passed to every `create_*` constructor. The DIR-24-8 table (E1) ignores
/// `initial_capacity`/`growth_factor` for its flat 16 M-entry `tbl24` (which
/// is fixed size by design) but still uses them to size and grow its `tbl8`
/// extension-group pool. The trie-based engines (E2-E4) use both to size
/// and grow their node arenas.
#[derive(Debug, Clone, Copy)]
pub struct TableConfig {
    /// Number of arena nodes to pre-allocate at `create` time.
    pub initial_capacity: usize,
    /// Factor the arena's backing storage grows by when exhausted.
    pub growth_factor: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 256,
            growth_factor: 2,
        }
    }
}
