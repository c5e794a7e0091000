//! Tunables for [`crate::tree::LsmTree`].
//!
//! Loading these from a file or environment is outside this crate's scope;
//! callers construct a [`LsmTreeConfig`] directly, overriding defaults with
//! struct-update syntax as needed.

/// Construction parameters for an [`LsmTree`](crate::tree::LsmTree).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LsmTreeConfig {
    /// Maximum number of distinct keys the in-memory buffer holds before it
    /// is flushed to a new level-0 run.
    pub buffer_max_entries: usize,

    /// Number of levels in the run hierarchy.
    pub depth: usize,

    /// Per-level run-count cap and the capacity multiplier between adjacent
    /// levels (level `i` holds runs of up to `buffer_max_entries * fanout^i`
    /// entries).
    pub fanout: usize,

    /// Size of the worker pool used for parallel `get`/`range` search.
    pub thread_count: usize,

    /// Bits of Bloom filter bitmap allocated per entry in a run.
    pub bf_bits_per_entry: f64,
}

impl Default for LsmTreeConfig {
    fn default() -> Self {
        Self {
            buffer_max_entries: 1000,
            depth: 5,
            fanout: 10,
            thread_count: 4,
            bf_bits_per_entry: 0.5,
        }
    }
}
