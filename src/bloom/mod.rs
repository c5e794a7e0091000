//! Probabilistic membership filter used by each [`Run`](crate::run::Run) to
//! short-circuit point lookups that cannot possibly hit.
//!
//! Sizing is expressed in bits-per-entry rather than a target false-positive
//! rate, since that is the tunable callers reason about; we convert between
//! the two via the standard relation for the optimal number of hash functions,
//! `p ≈ 0.6185^(bits_per_entry)`, and hand the actual bit-twiddling off to
//! the `bloomfilter` crate, which we treat as an opaque hashing oracle.


use bloomfilter::Bloom;

use crate::types::Key;

/// A sized, deterministic Bloom filter over [`Key`]s.
///
/// Construction never fails outwardly: if the underlying crate rejects the
/// derived false-positive rate (possible only at the degenerate extremes of
/// `entries` or `bits_per_entry`), the filter degrades to "always maybe
/// present", which preserves soundness (no false negatives) at the cost of
/// the early-out it would otherwise provide.
#[derive(Debug)]
pub struct BloomFilter {
    inner: Option<Bloom<Key>>,
}

impl BloomFilter {
    pub fn new(entries: usize, bits_per_entry: f64) -> Self {
        let entries = entries.max(1);
        let fp_rate = fp_rate_for_bits_per_entry(bits_per_entry);
        let inner = Bloom::new_for_fp_rate(entries, fp_rate).ok();
        Self { inner }
    }

    pub fn set(&mut self, key: Key) {
        if let Some(bloom) = &mut self.inner {
            bloom.set(&key);
        }
    }

    /// Returns `false` only if `key` was never [`set`](Self::set).
    pub fn is_set(&self, key: Key) -> bool {
        match &self.inner {
            Some(bloom) => bloom.check(&key),
            None => true,
        }
    }
}

fn fp_rate_for_bits_per_entry(bits_per_entry: f64) -> f64 {
    const OPTIMAL_BASE: f64 = 0.6185;
    let bits_per_entry = bits_per_entry.max(0.01);
    OPTIMAL_BASE.powf(bits_per_entry).clamp(1e-6, 0.5)
}
