//! Per-run seed derivation
//!
//! Run `i` of a batch seeded with `s` uses `SHA-256(s_le || i_le)[0..8]`.
//! Batch `s` run 1 and batch `s + 1` run 0 therefore get unrelated streams.

use sha2::{Digest, Sha256};

/// Derive the seed for one Monte Carlo run
///
/// # Example
/// ```
/// use econ_model_engine::rng::derive_run_seed;
///
/// assert_eq!(derive_run_seed(42, 3), derive_run_seed(42, 3));
/// assert_ne!(derive_run_seed(42, 3), derive_run_seed(42, 4));
/// ```
pub fn derive_run_seed(base_seed: u64, run_index: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(base_seed.to_le_bytes());
    hasher.update(run_index.to_le_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}
