//! Deterministic random number generation
//!
//! Uses xorshift64* for per-run streams. Run seeds are derived from the batch
//! seed and the run index (see [`derive_run_seed`]), so every Monte Carlo run
//! owns an isolated, reproducible stream.
//! CRITICAL: All randomness in the engine MUST go through this module.

mod seed;
mod xorshift;

pub use seed::derive_run_seed;
pub use xorshift::RngManager;
