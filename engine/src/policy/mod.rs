//! Policy execution
//!
//! Trigger-action rules run after constraint checking at every timestep
//! that did not halt.
//!
//! # Critical Invariants
//!
//! 1. **Declaration order**: policies execute in declaration-index order,
//!    actions in list order
//! 2. **Immediate visibility**: each mutation is seen by every later action
//!    and policy in the same timestep
//! 3. **Audited**: every applied action is recorded with its before/after
//!    values

pub mod actions;
pub mod engine;

pub use actions::{apply_action, PolicyEnv, PolicyError};
pub use engine::PolicyEngine;
