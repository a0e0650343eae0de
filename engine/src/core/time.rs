//! Time management for a single run
//!
//! A run walks timesteps `0..horizon` strictly in order. This module owns the
//! step counter and answers the two questions the state machine asks every
//! step: "is this the first step?" and "is there a next step to advance into?".

use serde::{Deserialize, Serialize};

/// Manages simulation time in discrete timesteps
///
/// # Example
/// ```
/// use econ_model_engine::TimeManager;
///
/// let mut time = TimeManager::new(3, "year");
/// assert_eq!(time.current_step(), 0);
/// assert!(time.is_first_step());
///
/// time.advance_step();
/// time.advance_step();
/// assert_eq!(time.current_step(), 2);
/// assert!(time.is_final_step());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeManager {
    /// Current timestep index
    current_step: usize,
    /// Number of timesteps in the run (T)
    horizon: usize,
    /// Label of one timestep ("year", "quarter", ...)
    time_unit: String,
}

impl TimeManager {
    /// Create a new TimeManager positioned at t = 0
    ///
    /// # Panics
    /// Panics if `horizon` is zero. Horizons are validated at model load, so
    /// this only fires on a programming error.
    pub fn new(horizon: usize, time_unit: impl Into<String>) -> Self {
        assert!(horizon > 0, "horizon must be positive");
        Self {
            current_step: 0,
            horizon,
            time_unit: time_unit.into(),
        }
    }

    /// Advance time by one step
    pub fn advance_step(&mut self) {
        self.current_step += 1;
    }

    /// Current timestep index
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Total number of timesteps
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Unit label of one timestep
    pub fn time_unit(&self) -> &str {
        &self.time_unit
    }

    /// True at t = 0
    pub fn is_first_step(&self) -> bool {
        self.current_step == 0
    }

    /// True at t = T - 1 (no recurrence advance follows)
    pub fn is_final_step(&self) -> bool {
        self.current_step + 1 == self.horizon
    }

    /// True once every timestep has been visited
    pub fn is_exhausted(&self) -> bool {
        self.current_step >= self.horizon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "horizon must be positive")]
    fn test_zero_horizon_panics() {
        TimeManager::new(0, "year");
    }

    #[test]
    fn test_single_step_horizon_is_first_and_final() {
        let time = TimeManager::new(1, "month");
        assert!(time.is_first_step());
        assert!(time.is_final_step());
        assert!(!time.is_exhausted());
    }

    #[test]
    fn test_exhausted_after_last_step() {
        let mut time = TimeManager::new(2, "quarter");
        time.advance_step();
        assert!(time.is_final_step());
        time.advance_step();
        assert!(time.is_exhausted());
        assert_eq!(time.time_unit(), "quarter");
    }
}
