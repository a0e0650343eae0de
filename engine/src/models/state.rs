//! Simulation State
//!
//! Per-run mutable storage: one time series per model variable. A slot stays
//! `None` until an equation or policy writes it, which is how the evaluator
//! tells "not computed yet" apart from a computed zero.
//!
//! # Critical Invariants
//!
//! 1. **Fixed variable set**: the variable list is decided at model load and
//!    never grows during a run
//! 2. **Bounded series**: every series has exactly `horizon` slots
//! 3. **Fresh per run**: a state is never shared between runs

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors raised by state access
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Timestep {step} outside horizon {horizon} for variable '{variable}'")]
    StepOutOfRange {
        variable: String,
        step: usize,
        horizon: usize,
    },
}

/// Time-indexed values of every model variable for one run
///
/// # Example
///
/// ```rust
/// use econ_model_engine::SimulationState;
///
/// let mut state = SimulationState::new(&["revenue".to_string()], 3);
/// assert_eq!(state.value("revenue", 0).unwrap(), None);
///
/// state.set("revenue", 0, 1000.0).unwrap();
/// assert_eq!(state.value("revenue", 0).unwrap(), Some(1000.0));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationState {
    /// Variable names in declaration order
    variables: Vec<String>,

    /// Name → position in `series`
    index: HashMap<String, usize>,

    /// One series per variable, `horizon` slots each
    series: Vec<Vec<Option<f64>>>,

    horizon: usize,
}

impl SimulationState {
    /// Create an empty state for the given variables
    pub fn new(variables: &[String], horizon: usize) -> Self {
        let index = variables
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        Self {
            variables: variables.to_vec(),
            index,
            series: vec![vec![None; horizon]; variables.len()],
            horizon,
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    fn slot(&self, name: &str, step: usize) -> Result<usize, StateError> {
        let position = *self
            .index
            .get(name)
            .ok_or_else(|| StateError::UnknownVariable(name.to_string()))?;

        if step >= self.horizon {
            return Err(StateError::StepOutOfRange {
                variable: name.to_string(),
                step,
                horizon: self.horizon,
            });
        }
        Ok(position)
    }

    /// Value of `name` at `step`; `Ok(None)` when not computed yet
    pub fn value(&self, name: &str, step: usize) -> Result<Option<f64>, StateError> {
        let position = self.slot(name, step)?;
        Ok(self.series[position][step])
    }

    /// Write `name` at `step`
    pub fn set(&mut self, name: &str, step: usize, value: f64) -> Result<(), StateError> {
        let position = self.slot(name, step)?;
        self.series[position][step] = Some(value);
        Ok(())
    }

    /// Reset `name` at `step` to "not computed"
    pub fn clear(&mut self, name: &str, step: usize) -> Result<(), StateError> {
        let position = self.slot(name, step)?;
        self.series[position][step] = None;
        Ok(())
    }

    /// Latest step holding any value, across all variables
    pub fn last_populated_step(&self) -> Option<usize> {
        self.series
            .iter()
            .filter_map(|values| values.iter().rposition(Option::is_some))
            .max()
    }

    /// Consume the state into an ordered name → series map
    pub fn into_series(self) -> BTreeMap<String, Vec<Option<f64>>> {
        self.variables.into_iter().zip(self.series).collect()
    }
}
