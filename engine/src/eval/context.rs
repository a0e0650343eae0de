// Evaluation context
//
// Everything an expression may read at one timestep: the run's state, its
// parameter values, the function registry, and (in Monte Carlo mode) the
// run's random stream with the draw cache used during fixed-point passes.

use crate::eval::functions::FunctionRegistry;
use crate::models::SimulationState;
use crate::rng::RngManager;
use std::collections::{BTreeMap, HashMap};

/// Outcome of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Eval {
    Ready(f64),

    /// A read hit a slot that has not been computed yet
    NotReady { variable: String, step: usize },
}

/// Draws memoized per (owner, timestep, ordinal)
///
/// The owner is the equation index; the ordinal counts draw nodes in the
/// order one evaluation reaches them.
#[derive(Debug, Default)]
pub struct DrawCache {
    draws: HashMap<(usize, usize, usize), f64>,
}

impl DrawCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.draws.clear();
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub(crate) fn get_or_insert_with(
        &mut self,
        key: (usize, usize, usize),
        draw: impl FnOnce() -> f64,
    ) -> f64 {
        *self.draws.entry(key).or_insert_with(draw)
    }
}

/// Read-only view of a run at one timestep, plus its random stream
pub struct EvalContext<'a> {
    pub(crate) state: &'a SimulationState,
    pub(crate) parameters: &'a BTreeMap<String, f64>,
    pub(crate) functions: &'a dyn FunctionRegistry,
    pub(crate) step: usize,
    pub(crate) stream: Option<&'a mut RngManager>,
    pub(crate) draw_cache: Option<(&'a mut DrawCache, usize)>,
    pub(crate) ordinal: usize,
}

impl<'a> EvalContext<'a> {
    /// Context with no random stream: draw nodes yield central values
    pub fn new(
        state: &'a SimulationState,
        parameters: &'a BTreeMap<String, f64>,
        functions: &'a dyn FunctionRegistry,
        step: usize,
    ) -> Self {
        Self {
            state,
            parameters,
            functions,
            step,
            stream: None,
            draw_cache: None,
            ordinal: 0,
        }
    }

    /// Attach the run's stream (`None` keeps deterministic mode)
    pub fn with_stream(mut self, stream: Option<&'a mut RngManager>) -> Self {
        self.stream = stream;
        self
    }

    /// Memoize draws under `owner` so re-evaluation reuses them
    pub fn with_draw_cache(mut self, cache: &'a mut DrawCache, owner: usize) -> Self {
        self.draw_cache = Some((cache, owner));
        self
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn state(&self) -> &SimulationState {
        self.state
    }
}
