// Equation organizer
//
// Builds the variable → category → equation lookup once per model load.
// Structural problems (duplicates, missing initial conditions, conflicting
// categories) are collected as validation errors; equations whose target is
// not a usable variable are skipped with a diagnostic instead.
//
// The same pass orders each timestep's equations by their same-step reads.
// Strongly connected components of that graph become `Block::Cycle`s, the
// only places where fixed-point iteration runs.

use crate::equations::validation::ValidationError;
use crate::models::{EquationCategory, Expr, Model, SourceLocation, TimeIndex, TIME_VARIABLE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// Equation skipped at load time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadDiagnostic {
    /// Position in the model's equation list
    pub equation: usize,
    pub target: String,
    pub category: EquationCategory,
    pub location: Option<SourceLocation>,
    pub reason: String,
}

/// Unit of work in a timestep's evaluation schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Equation outside every same-step cycle; evaluated once
    Single(usize),

    /// Equations reading each other at the same step, in declaration order;
    /// iterated to a fixed point
    Cycle(Vec<usize>),
}

impl Block {
    pub fn positions(&self) -> &[usize] {
        match self {
            Block::Single(position) => std::slice::from_ref(position),
            Block::Cycle(positions) => positions,
        }
    }
}

/// Lookup from variables to their defining equations
///
/// Equation references are positions in `Model::equations`; every list is
/// kept in declaration order.
#[derive(Debug, Clone, Default)]
pub struct EquationIndex {
    /// Model variables in order of first definition
    variables: Vec<String>,

    by_variable: BTreeMap<String, BTreeMap<EquationCategory, usize>>,

    initial: Vec<usize>,
    current: Vec<usize>,
    recurrence: Vec<usize>,
    direct: Vec<usize>,

    /// Evaluation order at t = 0, Initial equations included
    first_schedule: Vec<Block>,

    /// Evaluation order at every later step
    schedule: Vec<Block>,

    diagnostics: Vec<LoadDiagnostic>,
}

fn malformed_reason(target: &str, parameters: &HashSet<&str>) -> Option<&'static str> {
    if target.trim().is_empty() {
        Some("target name is empty")
    } else if target == TIME_VARIABLE {
        Some("target is the reserved time variable")
    } else if parameters.contains(target) {
        Some("target names a parameter")
    } else {
        None
    }
}

/// Whether a read at `index` can land on the step being evaluated
///
/// Absolute indices past 0 are assumed to, since they match exactly one
/// later step.
fn touches_current(index: TimeIndex, first_step: bool) -> bool {
    match index {
        TimeIndex::Relative { offset } => offset >= 0,
        TimeIndex::Absolute { step } => (step == 0) == first_step,
    }
}

/// Variables `expression` may read at the step being evaluated
fn same_step_reads<'a>(expression: &'a Expr, first_step: bool) -> Vec<&'a str> {
    let mut reads = Vec::new();
    expression.walk(&mut |node: &'a Expr| match node {
        Expr::VariableRef { name } => reads.push(name.as_str()),
        Expr::Indexing { variable, index } if touches_current(*index, first_step) => {
            reads.push(variable.as_str())
        }
        Expr::Aggregation {
            variable, from, to, ..
        } if touches_current(*from, first_step) || touches_current(*to, first_step) => {
            reads.push(variable.as_str())
        }
        _ => {}
    });
    reads
}

/// Tarjan's strongly connected components, iteratively
///
/// `reads[i]` lists the nodes node `i` depends on.
fn strongly_connected(reads: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;

    let mut visit_order = vec![UNVISITED; reads.len()];
    let mut low_link = vec![0; reads.len()];
    let mut on_stack = vec![false; reads.len()];
    let mut stack = Vec::new();
    let mut components = Vec::new();
    let mut counter = 0;

    for root in 0..reads.len() {
        if visit_order[root] != UNVISITED {
            continue;
        }
        visit_order[root] = counter;
        low_link[root] = counter;
        counter += 1;
        stack.push(root);
        on_stack[root] = true;

        // (node, next edge to follow)
        let mut frames = vec![(root, 0usize)];
        while let Some(frame) = frames.last_mut() {
            let node = frame.0;
            if let Some(&next) = reads[node].get(frame.1) {
                frame.1 += 1;
                if visit_order[next] == UNVISITED {
                    visit_order[next] = counter;
                    low_link[next] = counter;
                    counter += 1;
                    stack.push(next);
                    on_stack[next] = true;
                    frames.push((next, 0));
                } else if on_stack[next] {
                    low_link[node] = low_link[node].min(visit_order[next]);
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                low_link[parent] = low_link[parent].min(low_link[node]);
            }
            if low_link[node] == visit_order[node] {
                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }

    components
}

/// Order `positions` so every equation follows the equations it reads
///
/// Independent blocks keep declaration order.
fn order(model: &Model, positions: Vec<usize>, first_step: bool) -> Vec<Block> {
    let mut definer: HashMap<&str, usize> = HashMap::new();
    for (node, &position) in positions.iter().enumerate() {
        definer
            .entry(model.equations[position].target.as_str())
            .or_insert(node);
    }

    let reads: Vec<Vec<usize>> = positions
        .iter()
        .map(|&position| {
            let mut deps: Vec<usize> =
                same_step_reads(&model.equations[position].expression, first_step)
                    .into_iter()
                    .filter_map(|name| definer.get(name).copied())
                    .collect();
            deps.sort_unstable();
            deps.dedup();
            deps
        })
        .collect();

    let components = strongly_connected(&reads);
    let mut component_of = vec![0; positions.len()];
    for (id, members) in components.iter().enumerate() {
        for &node in members {
            component_of[node] = id;
        }
    }

    let mut readers: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); components.len()];
    let mut pending = vec![0usize; components.len()];
    for (node, deps) in reads.iter().enumerate() {
        for &dep in deps {
            let (from, to) = (component_of[dep], component_of[node]);
            if from != to && readers[from].insert(to) {
                pending[to] += 1;
            }
        }
    }

    let first_position = |id: usize| {
        components[id]
            .iter()
            .map(|&node| positions[node])
            .min()
            .unwrap_or(usize::MAX)
    };
    let mut ready: BTreeSet<(usize, usize)> = (0..components.len())
        .filter(|&id| pending[id] == 0)
        .map(|id| (first_position(id), id))
        .collect();

    let mut blocks = Vec::with_capacity(components.len());
    while let Some((_, id)) = ready.pop_first() {
        let mut members: Vec<usize> = components[id].iter().map(|&node| positions[node]).collect();
        members.sort_unstable();

        let node = components[id][0];
        if members.len() == 1 && !reads[node].contains(&node) {
            blocks.push(Block::Single(members[0]));
        } else {
            blocks.push(Block::Cycle(members));
        }

        for &reader in &readers[id] {
            pending[reader] -= 1;
            if pending[reader] == 0 {
                ready.insert((first_position(reader), reader));
            }
        }
    }

    blocks
}

impl EquationIndex {
    /// Organize `model`'s equations
    ///
    /// Always returns the index built from the usable equations together with
    /// every structural error found.
    pub fn build(model: &Model) -> (Self, Vec<ValidationError>) {
        let parameters: HashSet<&str> = model.parameters.iter().map(|p| p.name.as_str()).collect();
        let mut index = EquationIndex::default();
        let mut errors = Vec::new();

        for (position, equation) in model.equations.iter().enumerate() {
            if let Some(reason) = malformed_reason(&equation.target, &parameters) {
                warn!(
                    equation = position,
                    target = %equation.target,
                    reason,
                    "Skipping equation with unresolvable target"
                );
                index.diagnostics.push(LoadDiagnostic {
                    equation: position,
                    target: equation.target.clone(),
                    category: equation.category,
                    location: equation.location.clone(),
                    reason: reason.to_string(),
                });
                continue;
            }

            let categories = index.by_variable.entry(equation.target.clone()).or_default();
            if categories.is_empty() {
                index.variables.push(equation.target.clone());
            }
            if categories.contains_key(&equation.category) {
                errors.push(ValidationError::DuplicateEquation {
                    variable: equation.target.clone(),
                    category: equation.category,
                    location: equation.describe(),
                });
                continue;
            }
            categories.insert(equation.category, position);

            match equation.category {
                EquationCategory::Initial => index.initial.push(position),
                EquationCategory::Current => index.current.push(position),
                EquationCategory::Recurrence => index.recurrence.push(position),
                EquationCategory::Direct => index.direct.push(position),
            }
        }

        for (variable, categories) in &index.by_variable {
            let has = |category| categories.contains_key(&category);

            if has(EquationCategory::Direct) {
                for other in [
                    EquationCategory::Initial,
                    EquationCategory::Current,
                    EquationCategory::Recurrence,
                ] {
                    if has(other) {
                        errors.push(ValidationError::ConflictingDefinitions {
                            variable: variable.clone(),
                            first: EquationCategory::Direct,
                            second: other,
                        });
                    }
                }
            }
            if has(EquationCategory::Current) && has(EquationCategory::Recurrence) {
                errors.push(ValidationError::ConflictingDefinitions {
                    variable: variable.clone(),
                    first: EquationCategory::Current,
                    second: EquationCategory::Recurrence,
                });
            }
            if has(EquationCategory::Recurrence) && !has(EquationCategory::Initial) {
                errors.push(ValidationError::MissingInitialCondition {
                    variable: variable.clone(),
                });
            }
        }

        let first: Vec<usize> = index
            .current
            .iter()
            .copied()
            .filter(|&position| !index.has_initial(&model.equations[position].target))
            .chain(index.initial.iter().copied())
            .chain(index.direct.iter().copied())
            .collect();
        let later: Vec<usize> = index.current.iter().chain(&index.direct).copied().collect();
        index.first_schedule = order(model, first, true);
        index.schedule = order(model, later, false);
        debug!(
            equations = model.equations.len(),
            cycles = index
                .schedule
                .iter()
                .filter(|block| matches!(block, Block::Cycle(_)))
                .count(),
            "Equation schedule built"
        );

        (index, errors)
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.by_variable.contains_key(name)
    }

    /// Equation defining `variable` in `category`, if any
    pub fn equation_for(&self, variable: &str, category: EquationCategory) -> Option<usize> {
        self.by_variable.get(variable)?.get(&category).copied()
    }

    pub fn has_initial(&self, variable: &str) -> bool {
        self.equation_for(variable, EquationCategory::Initial).is_some()
    }

    pub fn initial(&self) -> &[usize] {
        &self.initial
    }

    pub fn recurrence(&self) -> &[usize] {
        &self.recurrence
    }

    /// Evaluation schedule at `step`
    ///
    /// At t = 0 this covers Initial, Direct and Current equations of
    /// variables without an Initial; later steps cover Current and Direct.
    /// Dependencies always precede their readers.
    pub fn schedule(&self, step: usize) -> &[Block] {
        if step == 0 {
            &self.first_schedule
        } else {
            &self.schedule
        }
    }

    /// Equations skipped at load time
    pub fn diagnostics(&self) -> &[LoadDiagnostic] {
        &self.diagnostics
    }

    /// Positions of every retained equation, in declaration order
    pub fn retained(&self) -> Vec<usize> {
        let mut all: Vec<usize> = self
            .initial
            .iter()
            .chain(&self.current)
            .chain(&self.recurrence)
            .chain(&self.direct)
            .copied()
            .collect();
        all.sort_unstable();
        all
    }
}
