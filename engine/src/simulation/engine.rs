//! Time-Step Simulator
//!
//! Drives one run through the model's horizon.
//!
//! # Architecture
//!
//! ```text
//! For each timestep t:
//! 1. Initializing (t = 0 only): evaluate Initial equations
//! 2. Evaluating: Current/Direct equations in dependency order, with
//!    fixed-point iteration inside same-step cycles
//! 3. ConstraintChecking: fatal violation halts the run
//! 4. PolicyExecuting: triggers and actions in declaration order
//! 5. Advancing (t < T-1): Recurrence equations populate t+1
//! ```
//!
//! Evaluation faults never escape a run: they become a `RunFailure` on the
//! run's result with status `Failed`.

use crate::constraint::{self, ConstraintOutcome};
use crate::core::time::TimeManager;
use crate::equations::{Block, EquationIndex};
use crate::eval::{evaluate, DrawCache, Eval, EvalContext, EvalError, FunctionRegistry};
use crate::models::{
    ConstraintViolation, EquationCategory, Model, PolicyExecution, RunFailure, RunResult, RunStatus, RunWarning,
    Severity, SimulationPhase, SimulationState, StateError,
};
use crate::policy::{PolicyEngine, PolicyEnv, PolicyError};
use crate::rng::RngManager;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

// ============================================================================
// Settings & Cancellation
// ============================================================================

/// Per-run iteration settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationSettings {
    /// Fixed-point pass budget per timestep
    pub max_iterations: usize,

    /// Relative tolerance (absolute below magnitude 1) for "value changed"
    pub convergence_tolerance: f64,

    /// Fail the run instead of warning on non-convergence
    pub strict_convergence: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_tolerance: 1e-9,
            strict_convergence: false,
        }
    }
}

/// Shared flag asking in-flight runs to stop
///
/// Runs check it between timesteps; a cancelled run is discarded.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Faults that stop a run
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Equation {equation} failed at t={step}: {source}")]
    Equation {
        equation: String,
        step: usize,
        #[source]
        source: EvalError,
    },

    #[error("Constraint '{constraint}' failed at t={step}: {source}")]
    Constraint {
        constraint: String,
        step: usize,
        #[source]
        source: EvalError,
    },

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("No convergence at t={step} after {iterations} passes: {}", .unresolved.join(", "))]
    NonConvergence {
        step: usize,
        iterations: usize,
        unresolved: Vec<String>,
    },

    #[error(transparent)]
    State(#[from] StateError),
}

// ============================================================================
// Run Context
// ============================================================================

/// Mutable state of one run
struct RunContext<'r> {
    state: SimulationState,
    parameters: &'r BTreeMap<String, f64>,
    stream: Option<RngManager>,
    draw_cache: DrawCache,
    phase: SimulationPhase,
    violations: Vec<ConstraintViolation>,
    policy_executions: Vec<PolicyExecution>,
    warnings: Vec<RunWarning>,
}

enum StepOutcome {
    Continue,
    Halted,
}

fn differs(previous: f64, next: f64, tolerance: f64) -> bool {
    (previous - next).abs() > tolerance * previous.abs().max(next.abs()).max(1.0)
}

// ============================================================================
// Simulator
// ============================================================================

/// Executes runs of one loaded model
///
/// Borrowed pieces are shared read-only between parallel runs.
pub struct Simulator<'m> {
    model: &'m Model,
    index: &'m EquationIndex,
    policies: &'m PolicyEngine,
    functions: &'m dyn FunctionRegistry,
    settings: SimulationSettings,
    horizon: usize,
}

impl<'m> Simulator<'m> {
    pub fn new(
        model: &'m Model,
        index: &'m EquationIndex,
        policies: &'m PolicyEngine,
        functions: &'m dyn FunctionRegistry,
        settings: SimulationSettings,
        horizon: usize,
    ) -> Self {
        Self {
            model,
            index,
            policies,
            functions,
            settings,
            horizon,
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Execute one run
    ///
    /// `stream` is `None` in deterministic mode. Returns `None` when the
    /// run was cancelled.
    pub fn run(
        &self,
        run_index: usize,
        seed: Option<u64>,
        parameters: &BTreeMap<String, f64>,
        stream: Option<RngManager>,
        cancel: &CancellationToken,
    ) -> Option<RunResult> {
        let mut ctx = RunContext {
            state: SimulationState::new(self.index.variables(), self.horizon),
            parameters,
            stream,
            draw_cache: DrawCache::new(),
            phase: SimulationPhase::Initializing,
            violations: Vec::new(),
            policy_executions: Vec::new(),
            warnings: Vec::new(),
        };

        let mut time = TimeManager::new(self.horizon, self.model.time_unit.clone());
        let mut status = RunStatus::Completed;
        let mut failure = None;
        let mut last_timestep = 0;

        while !time.is_exhausted() {
            if cancel.is_cancelled() {
                debug!(run = run_index, "Run cancelled");
                return None;
            }

            let step = time.current_step();
            last_timestep = step;

            match self.step(&mut ctx, step, time.is_final_step()) {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Halted) => {
                    ctx.phase = SimulationPhase::Halted;
                    status = RunStatus::Halted;
                    break;
                }
                Err(err) => {
                    error!(
                        run = run_index,
                        timestep = step,
                        phase = %ctx.phase,
                        error = %err,
                        "Run failed"
                    );
                    failure = Some(RunFailure {
                        timestep: step,
                        phase: ctx.phase,
                        message: err.to_string(),
                    });
                    ctx.phase = SimulationPhase::Failed;
                    status = RunStatus::Failed;
                    break;
                }
            }

            time.advance_step();
        }

        if status == RunStatus::Completed {
            ctx.phase = SimulationPhase::Completed;
        }
        debug!(run = run_index, ?status, last_timestep, "Run finished");

        Some(RunResult {
            run_index,
            seed,
            status,
            last_timestep,
            parameters: parameters.clone(),
            series: ctx.state.into_series(),
            violations: ctx.violations,
            policy_executions: ctx.policy_executions,
            warnings: ctx.warnings,
            failure,
        })
    }

    fn step(
        &self,
        ctx: &mut RunContext<'_>,
        step: usize,
        is_final: bool,
    ) -> Result<StepOutcome, SimulationError> {
        ctx.draw_cache.clear();

        // STEP 1: INITIALIZING
        let mut carried = Vec::new();
        if step == 0 {
            ctx.phase = SimulationPhase::Initializing;
            for &position in self.index.initial() {
                let target = &self.model.equations[position].target;
                match self.eval_equation(ctx, position, 0)? {
                    Eval::Ready(value) => ctx.state.set(target, 0, value)?,
                    Eval::NotReady { .. } => carried.push(position),
                }
            }
        }

        // STEP 2: EVALUATING
        ctx.phase = SimulationPhase::Evaluating;
        self.evaluate_schedule(ctx, step, &carried)?;

        // STEP 3: CONSTRAINT CHECKING
        ctx.phase = SimulationPhase::ConstraintChecking;
        for constraint in &self.model.constraints {
            let outcome = {
                let mut eval_ctx =
                    EvalContext::new(&ctx.state, ctx.parameters, self.functions, step)
                        .with_stream(ctx.stream.as_mut());
                constraint::check(constraint, &mut eval_ctx).map_err(|source| {
                    SimulationError::Constraint {
                        constraint: constraint.name.clone(),
                        step,
                        source,
                    }
                })?
            };

            match outcome {
                ConstraintOutcome::Satisfied => {}
                ConstraintOutcome::Skipped {
                    missing,
                    step: missing_step,
                } => {
                    warn!(
                        constraint = %constraint.name,
                        timestep = step,
                        missing = %missing,
                        "Constraint skipped: input not computed"
                    );
                    ctx.warnings.push(RunWarning::ConstraintSkipped {
                        timestep: step,
                        constraint: constraint.name.clone(),
                        missing,
                        missing_step,
                    });
                }
                ConstraintOutcome::Violated(violation) => {
                    debug!(
                        constraint = %violation.constraint,
                        timestep = step,
                        severity = ?violation.severity,
                        "Constraint violated"
                    );
                    let fatal = violation.severity == Severity::Fatal;
                    ctx.violations.push(violation);
                    if fatal {
                        return Ok(StepOutcome::Halted);
                    }
                }
            }
        }

        // STEP 4: POLICY EXECUTING
        ctx.phase = SimulationPhase::PolicyExecuting;
        {
            let mut env = PolicyEnv {
                state: &mut ctx.state,
                parameters: ctx.parameters,
                functions: self.functions,
                stream: ctx.stream.as_mut(),
                step,
            };
            self.policies.execute(
                &self.model.policies,
                &mut env,
                &mut ctx.policy_executions,
                &mut ctx.warnings,
            )?;
        }

        // STEP 5: ADVANCING
        if !is_final {
            ctx.phase = SimulationPhase::Advancing;
            for &position in self.index.recurrence() {
                let target = &self.model.equations[position].target;
                match self.eval_equation(ctx, position, step)? {
                    Eval::Ready(value) => ctx.state.set(target, step + 1, value)?,
                    Eval::NotReady {
                        variable,
                        step: missing_step,
                    } => {
                        warn!(
                            variable = %target,
                            timestep = step,
                            missing = %variable,
                            "Recurrence unresolved"
                        );
                        ctx.warnings.push(RunWarning::RecurrenceUnresolved {
                            timestep: step,
                            variable: target.clone(),
                            missing: variable,
                            missing_step,
                        });
                    }
                }
            }
        }

        Ok(StepOutcome::Continue)
    }

    fn eval_equation(
        &self,
        ctx: &mut RunContext<'_>,
        position: usize,
        step: usize,
    ) -> Result<Eval, SimulationError> {
        let equation = &self.model.equations[position];
        let mut eval_ctx = EvalContext::new(&ctx.state, ctx.parameters, self.functions, step)
            .with_stream(ctx.stream.as_mut())
            .with_draw_cache(&mut ctx.draw_cache, position);
        evaluate(&equation.expression, &mut eval_ctx).map_err(|source| SimulationError::Equation {
            equation: equation.describe(),
            step,
            source,
        })
    }

    /// Evaluate the step's schedule block by block
    ///
    /// Initial equations only take part when carried over from the
    /// Initializing phase. Anything left unresolved is reported once per
    /// step.
    fn evaluate_schedule(
        &self,
        ctx: &mut RunContext<'_>,
        step: usize,
        carried: &[usize],
    ) -> Result<(), SimulationError> {
        let active = |position: &usize| {
            self.model.equations[*position].category != EquationCategory::Initial
                || carried.contains(position)
        };

        let mut unresolved: Vec<&str> = Vec::new();
        let mut iterations = 0;

        for block in self.index.schedule(step) {
            match block {
                Block::Single(position) => {
                    if !active(position) {
                        continue;
                    }
                    iterations = iterations.max(1);
                    let target = self.model.equations[*position].target.as_str();
                    match self.eval_equation(ctx, *position, step)? {
                        Eval::Ready(value) => ctx.state.set(target, step, value)?,
                        Eval::NotReady { .. } => unresolved.push(target),
                    }
                }
                Block::Cycle(members) => {
                    let members: Vec<usize> = members.iter().copied().filter(active).collect();
                    if members.is_empty() {
                        continue;
                    }
                    let (passes, stuck) = self.fixed_point(ctx, &members, step)?;
                    iterations = iterations.max(passes);
                    unresolved.extend(stuck);
                }
            }
        }

        if unresolved.is_empty() {
            debug!(timestep = step, iterations, "Timestep resolved");
            return Ok(());
        }

        let mut unresolved: Vec<String> = unresolved.into_iter().map(str::to_string).collect();
        unresolved.sort();
        unresolved.dedup();

        if self.settings.strict_convergence {
            return Err(SimulationError::NonConvergence {
                step,
                iterations,
                unresolved,
            });
        }

        warn!(
            timestep = step,
            iterations,
            unresolved = ?unresolved,
            "Fixed-point iteration did not converge"
        );
        ctx.warnings.push(RunWarning::NonConvergence {
            timestep: step,
            iterations,
            unresolved,
        });
        Ok(())
    }

    /// Iterate one cycle until a full pass changes nothing
    ///
    /// A pass that stalls with every member deferred is retried once with the
    /// deferred targets seeded from t-1. Returns the passes used and the
    /// targets still deferred or still changing when iteration stopped.
    /// Seeds that no equation replaced are cleared again.
    fn fixed_point(
        &self,
        ctx: &mut RunContext<'_>,
        members: &[usize],
        step: usize,
    ) -> Result<(usize, Vec<&'m str>), SimulationError> {
        let tolerance = self.settings.convergence_tolerance;
        let mut seeded: Vec<&str> = Vec::new();
        let mut deferred: Vec<&'m str> = Vec::new();
        let mut passes = 0;

        let stuck = loop {
            passes += 1;
            let mut changed: Vec<&'m str> = Vec::new();
            deferred.clear();

            for &position in members {
                let target = self.model.equations[position].target.as_str();
                match self.eval_equation(ctx, position, step)? {
                    Eval::Ready(value) => {
                        let previous = ctx.state.value(target, step)?;
                        if previous.map_or(true, |p| differs(p, value, tolerance)) {
                            ctx.state.set(target, step, value)?;
                            changed.push(target);
                        }
                    }
                    Eval::NotReady { .. } => deferred.push(target),
                }
            }

            if changed.is_empty() {
                if deferred.is_empty() {
                    return Ok((passes, Vec::new()));
                }
                if seeded.is_empty() && step > 0 {
                    for &target in &deferred {
                        if ctx.state.value(target, step)?.is_none() {
                            if let Some(guess) = ctx.state.value(target, step - 1)? {
                                ctx.state.set(target, step, guess)?;
                                seeded.push(target);
                            }
                        }
                    }
                    if !seeded.is_empty() && passes < self.settings.max_iterations {
                        continue;
                    }
                }
                break deferred.clone();
            }

            if passes >= self.settings.max_iterations {
                changed.extend(deferred.iter().copied());
                break changed;
            }
        };

        // Provisional guesses never count as computed values
        for target in &seeded {
            if deferred.contains(target) {
                ctx.state.clear(target, step)?;
            }
        }

        Ok((passes, stuck))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equations::organize;
    use crate::eval::BuiltinFunctions;
    use crate::models::{
        Action, BinaryOperator, Constraint, Equation, EquationCategory, Expr, Parameter, Policy,
    };

    fn growth_model() -> Model {
        Model {
            name: "growth".to_string(),
            time_horizon: 3,
            time_unit: "year".to_string(),
            parameters: vec![
                Parameter::fixed("revenue0", 1000.0),
                Parameter::fixed("growth_rate", 0.1),
            ],
            equations: vec![
                Equation::new("revenue", EquationCategory::Initial, Expr::var("revenue0")),
                Equation::new(
                    "revenue",
                    EquationCategory::Recurrence,
                    Expr::binary(
                        BinaryOperator::Multiply,
                        Expr::at("revenue", 0),
                        Expr::binary(
                            BinaryOperator::Add,
                            Expr::literal(1.0),
                            Expr::var("growth_rate"),
                        ),
                    ),
                ),
            ],
            constraints: vec![],
            policies: vec![],
            correlation_groups: vec![],
        }
    }

    fn run_model(model: &Model, settings: SimulationSettings) -> RunResult {
        let index = organize(model, &BuiltinFunctions).unwrap();
        let policies = PolicyEngine::new(&model.policies);
        let simulator = Simulator::new(
            model,
            &index,
            &policies,
            &BuiltinFunctions,
            settings,
            model.time_horizon,
        );
        let parameters: BTreeMap<String, f64> = model
            .parameters
            .iter()
            .filter_map(|p| match p.value {
                crate::models::ParameterValue::Fixed(v) => Some((p.name.clone(), v)),
                _ => None,
            })
            .collect();
        simulator
            .run(0, None, &parameters, None, &CancellationToken::new())
            .unwrap()
    }

    fn assert_series(result: &RunResult, variable: &str, expected: &[f64]) {
        let actual = result.values(variable);
        assert_eq!(actual.len(), expected.len(), "{}: {:?}", variable, actual);
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{}: {:?} vs {:?}", variable, actual, expected);
        }
    }

    #[test]
    fn test_growth_recurrence() {
        let result = run_model(&growth_model(), SimulationSettings::default());
        assert_eq!(result.status, RunStatus::Completed);
        assert_series(&result, "revenue", &[1000.0, 1100.0, 1210.0]);
        assert_eq!(result.last_timestep, 2);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_current_equations_resolve_out_of_order() {
        let mut model = growth_model();
        // profit is declared before its input margin
        model.equations.push(Equation::new(
            "profit",
            EquationCategory::Current,
            Expr::binary(BinaryOperator::Multiply, Expr::var("revenue"), Expr::var("margin")),
        ));
        model.equations.push(Equation::new(
            "margin",
            EquationCategory::Direct,
            Expr::literal(0.25),
        ));

        let result = run_model(&model, SimulationSettings::default());
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert_series(&result, "profit", &[250.0, 275.0, 302.5]);
    }

    #[test]
    fn test_simultaneous_equations_converge_from_previous_step() {
        // income = 100 + 0.5 * consumption, consumption = 0.8 * income
        // fixed point: income = 100 / 0.6
        let mut model = growth_model();
        model.equations.push(Equation::new(
            "income",
            EquationCategory::Initial,
            Expr::literal(100.0),
        ));
        model.equations.push(Equation::new(
            "consumption",
            EquationCategory::Initial,
            Expr::literal(80.0),
        ));
        model.equations.push(Equation::new(
            "income",
            EquationCategory::Current,
            Expr::binary(
                BinaryOperator::Add,
                Expr::literal(100.0),
                Expr::binary(BinaryOperator::Multiply, Expr::literal(0.5), Expr::var("consumption")),
            ),
        ));
        model.equations.push(Equation::new(
            "consumption",
            EquationCategory::Current,
            Expr::binary(BinaryOperator::Multiply, Expr::literal(0.8), Expr::var("income")),
        ));

        let result = run_model(&model, SimulationSettings::default());
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        let income = result.value("income", 1).unwrap();
        assert!((income - 100.0 / 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_unresolvable_cycle_warns_and_leaves_values_absent() {
        let mut model = growth_model();
        model.equations.push(Equation::new(
            "a",
            EquationCategory::Direct,
            Expr::binary(BinaryOperator::Add, Expr::var("b"), Expr::literal(1.0)),
        ));
        model.equations.push(Equation::new(
            "b",
            EquationCategory::Direct,
            Expr::binary(BinaryOperator::Add, Expr::var("a"), Expr::literal(1.0)),
        ));

        let result = run_model(&model, SimulationSettings::default());
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.value("a", 0), None);
        assert!(matches!(
            &result.warnings[0],
            RunWarning::NonConvergence { timestep: 0, unresolved, .. } if unresolved == &["a", "b"]
        ));

        let strict = run_model(
            &model,
            SimulationSettings {
                strict_convergence: true,
                ..SimulationSettings::default()
            },
        );
        assert_eq!(strict.status, RunStatus::Failed);
        assert_eq!(strict.failure.unwrap().phase, SimulationPhase::Evaluating);
    }

    #[test]
    fn test_long_chain_declared_against_dependency_order_converges() {
        // x0 = x1 + 1, x1 = x2 + 1, ..., x99 = 1
        let mut equations: Vec<Equation> = (0..99)
            .map(|i| {
                Equation::new(
                    format!("x{}", i),
                    EquationCategory::Current,
                    Expr::binary(
                        BinaryOperator::Add,
                        Expr::var(format!("x{}", i + 1)),
                        Expr::literal(1.0),
                    ),
                )
            })
            .collect();
        equations.push(Equation::new("x99", EquationCategory::Current, Expr::literal(1.0)));
        let model = Model {
            name: "chain".to_string(),
            time_horizon: 2,
            time_unit: "period".to_string(),
            parameters: vec![],
            equations,
            constraints: vec![],
            policies: vec![],
            correlation_groups: vec![],
        };

        let result = run_model(&model, SimulationSettings::default());
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert_series(&result, "x0", &[100.0, 100.0]);
        assert_series(&result, "x50", &[50.0, 50.0]);

        let strict = run_model(
            &model,
            SimulationSettings {
                strict_convergence: true,
                ..SimulationSettings::default()
            },
        );
        assert_eq!(strict.status, RunStatus::Completed);
        assert!(strict.failure.is_none());
    }

    fn oscillating_model() -> Model {
        // a = 1 - b, b = a has no fixed point reachable by iteration
        Model {
            name: "oscillating".to_string(),
            time_horizon: 2,
            time_unit: "period".to_string(),
            parameters: vec![],
            equations: vec![
                Equation::new("a", EquationCategory::Initial, Expr::literal(0.25)),
                Equation::new(
                    "a",
                    EquationCategory::Current,
                    Expr::binary(BinaryOperator::Subtract, Expr::literal(1.0), Expr::var("b")),
                ),
                Equation::new("b", EquationCategory::Current, Expr::var("a")),
            ],
            constraints: vec![],
            policies: vec![],
            correlation_groups: vec![],
        }
    }

    #[test]
    fn test_exhausted_budget_warns_and_keeps_last_values() {
        let settings = SimulationSettings {
            max_iterations: 5,
            ..SimulationSettings::default()
        };
        let result = run_model(&oscillating_model(), settings);

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(
            result.warnings,
            vec![RunWarning::NonConvergence {
                timestep: 1,
                iterations: 5,
                unresolved: vec!["a".to_string(), "b".to_string()],
            }]
        );
        // Seeded from t-1, then four passes alternating 0.75 / 0.25
        assert_eq!(result.values("a"), vec![0.25, 0.25]);
        assert_eq!(result.values("b"), vec![0.25, 0.25]);

        let strict = run_model(
            &oscillating_model(),
            SimulationSettings {
                strict_convergence: true,
                ..settings
            },
        );
        assert_eq!(strict.status, RunStatus::Failed);
        let failure = strict.failure.unwrap();
        assert_eq!(failure.timestep, 1);
        assert_eq!(failure.phase, SimulationPhase::Evaluating);
        assert_eq!(failure.message, "No convergence at t=1 after 5 passes: a, b");
    }

    #[test]
    fn test_fatal_constraint_halts_before_policies() {
        let mut model = growth_model();
        model.constraints.push(Constraint {
            name: "cap".to_string(),
            condition: Expr::binary(
                BinaryOperator::LessThan,
                Expr::var("revenue"),
                Expr::literal(1050.0),
            ),
            severity: Severity::Fatal,
            message: String::new(),
        });
        model.policies.push(Policy {
            name: "boost".to_string(),
            trigger: Expr::literal(1.0),
            actions: vec![Action::Add {
                variable: "revenue".to_string(),
                amount: Expr::literal(1.0),
            }],
            declaration_index: None,
        });

        let result = run_model(&model, SimulationSettings::default());
        assert_eq!(result.status, RunStatus::Halted);
        assert_eq!(result.last_timestep, 1);
        assert_eq!(result.violations.len(), 1);
        // Only t = 0 ran its policies
        assert_eq!(result.policy_executions.len(), 1);
        assert_eq!(result.value("revenue", 2), None);
    }

    #[test]
    fn test_cancelled_run_is_discarded() {
        let model = growth_model();
        let index = organize(&model, &BuiltinFunctions).unwrap();
        let policies = PolicyEngine::new(&model.policies);
        let simulator = Simulator::new(
            &model,
            &index,
            &policies,
            &BuiltinFunctions,
            SimulationSettings::default(),
            3,
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(simulator
            .run(0, None, &BTreeMap::new(), None, &cancel)
            .is_none());
    }
}
