// Policy engine
//
// Runs trigger-action policies at one timestep, strictly in declaration
// order. A trigger whose inputs are not computed skips the policy with a
// run warning; every other fault stops the step.

use crate::eval::{is_truthy, Eval};
use crate::models::{Policy, PolicyExecution, RunWarning};
use crate::policy::actions::{apply_action, PolicyEnv, PolicyError};
use tracing::debug;

/// Execution order over a model's policies
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    /// Positions in the policy list, in execution order
    order: Vec<usize>,
}

impl PolicyEngine {
    /// Order policies by declaration index; ties and missing indices fall
    /// back to list position
    pub fn new(policies: &[Policy]) -> Self {
        let mut order: Vec<usize> = (0..policies.len()).collect();
        order.sort_by_key(|&position| {
            (
                policies[position].declaration_index.unwrap_or(position),
                position,
            )
        });
        Self { order }
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Evaluate every trigger and apply the actions of those that fire
    pub fn execute(
        &self,
        policies: &[Policy],
        env: &mut PolicyEnv<'_>,
        log: &mut Vec<PolicyExecution>,
        warnings: &mut Vec<RunWarning>,
    ) -> Result<(), PolicyError> {
        for &position in &self.order {
            let policy = &policies[position];

            let fired = match env.eval(&policy.trigger) {
                Ok(Eval::Ready(value)) => is_truthy(value),
                Ok(Eval::NotReady { variable, step }) => {
                    debug!(policy = %policy.name, missing = %variable, "Policy skipped");
                    warnings.push(RunWarning::PolicySkipped {
                        timestep: env.step,
                        policy: policy.name.clone(),
                        missing: variable,
                        missing_step: step,
                    });
                    continue;
                }
                Err(source) => {
                    return Err(PolicyError::Eval {
                        policy: policy.name.clone(),
                        source,
                    })
                }
            };

            if !fired {
                continue;
            }

            debug!(policy = %policy.name, timestep = env.step, "Policy triggered");
            for action in &policy.actions {
                apply_action(&policy.name, action, env, log)?;
            }
        }
        Ok(())
    }
}
