//! Per-run parameter sampling
//!
//! Correlation groups are factored once at load. Each run then draws its
//! parameters in a fixed order: groups first (declaration order), then the
//! independent stochastic parameters (declaration order). Fixed parameters
//! never touch the stream.

use crate::models::{Model, ParameterValue};
use crate::rng::RngManager;
use crate::sampling::correlation::{
    check_correlation_matrix, correlate, factor, is_positive_semi_definite, min_eigenvalue,
    repair, to_gaussian_matrix, to_matrix,
};
use crate::sampling::special::normal_quantile;
use crate::sampling::{Distribution, SamplingError};
use nalgebra as na;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

#[derive(Debug, Clone)]
struct PreparedGroup {
    /// Member positions in `ParameterSampler::parameters`
    members: Vec<usize>,

    /// L with L·Lᵀ equal to the Gaussian copula correlation
    factor: na::DMatrix<f64>,
}

#[derive(Debug, Clone)]
enum Source {
    Fixed(f64),
    Stochastic(Distribution),
}

/// Samples a model's parameters for one run
#[derive(Debug, Clone)]
pub struct ParameterSampler {
    parameters: Vec<(String, Source)>,
    groups: Vec<PreparedGroup>,

    /// Stochastic parameters outside every group
    independent: Vec<usize>,
}

impl ParameterSampler {
    /// Check every distribution and correlation group, collecting all errors
    pub fn check(model: &Model) -> Vec<SamplingError> {
        match Self::build(model) {
            Ok(_) => Vec::new(),
            Err(errors) => errors,
        }
    }

    /// Validate and factor the model's stochastic parameters
    pub fn prepare(model: &Model) -> Result<Self, SamplingError> {
        Self::build(model).map_err(|mut errors| errors.swap_remove(0))
    }

    fn build(model: &Model) -> Result<Self, Vec<SamplingError>> {
        let mut errors = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut parameters = Vec::with_capacity(model.parameters.len());

        for (position, parameter) in model.parameters.iter().enumerate() {
            positions.entry(parameter.name.as_str()).or_insert(position);
            let source = match &parameter.value {
                ParameterValue::Fixed(value) => Source::Fixed(*value),
                ParameterValue::Distribution(distribution) => {
                    if let Err(reason) = distribution.validate() {
                        errors.push(SamplingError::InvalidDistribution {
                            owner: parameter.name.clone(),
                            reason,
                        });
                    }
                    Source::Stochastic(distribution.clone())
                }
            };
            parameters.push((parameter.name.clone(), source));
        }

        // Membership declared on the parameter side must name a known group
        // that lists the parameter
        for parameter in &model.parameters {
            if let Some(group_id) = &parameter.correlation_group {
                match model.correlation_groups.iter().find(|g| &g.id == group_id) {
                    None => errors.push(SamplingError::UnknownCorrelationGroup {
                        parameter: parameter.name.clone(),
                        group: group_id.clone(),
                    }),
                    Some(group) if !group.parameters.contains(&parameter.name) => {
                        errors.push(SamplingError::MembershipMismatch {
                            parameter: parameter.name.clone(),
                            group: group_id.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        let mut grouped: HashMap<usize, &str> = HashMap::new();
        let mut groups = Vec::with_capacity(model.correlation_groups.len());

        for group in &model.correlation_groups {
            let mut members = Vec::with_capacity(group.parameters.len());
            let mut members_ok = true;

            for name in &group.parameters {
                let Some(&position) = positions.get(name.as_str()) else {
                    errors.push(SamplingError::UnknownGroupMember {
                        group: group.id.clone(),
                        parameter: name.clone(),
                    });
                    members_ok = false;
                    continue;
                };
                if matches!(parameters[position].1, Source::Fixed(_)) {
                    errors.push(SamplingError::NonStochasticMember {
                        group: group.id.clone(),
                        parameter: name.clone(),
                    });
                    members_ok = false;
                }
                if let Some(other) = grouped.insert(position, group.id.as_str()) {
                    errors.push(SamplingError::DuplicateMembership {
                        parameter: name.clone(),
                        first: other.to_string(),
                        second: group.id.clone(),
                    });
                    members_ok = false;
                }
                members.push(position);
            }

            if let Err(reason) = check_correlation_matrix(&group.matrix, group.parameters.len()) {
                errors.push(SamplingError::InvalidCorrelationMatrix {
                    group: group.id.clone(),
                    reason,
                });
                continue;
            }

            let declared = to_matrix(&group.matrix);
            if !is_positive_semi_definite(&declared) {
                errors.push(SamplingError::NotPositiveSemiDefinite {
                    group: group.id.clone(),
                });
                continue;
            }

            let mut gaussian = to_gaussian_matrix(&declared, group.kind);
            if !is_positive_semi_definite(&gaussian) {
                warn!(
                    group = %group.id,
                    min_eigenvalue = min_eigenvalue(&gaussian),
                    "Gaussian copula correlation is indefinite; clipping to nearest valid matrix"
                );
                gaussian = repair(&gaussian);
            }

            match factor(&gaussian) {
                Some(factor) if members_ok => groups.push(PreparedGroup { members, factor }),
                Some(_) => {}
                None => errors.push(SamplingError::NotPositiveSemiDefinite {
                    group: group.id.clone(),
                }),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let independent = parameters
            .iter()
            .enumerate()
            .filter(|(position, (_, source))| {
                matches!(source, Source::Stochastic(_)) && !grouped.contains_key(position)
            })
            .map(|(position, _)| position)
            .collect();

        Ok(Self {
            parameters,
            groups,
            independent,
        })
    }

    /// True when any parameter is stochastic
    pub fn has_stochastic(&self) -> bool {
        self.parameters
            .iter()
            .any(|(_, source)| matches!(source, Source::Stochastic(_)))
    }

    /// Deterministic-mode values: fixed values and distribution central values
    pub fn central_values(&self) -> BTreeMap<String, f64> {
        self.parameters
            .iter()
            .map(|(name, source)| {
                let value = match source {
                    Source::Fixed(value) => *value,
                    Source::Stochastic(distribution) => distribution.central_value(),
                };
                (name.clone(), value)
            })
            .collect()
    }

    /// Draw one run's parameter values from `rng`
    pub fn sample(&self, rng: &mut RngManager) -> BTreeMap<String, f64> {
        let mut values: Vec<Option<f64>> = self
            .parameters
            .iter()
            .map(|(_, source)| match source {
                Source::Fixed(value) => Some(*value),
                Source::Stochastic(_) => None,
            })
            .collect();

        for group in &self.groups {
            let independent = na::DVector::from_iterator(
                group.members.len(),
                group.members.iter().map(|_| normal_quantile(rng.next_open_f64())),
            );
            let correlated = correlate(&group.factor, independent);

            for (&position, &z) in group.members.iter().zip(correlated.iter()) {
                if let Source::Stochastic(distribution) = &self.parameters[position].1 {
                    values[position] = Some(distribution.from_standard_normal(z));
                }
            }
        }

        for &position in &self.independent {
            if let Source::Stochastic(distribution) = &self.parameters[position].1 {
                values[position] = Some(distribution.sample(rng));
            }
        }

        self.parameters
            .iter()
            .zip(values)
            .filter_map(|((name, _), value)| value.map(|v| (name.clone(), v)))
            .collect()
    }
}
