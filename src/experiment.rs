//! Experiment evaluation: selects at most one running experiment for a parameter and
//! deterministically assigns one of its variants through a hashed weighted draw.
use std::collections::HashMap;
use std::sync::Arc;

use crate::configuration::{Experiment, ExperimentStatus, Timestamp, Variant};
use crate::operators::OperatorRegistry;
use crate::sharder::{bucket, is_in_percentage, Murmur3Sharder, NUM_BUCKETS};
use crate::{AttributeBag, Value};

/// The outcome of a matching experiment: which experiment, which arm, and the parameter values
/// that arm carries.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentEvaluation {
    pub experiment_id: String,
    pub variant_key: String,
    pub values: HashMap<String, Value>,
}

/// The experiment selection engine.
///
/// Shares the operator registry with the rule engine, so custom operators registered through the
/// client apply to experiment constraints too.
pub struct ExperimentEngine {
    operators: Arc<OperatorRegistry>,
}

impl ExperimentEngine {
    /// Create an engine backed by the given operator registry.
    pub fn new(operators: Arc<OperatorRegistry>) -> ExperimentEngine {
        ExperimentEngine { operators }
    }

    /// Select a variant for `parameter_name`, or `None` if no experiment matches.
    ///
    /// Experiments are consulted in ascending `priority` order (stable across ties); the first
    /// experiment that passes every gate and draws a variant wins, and no further experiments are
    /// considered.
    pub fn evaluate(
        &self,
        experiments: &[Experiment],
        parameter_name: &str,
        attributes: &AttributeBag,
        now: Timestamp,
    ) -> Option<ExperimentEvaluation> {
        let mut ordered: Vec<&Experiment> = experiments.iter().collect();
        ordered.sort_by_key(|experiment| experiment.priority);

        for experiment in ordered {
            if !experiment.parameters.iter().any(|p| p == parameter_name) {
                continue;
            }
            if experiment.status != ExperimentStatus::Running {
                continue;
            }
            if !check_time(experiment, now) {
                continue;
            }
            if !check_population(experiment, attributes) {
                continue;
            }
            if !self.check_constraints(experiment, attributes) {
                continue;
            }

            let Some(variant) = select_variant(experiment, attributes) else {
                continue;
            };

            return Some(ExperimentEvaluation {
                experiment_id: experiment.id.clone(),
                variant_key: variant.key.clone(),
                values: variant.values.clone(),
            });
        }

        None
    }

    fn check_constraints(&self, experiment: &Experiment, attributes: &AttributeBag) -> bool {
        experiment.constraints.iter().all(|constraint| {
            let attribute = attributes.get(&constraint.field).unwrap_or(&Value::Null);
            self.operators
                .evaluate(&constraint.operator, attribute, &constraint.value)
                .unwrap_or(false)
        })
    }
}

/// Both ends of the experiment window are inclusive.
fn check_time(experiment: &Experiment, now: Timestamp) -> bool {
    let now = now.timestamp();
    if experiment.start_time.is_some_and(|t| now < t) {
        return false;
    }
    if experiment.end_time.is_some_and(|t| now > t) {
        return false;
    }
    true
}

fn check_population(experiment: &Experiment, attributes: &AttributeBag) -> bool {
    if experiment.population_size <= 0 {
        return false;
    }
    if experiment.population_size >= 100 {
        return true;
    }
    if experiment.hash_attribute.is_empty() {
        return false;
    }

    let Some(value) = attributes
        .get(&experiment.hash_attribute)
        .filter(|v| !v.is_null())
    else {
        return false;
    };

    // The population gate hashes under the experiment id; the variant draw below salts with the
    // hash attribute name so the two draws are independent.
    let bucket = bucket(&Murmur3Sharder, &experiment.id, value);
    is_in_percentage(bucket, experiment.population_size)
}

/// Weighted draw over the experiment's variants.
///
/// The subject's bucket is scaled by the total rollout weight and matched against the cumulative
/// weights in declaration order. Integer truncation can leave `normalised` one short of the total;
/// the last variant absorbs that remainder.
fn select_variant<'a>(experiment: &'a Experiment, attributes: &AttributeBag) -> Option<&'a Variant> {
    match experiment.variants.as_slice() {
        [] => None,
        [single] => Some(single),
        variants => {
            let total: i64 = variants.iter().map(|variant| variant.rollout).sum();

            let value = attributes
                .get(&experiment.hash_attribute)
                .filter(|v| !v.is_null())?;

            let namespace = format!("{}:{}", experiment.id, experiment.hash_attribute);
            let bucket = bucket(&Murmur3Sharder, &namespace, value) as i64;
            let normalised = bucket * total / NUM_BUCKETS as i64;

            let mut cumulative = 0;
            for variant in variants {
                cumulative += variant.rollout;
                if normalised < cumulative {
                    return Some(variant);
                }
            }
            variants.last()
        }
    }
}
