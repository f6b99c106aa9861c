//! Parameter evaluation: walks a parameter's rules in declaration order and returns the first
//! match's rollout value, falling back to the parameter default.
use std::sync::Arc;

use crate::configuration::{Parameter, Rule, Timestamp};
use crate::operators::OperatorRegistry;
use crate::sharder::{bucket, is_in_percentage, Murmur3Sharder};
use crate::{AttributeBag, ResolvedValue, Value};

/// The rule evaluation engine.
///
/// Evaluation is deterministic for a fixed (parameter, bag, wall clock) triple and never fails: a
/// structurally broken rule (unknown operator, missing hash attribute) disqualifies itself rather
/// than the whole parameter.
pub struct Engine {
    operators: Arc<OperatorRegistry>,
}

impl Engine {
    /// Create an engine backed by the given operator registry.
    pub fn new(operators: Arc<OperatorRegistry>) -> Engine {
        Engine { operators }
    }

    /// Resolve `parameter` for the given attribute bag at the given instant.
    ///
    /// The wall clock is passed in rather than read here so that a single
    /// [`Client::get_parameter`](crate::Client::get_parameter) call evaluates everything against
    /// one instant.
    pub fn evaluate_parameter(
        &self,
        parameter_name: &str,
        parameter: &Parameter,
        attributes: &AttributeBag,
        now: Timestamp,
    ) -> ResolvedValue {
        for rule in &parameter.rules {
            if self.evaluate_rule(parameter_name, rule, attributes, now) {
                return ResolvedValue::matched(rule.rollout_value.clone());
            }
        }
        ResolvedValue::unmatched(Some(parameter.default_value.clone()))
    }

    fn evaluate_rule(
        &self,
        parameter_name: &str,
        rule: &Rule,
        attributes: &AttributeBag,
        now: Timestamp,
    ) -> bool {
        if let Some(effective_at) = rule.effective_at {
            if now.timestamp() < effective_at {
                return false;
            }
        }

        for constraint in &rule.constraints {
            let attribute = attributes.get(&constraint.field).unwrap_or(&Value::Null);
            match self
                .operators
                .evaluate(&constraint.operator, attribute, &constraint.value)
            {
                Some(true) => {}
                // An unknown operator disqualifies the rule the same way a failing one does.
                Some(false) | None => return false,
            }
        }

        if let (Some(percentage), Some(hash_attribute)) =
            (rule.percentage, rule.hash_attribute.as_deref())
        {
            let Some(value) = attributes.get(hash_attribute).filter(|v| !v.is_null()) else {
                return false;
            };
            // Bucketing is namespaced by parameter name so rollouts stay independent across
            // parameters.
            let bucket = bucket(&Murmur3Sharder, parameter_name, value);
            if !is_in_percentage(bucket, percentage) {
                return false;
            }
        }

        true
    }
}
