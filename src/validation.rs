//! Structural validation of fetched configuration. Validation runs at sync time (and on demand);
//! it never runs during evaluation, where malformed rules degrade gracefully instead.
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::configuration::{Constraint, Experiment, Parameter, Rule, Variant};
use crate::operators::OperatorRegistry;

/// A single validation finding: which entity (parameter name or experiment id), optionally which
/// rule, which field path, and what is wrong with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub entity: String,
    pub rule_index: Option<usize>,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.entity)?;
        if let Some(rule_index) = self.rule_index {
            write!(f, ".rules[{rule_index}]")?;
        }
        if !self.field.is_empty() {
            write!(f, ".{}", self.field)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// All findings for a configuration, collected rather than short-circuited.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors {
    pub errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str("validation errors");
        }
        f.write_str("validation errors:")?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        ValidationErrors { errors }
    }
}

/// Validate a parameters document. Returns every finding; an empty vector means the document is
/// structurally sound.
pub fn validate_parameters(parameters: &HashMap<String, Parameter>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for (name, parameter) in parameters {
        validate_parameter(name, parameter, &mut errors);
    }
    errors
}

fn validate_parameter(name: &str, parameter: &Parameter, errors: &mut Vec<ValidationError>) {
    if name.is_empty() {
        errors.push(ValidationError {
            entity: name.to_owned(),
            rule_index: None,
            field: String::new(),
            message: "parameter name cannot be empty".to_owned(),
        });
    }

    for (rule_index, rule) in parameter.rules.iter().enumerate() {
        validate_rule(name, rule_index, rule, errors);
    }
}

fn validate_rule(name: &str, rule_index: usize, rule: &Rule, errors: &mut Vec<ValidationError>) {
    if let Some(percentage) = rule.percentage {
        if !(0..=100).contains(&percentage) {
            errors.push(ValidationError {
                entity: name.to_owned(),
                rule_index: Some(rule_index),
                field: "percentage".to_owned(),
                message: "must be between 0 and 100".to_owned(),
            });
        }

        if rule.hash_attribute.as_deref().unwrap_or("").is_empty() {
            errors.push(ValidationError {
                entity: name.to_owned(),
                rule_index: Some(rule_index),
                field: "hashAttribute".to_owned(),
                message: "is required when percentage is set".to_owned(),
            });
        }
    }

    for (constraint_index, constraint) in rule.constraints.iter().enumerate() {
        validate_constraint(
            name,
            Some(rule_index),
            constraint_index,
            constraint,
            None,
            errors,
        );
    }
}

/// Validate an experiments document against the given operator registry (experiment constraints
/// must name known operators).
pub fn validate_experiments(
    experiments: &[Experiment],
    operators: &OperatorRegistry,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for experiment in experiments {
        validate_experiment(experiment, operators, &mut errors);
    }
    errors
}

fn validate_experiment(
    experiment: &Experiment,
    operators: &OperatorRegistry,
    errors: &mut Vec<ValidationError>,
) {
    // Findings are keyed by id; fall back to the name when the id itself is missing.
    let entity = if experiment.id.is_empty() {
        &experiment.name
    } else {
        &experiment.id
    };

    let mut push = |field: &str, message: String| {
        errors.push(ValidationError {
            entity: entity.clone(),
            rule_index: None,
            field: field.to_owned(),
            message,
        });
    };

    if experiment.id.is_empty() {
        push("id", "cannot be empty".to_owned());
    }
    if experiment.name.is_empty() {
        push("name", "cannot be empty".to_owned());
    }
    if experiment.parameters.is_empty() {
        push("parameters", "cannot be empty".to_owned());
    }
    if experiment.hash_attribute.is_empty() {
        push("hashAttribute", "cannot be empty".to_owned());
    }
    if !(0..=100).contains(&experiment.population_size) {
        push("populationSize", "must be between 0 and 100".to_owned());
    }
    if experiment.variants.is_empty() {
        push("variants", "cannot be empty".to_owned());
    }

    let mut seen_keys = HashSet::new();
    let mut total_rollout = 0;
    for (variant_index, variant) in experiment.variants.iter().enumerate() {
        total_rollout += variant.rollout;
        validate_variant(variant_index, variant, &mut seen_keys, &mut push);
    }

    if !experiment.variants.is_empty() && total_rollout != 100 {
        push(
            "variants",
            format!("total rollout must equal 100, got {total_rollout}"),
        );
    }

    for (constraint_index, constraint) in experiment.constraints.iter().enumerate() {
        validate_constraint(
            entity,
            None,
            constraint_index,
            constraint,
            Some(operators),
            errors,
        );
    }
}

fn validate_variant(
    variant_index: usize,
    variant: &Variant,
    seen_keys: &mut HashSet<String>,
    push: &mut impl FnMut(&str, String),
) {
    if variant.key.is_empty() {
        push(
            &format!("variants[{variant_index}].key"),
            "cannot be empty".to_owned(),
        );
    } else if !seen_keys.insert(variant.key.clone()) {
        push(
            &format!("variants[{variant_index}].key"),
            format!("duplicate variant key: {}", variant.key),
        );
    }

    if !(0..=100).contains(&variant.rollout) {
        push(
            &format!("variants[{variant_index}].rollout"),
            "must be between 0 and 100".to_owned(),
        );
    }

    if variant.values.is_empty() {
        push(
            &format!("variants[{variant_index}].values"),
            "cannot be empty".to_owned(),
        );
    }
}

fn validate_constraint(
    entity: &str,
    rule_index: Option<usize>,
    constraint_index: usize,
    constraint: &Constraint,
    operators: Option<&OperatorRegistry>,
    errors: &mut Vec<ValidationError>,
) {
    if constraint.field.is_empty() {
        errors.push(ValidationError {
            entity: entity.to_owned(),
            rule_index,
            field: format!("constraints[{constraint_index}].field"),
            message: "cannot be empty".to_owned(),
        });
    }

    let mut push = |message: String| {
        errors.push(ValidationError {
            entity: entity.to_owned(),
            rule_index,
            field: format!("constraints[{constraint_index}].operator"),
            message,
        });
    };

    if constraint.operator.is_empty() {
        push("cannot be empty".to_owned());
    } else if let Some(operators) = operators {
        if !operators.is_known(&constraint.operator) {
            push(format!("unknown operator: {}", constraint.operator));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::configuration::ExperimentStatus;
    use crate::Value;

    fn registry() -> OperatorRegistry {
        let registry = OperatorRegistry::new();
        registry.bootstrap();
        registry
    }

    fn experiment() -> Experiment {
        Experiment {
            id: "exp-1".to_owned(),
            name: "Exp 1".to_owned(),
            parameters: vec!["checkout".to_owned()],
            hash_attribute: "user_id".to_owned(),
            population_size: 100,
            priority: 1,
            status: ExperimentStatus::Running,
            start_time: None,
            end_time: None,
            constraints: vec![],
            variants: vec![
                Variant {
                    key: "control".to_owned(),
                    rollout: 50,
                    values: HashMap::from([("checkout".to_owned(), "red".into())]),
                },
                Variant {
                    key: "treatment".to_owned(),
                    rollout: 50,
                    values: HashMap::from([("checkout".to_owned(), "green".into())]),
                },
            ],
        }
    }

    #[test]
    fn valid_parameters_produce_no_errors() {
        let parameters = HashMap::from([(
            "checkout".to_owned(),
            Parameter {
                default_value: "red".into(),
                rules: vec![Rule {
                    rollout_value: "green".into(),
                    percentage: Some(50),
                    hash_attribute: Some("user_id".to_owned()),
                    effective_at: None,
                    constraints: vec![Constraint {
                        field: "env".to_owned(),
                        operator: "equal".to_owned(),
                        value: "prod".into(),
                    }],
                }],
            },
        )]);

        assert!(validate_parameters(&parameters).is_empty());
    }

    #[test]
    fn percentage_out_of_range() {
        let parameters = HashMap::from([(
            "checkout".to_owned(),
            Parameter {
                default_value: Value::Null,
                rules: vec![Rule {
                    rollout_value: "x".into(),
                    percentage: Some(150),
                    hash_attribute: Some("user_id".to_owned()),
                    effective_at: None,
                    constraints: vec![],
                }],
            },
        )]);

        let errors = validate_parameters(&parameters);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "percentage");
        assert_eq!(errors[0].rule_index, Some(0));
    }

    #[test]
    fn percentage_requires_hash_attribute() {
        let parameters = HashMap::from([(
            "checkout".to_owned(),
            Parameter {
                default_value: Value::Null,
                rules: vec![Rule {
                    rollout_value: "x".into(),
                    percentage: Some(50),
                    hash_attribute: None,
                    effective_at: None,
                    constraints: vec![],
                }],
            },
        )]);

        let errors = validate_parameters(&parameters);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "hashAttribute");
        assert_eq!(errors[0].message, "is required when percentage is set");
    }

    #[test]
    fn empty_constraint_fields_are_reported_together() {
        let parameters = HashMap::from([(
            "checkout".to_owned(),
            Parameter {
                default_value: Value::Null,
                rules: vec![Rule {
                    rollout_value: "x".into(),
                    percentage: None,
                    hash_attribute: None,
                    effective_at: None,
                    constraints: vec![Constraint {
                        field: String::new(),
                        operator: String::new(),
                        value: Value::Null,
                    }],
                }],
            },
        )]);

        let errors = validate_parameters(&parameters);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn valid_experiment_produces_no_errors() {
        assert!(validate_experiments(&[experiment()], &registry()).is_empty());
    }

    #[test]
    fn rollouts_must_sum_to_one_hundred() {
        let mut exp = experiment();
        exp.variants[1].rollout = 40;

        let errors = validate_experiments(&[exp], &registry());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "variants");
        assert_eq!(errors[0].message, "total rollout must equal 100, got 90");
    }

    #[test]
    fn duplicate_variant_keys_are_reported() {
        let mut exp = experiment();
        exp.variants[1].key = "control".to_owned();

        let errors = validate_experiments(&[exp], &registry());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "variants[1].key");
    }

    #[test]
    fn unknown_operator_is_reported() {
        let mut exp = experiment();
        exp.constraints.push(Constraint {
            field: "env".to_owned(),
            operator: "regexMatch".to_owned(),
            value: "prod".into(),
        });

        let errors = validate_experiments(&[exp], &registry());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "unknown operator: regexMatch");
    }

    #[test]
    fn custom_operator_registration_makes_it_known() {
        let registry = registry();
        registry.register("regexMatch", |_, _| true);

        let mut exp = experiment();
        exp.constraints.push(Constraint {
            field: "env".to_owned(),
            operator: "regexMatch".to_owned(),
            value: "prod".into(),
        });

        assert!(validate_experiments(&[exp], &registry).is_empty());
    }

    #[test]
    fn findings_accumulate_across_entities() {
        let mut first = experiment();
        first.id = String::new();
        let mut second = experiment();
        second.population_size = 200;
        second.variants.clear();

        let errors = validate_experiments(&[first, second], &registry());
        // first: empty id; second: populationSize range + empty variants.
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn error_messages_name_the_path() {
        let error = ValidationError {
            entity: "checkout".to_owned(),
            rule_index: Some(2),
            field: "percentage".to_owned(),
            message: "must be between 0 and 100".to_owned(),
        };
        assert_eq!(
            error.to_string(),
            "\"checkout\".rules[2].percentage: must be between 0 and 100"
        );

        let errors = ValidationErrors::from(vec![error]);
        assert!(errors.to_string().starts_with("validation errors:"));
    }
}
