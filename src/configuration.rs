//! Configuration model: parameters with their rules, experiments with their variants, and the
//! immutable snapshot that bundles both. These types mirror the configuration document schema;
//! parsing the documents themselves is the fetcher's concern.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::Value;

#[allow(missing_docs)]
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A named configuration entry: a default value plus an ordered rule list.
///
/// Rule order is semantically significant: the first matching rule wins. A parameter with no
/// rules always resolves to its default, unmatched.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    #[serde(default)]
    pub default_value: Value,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// A conditional override inside a parameter.
///
/// If `percentage` is set, `hash_attribute` names the bag attribute whose value is hashed to
/// decide rollout membership; validation requires it to be a non-empty string in that case.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub rollout_value: Value,
    /// Rollout percentage in 0..=100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_attribute: Option<String>,
    /// Epoch seconds; the rule is skipped while the wall clock is strictly before this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_at: Option<i64>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

/// A predicate applied against the attribute bag: `operator(bag[field], value)`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    pub field: String,
    /// Names a predicate in the operator registry. An unknown name fails the enclosing rule at
    /// evaluation time rather than erroring.
    pub operator: String,
    pub value: Value,
}

/// Lifecycle status of an experiment. Only running experiments assign variants.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Scheduled,
    Running,
    Aborted,
    Finished,
}

/// One arm of an experiment: a rollout weight and the parameter values it assigns.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub key: String,
    /// Weight in 0..=100; weights of all variants in an experiment must sum to 100.
    pub rollout: i64,
    /// Parameter overrides carried by this arm, keyed by parameter name.
    #[serde(default)]
    pub values: HashMap<String, Value>,
}

/// A named, priority-ordered, time- and population-gated assignment of one variant per eligible
/// subject.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: String,
    pub name: String,
    /// Names of the parameters this experiment overrides.
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Bag attribute hashed for both the population gate and the variant draw.
    #[serde(default)]
    pub hash_attribute: String,
    /// Share of the population eligible for the experiment, in 0..=100.
    #[serde(default)]
    pub population_size: i64,
    /// Experiments are consulted in ascending priority order; ties keep declaration order.
    #[serde(default)]
    pub priority: i64,
    pub status: ExperimentStatus,
    /// Epoch seconds, inclusive on both ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

/// Top-level shape of an experiments document.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ExperimentsDocument {
    #[serde(default)]
    pub experiments: Vec<Experiment>,
}

/// The immutable `(parameters, experiments)` pair currently in force.
///
/// A snapshot is created by the sync pipeline and fully replaces the previous one; readers always
/// observe a complete generation, never a partial publication.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    pub parameters: HashMap<String, Parameter>,
    pub experiments: Vec<Experiment>,
}
