//! The nine built-in comparison predicates and the registry that resolves operator names to
//! predicates during rule evaluation. User-supplied predicates registered through
//! [`OperatorRegistry::register`] have the same shape as the built-ins.
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::Value;

/// Binary predicate over two dynamic values. The left operand is the attribute value from the bag
/// (possibly [`Value::Null`] when absent), the right operand is the constraint value from the
/// configuration.
pub type OperatorFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Name of the built-in `equal` operator.
pub const EQUAL: &str = "equal";
/// Name of the built-in `notEqual` operator.
pub const NOT_EQUAL: &str = "notEqual";
/// Name of the built-in `greaterThan` operator.
pub const GREATER_THAN: &str = "greaterThan";
/// Name of the built-in `lessThan` operator.
pub const LESS_THAN: &str = "lessThan";
/// Name of the built-in `greaterThanOrEqual` operator.
pub const GREATER_THAN_OR_EQUAL: &str = "greaterThanOrEqual";
/// Name of the built-in `lessThanOrEqual` operator.
pub const LESS_THAN_OR_EQUAL: &str = "lessThanOrEqual";
/// Name of the built-in `contains` operator.
pub const CONTAINS: &str = "contains";
/// Name of the built-in `in` operator.
pub const IN: &str = "in";
/// Name of the built-in `notIn` operator.
pub const NOT_IN: &str = "notIn";

/// Names of all built-in operators, in registration order.
pub const BUILTIN_OPERATORS: [&str; 9] = [
    EQUAL,
    NOT_EQUAL,
    GREATER_THAN,
    LESS_THAN,
    GREATER_THAN_OR_EQUAL,
    LESS_THAN_OR_EQUAL,
    CONTAINS,
    IN,
    NOT_IN,
];

/// Tolerance for numeric equality once operands cross into `f64` territory.
const NUMERIC_EQ_TOLERANCE: f64 = 1e-9;

/// `equal` semantics: two nulls are equal, one null is not; numeric values compare as numbers
/// regardless of representation; everything else is structural equality within the same variant.
/// Cross-variant comparisons (number vs string vs bool) are `false`.
pub(crate) fn equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        // Int/Int stays exact so i64 values beyond 2^53 don't collapse.
        (Value::Int(a), Value::Int(b)) => a == b,
        _ => match (a.as_numeric(), b.as_numeric()) {
            (Some(a), Some(b)) => (a - b).abs() < NUMERIC_EQ_TOLERANCE,
            _ => a == b,
        },
    }
}

pub(crate) fn not_equal(a: &Value, b: &Value) -> bool {
    !equal(a, b)
}

/// `greaterThan` semantics: numeric operands compare as `f64`, string operands compare
/// lexicographically, anything else (including nulls) is `false`.
pub(crate) fn greater_than(a: &Value, b: &Value) -> bool {
    match (a.as_numeric(), b.as_numeric()) {
        (Some(a), Some(b)) => a > b,
        _ => match (a, b) {
            (Value::String(a), Value::String(b)) => a > b,
            _ => false,
        },
    }
}

pub(crate) fn less_than(a: &Value, b: &Value) -> bool {
    match (a.as_numeric(), b.as_numeric()) {
        (Some(a), Some(b)) => a < b,
        _ => match (a, b) {
            (Value::String(a), Value::String(b)) => a < b,
            _ => false,
        },
    }
}

pub(crate) fn greater_than_or_equal(a: &Value, b: &Value) -> bool {
    // Null short-circuits before `equal` so that null >= null stays false.
    if a.is_null() || b.is_null() {
        return false;
    }
    greater_than(a, b) || equal(a, b)
}

pub(crate) fn less_than_or_equal(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return false;
    }
    less_than(a, b) || equal(a, b)
}

/// `contains` semantics: substring containment for two strings (byte-oriented, which is UTF-8 safe
/// because the needle is itself a byte sequence), membership by structural equality when the left
/// operand is a sequence, `false` otherwise.
pub(crate) fn contains(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(a), Value::String(b)) => a.contains(b.as_str()),
        (Value::Seq(items), b) => items.iter().any(|item| item == b),
        _ => false,
    }
}

/// `in` semantics: the right operand must be a sequence; returns `true` iff any element is `equal`
/// to the left operand.
pub(crate) fn in_seq(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return false;
    }
    match b {
        Value::Seq(items) => items.iter().any(|item| equal(a, item)),
        _ => false,
    }
}

pub(crate) fn not_in(a: &Value, b: &Value) -> bool {
    // A null operand fails every membership check, including the negated one.
    if a.is_null() || b.is_null() {
        return false;
    }
    !in_seq(a, b)
}

/// Thread-safe mapping from operator names to predicates.
///
/// Writes are serialised through the lock; lookups proceed concurrently. A registry starts empty;
/// call [`OperatorRegistry::bootstrap`] to install the nine built-ins.
#[derive(Default)]
pub struct OperatorRegistry {
    operators: RwLock<HashMap<String, OperatorFn>>,
}

impl OperatorRegistry {
    /// Create an empty registry.
    pub fn new() -> OperatorRegistry {
        OperatorRegistry::default()
    }

    /// Pre-register the nine built-in operators. Idempotent.
    pub fn bootstrap(&self) {
        self.register(EQUAL, equal);
        self.register(NOT_EQUAL, not_equal);
        self.register(GREATER_THAN, greater_than);
        self.register(LESS_THAN, less_than);
        self.register(GREATER_THAN_OR_EQUAL, greater_than_or_equal);
        self.register(LESS_THAN_OR_EQUAL, less_than_or_equal);
        self.register(CONTAINS, contains);
        self.register(IN, in_seq);
        self.register(NOT_IN, not_in);
    }

    /// Register a named predicate. Registration is idempotent by name: registering the same name
    /// again replaces the previous predicate, built-ins included.
    pub fn register<F>(&self, name: impl Into<String>, op: F)
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        let mut operators = self
            .operators
            .write()
            .expect("thread holding operator lock should not panic");
        operators.insert(name.into(), Arc::new(op));
    }

    /// Apply the named operator to the operands. Returns `None` if no operator is registered under
    /// `name`; the caller treats that as a failing constraint, never a hard error.
    pub fn evaluate(&self, name: &str, a: &Value, b: &Value) -> Option<bool> {
        let op = {
            let operators = self
                .operators
                .read()
                .expect("thread holding operator lock should not panic");
            operators.get(name).cloned()
        };
        op.map(|op| (*op)(a, b))
    }

    /// Returns `true` if an operator is registered under `name`.
    pub fn is_known(&self, name: &str) -> bool {
        self.operators
            .read()
            .expect("thread holding operator lock should not panic")
            .contains_key(name)
    }
}
