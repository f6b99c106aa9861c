use crate::Value;

/// The outcome of a parameter resolution: an optional value plus whether a rule or experiment
/// actually matched.
///
/// Resolution is infallible from the caller's perspective; a missing parameter or a misconfigured
/// rule surfaces as an unmatched result, never as an error. The typed accessors return the carried
/// value only when the resolution matched *and* the dynamic type is exactly the accessor's type;
/// in every other case they return the supplied fallback.
///
/// # Examples
/// ```
/// # fn test(client: &polaris::Client) {
/// let enabled = client
///     .get_parameter("new_checkout", &Default::default())
///     .boolean(false);
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValue {
    value: Option<Value>,
    matched: bool,
}

impl ResolvedValue {
    /// A resolution that matched a rule or experiment and carries its value.
    pub fn matched(value: Value) -> ResolvedValue {
        ResolvedValue {
            value: Some(value),
            matched: true,
        }
    }

    /// A resolution that fell through to a default (or found nothing at all).
    pub fn unmatched(value: Option<Value>) -> ResolvedValue {
        ResolvedValue {
            value,
            matched: false,
        }
    }

    /// Returns `true` if a rule or experiment matched.
    pub fn is_matched(&self) -> bool {
        self.matched
    }

    /// The carried value, whether matched or not. `None` when the parameter was not found.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Returns the value if matched and boolean, otherwise `fallback`.
    pub fn boolean(&self, fallback: bool) -> bool {
        self.matched_value()
            .and_then(Value::as_bool)
            .unwrap_or(fallback)
    }

    /// Returns the value if matched and a string, otherwise `fallback`.
    pub fn string(&self, fallback: &str) -> String {
        self.matched_value()
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_owned()
    }

    /// Returns the value if matched and an integer, otherwise `fallback`.
    pub fn integer(&self, fallback: i64) -> i64 {
        self.matched_value()
            .and_then(Value::as_int)
            .unwrap_or(fallback)
    }

    /// Returns the value if matched and a float, otherwise `fallback`. An integer value does not
    /// coerce: the type must match exactly.
    pub fn float(&self, fallback: f64) -> f64 {
        self.matched_value()
            .and_then(Value::as_float)
            .unwrap_or(fallback)
    }

    fn matched_value(&self) -> Option<&Value> {
        if self.matched {
            self.value.as_ref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ResolvedValue;
    use crate::Value;

    #[test]
    fn matched_values_are_returned() {
        assert!(ResolvedValue::matched(true.into()).boolean(false));
        assert_eq!(ResolvedValue::matched("a".into()).string("b"), "a");
        assert_eq!(ResolvedValue::matched(42.into()).integer(0), 42);
        assert_eq!(ResolvedValue::matched(1.5.into()).float(0.0), 1.5);
    }

    #[test]
    fn unmatched_values_fall_back() {
        let resolved = ResolvedValue::unmatched(Some(true.into()));
        assert!(!resolved.is_matched());
        // The default value is carried for inspection but the accessor still falls back.
        assert_eq!(resolved.value(), Some(&Value::Bool(true)));
        assert!(!resolved.boolean(false));
        assert!(resolved.boolean(true));
    }

    #[test]
    fn absent_value_falls_back() {
        let resolved = ResolvedValue::unmatched(None);
        assert_eq!(resolved.value(), None);
        assert_eq!(resolved.string("fallback"), "fallback");
        assert_eq!(resolved.integer(7), 7);
    }

    #[test]
    fn type_mismatch_falls_back() {
        let resolved = ResolvedValue::matched("42".into());
        assert_eq!(resolved.integer(0), 0);
        assert_eq!(resolved.string(""), "42");

        let resolved = ResolvedValue::matched(42.into());
        // Int does not coerce to float, and vice versa.
        assert_eq!(resolved.float(0.5), 0.5);
        let resolved = ResolvedValue::matched(42.0.into());
        assert_eq!(resolved.integer(7), 7);
        assert_eq!(resolved.float(0.0), 42.0);
    }

    #[test]
    fn matched_null_falls_back() {
        let resolved = ResolvedValue::matched(Value::Null);
        assert!(resolved.is_matched());
        assert_eq!(resolved.string("fallback"), "fallback");
        assert!(!resolved.boolean(false));
    }
}
