use std::collections::HashMap;

use crate::Value;

/// Type alias for a HashMap representing key-value pairs of attributes describing the subject of
/// an evaluation.
///
/// Keys are strings representing attribute names. The bag is owned by the caller, read-only during
/// evaluation, and lives for a single [`Client::get_parameter`](crate::Client::get_parameter)
/// call. An attribute missing from the bag evaluates as [`Value::Null`].
///
/// # Examples
/// ```
/// # use polaris::AttributeBag;
/// let attributes = [
///     ("age".to_owned(), 30.into()),
///     ("is_premium_member".to_owned(), true.into()),
///     ("username".to_owned(), "john_doe".into()),
/// ].into_iter().collect::<AttributeBag>();
/// ```
pub type AttributeBag = HashMap<String, Value>;
