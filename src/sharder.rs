//! Deterministic hashing for percentage rollouts and variant assignment.
//!
//! A subject's bucket is derived from the canonical string `namespace + ":" + value`, hashed with
//! MurmurHash3 (x86, 32-bit, seed 0) and reduced to the 0..10000 bucket space. The namespace keeps
//! rollouts independent: the same user lands in different buckets for different parameters.
use std::io::Cursor;

use crate::Value;

/// Number of buckets in the rollout space. 10 000 buckets give 0.01% granularity.
pub const NUM_BUCKETS: u32 = 10_000;

pub trait Sharder {
    fn get_bucket(&self, input: impl AsRef<[u8]>, total_buckets: u32) -> u32;
}

/// The default (and only) sharder.
pub struct Murmur3Sharder;

impl Sharder for Murmur3Sharder {
    fn get_bucket(&self, input: impl AsRef<[u8]>, total_buckets: u32) -> u32 {
        let hash = murmur3::murmur3_32(&mut Cursor::new(input.as_ref()), 0)
            .expect("reading from an in-memory cursor cannot fail");
        hash % total_buckets
    }
}

/// Compute the bucket for `value` under `namespace`.
pub(crate) fn bucket(sharder: &impl Sharder, namespace: &str, value: &Value) -> u32 {
    sharder.get_bucket(format!("{namespace}:{value}"), NUM_BUCKETS)
}

/// Percentage gate over a bucket. `percentage <= 0` never passes and `percentage >= 100` always
/// passes, so any (namespace, value) pair that is in at percentage p stays in for every p' > p.
pub(crate) fn is_in_percentage(bucket: u32, percentage: i64) -> bool {
    if percentage <= 0 {
        return false;
    }
    if percentage >= 100 {
        return true;
    }
    let threshold = percentage as u32 * (NUM_BUCKETS / 100);
    bucket < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn murmur3_reference_vectors() {
        // Reference values for MurmurHash3 x86 32-bit with seed 0.
        let sharder = Murmur3Sharder;
        assert_eq!(
            murmur3::murmur3_32(&mut std::io::Cursor::new(b""), 0).unwrap(),
            0
        );
        assert_eq!(
            murmur3::murmur3_32(&mut std::io::Cursor::new(b"hello"), 0).unwrap(),
            0x248b_fa47
        );
        assert!(sharder.get_bucket("hello", NUM_BUCKETS) < NUM_BUCKETS);
    }

    #[test]
    fn bucketing_is_deterministic() {
        let sharder = Murmur3Sharder;
        let a = bucket(&sharder, "checkout", &"user-1".into());
        let b = bucket(&sharder, "checkout", &"user-1".into());
        assert_eq!(a, b);
    }

    #[test]
    fn bucketing_is_namespaced() {
        let sharder = Murmur3Sharder;
        let users = (0..100).map(|i| Value::from(format!("user-{i}")));
        // At least one user must land in different buckets under different namespaces; all of
        // them agreeing would mean the namespace is ignored.
        assert!(users
            .into_iter()
            .any(|u| bucket(&sharder, "checkout", &u) != bucket(&sharder, "search", &u)));
    }

    #[test]
    fn int_and_string_renderings_are_distinct_inputs() {
        let sharder = Murmur3Sharder;
        // "ns:42" hashes identically whether 42 arrived as Int or String; the canonical rendering
        // makes that explicit.
        assert_eq!(
            bucket(&sharder, "ns", &42.into()),
            bucket(&sharder, "ns", &"42".into())
        );
    }

    #[test]
    fn percentage_edges() {
        assert!(!is_in_percentage(0, 0));
        assert!(!is_in_percentage(9_999, 0));
        assert!(!is_in_percentage(0, -5));
        assert!(is_in_percentage(0, 100));
        assert!(is_in_percentage(9_999, 100));
        assert!(is_in_percentage(9_999, 150));
    }

    #[test]
    fn percentage_threshold_is_bucket_times_hundred() {
        assert!(is_in_percentage(4_999, 50));
        assert!(!is_in_percentage(5_000, 50));
        assert!(is_in_percentage(0, 1));
        assert!(!is_in_percentage(100, 1));
    }

    #[test]
    fn rollout_is_monotone() {
        let sharder = Murmur3Sharder;
        for i in 0..50 {
            let value = Value::from(format!("user-{i}"));
            let bucket = bucket(&sharder, "param", &value);
            let mut included = false;
            for percentage in 0..=100 {
                let now_included = is_in_percentage(bucket, percentage);
                // Once in, always in: inclusion may only flip from false to true.
                assert!(now_included || !included);
                included = now_included;
            }
            assert!(included, "everyone is in at 100%");
        }
    }
}
