//! Metrics boundary. The library reports counters and histograms through the
//! [`MetricsRecorder`] trait; implement it to integrate with your observability backend. Tags are
//! `key:value` strings, StatsD style.
/// Recorder for metrics emitted during parameter resolution and configuration sync.
///
/// Implementations must be cheap: `count` and `histogram` are called on the hot read path.
pub trait MetricsRecorder: Send + Sync {
    fn count(&self, metric_name: &str, count: i64, tags: &[String]);
    fn histogram(&self, metric_name: &str, value: f64, tags: &[String]);
}

/// The default recorder. Drops everything.
pub struct NoopMetricsRecorder;

impl MetricsRecorder for NoopMetricsRecorder {
    fn count(&self, _metric_name: &str, _count: i64, _tags: &[String]) {}
    fn histogram(&self, _metric_name: &str, _value: f64, _tags: &[String]) {}
}

/// End-to-end `get_parameter` latency in nanoseconds (histogram).
pub const METRIC_GET_PARAMETER_LATENCY: &str = "get_parameter_latency";
/// `get_parameter` outcome counter; tagged `status:{resolved,fallback,not_found}` and
/// `storage:{default,custom}`.
pub const METRIC_GET_PARAMETER: &str = "get_parameter";
/// Experiment match counter; tagged `experiment:<id>` and `variant:<key>`.
pub const METRIC_EXPERIMENT_MATCHED: &str = "experiment_matched";
/// Sync cycle counter; tagged `status:{success,error}`.
pub const METRIC_SYNC_TOTAL: &str = "sync_total";
/// Storage save latency in nanoseconds (histogram).
pub const METRIC_STORAGE_SAVE_LATENCY: &str = "storage_save_latency";
/// Storage get latency in nanoseconds (histogram).
pub const METRIC_STORAGE_GET_LATENCY: &str = "storage_get_latency";
/// Storage lookup counter; tagged `status:{hit,miss}`.
pub const METRIC_STORAGE_GET_TOTAL: &str = "storage_get_total";

pub(crate) const STATUS_RESOLVED: &str = "status:resolved";
pub(crate) const STATUS_FALLBACK: &str = "status:fallback";
pub(crate) const STATUS_NOT_FOUND: &str = "status:not_found";
pub(crate) const STATUS_SUCCESS: &str = "status:success";
pub(crate) const STATUS_ERROR: &str = "status:error";
pub(crate) const STATUS_HIT: &str = "status:hit";
pub(crate) const STATUS_MISS: &str = "status:miss";
