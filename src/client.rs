use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::configuration_store::Storage;
use crate::eval::Engine;
use crate::experiment::ExperimentEngine;
use crate::metrics::{
    MetricsRecorder, NoopMetricsRecorder, METRIC_EXPERIMENT_MATCHED, METRIC_GET_PARAMETER,
    METRIC_GET_PARAMETER_LATENCY, STATUS_FALLBACK, STATUS_NOT_FOUND, STATUS_RESOLVED,
};
use crate::operators::OperatorRegistry;
use crate::synced_storage::SyncedStorage;
use crate::{AttributeBag, ResolvedValue, Result, Value};

/// Configuration for [`Client`].
///
/// # Examples
/// ```
/// # use polaris::{Client, ClientConfig};
/// # use polaris::fetcher::FileFetcher;
/// # use polaris::synced_storage::SyncedStorage;
/// # use std::sync::Arc;
/// let storage = Arc::new(SyncedStorage::new(FileFetcher::new("parameters.yaml")));
/// let client = Client::new(storage, ClientConfig::new());
/// ```
pub struct ClientConfig {
    pub(crate) recorder: Arc<dyn MetricsRecorder>,
}

impl ClientConfig {
    /// Create a default client configuration.
    pub fn new() -> ClientConfig {
        ClientConfig::default()
    }

    /// Set the metrics recorder used for resolution counters and latency histograms.
    pub fn metrics_recorder(mut self, recorder: Arc<dyn MetricsRecorder>) -> ClientConfig {
        self.recorder = recorder;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            recorder: Arc::new(NoopMetricsRecorder),
        }
    }
}

/// Per-call options for [`Client::get_parameter_with_options`].
#[derive(Default, Clone)]
pub struct GetParameterOptions {
    /// Resolve against this storage instead of the client's synced storage.
    pub storage: Option<Arc<dyn Storage>>,
}

/// Entry point for parameter resolution.
///
/// A `Client` composes the synced storage, the rule evaluation engine, and the experiment engine.
/// Resolution order is experiment-before-parameter: a matching running experiment overrides the
/// parameter's own rules.
///
/// # Examples
/// ```no_run
/// # use polaris::{AttributeBag, Client, ClientConfig};
/// # use polaris::fetcher::FileFetcher;
/// # use polaris::synced_storage::SyncedStorage;
/// # use std::sync::Arc;
/// # fn main() -> polaris::Result<()> {
/// let storage = Arc::new(SyncedStorage::new(FileFetcher::new("parameters.yaml")));
/// let client = Client::new(storage, ClientConfig::new());
/// client.start()?;
///
/// let attributes = AttributeBag::from([("user_id".to_owned(), "user-1".into())]);
/// let color = client.get_parameter("checkout_button", &attributes).string("red");
/// # Ok(())
/// # }
/// ```
pub struct Client {
    storage: Arc<SyncedStorage>,
    engine: Engine,
    experiment_engine: ExperimentEngine,
    operators: Arc<OperatorRegistry>,
    recorder: Arc<dyn MetricsRecorder>,
}

impl Client {
    /// Create a new `Client` reading from the given synced storage.
    pub fn new(storage: Arc<SyncedStorage>, config: ClientConfig) -> Client {
        let operators = Arc::new(OperatorRegistry::new());
        operators.bootstrap();

        // The pipeline validates fetched experiment constraints against the same registry, so
        // custom operators registered on this client are known there too.
        storage.set_operators(operators.clone());

        Client {
            storage,
            engine: Engine::new(operators.clone()),
            experiment_engine: ExperimentEngine::new(operators.clone()),
            operators,
            recorder: config.recorder,
        }
    }

    /// Perform the initial configuration sync and start background polling.
    ///
    /// See [`SyncedStorage::start`] for failure semantics.
    pub fn start(&self) -> Result<()> {
        log::info!(target: "polaris", "starting polaris client");
        self.storage.start()
    }

    /// Stop background polling and wait for the sync thread to exit.
    pub fn shutdown(&self) -> Result<()> {
        self.storage.shutdown()
    }

    /// Resolve `parameter_name` for the given attribute bag.
    ///
    /// Resolution never fails: an unknown parameter, a misconfigured rule, or an unavailable
    /// storage all degrade into an unmatched [`ResolvedValue`].
    pub fn get_parameter(&self, parameter_name: &str, attributes: &AttributeBag) -> ResolvedValue {
        self.get_parameter_with_options(parameter_name, attributes, GetParameterOptions::default())
    }

    /// Resolve `parameter_name`, optionally against a caller-supplied storage.
    pub fn get_parameter_with_options(
        &self,
        parameter_name: &str,
        attributes: &AttributeBag,
        options: GetParameterOptions,
    ) -> ResolvedValue {
        log::debug!(target: "polaris", "getting parameter {parameter_name}");
        let start = Instant::now();

        let result = self.resolve(parameter_name, attributes, &options);

        self.recorder.histogram(
            METRIC_GET_PARAMETER_LATENCY,
            start.elapsed().as_nanos() as f64,
            &[],
        );
        result
    }

    fn resolve(
        &self,
        parameter_name: &str,
        attributes: &AttributeBag,
        options: &GetParameterOptions,
    ) -> ResolvedValue {
        let now = Utc::now();
        let storage_tag = if options.storage.is_some() {
            "storage:custom"
        } else {
            "storage:default"
        };
        let storage: &dyn Storage = match &options.storage {
            Some(storage) => storage.as_ref(),
            None => &*self.storage,
        };

        // Experiments take precedence over the parameter's own rules. Both reads below go through
        // the same storage object, so they observe one consistent snapshot holder.
        match storage.get_experiments() {
            Ok(experiments) if !experiments.is_empty() => {
                if let Some(evaluation) =
                    self.experiment_engine
                        .evaluate(&experiments, parameter_name, attributes, now)
                {
                    let value = evaluation
                        .values
                        .get(parameter_name)
                        .cloned()
                        .unwrap_or(Value::Null);
                    self.recorder.count(
                        METRIC_EXPERIMENT_MATCHED,
                        1,
                        &[
                            format!("experiment:{}", evaluation.experiment_id),
                            format!("variant:{}", evaluation.variant_key),
                        ],
                    );
                    return ResolvedValue::matched(value);
                }
            }
            Ok(_) => {}
            Err(err) => {
                log::warn!(target: "polaris", "failed to get experiments: {err}");
            }
        }

        let parameter = match storage.get(parameter_name) {
            Ok(parameter) => parameter,
            Err(err) => {
                log::error!(target: "polaris", "failed to get parameter {parameter_name}: {err}");
                self.recorder.count(
                    METRIC_GET_PARAMETER,
                    1,
                    &[STATUS_NOT_FOUND.to_owned(), storage_tag.to_owned()],
                );
                return ResolvedValue::unmatched(None);
            }
        };

        let result = self
            .engine
            .evaluate_parameter(parameter_name, &parameter, attributes, now);

        let status = if result.is_matched() {
            STATUS_RESOLVED
        } else {
            STATUS_FALLBACK
        };
        self.recorder.count(
            METRIC_GET_PARAMETER,
            1,
            &[status.to_owned(), storage_tag.to_owned()],
        );

        result
    }

    /// Register a custom operator for use in rule and experiment constraints.
    ///
    /// Registration is idempotent by name and replaces any previous predicate, built-ins
    /// included.
    ///
    /// # Examples
    /// ```
    /// # fn test(client: &polaris::Client) {
    /// client.register_operator("startsWith", |a, b| {
    ///     match (a.as_str(), b.as_str()) {
    ///         (Some(a), Some(b)) => a.starts_with(b),
    ///         _ => false,
    ///     }
    /// });
    /// # }
    /// ```
    pub fn register_operator<F>(&self, name: impl Into<String>, op: F)
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        log::info!(target: "polaris", "registering custom operator {name}");
        self.operators.register(name, op);
    }
}
