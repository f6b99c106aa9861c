//! A thread-safe in-memory storage for the currently active configuration. [`InMemoryStorage`]
//! provides concurrent access for readers (parameter resolution) and writers (the sync pipeline).
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::configuration::{Configuration, Experiment, Parameter};
use crate::metrics::{
    MetricsRecorder, NoopMetricsRecorder, METRIC_STORAGE_GET_LATENCY, METRIC_STORAGE_GET_TOTAL,
    METRIC_STORAGE_SAVE_LATENCY, STATUS_HIT, STATUS_MISS,
};
use crate::{Error, Result};

/// Storage for the active configuration snapshot.
///
/// The sync pipeline writes through this trait and the client reads through it; a caller may also
/// supply its own implementation per call via
/// [`GetParameterOptions`](crate::GetParameterOptions).
pub trait Storage: Send + Sync {
    /// Replace the stored parameter map.
    fn save(&self, parameters: HashMap<String, Parameter>) -> Result<()>;
    /// Look up one parameter. Returns [`Error::ParameterNotFound`] for unknown names.
    fn get(&self, parameter_name: &str) -> Result<Parameter>;
    /// Replace the stored experiment list.
    fn save_experiments(&self, experiments: Vec<Experiment>) -> Result<()>;
    /// The stored experiment list.
    fn get_experiments(&self) -> Result<Vec<Experiment>>;
}

/// `InMemoryStorage` keeps the current [`Configuration`] behind a readers-writer lock.
///
/// The snapshot itself is immutable: writers build a new `Configuration` and swap the `Arc`, so a
/// reader that has cloned the `Arc` keeps a consistent (parameters, experiments) generation for as
/// long as it holds it.
pub struct InMemoryStorage {
    configuration: RwLock<Arc<Configuration>>,
    recorder: Arc<dyn MetricsRecorder>,
}

impl Default for InMemoryStorage {
    fn default() -> InMemoryStorage {
        InMemoryStorage::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> InMemoryStorage {
        InMemoryStorage::with_recorder(Arc::new(NoopMetricsRecorder))
    }

    pub fn with_recorder(recorder: Arc<dyn MetricsRecorder>) -> InMemoryStorage {
        InMemoryStorage {
            configuration: RwLock::new(Arc::new(Configuration::default())),
            recorder,
        }
    }

    /// The current snapshot. Both fields come from the same generation.
    pub fn configuration(&self) -> Arc<Configuration> {
        // The lock can only be poisoned if a writer panicked while holding it, which should never
        // happen.
        let configuration = self
            .configuration
            .read()
            .expect("thread holding configuration lock should not panic");
        configuration.clone()
    }

    fn replace_with(&self, update: impl FnOnce(&Configuration) -> Configuration) {
        let mut slot = self
            .configuration
            .write()
            .expect("thread holding configuration lock should not panic");
        let next = update(&slot);
        *slot = Arc::new(next);
    }
}

impl Storage for InMemoryStorage {
    fn save(&self, parameters: HashMap<String, Parameter>) -> Result<()> {
        let start = Instant::now();
        self.replace_with(|current| Configuration {
            parameters,
            experiments: current.experiments.clone(),
        });
        self.recorder.histogram(
            METRIC_STORAGE_SAVE_LATENCY,
            start.elapsed().as_nanos() as f64,
            &[],
        );
        Ok(())
    }

    fn get(&self, parameter_name: &str) -> Result<Parameter> {
        let start = Instant::now();
        let configuration = self.configuration();
        let result = configuration
            .parameters
            .get(parameter_name)
            .cloned()
            .ok_or_else(|| Error::ParameterNotFound(parameter_name.to_owned()));

        let status = if result.is_ok() { STATUS_HIT } else { STATUS_MISS };
        self.recorder
            .count(METRIC_STORAGE_GET_TOTAL, 1, &[status.to_owned()]);
        self.recorder.histogram(
            METRIC_STORAGE_GET_LATENCY,
            start.elapsed().as_nanos() as f64,
            &[],
        );
        result
    }

    fn save_experiments(&self, experiments: Vec<Experiment>) -> Result<()> {
        let start = Instant::now();
        self.replace_with(|current| Configuration {
            parameters: current.parameters.clone(),
            experiments,
        });
        self.recorder.histogram(
            METRIC_STORAGE_SAVE_LATENCY,
            start.elapsed().as_nanos() as f64,
            &[],
        );
        Ok(())
    }

    fn get_experiments(&self) -> Result<Vec<Experiment>> {
        Ok(self.configuration().experiments.clone())
    }
}
