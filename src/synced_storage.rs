//! The fetcher/storage pipeline: performs an initial configuration sync, then (for non-static
//! sources) keeps a background thread that periodically re-fetches and atomically publishes each
//! snapshot into the in-memory storage.
use std::collections::HashMap;
use std::sync::mpsc::{RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use rand::{thread_rng, Rng};

use crate::configuration::{Experiment, Parameter};
use crate::configuration_store::{InMemoryStorage, Storage};
use crate::fetcher::Fetcher;
use crate::metrics::{
    MetricsRecorder, NoopMetricsRecorder, METRIC_SYNC_TOTAL, STATUS_ERROR, STATUS_SUCCESS,
};
use crate::operators::OperatorRegistry;
use crate::validation::{validate_experiments, validate_parameters, ValidationErrors};
use crate::{Error, Result};

/// Configuration for [`SyncedStorage`].
#[derive(Clone)]
pub struct SyncedStorageConfig {
    /// Interval to wait between configuration syncs.
    ///
    /// Defaults to [`SyncedStorageConfig::DEFAULT_SYNC_INTERVAL`].
    pub interval: Duration,
    /// Jitter applies a randomized duration to subtract from the interval. This helps to avoid
    /// multiple server instances synchronizing and producing spiky load on the source.
    ///
    /// Defaults to [`SyncedStorageConfig::DEFAULT_SYNC_JITTER`].
    pub jitter: Duration,
    /// When `true`, a failing or invalid initial sync aborts [`SyncedStorage::start`]. When
    /// `false`, the failure is logged and the poller keeps trying.
    pub strict: bool,
    /// Recorder for sync and storage metrics.
    pub recorder: Arc<dyn MetricsRecorder>,
}

impl SyncedStorageConfig {
    /// Default value for [`SyncedStorageConfig::interval`].
    pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);
    /// Default value for [`SyncedStorageConfig::jitter`].
    pub const DEFAULT_SYNC_JITTER: Duration = Duration::from_secs(3);

    /// Create a new `SyncedStorageConfig` using default configuration.
    pub fn new() -> SyncedStorageConfig {
        SyncedStorageConfig::default()
    }

    /// Update the sync interval with `interval`.
    pub fn with_interval(mut self, interval: Duration) -> SyncedStorageConfig {
        self.interval = interval;
        self
    }

    /// Update the sync interval jitter with `jitter`.
    pub fn with_jitter(mut self, jitter: Duration) -> SyncedStorageConfig {
        self.jitter = jitter;
        self
    }

    /// Set whether an initial sync failure aborts [`SyncedStorage::start`].
    pub fn strict(mut self, strict: bool) -> SyncedStorageConfig {
        self.strict = strict;
        self
    }

    /// Set the metrics recorder.
    pub fn metrics_recorder(mut self, recorder: Arc<dyn MetricsRecorder>) -> SyncedStorageConfig {
        self.recorder = recorder;
        self
    }
}

impl Default for SyncedStorageConfig {
    fn default() -> SyncedStorageConfig {
        SyncedStorageConfig {
            interval: SyncedStorageConfig::DEFAULT_SYNC_INTERVAL,
            jitter: SyncedStorageConfig::DEFAULT_SYNC_JITTER,
            strict: false,
            recorder: Arc::new(NoopMetricsRecorder),
        }
    }
}

struct PollerHandle {
    join_handle: std::thread::JoinHandle<()>,
    /// Used to send a stop command to the sync thread.
    stop_sender: SyncSender<()>,
}

/// Storage kept in sync with a [`Fetcher`].
///
/// `SyncedStorage` implements [`Storage`] by delegating reads to its in-memory snapshot, so it can
/// be handed directly to [`Client::new`](crate::Client::new). The background thread started by
/// [`SyncedStorage::start`] is the snapshot's sole writer; readers are unbounded.
pub struct SyncedStorage {
    worker: Arc<SyncWorker>,
    config: SyncedStorageConfig,
    poller: Mutex<Option<PollerHandle>>,
}

impl SyncedStorage {
    /// Create a pipeline around `fetcher` with default configuration.
    pub fn new(fetcher: impl Fetcher + 'static) -> SyncedStorage {
        SyncedStorage::with_config(fetcher, SyncedStorageConfig::default())
    }

    /// Create a pipeline around `fetcher` with the provided configuration.
    pub fn with_config(fetcher: impl Fetcher + 'static, config: SyncedStorageConfig) -> SyncedStorage {
        let operators = Arc::new(OperatorRegistry::new());
        operators.bootstrap();

        SyncedStorage {
            worker: Arc::new(SyncWorker {
                fetcher: Box::new(fetcher),
                storage: InMemoryStorage::with_recorder(config.recorder.clone()),
                operators: RwLock::new(operators),
                recorder: config.recorder.clone(),
            }),
            config,
            poller: Mutex::new(None),
        }
    }

    /// Replace the registry used to validate fetched experiment constraints, so that operators
    /// registered on the client are not reported as unknown.
    pub(crate) fn set_operators(&self, operators: Arc<OperatorRegistry>) {
        *self
            .worker
            .operators
            .write()
            .expect("thread holding operator registry slot should not panic") = operators;
    }

    /// Perform the initial sync and, unless the fetcher is static, start the background sync
    /// thread.
    ///
    /// # Errors
    ///
    /// In strict mode, returns the initial sync failure (fetch, parse or validation). Also fails
    /// if the sync thread cannot be spawned.
    pub fn start(&self) -> Result<()> {
        {
            let poller = self
                .poller
                .lock()
                .expect("thread holding poller slot should not panic");
            if poller.is_some() {
                log::warn!(target: "polaris", "sync pipeline is already started");
                return Ok(());
            }
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        if let Err(err) = runtime.block_on(self.worker.sync(self.config.strict)) {
            if self.config.strict {
                return Err(err);
            }
            log::warn!(target: "polaris", "initial configuration sync failed: {err}");
        }

        if self.worker.fetcher.is_static() {
            log::debug!(target: "polaris", "fetcher is static, not polling");
            return Ok(());
        }

        // Using `sync_channel` here as it makes `stop_sender` `Sync` (shareable between
        // threads). Buffer size of 1 is enough: we `try_send()` the stop command and ignore a full
        // buffer (another thread has sent a stop command already).
        let (stop_sender, stop_receiver) = std::sync::mpsc::sync_channel::<()>(1);

        let join_handle = {
            let worker = Arc::clone(&self.worker);
            let interval = self.config.interval;
            let jitter_limit = self.config.jitter;

            std::thread::Builder::new()
                .name("polaris-sync".to_owned())
                .spawn(move || {
                    let runtime = match tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                    {
                        Ok(runtime) => runtime,
                        Err(err) => {
                            log::error!(target: "polaris", "failed to build sync thread runtime: {err}");
                            return;
                        }
                    };

                    loop {
                        let timeout = jitter(interval, jitter_limit);
                        match stop_receiver.recv_timeout(timeout) {
                            Err(RecvTimeoutError::Timeout) => {
                                // Timed out: a full interval passed without a stop command.
                                log::debug!(target: "polaris", "syncing configuration");
                                if let Err(err) = runtime.block_on(worker.sync(false)) {
                                    log::warn!(target: "polaris", "configuration sync failed: {err}");
                                }
                            }
                            Ok(()) => {
                                log::debug!(target: "polaris", "sync thread received stop command");
                                return;
                            }
                            Err(RecvTimeoutError::Disconnected) => {
                                // When the other end of the channel disconnects, calls to
                                // .recv_timeout() return immediately. Stop the thread.
                                log::debug!(target: "polaris", "sync thread received disconnected");
                                return;
                            }
                        }
                    }
                })?
        };

        *self
            .poller
            .lock()
            .expect("thread holding poller slot should not panic") = Some(PollerHandle {
            join_handle,
            stop_sender,
        });

        Ok(())
    }

    /// Stop the background sync thread.
    ///
    /// The stop takes effect between sync cycles; an in-flight cycle is never interrupted
    /// mid-step. This function does not wait for the thread to actually stop.
    pub fn stop(&self) {
        let poller = self
            .poller
            .lock()
            .expect("thread holding poller slot should not panic");
        if let Some(handle) = &*poller {
            // Error means that the receiver was dropped (thread exited) or the channel buffer is
            // full (a stop command is already queued). Both can be ignored.
            let _ = handle.stop_sender.try_send(());
        }
    }

    /// Stop the background sync thread and block waiting for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SyncThreadPanicked`] if the thread has panicked.
    pub fn shutdown(&self) -> Result<()> {
        let handle = self
            .poller
            .lock()
            .expect("thread holding poller slot should not panic")
            .take();

        if let Some(handle) = handle {
            let _ = handle.stop_sender.try_send(());
            handle
                .join_handle
                .join()
                .map_err(|_| Error::SyncThreadPanicked)?;
        }

        Ok(())
    }

    /// Run one sync cycle immediately on the calling thread.
    pub async fn sync_now(&self) -> Result<()> {
        self.worker.sync(false).await
    }
}

impl Storage for SyncedStorage {
    fn save(&self, parameters: HashMap<String, Parameter>) -> Result<()> {
        self.worker.storage.save(parameters)
    }

    fn get(&self, parameter_name: &str) -> Result<Parameter> {
        self.worker.storage.get(parameter_name)
    }

    fn save_experiments(&self, experiments: Vec<Experiment>) -> Result<()> {
        self.worker.storage.save_experiments(experiments)
    }

    fn get_experiments(&self) -> Result<Vec<Experiment>> {
        self.worker.storage.get_experiments()
    }
}

/// State shared between the pipeline and its background thread.
struct SyncWorker {
    fetcher: Box<dyn Fetcher>,
    storage: InMemoryStorage,
    operators: RwLock<Arc<OperatorRegistry>>,
    recorder: Arc<dyn MetricsRecorder>,
}

impl SyncWorker {
    /// One sync cycle: fetch, validate, publish. With `reject_invalid` (the strict initial sync),
    /// validation findings abort the cycle before anything is published; otherwise they are
    /// logged and the snapshot is published anyway, relying on evaluation-time degradation.
    async fn sync(&self, reject_invalid: bool) -> Result<()> {
        let parameters = match self.fetcher.fetch().await {
            Ok(parameters) => parameters,
            Err(err) => return Err(self.sync_error(err)),
        };

        let findings = validate_parameters(&parameters);
        if !findings.is_empty() {
            let errors = ValidationErrors::from(findings);
            if reject_invalid {
                return Err(self.sync_error(errors.into()));
            }
            log::warn!(target: "polaris", "fetched parameters failed validation: {errors}");
        }

        if let Err(err) = self.storage.save(parameters) {
            return Err(self.sync_error(err));
        }

        match self.fetcher.fetch_experiments().await {
            Ok(Some(experiments)) => {
                let operators = self
                    .operators
                    .read()
                    .expect("thread holding operator registry slot should not panic")
                    .clone();
                let findings = validate_experiments(&experiments, &operators);
                if !findings.is_empty() {
                    let errors = ValidationErrors::from(findings);
                    if reject_invalid {
                        return Err(self.sync_error(errors.into()));
                    }
                    log::warn!(target: "polaris", "fetched experiments failed validation: {errors}");
                }

                if let Err(err) = self.storage.save_experiments(experiments) {
                    return Err(self.sync_error(err));
                }
            }
            // No experiments source configured: the previously stored list stays in force.
            Ok(None) => {}
            Err(err) => return Err(self.sync_error(err)),
        }

        self.recorder
            .count(METRIC_SYNC_TOTAL, 1, &[STATUS_SUCCESS.to_owned()]);
        Ok(())
    }

    fn sync_error(&self, err: Error) -> Error {
        self.recorder
            .count(METRIC_SYNC_TOTAL, 1, &[STATUS_ERROR.to_owned()]);
        err
    }
}

/// Apply randomized `jitter` to `interval`.
fn jitter(interval: Duration, jitter: Duration) -> Duration {
    Duration::saturating_sub(interval, thread_rng().gen_range(Duration::ZERO..=jitter))
}
