//! The upstream boundary of the sync pipeline. A [`Fetcher`] produces configuration documents
//! from some external source; [`FileFetcher`] reads them from local YAML or JSON files.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::configuration::{Experiment, ExperimentsDocument, Parameter};
use crate::{Error, Result};

/// Source of configuration snapshots.
///
/// `fetch_experiments` distinguishes "no experiments source configured" (`Ok(None)`, the pipeline
/// leaves the stored list untouched) from "the source says there are no experiments"
/// (`Ok(Some(vec![]))`, the pipeline clears the stored list).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the parameters document.
    async fn fetch(&self) -> Result<HashMap<String, Parameter>>;

    /// Fetch the experiments document, or `None` when no experiments source is configured.
    async fn fetch_experiments(&self) -> Result<Option<Vec<Experiment>>>;

    /// `true` means the source never changes and the pipeline must not poll it.
    fn is_static(&self) -> bool;
}

/// Reads parameter and experiment documents from the local filesystem.
///
/// The file extension decides the format: `.yaml`/`.yml` or `.json`. When no experiments path is
/// configured, `experiments.yaml` next to the parameters file is tried; if that file does not
/// exist the fetcher reports no experiments source.
///
/// # Examples
/// ```no_run
/// # use polaris::fetcher::FileFetcher;
/// let fetcher = FileFetcher::new("config/parameters.yaml")
///     .with_experiments_path("config/experiments.yaml")
///     .static_source(true);
/// ```
pub struct FileFetcher {
    parameters_path: PathBuf,
    experiments_path: Option<PathBuf>,
    is_static: bool,
}

impl FileFetcher {
    /// Create a fetcher reading parameters from `parameters_path`.
    pub fn new(parameters_path: impl Into<PathBuf>) -> FileFetcher {
        FileFetcher {
            parameters_path: parameters_path.into(),
            experiments_path: None,
            is_static: false,
        }
    }

    /// Read experiments from `experiments_path` instead of the default sibling file.
    pub fn with_experiments_path(mut self, experiments_path: impl Into<PathBuf>) -> FileFetcher {
        self.experiments_path = Some(experiments_path.into());
        self
    }

    /// Mark the files as a constant source: the pipeline reads them once and never polls.
    pub fn static_source(mut self, is_static: bool) -> FileFetcher {
        self.is_static = is_static;
        self
    }

    fn resolved_experiments_path(&self) -> PathBuf {
        match &self.experiments_path {
            Some(path) => path.clone(),
            None => self
                .parameters_path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join("experiments.yaml"),
        }
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self) -> Result<HashMap<String, Parameter>> {
        let bytes = tokio::fs::read(&self.parameters_path).await?;
        parse_document(&self.parameters_path, &bytes)
    }

    async fn fetch_experiments(&self) -> Result<Option<Vec<Experiment>>> {
        let path = self.resolved_experiments_path();

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            // A missing default sibling file means "no experiments source", not an error.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let document: ExperimentsDocument = parse_document(&path, &bytes)?;
        Ok(Some(document.experiments))
    }

    fn is_static(&self) -> bool {
        self.is_static
    }
}

fn parse_document<T: serde::de::DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T> {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_slice(bytes)?),
        Some("json") => Ok(serde_json::from_slice(bytes)?),
        _ => Err(Error::UnsupportedFormat(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{Fetcher, FileFetcher};
    use crate::Error;

    const PARAMETERS_YAML: &str = "
checkout:
  defaultValue: red
  rules:
    - rolloutValue: green
      constraints:
        - field: env
          operator: equal
          value: prod
";

    const EXPERIMENTS_YAML: &str = "
experiments:
  - id: exp-1
    name: Exp 1
    parameters: [checkout]
    hashAttribute: uid
    populationSize: 100
    priority: 1
    status: running
    variants:
      - key: all
        rollout: 100
        values:
          checkout: green
";

    fn write_file(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn fetches_yaml_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "parameters.yaml", PARAMETERS_YAML);

        let fetcher = FileFetcher::new(path);
        let parameters = fetcher.fetch().await.unwrap();
        assert_eq!(parameters["checkout"].default_value, "red".into());
        assert_eq!(parameters["checkout"].rules.len(), 1);
    }

    #[tokio::test]
    async fn fetches_json_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "parameters.json",
            r#"{"checkout": {"defaultValue": "red"}}"#,
        );

        let parameters = FileFetcher::new(path).fetch().await.unwrap();
        assert_eq!(parameters["checkout"].default_value, "red".into());
    }

    #[tokio::test]
    async fn rejects_unknown_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "parameters.toml", "x = 1");

        let result = FileFetcher::new(path).fetch().await;
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn missing_parameters_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileFetcher::new(dir.path().join("absent.yaml")).fetch().await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn experiments_default_to_the_sibling_file() {
        let dir = tempfile::tempdir().unwrap();
        let parameters = write_file(dir.path(), "parameters.yaml", PARAMETERS_YAML);
        write_file(dir.path(), "experiments.yaml", EXPERIMENTS_YAML);

        let experiments = FileFetcher::new(parameters)
            .fetch_experiments()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(experiments.len(), 1);
        assert_eq!(experiments[0].id, "exp-1");
    }

    #[tokio::test]
    async fn missing_experiments_file_means_no_source() {
        let dir = tempfile::tempdir().unwrap();
        let parameters = write_file(dir.path(), "parameters.yaml", PARAMETERS_YAML);

        let experiments = FileFetcher::new(parameters).fetch_experiments().await.unwrap();
        assert!(experiments.is_none());
    }

    #[tokio::test]
    async fn explicit_experiments_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let parameters = write_file(dir.path(), "parameters.yaml", PARAMETERS_YAML);
        let experiments = write_file(dir.path(), "custom.yaml", EXPERIMENTS_YAML);

        let fetched = FileFetcher::new(parameters)
            .with_experiments_path(experiments)
            .fetch_experiments()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched[0].id, "exp-1");
    }

    #[tokio::test]
    async fn malformed_document_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "parameters.json", "{not json");

        let result = FileFetcher::new(path).fetch().await;
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
