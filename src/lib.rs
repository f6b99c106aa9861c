//! An embeddable feature-flag and experiment evaluation library.
//!
//! # Overview
//!
//! The library revolves around a [`Client`] that resolves named parameters for "subjects", where
//! each subject is described by an [`AttributeBag`] of key-value attributes. Resolution returns a
//! [`ResolvedValue`]: either a rule-matched or experiment-assigned value, or the parameter's
//! declared default. Assignment to percentage rollouts and experiment variants is deterministic:
//! the same subject resolves to the same value on every call, with no central coordinator.
//!
//! Configuration is pulled from a [`fetcher::Fetcher`] (such as [`fetcher::FileFetcher`]) by a
//! [`synced_storage::SyncedStorage`], which publishes each fetched snapshot atomically and, for
//! non-static sources, keeps polling in the background.
//!
//! ```no_run
//! # use polaris::{AttributeBag, Client, ClientConfig};
//! # use polaris::fetcher::FileFetcher;
//! # use polaris::synced_storage::SyncedStorage;
//! # use std::sync::Arc;
//! # fn main() -> polaris::Result<()> {
//! let fetcher = FileFetcher::new("config/parameters.yaml");
//! let storage = Arc::new(SyncedStorage::new(fetcher));
//! let client = Client::new(storage, ClientConfig::new());
//! client.start()?;
//!
//! let attributes = AttributeBag::from([
//!     ("user_id".to_owned(), "user-42".into()),
//!     ("env".to_owned(), "prod".into()),
//! ]);
//! let color = client.get_parameter("checkout_button", &attributes).string("red");
//! # Ok(())
//! # }
//! ```
//!
//! # Error handling
//!
//! Resolution is infallible from the caller's perspective: an unknown parameter, a misconfigured
//! rule, or an unreachable source all degrade into an unmatched [`ResolvedValue`], and the typed
//! accessors fall back to the value you supply. Errors are surfaced where they are actionable,
//! from [`Client::start`] and the sync pipeline, as the [`Error`] enum.
//!
//! # Logging
//!
//! The library uses the [`log`](https://docs.rs/log/latest/log/) crate (target `polaris`).
//! Consider integrating a `log`-compatible logger implementation for better visibility into sync
//! and resolution behavior.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod configuration;
pub mod configuration_store;
pub mod eval;
pub mod experiment;
pub mod fetcher;
pub mod metrics;
pub mod operators;
pub mod sharder;
pub mod synced_storage;
pub mod validation;

mod attributes;
mod client;
mod error;
mod resolved_value;
mod value;

pub use attributes::AttributeBag;
pub use client::{Client, ClientConfig, GetParameterOptions};
pub use error::{Error, Result};
pub use resolved_value::ResolvedValue;
pub use value::Value;
