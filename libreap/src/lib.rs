//! Reap - Container Registry Retention Library
//!
//! Reap deletes old tags and dangling manifests from an Azure Container
//! Registry (or any registry exposing the same `/acr/v1` listing API).
//!
//! # Quick Start
//!
//! ```no_run
//! use libreap::{Client, Credentials, PurgeOptions, Purger};
//! use libreap::client::ClientConfig;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::with_config(
//!         "myregistry",
//!         ClientConfig::default(),
//!         Credentials::basic("token-name", "token-password"),
//!     )?;
//!     let login_url = client.login_url().to_string();
//!
//!     // Delete dev tags older than a week, then anything left dangling
//!     let options = PurgeOptions::new(vec!["hello-world:^dev-".to_string()], "7d")
//!         .with_untagged(true);
//!
//!     let summary = Purger::new(Arc::new(client), login_url)
//!         .run(&options, &mut std::io::stdout())
//!         .await?;
//!     println!(
//!         "{} tags, {} manifests deleted",
//!         summary.tags_deleted, summary.manifests_deleted
//!     );
//!     Ok(())
//! }
//! ```
//!
//! # Main Types
//!
//! - [`Purger`] - Runs a purge over one or more repositories
//! - [`PurgeOptions`] - Filters, retention and run mode
//! - [`Client`] - HTTP implementation of [`RegistryApi`]
//! - [`Credentials`] - Authentication credentials
//!
//! # Architecture
//!
//! A purge is assembled from small parts, each usable on its own:
//! [`duration`] parses retention expressions, [`pager`] walks listings,
//! [`filter`] selects tags, [`resolver`] finds dangling manifests,
//! [`planner`] applies the selection and [`dispatcher`] runs deletions
//! concurrently.

#![warn(clippy::all)]

/// Returns the libreap crate version.
///
/// # Examples
///
/// ```
/// let version = libreap::version();
/// assert!(!version.is_empty());
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub use auth::Credentials;
pub use client::{Client, RegistryApi};
pub use config::Config;
pub use error::{ReapError, Result};
pub use purge::{PurgeAborted, PurgeOptions, PurgeSummary, Purger};

pub mod auth;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod duration;
pub mod error;
pub mod filter;
pub mod model;
pub mod pager;
pub mod planner;
pub mod purge;
pub mod resolver;

#[cfg(test)]
mod testing;
