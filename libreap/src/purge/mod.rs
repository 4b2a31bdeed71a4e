//! Purge orchestration.
//!
//! [`Purger`] validates every filter and the retention expression up front,
//! then plans each repository in filter order with either the deleting or the
//! reporting strategy. A failure aborts the whole run; the counts gathered
//! until then travel with the error in [`PurgeAborted`].
//!
//! # Examples
//!
//! ```no_run
//! use libreap::{Client, PurgeOptions, Purger};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("myregistry")?;
//! let login_url = client.login_url().to_string();
//! let purger = Purger::new(Arc::new(client), login_url);
//!
//! let options = PurgeOptions::new(vec!["hello-world:^v1\\.".to_string()], "30d");
//! let summary = purger.run(&options, &mut std::io::stdout()).await?;
//! println!("{} tags deleted", summary.tags_deleted);
//! # Ok(())
//! # }
//! ```

use crate::client::{Cancellable, RegistryApi};
use crate::dispatcher::{DEFAULT_CONCURRENCY, Dispatcher};
use crate::duration;
use crate::error::{ReapError, Result};
use crate::filter::{RetentionCriterion, group_filters};
use crate::planner::{Apply, Delete, Report, plan_repository};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;


/// What to purge and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeOptions {
    /// `<repository>:<regex>` expressions
    pub filters: Vec<String>,
    /// Retention expression, e.g. `30d` or `1d12h`
    pub ago: String,
    /// Also delete dangling manifests
    pub untagged: bool,
    /// Report instead of deleting
    pub dry_run: bool,
    /// Number of deletion workers
    pub concurrency: usize,
}

impl PurgeOptions {
    pub fn new(filters: Vec<String>, ago: impl Into<String>) -> Self {
        Self {
            filters,
            ago: ago.into(),
            untagged: false,
            dry_run: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_untagged(mut self, untagged: bool) -> Self {
        self.untagged = untagged;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Objects deleted, or reported in a dry run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeSummary {
    pub tags_deleted: usize,
    pub manifests_deleted: usize,
}

impl PurgeSummary {
    fn since(self, earlier: PurgeSummary) -> PurgeSummary {
        PurgeSummary {
            tags_deleted: self.tags_deleted - earlier.tags_deleted,
            manifests_deleted: self.manifests_deleted - earlier.manifests_deleted,
        }
    }
}

/// A purge that stopped on an error.
#[derive(Error, Debug)]
#[error(
    "purge aborted after {} tags and {} manifests",
    .summary.tags_deleted,
    .summary.manifests_deleted
)]
pub struct PurgeAborted {
    /// Deletions completed before the failure
    pub summary: PurgeSummary,
    #[source]
    pub source: ReapError,
}

impl PurgeAborted {
    fn before_start(source: ReapError) -> Self {
        Self {
            summary: PurgeSummary::default(),
            source,
        }
    }
}

/// Runs purges against one registry.
pub struct Purger {
    registry: Arc<dyn RegistryApi>,
    login_url: String,
    token: CancellationToken,
}

impl Purger {
    /// `login_url` prefixes the references printed by dry runs.
    pub fn new(registry: Arc<dyn RegistryApi>, login_url: impl Into<String>) -> Self {
        Self {
            registry,
            login_url: login_url.into(),
            token: CancellationToken::new(),
        }
    }

    /// Shares a cancellation token with the caller.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Purges relative to the current time.
    ///
    /// Dry-run lines go to `report`; real runs do not write to it.
    pub async fn run(
        &self,
        options: &PurgeOptions,
        report: &mut (dyn Write + Send),
    ) -> std::result::Result<PurgeSummary, PurgeAborted> {
        self.run_at(options, Utc::now(), report).await
    }

    /// Purges with the cutoff computed from `now`.
    pub async fn run_at(
        &self,
        options: &PurgeOptions,
        now: DateTime<Utc>,
        report: &mut (dyn Write + Send),
    ) -> std::result::Result<PurgeSummary, PurgeAborted> {
        let plan = self.prepare(options, now).map_err(PurgeAborted::before_start)?;
        let registry: Arc<dyn RegistryApi> =
            Arc::new(Cancellable::new(Arc::clone(&self.registry), self.token.clone()));

        if options.dry_run {
            let mut apply = Report::new(self.login_url.as_str(), report);
            let result = self.run_plan(registry.as_ref(), &plan, options, &mut apply).await;
            return finish(result, apply.summary());
        }

        let mut dispatcher = Dispatcher::start(
            Arc::clone(&registry),
            options.concurrency,
            self.token.clone(),
        )
        .map_err(PurgeAborted::before_start)?;

        let result = {
            let mut apply = Delete::new(&mut dispatcher);
            self.run_plan(registry.as_ref(), &plan, options, &mut apply).await
        };

        let totals = dispatcher.shutdown().await;
        finish(
            result,
            PurgeSummary {
                tags_deleted: totals.tags,
                manifests_deleted: totals.manifests,
            },
        )
    }

    /// Compiles every filter before the first registry call.
    fn prepare(
        &self,
        options: &PurgeOptions,
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, RetentionCriterion)>> {
        if options.concurrency == 0 {
            return Err(ReapError::config("concurrency must be at least 1", None));
        }
        if options.filters.is_empty() {
            return Err(ReapError::invalid_filter("", "at least one filter is required"));
        }

        let cutoff = duration::cutoff(&options.ago, now)?;
        group_filters(&options.filters)?
            .into_iter()
            .map(|filter| {
                let criterion = RetentionCriterion::for_filter(&filter, cutoff)?;
                Ok((filter.repository, criterion))
            })
            .collect()
    }

    async fn run_plan<A>(
        &self,
        registry: &dyn RegistryApi,
        plan: &[(String, RetentionCriterion)],
        options: &PurgeOptions,
        apply: &mut A,
    ) -> Result<()>
    where
        A: Apply + ?Sized,
    {
        for (repository, criterion) in plan {
            let before = apply.summary();
            plan_repository(registry, repository, criterion, options.untagged, apply).await?;

            let done = apply.summary().since(before);
            info!(
                repository = repository.as_str(),
                tags = done.tags_deleted,
                manifests = done.manifests_deleted,
                dry_run = options.dry_run,
                "repository purged"
            );
        }
        Ok(())
    }
}

fn finish(
    result: Result<()>,
    summary: PurgeSummary,
) -> std::result::Result<PurgeSummary, PurgeAborted> {
    match result {
        Ok(()) => Ok(summary),
        Err(source) => Err(PurgeAborted { summary, source }),
    }
}
