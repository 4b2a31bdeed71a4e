//! Per-repository purge planning.
//!
//! [`plan_repository`] walks the tags of one repository, hands every
//! candidate to an [`Apply`] strategy, then (when requested) resolves the
//! dangling manifests and hands those over too. Dry runs and real runs share
//! this walk and differ only in the strategy: [`Delete`] submits jobs to the
//! [`Dispatcher`], [`Report`] prints what would be deleted.

use crate::client::RegistryApi;
use crate::dispatcher::{DeleteJob, Dispatcher};
use crate::error::{ReapError, Result};
use crate::filter::RetentionCriterion;
use crate::model::{ManifestAttributes, TagAttributes};
use crate::pager::Pager;
use crate::purge::PurgeSummary;
use crate::resolver;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use tracing::{debug, info, warn};


/// What to do with the objects selected for deletion.
#[async_trait]
pub trait Apply: Send {
    /// A tag selected for deletion.
    async fn tag(&mut self, repository: &str, tag: &TagAttributes) -> Result<()>;

    /// Every candidate of the current tag page has been handed over.
    async fn tags_page_done(&mut self) -> Result<()>;

    /// A dangling manifest selected for deletion.
    async fn manifest(&mut self, repository: &str, manifest: &ManifestAttributes) -> Result<()>;

    /// Every dangling manifest of the repository has been handed over.
    async fn manifests_done(&mut self) -> Result<()>;

    /// Per-digest count of tags selected in `repository` that are still
    /// present in the registry.
    fn pending_untags(&self, repository: &str) -> Option<&HashMap<String, usize>>;

    /// Objects deleted (or reported) so far, across repositories.
    fn summary(&self) -> PurgeSummary;
}

/// Selects and applies the deletions for one repository.
pub async fn plan_repository<A>(
    registry: &dyn RegistryApi,
    repository: &str,
    criterion: &RetentionCriterion,
    untagged: bool,
    apply: &mut A,
) -> Result<()>
where
    A: Apply + ?Sized,
{
    info!("Deleting tags for repository: {}", repository);

    let mut pager = Pager::tags(registry, repository);
    while let Some(page) = pager.next_page().await? {
        let mut selected = 0;
        for tag in &page {
            if criterion.is_candidate(tag)? {
                apply.tag(repository, tag).await?;
                selected += 1;
            }
        }
        debug!(repository, listed = page.len(), selected, "tag page done");
        apply.tags_page_done().await?;
    }

    if pager.repository_missing() {
        warn!("Repository not found: {}", repository);
        return Ok(());
    }

    if !untagged {
        return Ok(());
    }

    info!("Deleting manifests for repository: {}", repository);

    let resolution =
        resolver::resolve(registry, repository, apply.pending_untags(repository)).await?;
    debug!(
        repository,
        deletable = resolution.deletable.len(),
        protected = resolution.protected.len(),
        "manifests resolved"
    );
    for manifest in &resolution.deletable {
        apply.manifest(repository, manifest).await?;
    }
    apply.manifests_done().await
}

/// Deletes through the dispatcher.
pub struct Delete<'d> {
    dispatcher: &'d mut Dispatcher,
}

impl<'d> Delete<'d> {
    pub fn new(dispatcher: &'d mut Dispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl<'d> Apply for Delete<'d> {
    async fn tag(&mut self, repository: &str, tag: &TagAttributes) -> Result<()> {
        let name = tag.name.as_deref().unwrap_or_default();
        self.dispatcher.submit(DeleteJob::tag(repository, name)).await
    }

    async fn tags_page_done(&mut self) -> Result<()> {
        self.dispatcher.sync().await.map(|_| ())
    }

    async fn manifest(&mut self, repository: &str, manifest: &ManifestAttributes) -> Result<()> {
        let digest = manifest.digest.as_deref().unwrap_or_default();
        self.dispatcher
            .submit(DeleteJob::manifest(repository, digest))
            .await
    }

    async fn manifests_done(&mut self) -> Result<()> {
        self.dispatcher.sync().await.map(|_| ())
    }

    fn pending_untags(&self, _repository: &str) -> Option<&HashMap<String, usize>> {
        // deletions are synchronized before manifests are listed
        None
    }

    fn summary(&self) -> PurgeSummary {
        let totals = self.dispatcher.totals();
        PurgeSummary {
            tags_deleted: totals.tags,
            manifests_deleted: totals.manifests,
        }
    }
}

/// Writes one line per object that would be deleted.
///
/// Tags print as `<login-url>/<repository>:<tag>`, manifests as
/// `<login-url>/<repository>@<digest>`.
pub struct Report<'w> {
    login_url: String,
    out: &'w mut (dyn Write + Send),
    pending: HashMap<String, HashMap<String, usize>>,
    summary: PurgeSummary,
}

impl<'w> Report<'w> {
    pub fn new(login_url: impl Into<String>, out: &'w mut (dyn Write + Send)) -> Self {
        Self {
            login_url: login_url.into(),
            out,
            pending: HashMap::new(),
            summary: PurgeSummary::default(),
        }
    }

    fn line(&mut self, line: String) -> Result<()> {
        writeln!(self.out, "{}", line)
            .map_err(|e| ReapError::io("Failed to write dry-run output", e))
    }
}

#[async_trait]
impl<'w> Apply for Report<'w> {
    async fn tag(&mut self, repository: &str, tag: &TagAttributes) -> Result<()> {
        let name = tag.name.as_deref().unwrap_or_default();
        self.line(format!("{}/{}:{}", self.login_url, repository, name))?;

        if let Some(digest) = tag.digest.as_deref() {
            *self
                .pending
                .entry(repository.to_string())
                .or_default()
                .entry(digest.to_string())
                .or_default() += 1;
        }
        self.summary.tags_deleted += 1;
        Ok(())
    }

    async fn tags_page_done(&mut self) -> Result<()> {
        self.out
            .flush()
            .map_err(|e| ReapError::io("Failed to write dry-run output", e))
    }

    async fn manifest(&mut self, repository: &str, manifest: &ManifestAttributes) -> Result<()> {
        let digest = manifest.digest.as_deref().unwrap_or_default();
        self.line(format!("{}/{}@{}", self.login_url, repository, digest))?;
        self.summary.manifests_deleted += 1;
        Ok(())
    }

    async fn manifests_done(&mut self) -> Result<()> {
        self.tags_page_done().await
    }

    fn pending_untags(&self, repository: &str) -> Option<&HashMap<String, usize>> {
        self.pending.get(repository)
    }

    fn summary(&self) -> PurgeSummary {
        self.summary
    }
}
