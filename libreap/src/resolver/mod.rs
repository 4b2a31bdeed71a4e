//! Dangling manifest resolution.
//!
//! An untagged manifest may still be needed: a tagged manifest list keeps
//! every platform manifest it references alive. The resolver lists the whole
//! repository once, then makes two passes over the snapshot:
//!
//! 1. scan: tagged manifest lists contribute their children to the protected
//!    set; untagged manifests become candidates;
//! 2. filter: candidates that are protected or locked are dropped.

use crate::client::RegistryApi;
use crate::error::Result;
use crate::model::{ManifestAttributes, ManifestListDescriptor};
use crate::pager::Pager;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[cfg(test)]
mod tests;

/// Outcome of resolving one repository.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Manifests safe to delete, in listing order.
    pub deletable: Vec<ManifestAttributes>,
    /// Digests referenced by a still-tagged manifest list.
    pub protected: HashSet<String>,
    /// Whether the repository was reported missing.
    pub repository_missing: bool,
}

/// Finds the untagged manifests of `repository` no tagged list depends on.
///
/// `pending` maps a digest to the number of its tags already scheduled for
/// deletion but still present in the registry (dry runs). Those tags are
/// subtracted before deciding whether a manifest is tagged.
pub async fn resolve(
    registry: &dyn RegistryApi,
    repository: &str,
    pending: Option<&HashMap<String, usize>>,
) -> Result<Resolution> {
    let mut pager = Pager::manifests(registry, repository);
    let manifests = pager.collect_all().await?;

    let remaining_tags = |manifest: &ManifestAttributes| {
        let scheduled = manifest
            .digest
            .as_deref()
            .and_then(|d| pending.and_then(|p| p.get(d)))
            .copied()
            .unwrap_or(0);
        manifest.tag_count().saturating_sub(scheduled)
    };

    let mut protected = HashSet::new();
    let mut candidates = Vec::new();

    for manifest in manifests {
        let tagged = remaining_tags(&manifest) > 0;

        if tagged && manifest.is_manifest_list() {
            let digest = manifest.digest.as_deref().unwrap_or_default();
            let body = registry.get_manifest(repository, digest).await?;
            let list = ManifestListDescriptor::from_bytes(&body)?;
            for child in list.dependent_digests() {
                protected.insert(child.to_string());
            }
            debug!(
                repository,
                digest,
                children = list.manifests.len(),
                "manifest list protects its children"
            );
        }

        if !tagged {
            candidates.push(manifest);
        }
    }

    let deletable = candidates
        .into_iter()
        .filter(|m| {
            let digest = m.digest.as_deref().unwrap_or_default();
            !protected.contains(digest) && m.delete_enabled()
        })
        .collect();

    Ok(Resolution {
        deletable,
        protected,
        repository_missing: pager.repository_missing(),
    })
}
