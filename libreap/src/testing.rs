//! In-memory registry used by the engine tests.

use crate::client::RegistryApi;
use crate::error::{ReapError, Result};
use crate::model::{
    ChangeableAttributes, DOCKER_MANIFEST_LIST, ManifestAttributes, TagAttributes,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A timestamp comfortably older than any cutoff used in tests.
pub const OLD: &str = "2019-07-11T23:35:03.2105066Z";

/// A timestamp newer than any cutoff used in tests.
pub const FRESH: &str = "2999-01-01T00:00:00Z";

type Failure = Box<dyn Fn() -> ReapError + Send + Sync>;

#[derive(Default)]
struct Repository {
    tags: BTreeMap<String, TagAttributes>,
    manifests: BTreeMap<String, ManifestAttributes>,
}

#[derive(Default)]
struct State {
    repositories: BTreeMap<String, Repository>,
    bodies: HashMap<String, Vec<u8>>,
    calls: Vec<String>,
    failures: HashMap<String, Failure>,
    vanished: HashSet<String>,
}

pub struct FakeRegistry {
    state: Mutex<State>,
    page_size: usize,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: 100,
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Every call sleeps for `delay`, so concurrent calls overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Creates an empty repository.
    pub fn with_repository(mut self, repository: &str) -> Self {
        self.state_mut()
            .repositories
            .entry(repository.to_string())
            .or_default();
        self
    }

    /// Adds a tag and records it on the manifest it points at.
    pub fn with_tag(mut self, repository: &str, name: &str, digest: &str, updated: &str) -> Self {
        let repo = self
            .state_mut()
            .repositories
            .entry(repository.to_string())
            .or_default();
        repo.tags.insert(
            name.to_string(),
            TagAttributes {
                name: Some(name.to_string()),
                digest: Some(digest.to_string()),
                created_time: Some(updated.to_string()),
                last_update_time: Some(updated.to_string()),
                ..Default::default()
            },
        );
        let manifest = repo
            .manifests
            .entry(digest.to_string())
            .or_insert_with(|| plain_manifest(digest));
        manifest
            .tags
            .get_or_insert_with(Vec::new)
            .push(name.to_string());
        self
    }

    /// Adds or replaces a manifest record.
    pub fn with_manifest(mut self, repository: &str, manifest: ManifestAttributes) -> Self {
        let digest = manifest.digest.clone().unwrap_or_default();
        self.state_mut()
            .repositories
            .entry(repository.to_string())
            .or_default()
            .manifests
            .insert(digest, manifest);
        self
    }

    /// Adds an untagged image manifest.
    pub fn with_untagged(self, repository: &str, digest: &str) -> Self {
        self.with_manifest(repository, plain_manifest(digest))
    }

    /// Adds a manifest list referencing `children`, tagged with `tags`.
    pub fn with_manifest_list(
        mut self,
        repository: &str,
        digest: &str,
        tags: &[&str],
        children: &[&str],
    ) -> Self {
        let entries: Vec<serde_json::Value> = children
            .iter()
            .map(|child| {
                serde_json::json!({
                    "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
                    "size": 524,
                    "digest": child,
                    "platform": { "architecture": "amd64", "os": "linux" }
                })
            })
            .collect();
        let body = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": DOCKER_MANIFEST_LIST,
            "manifests": entries,
        });
        self.state_mut()
            .bodies
            .insert(digest.to_string(), body.to_string().into_bytes());

        self = self.with_manifest(
            repository,
            ManifestAttributes {
                digest: Some(digest.to_string()),
                media_type: Some(DOCKER_MANIFEST_LIST.to_string()),
                tags: Some(Vec::new()),
                ..Default::default()
            },
        );
        for tag in tags {
            self = self.with_tag(repository, tag, digest, OLD);
        }
        self
    }

    /// Stores a raw manifest body.
    pub fn with_body(mut self, digest: &str, body: &[u8]) -> Self {
        self.state_mut()
            .bodies
            .insert(digest.to_string(), body.to_vec());
        self
    }

    /// Locks a tag or manifest against deletion.
    pub fn lock(mut self, repository: &str, reference: &str) -> Self {
        let locked = Some(ChangeableAttributes {
            delete_enabled: Some(false),
            ..Default::default()
        });
        if let Some(repo) = self.state_mut().repositories.get_mut(repository) {
            if let Some(tag) = repo.tags.get_mut(reference) {
                tag.changeable_attributes = locked.clone();
            }
            if let Some(manifest) = repo.manifests.get_mut(reference) {
                manifest.changeable_attributes = locked;
            }
        }
        self
    }

    /// Makes the call identified by `key` fail with the produced error.
    ///
    /// Keys look like `delete_tag hello v1` or `list_tags hello <last>`.
    pub fn fail_on(
        mut self,
        key: &str,
        error: impl Fn() -> ReapError + Send + Sync + 'static,
    ) -> Self {
        self.state_mut()
            .failures
            .insert(key.to_string(), Box::new(error));
        self
    }

    /// Deleting `reference` reports "not found" as if another client won.
    pub fn vanish_on_delete(mut self, reference: &str) -> Self {
        self.state_mut().vanished.insert(reference.to_string());
        self
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of calls whose key starts with `prefix`.
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn tag_names(&self, repository: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .repositories
            .get(repository)
            .map(|r| r.tags.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn manifest_digests(&self, repository: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .repositories
            .get(repository)
            .map(|r| r.manifests.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Highest number of calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn state_mut(&mut self) -> &mut State {
        self.state.get_mut().unwrap()
    }

    /// Logs the call, tracks concurrency and applies injected failures.
    async fn enter(&self, key: String) -> Result<()> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap();
        let failure = state.failures.get(&key).map(|f| f());
        state.calls.push(key);
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn page<T: Clone>(items: &BTreeMap<String, T>, last: Option<&str>, size: usize) -> Vec<T> {
        items
            .iter()
            .filter(|(key, _)| last.is_none_or(|last| key.as_str() > last))
            .take(size)
            .map(|(_, item)| item.clone())
            .collect()
    }
}

fn plain_manifest(digest: &str) -> ManifestAttributes {
    ManifestAttributes {
        digest: Some(digest.to_string()),
        media_type: Some("application/vnd.docker.distribution.manifest.v2+json".to_string()),
        tags: Some(Vec::new()),
        ..Default::default()
    }
}

#[async_trait]
impl RegistryApi for FakeRegistry {
    async fn list_tags(&self, repository: &str, last: Option<&str>) -> Result<Vec<TagAttributes>> {
        self.enter(format!("list_tags {} {}", repository, last.unwrap_or("")))
            .await?;

        let state = self.state.lock().unwrap();
        let repo = state
            .repositories
            .get(repository)
            .ok_or_else(|| ReapError::not_found("repository", repository))?;
        Ok(Self::page(&repo.tags, last, self.page_size))
    }

    async fn delete_tag(&self, repository: &str, tag: &str) -> Result<()> {
        self.enter(format!("delete_tag {} {}", repository, tag)).await?;

        let mut state = self.state.lock().unwrap();
        if state.vanished.contains(tag) {
            return Err(ReapError::not_found("tag", tag));
        }
        let repo = state
            .repositories
            .get_mut(repository)
            .ok_or_else(|| ReapError::not_found("repository", repository))?;
        let removed = repo
            .tags
            .remove(tag)
            .ok_or_else(|| ReapError::not_found("tag", tag))?;

        if let Some(digest) = removed.digest
            && let Some(manifest) = repo.manifests.get_mut(&digest)
            && let Some(tags) = manifest.tags.as_mut()
        {
            tags.retain(|t| t != tag);
        }
        Ok(())
    }

    async fn list_manifests(
        &self,
        repository: &str,
        last: Option<&str>,
    ) -> Result<Vec<ManifestAttributes>> {
        self.enter(format!("list_manifests {} {}", repository, last.unwrap_or("")))
            .await?;

        let state = self.state.lock().unwrap();
        let repo = state
            .repositories
            .get(repository)
            .ok_or_else(|| ReapError::not_found("repository", repository))?;
        Ok(Self::page(&repo.manifests, last, self.page_size))
    }

    async fn get_manifest(&self, repository: &str, digest: &str) -> Result<Vec<u8>> {
        self.enter(format!("get_manifest {} {}", repository, digest))
            .await?;

        let state = self.state.lock().unwrap();
        state
            .bodies
            .get(digest)
            .cloned()
            .ok_or_else(|| ReapError::not_found("manifest", digest))
    }

    async fn delete_manifest(&self, repository: &str, digest: &str) -> Result<()> {
        self.enter(format!("delete_manifest {} {}", repository, digest))
            .await?;

        let mut state = self.state.lock().unwrap();
        if state.vanished.contains(digest) {
            return Err(ReapError::not_found("manifest", digest));
        }
        let repo = state
            .repositories
            .get_mut(repository)
            .ok_or_else(|| ReapError::not_found("repository", repository))?;
        let removed = repo
            .manifests
            .remove(digest)
            .ok_or_else(|| ReapError::not_found("manifest", digest))?;

        for tag in removed.tags.unwrap_or_default() {
            repo.tags.remove(&tag);
        }
        Ok(())
    }
}
