//! Lazy, forward-only pagination over registry listings.
//!
//! A [`Pager`] hides the `last` cursor of the ACR listing endpoints: each
//! call to [`Pager::next_page`] fetches the page following the last item
//! already returned, and an empty page ends the sequence. A repository the
//! registry reports as missing yields an empty sequence instead of an error.

use crate::client::RegistryApi;
use crate::error::{ReapError, Result};
use crate::model::{ManifestAttributes, TagAttributes};
use futures::future::BoxFuture;
use std::marker::PhantomData;
use tracing::debug;


/// An item of a paged listing.
pub trait Paged: Sized + Send {
    /// Human-readable kind, used in log lines and errors.
    const KIND: &'static str;

    /// The key the next page starts after.
    fn key(&self) -> Option<&str>;

    /// Fetches the page following `last`.
    fn fetch<'a>(
        registry: &'a dyn RegistryApi,
        repository: &'a str,
        last: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<Self>>>;
}

impl Paged for TagAttributes {
    const KIND: &'static str = "tag";

    fn key(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn fetch<'a>(
        registry: &'a dyn RegistryApi,
        repository: &'a str,
        last: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<Self>>> {
        registry.list_tags(repository, last)
    }
}

impl Paged for ManifestAttributes {
    const KIND: &'static str = "manifest";

    fn key(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    fn fetch<'a>(
        registry: &'a dyn RegistryApi,
        repository: &'a str,
        last: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<Self>>> {
        registry.list_manifests(repository, last)
    }
}

/// Paged listing of one repository.
pub struct Pager<'a, T> {
    registry: &'a dyn RegistryApi,
    repository: &'a str,
    last: Option<String>,
    finished: bool,
    missing: bool,
    pages: usize,
    _item: PhantomData<T>,
}

impl<'a> Pager<'a, TagAttributes> {
    /// Pages through the tags of `repository`.
    pub fn tags(registry: &'a dyn RegistryApi, repository: &'a str) -> Self {
        Self::new(registry, repository)
    }
}

impl<'a> Pager<'a, ManifestAttributes> {
    /// Pages through the manifests of `repository`.
    pub fn manifests(registry: &'a dyn RegistryApi, repository: &'a str) -> Self {
        Self::new(registry, repository)
    }
}

impl<'a, T: Paged> Pager<'a, T> {
    pub fn new(registry: &'a dyn RegistryApi, repository: &'a str) -> Self {
        Self {
            registry,
            repository,
            last: None,
            finished: false,
            missing: false,
            pages: 0,
            _item: PhantomData,
        }
    }

    /// Returns the next non-empty page, or `None` once the listing is done.
    ///
    /// After the end (or an error) further calls return `Ok(None)` without
    /// contacting the registry.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>> {
        if self.finished {
            return Ok(None);
        }

        let fetched = T::fetch(self.registry, self.repository, self.last.as_deref()).await;
        let page = match fetched {
            Ok(page) => page,
            Err(e) if e.is_not_found() => {
                debug!(
                    repository = self.repository,
                    "repository not found while listing {}s",
                    T::KIND
                );
                self.finished = true;
                self.missing = true;
                return Ok(None);
            }
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };

        if page.is_empty() {
            self.finished = true;
            return Ok(None);
        }

        let keys_present = page.iter().all(|item| item.key().is_some());
        let last = page.last().and_then(Paged::key).map(str::to_string);
        match last {
            Some(last) if keys_present => self.last = Some(last),
            _ => {
                self.finished = true;
                return Err(ReapError::validation(format!(
                    "Listing of {} returned a {} without its identifying key",
                    self.repository,
                    T::KIND
                )));
            }
        }

        self.pages += 1;
        debug!(
            repository = self.repository,
            page = self.pages,
            items = page.len(),
            "fetched {} page",
            T::KIND
        );
        Ok(Some(page))
    }

    /// Whether the sequence ended because the repository does not exist.
    pub fn repository_missing(&self) -> bool {
        self.missing
    }

    /// Drains the remaining pages into one vector.
    pub async fn collect_all(&mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            items.extend(page);
        }
        Ok(items)
    }
}
