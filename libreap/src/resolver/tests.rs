use super::*;
use crate::error::ReapError;
use crate::testing::{FakeRegistry, OLD};

fn digests(resolution: &Resolution) -> Vec<&str> {
    resolution
        .deletable
        .iter()
        .map(|m| m.digest.as_deref().unwrap())
        .collect()
}

#[tokio::test]
async fn test_tagged_list_protects_children() {
    let registry = FakeRegistry::new()
        .with_manifest_list("hello", "sha256:d0", &["v3"], &["sha256:d1"])
        .with_untagged("hello", "sha256:d1")
        .with_untagged("hello", "sha256:d2");

    let resolution = resolve(&registry, "hello", None).await.unwrap();

    assert_eq!(digests(&resolution), vec!["sha256:d2"]);
    assert!(resolution.protected.contains("sha256:d1"));
    assert_eq!(registry.count_calls("get_manifest"), 1);
}

#[tokio::test]
async fn test_untagged_list_protects_nothing() {
    let registry = FakeRegistry::new()
        .with_manifest_list("hello", "sha256:d0", &[], &["sha256:d1"])
        .with_untagged("hello", "sha256:d1");

    let resolution = resolve(&registry, "hello", None).await.unwrap();

    assert_eq!(digests(&resolution), vec!["sha256:d0", "sha256:d1"]);
    assert!(resolution.protected.is_empty());
    assert_eq!(registry.count_calls("get_manifest"), 0);
}

#[tokio::test]
async fn test_tagged_images_are_not_candidates() {
    let registry = FakeRegistry::new()
        .with_tag("hello", "v1", "sha256:aa", OLD)
        .with_untagged("hello", "sha256:bb");

    let resolution = resolve(&registry, "hello", None).await.unwrap();
    assert_eq!(digests(&resolution), vec!["sha256:bb"]);
}

#[tokio::test]
async fn test_locked_manifests_are_kept() {
    let registry = FakeRegistry::new()
        .with_untagged("hello", "sha256:aa")
        .with_untagged("hello", "sha256:bb")
        .lock("hello", "sha256:aa");

    let resolution = resolve(&registry, "hello", None).await.unwrap();
    assert_eq!(digests(&resolution), vec!["sha256:bb"]);
}

#[tokio::test]
async fn test_pending_untags_release_protection() {
    let registry = FakeRegistry::new()
        .with_manifest_list("hello", "sha256:d0", &["v1", "v2"], &["sha256:d1"])
        .with_untagged("hello", "sha256:d1");

    // only one of the two tags scheduled: still protected
    let partial = HashMap::from([("sha256:d0".to_string(), 1)]);
    let resolution = resolve(&registry, "hello", Some(&partial)).await.unwrap();
    assert!(digests(&resolution).is_empty());

    // both scheduled: the list and its child become dangling
    let all = HashMap::from([("sha256:d0".to_string(), 2)]);
    let resolution = resolve(&registry, "hello", Some(&all)).await.unwrap();
    assert_eq!(digests(&resolution), vec!["sha256:d0", "sha256:d1"]);
}

#[tokio::test]
async fn test_protection_spans_pages() {
    // the child sorts before the list, so it is seen on an earlier page
    let registry = FakeRegistry::new()
        .with_page_size(1)
        .with_untagged("hello", "sha256:a-child")
        .with_manifest_list("hello", "sha256:z-list", &["latest"], &["sha256:a-child"]);

    let resolution = resolve(&registry, "hello", None).await.unwrap();
    assert!(digests(&resolution).is_empty());
}

#[tokio::test]
async fn test_missing_repository() {
    let registry = FakeRegistry::new();

    let resolution = resolve(&registry, "ghost", None).await.unwrap();
    assert!(resolution.deletable.is_empty());
    assert!(resolution.repository_missing);
}

#[tokio::test]
async fn test_unparsable_list_body_aborts() {
    let registry = FakeRegistry::new()
        .with_manifest_list("hello", "sha256:d0", &["v1"], &[])
        .with_body("sha256:d0", b"not json");

    let err = resolve(&registry, "hello", None).await.unwrap_err();
    assert!(matches!(err, ReapError::Validation { .. }));
}
