use libreap::client::ClientConfig;
use libreap::{Client, Credentials, PurgeOptions, PurgeSummary, Purger, ReapError};
use mockito::Matcher;
use std::sync::Arc;

const TAGS_PAGE: &str = r#"{
    "registry": "localhost",
    "imageName": "hello-world",
    "tags": [
        {"name": "v1", "digest": "sha256:aa", "lastUpdateTime": "2019-07-11T23:35:03.2105066Z"},
        {"name": "v2", "digest": "sha256:bb", "lastUpdateTime": "2999-01-01T00:00:00Z"}
    ]
}"#;

fn purger(server: &mockito::ServerGuard) -> Purger {
    let client = Client::with_config(
        &server.url(),
        ClientConfig::default(),
        Credentials::basic("user", "pass"),
    )
    .unwrap();
    let login_url = client.login_url().to_string();
    Purger::new(Arc::new(client), login_url)
}

#[test]
fn test_version_is_exposed() {
    assert!(!libreap::version().is_empty());
}

#[tokio::test]
async fn test_purge_over_http() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("GET", "/acr/v1/hello-world/_tags")
        .match_query(Matcher::Missing)
        .with_status(200)
        .with_body(TAGS_PAGE)
        .create_async()
        .await;
    let last = server
        .mock("GET", "/acr/v1/hello-world/_tags")
        .match_query(Matcher::UrlEncoded("last".into(), "v2".into()))
        .with_status(200)
        .with_body(r#"{"tags": []}"#)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/acr/v1/hello-world/_tags/v1")
        .match_header("authorization", "Basic dXNlcjpwYXNz")
        .with_status(202)
        .expect(1)
        .create_async()
        .await;

    let options = PurgeOptions::new(vec!["hello-world:.*".to_string()], "30d");
    let summary = purger(&server)
        .run(&options, &mut std::io::sink())
        .await
        .unwrap();

    first.assert_async().await;
    last.assert_async().await;
    delete.assert_async().await;
    assert_eq!(
        summary,
        PurgeSummary {
            tags_deleted: 1,
            manifests_deleted: 0
        }
    );
}

#[tokio::test]
async fn test_dry_run_over_http_never_deletes() {
    let mut server = mockito::Server::new_async().await;
    let _list = server
        .mock("GET", "/acr/v1/hello-world/_tags")
        .match_query(Matcher::Missing)
        .with_status(200)
        .with_body(TAGS_PAGE)
        .create_async()
        .await;
    let _end = server
        .mock("GET", "/acr/v1/hello-world/_tags")
        .match_query(Matcher::UrlEncoded("last".into(), "v2".into()))
        .with_status(200)
        .with_body(r#"{"tags": []}"#)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let options = PurgeOptions::new(vec!["hello-world:.*".to_string()], "30d").with_dry_run(true);
    let mut out = Vec::new();
    let summary = purger(&server).run(&options, &mut out).await.unwrap();

    delete.assert_async().await;
    assert_eq!(summary.tags_deleted, 1);

    let host = server.url().trim_start_matches("http://").to_string();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        format!("{}/hello-world:v1\n", host)
    );
}

#[tokio::test]
async fn test_missing_repository_over_http() {
    let mut server = mockito::Server::new_async().await;
    let _missing = server
        .mock("GET", "/acr/v1/ghost/_tags")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let options = PurgeOptions::new(vec!["ghost:.*".to_string()], "1d").with_untagged(true);
    let summary = purger(&server)
        .run(&options, &mut std::io::sink())
        .await
        .unwrap();

    assert_eq!(summary, PurgeSummary::default());
}

#[tokio::test]
async fn test_unauthorized_aborts() {
    let mut server = mockito::Server::new_async().await;
    let _denied = server
        .mock("GET", "/acr/v1/hello-world/_tags")
        .match_query(Matcher::Any)
        .with_status(401)
        .create_async()
        .await;

    let options = PurgeOptions::new(vec!["hello-world:.*".to_string()], "1d");
    let err = purger(&server)
        .run(&options, &mut std::io::sink())
        .await
        .unwrap_err();

    assert!(matches!(
        err.source,
        ReapError::Authentication {
            status_code: Some(401),
            ..
        }
    ));
}
