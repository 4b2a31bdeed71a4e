//! Registry capability and its HTTP implementation.
//!
//! [`RegistryApi`] is the narrow surface the purge engine consumes: paged
//! listings of tags and manifests, manifest bodies, and deletions. [`Client`]
//! implements it on top of reqwest against ACR-style endpoints
//! (`/acr/v1/<repo>/_tags`, `/acr/v1/<repo>/_manifests`) and the OCI
//! Distribution `/v2/<repo>/manifests/<digest>` endpoint.

use crate::auth::Credentials;
use crate::error::{ReapError, Result};
use crate::model::{
    DOCKER_MANIFEST_LIST, ManifestAttributeList, ManifestAttributes, OCI_IMAGE_INDEX, TagAttributes,
    TagList,
};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, RequestBuilder, Response, StatusCode};
use sha2::{Digest as Sha2Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;


/// Domain suffix appended to bare registry names.
pub const DEFAULT_REGISTRY_SUFFIX: &str = ".azurecr.io";

/// Operations the purge engine needs from a registry.
///
/// Listing operations take the key of the last item already seen (`None`
/// for the first page) and return the next page; an empty page means the
/// listing is exhausted. A missing repository is reported as
/// [`ReapError::NotFound`], which callers treat as an empty repository.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Lists the page of tags that follows `last`.
    async fn list_tags(&self, repository: &str, last: Option<&str>) -> Result<Vec<TagAttributes>>;

    /// Deletes a tag, leaving the manifest it pointed at in place.
    async fn delete_tag(&self, repository: &str, tag: &str) -> Result<()>;

    /// Lists the page of manifests that follows `last`.
    async fn list_manifests(
        &self,
        repository: &str,
        last: Option<&str>,
    ) -> Result<Vec<ManifestAttributes>>;

    /// Fetches the raw body of a manifest.
    async fn get_manifest(&self, repository: &str, digest: &str) -> Result<Vec<u8>>;

    /// Deletes a manifest by digest.
    async fn delete_manifest(&self, repository: &str, digest: &str) -> Result<()>;
}

/// Configuration for the HTTP client.
///
/// # Examples
///
/// ```
/// use libreap::client::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_timeout(60)
///     .with_max_idle_per_host(20);
/// assert_eq!(config.timeout_seconds, 60);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
    /// Maximum idle connections per host (default: 10)
    pub max_idle_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_idle_per_host: 10,
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request timeout in seconds.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the maximum idle connections per host.
    pub fn with_max_idle_per_host(mut self, max: usize) -> Self {
        self.max_idle_per_host = max;
        self
    }
}

/// HTTP client for an ACR-compatible registry.
#[derive(Debug, Clone)]
pub struct Client {
    /// The underlying HTTP client
    http_client: ReqwestClient,
    /// Base registry URL (e.g., "https://myregistry.azurecr.io")
    registry_url: String,
    /// Credentials sent with every request
    credentials: Credentials,
    /// Request timeout, kept for error messages
    timeout_seconds: u64,
}

impl Client {
    /// Creates an anonymous client with default configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use libreap::client::Client;
    ///
    /// let client = Client::new("myregistry").unwrap();
    /// assert_eq!(client.registry_url(), "https://myregistry.azurecr.io");
    /// ```
    pub fn new(registry: &str) -> Result<Self> {
        Self::with_config(registry, ClientConfig::default(), Credentials::Anonymous)
    }

    /// Creates a client with custom configuration and credentials.
    pub fn with_config(
        registry: &str,
        config: ClientConfig,
        credentials: Credentials,
    ) -> Result<Self> {
        let normalized_url = Self::normalize_url(registry)?;

        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build()
            .map_err(|e| ReapError::network_with_source("Failed to create HTTP client", e))?;

        Ok(Self {
            http_client,
            registry_url: normalized_url,
            credentials,
            timeout_seconds: config.timeout_seconds,
        })
    }

    /// Normalizes a registry name or URL.
    ///
    /// Bare names without a dot, port or scheme (`myregistry`) expand to the
    /// ACR login server; the scheme defaults to https; trailing slashes go.
    fn normalize_url(registry: &str) -> Result<String> {
        let registry = registry.trim();

        if registry.is_empty() {
            return Err(ReapError::validation("Registry URL cannot be empty"));
        }

        let url = if registry.starts_with("http://") || registry.starts_with("https://") {
            registry.to_string()
        } else {
            format!("https://{}", login_server(registry))
        };

        Ok(url.trim_end_matches('/').to_string())
    }

    /// Returns the base registry URL.
    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    /// Returns the registry host as shown in image references.
    pub fn login_url(&self) -> &str {
        self.registry_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credentials.to_header_value() {
            Some(header) => request.header(reqwest::header::AUTHORIZATION, header),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| self.translate_reqwest_error(e))
    }

    /// Translates a reqwest error into a ReapError.
    fn translate_reqwest_error(&self, error: reqwest::Error) -> ReapError {
        if error.is_timeout() {
            ReapError::network(format!(
                "Request to {} timed out after {} seconds",
                self.registry_url, self.timeout_seconds
            ))
        } else if error.is_connect() {
            ReapError::network_with_source(
                format!("Failed to connect to registry at {}", self.registry_url),
                error,
            )
        } else {
            ReapError::network_with_source(
                format!("Network error communicating with {}", self.registry_url),
                error,
            )
        }
    }

    /// Checks the HTTP response status and translates errors to ReapError.
    async fn check_response_status(
        response: Response,
        resource_type: &str,
        name: &str,
    ) -> Result<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("(unable to read response body)"));

        match status {
            StatusCode::UNAUTHORIZED => Err(ReapError::authentication(
                format!("Authentication required for {}: {}", url, error_body),
                Some(401),
            )),
            StatusCode::FORBIDDEN => Err(ReapError::authentication(
                format!("Access forbidden for {}: {}", url, error_body),
                Some(403),
            )),
            StatusCode::NOT_FOUND => Err(ReapError::not_found(resource_type, name)),
            StatusCode::TOO_MANY_REQUESTS => Err(ReapError::rate_limit(
                format!("Rate limit exceeded for {}", url),
                retry_after,
            )),
            StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => Err(ReapError::server(
                format!("Server error from {}: {}", url, error_body),
                status.as_u16(),
            )),
            _ => Err(ReapError::network(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                url,
                error_body
            ))),
        }
    }

    /// Verifies a fetched body against its content digest.
    ///
    /// Only sha256 digests are checked; other algorithms pass through.
    fn verify_digest(digest: &str, body: &[u8]) -> Result<()> {
        let Some(expected) = digest.strip_prefix("sha256:") else {
            return Ok(());
        };

        let computed = format!("{:x}", Sha256::digest(body));
        if !computed.eq_ignore_ascii_case(expected) {
            return Err(ReapError::validation(format!(
                "Manifest digest mismatch: expected {}, computed sha256:{}",
                digest, computed
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryApi for Client {
    async fn list_tags(&self, repository: &str, last: Option<&str>) -> Result<Vec<TagAttributes>> {
        let url = format!("{}/acr/v1/{}/_tags", self.registry_url, repository);
        let mut request = self.http_client.get(&url);
        if let Some(last) = last {
            request = request.query(&[("last", last)]);
        }

        let response = self.send(request).await?;
        let response = Self::check_response_status(response, "repository", repository).await?;

        let list: TagList = response
            .json()
            .await
            .map_err(|e| ReapError::validation_with_source("Failed to parse tag list", e))?;

        Ok(list.tags.unwrap_or_default())
    }

    async fn delete_tag(&self, repository: &str, tag: &str) -> Result<()> {
        let url = format!("{}/acr/v1/{}/_tags/{}", self.registry_url, repository, tag);

        let response = self.send(self.http_client.delete(&url)).await?;
        Self::check_response_status(response, "tag", &format!("{}:{}", repository, tag)).await?;

        Ok(())
    }

    async fn list_manifests(
        &self,
        repository: &str,
        last: Option<&str>,
    ) -> Result<Vec<ManifestAttributes>> {
        let url = format!("{}/acr/v1/{}/_manifests", self.registry_url, repository);
        let mut request = self.http_client.get(&url);
        if let Some(last) = last {
            request = request.query(&[("last", last)]);
        }

        let response = self.send(request).await?;
        let response = Self::check_response_status(response, "repository", repository).await?;

        let list: ManifestAttributeList = response
            .json()
            .await
            .map_err(|e| ReapError::validation_with_source("Failed to parse manifest list", e))?;

        Ok(list.manifests.unwrap_or_default())
    }

    async fn get_manifest(&self, repository: &str, digest: &str) -> Result<Vec<u8>> {
        let url = format!("{}/v2/{}/manifests/{}", self.registry_url, repository, digest);

        let request = self.http_client.get(&url).header(
            reqwest::header::ACCEPT,
            format!(
                "{}, {}, application/vnd.docker.distribution.manifest.v2+json, \
                 application/vnd.oci.image.manifest.v1+json",
                DOCKER_MANIFEST_LIST, OCI_IMAGE_INDEX
            ),
        );

        let response = self.send(request).await?;
        let response =
            Self::check_response_status(response, "manifest", &format!("{}@{}", repository, digest))
                .await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| ReapError::network_with_source("Failed to read manifest response", e))?;

        Self::verify_digest(digest, &body)?;
        Ok(body.to_vec())
    }

    async fn delete_manifest(&self, repository: &str, digest: &str) -> Result<()> {
        let url = format!("{}/v2/{}/manifests/{}", self.registry_url, repository, digest);

        let response = self.send(self.http_client.delete(&url)).await?;
        Self::check_response_status(response, "manifest", &format!("{}@{}", repository, digest))
            .await?;

        Ok(())
    }
}

/// Expands a bare registry name into its login server.
///
/// # Examples
///
/// ```
/// use libreap::client::login_server;
///
/// assert_eq!(login_server("myregistry"), "myregistry.azurecr.io");
/// assert_eq!(login_server("registry.example.com"), "registry.example.com");
/// assert_eq!(login_server("localhost:5000"), "localhost:5000");
/// ```
pub fn login_server(registry: &str) -> String {
    let registry = registry.trim().trim_end_matches('/');
    if registry.contains('.') || registry.contains(':') || registry == "localhost" {
        registry.to_string()
    } else {
        format!("{}{}", registry.to_lowercase(), DEFAULT_REGISTRY_SUFFIX)
    }
}

/// Runs a registry call unless `token` fires first.
pub async fn cancellable<T, F>(token: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ReapError::Cancelled),
        result = call => result,
    }
}

/// A [`RegistryApi`] whose every call races a cancellation token.
#[derive(Clone)]
pub struct Cancellable {
    inner: Arc<dyn RegistryApi>,
    token: CancellationToken,
}

impl Cancellable {
    pub fn new(inner: Arc<dyn RegistryApi>, token: CancellationToken) -> Self {
        Self { inner, token }
    }
}

#[async_trait]
impl RegistryApi for Cancellable {
    async fn list_tags(&self, repository: &str, last: Option<&str>) -> Result<Vec<TagAttributes>> {
        cancellable(&self.token, self.inner.list_tags(repository, last)).await
    }

    async fn delete_tag(&self, repository: &str, tag: &str) -> Result<()> {
        cancellable(&self.token, self.inner.delete_tag(repository, tag)).await
    }

    async fn list_manifests(
        &self,
        repository: &str,
        last: Option<&str>,
    ) -> Result<Vec<ManifestAttributes>> {
        cancellable(&self.token, self.inner.list_manifests(repository, last)).await
    }

    async fn get_manifest(&self, repository: &str, digest: &str) -> Result<Vec<u8>> {
        cancellable(&self.token, self.inner.get_manifest(repository, digest)).await
    }

    async fn delete_manifest(&self, repository: &str, digest: &str) -> Result<()> {
        cancellable(&self.token, self.inner.delete_manifest(repository, digest)).await
    }
}
