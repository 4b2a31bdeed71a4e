//! Error types for reap.
//!
//! Every failure the purge engine can surface is a variant of [`ReapError`].
//! Validation of user input (filters, retention expressions) fails before any
//! registry call; registry failures carry the underlying cause.

use thiserror::Error;


/// Main error type for purge operations
#[derive(Error, Debug)]
pub enum ReapError {
    /// Network-related errors (connection, timeout, DNS, unexpected status)
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Authentication errors (401, 403)
    #[error("Authentication error (status: {status_code:?}): {message}")]
    Authentication {
        message: String,
        status_code: Option<u16>,
    },

    /// Resource not found errors (404)
    #[error("{resource_type} not found: {name}")]
    NotFound { resource_type: String, name: String },

    /// Rate limiting errors (429)
    #[error("Rate limit: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<u64>,
    },

    /// Server errors (500, 502, 503, 504)
    #[error("Server error (status: {status_code}): {message}")]
    Server { message: String, status_code: u16 },

    /// Malformed registry data (unparsable JSON, digest mismatch, missing keys)
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors (invalid config file, out-of-range settings)
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A filter expression or its regular expression is malformed
    #[error("Invalid filter '{filter}': {message}")]
    InvalidFilter {
        filter: String,
        message: String,
        #[source]
        source: Option<regex::Error>,
    },

    /// A retention expression such as `1d2h` is malformed
    #[error("Invalid duration '{input}': {message}")]
    InvalidDuration { input: String, message: String },

    /// A listed tag carries a timestamp that cannot be parsed
    #[error("Invalid timestamp '{value}' on tag {tag}")]
    InvalidTimestamp {
        tag: String,
        value: String,
        #[source]
        source: Option<chrono::ParseError>,
    },

    /// A delete job failed for a reason other than "not found"
    #[error("Failed to delete {kind} {repository}:{reference}")]
    DeletionFailed {
        kind: String,
        repository: String,
        reference: String,
        #[source]
        source: Box<ReapError>,
    },

    /// Writing dry-run output failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// The shared cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for purge operations
pub type Result<T> = std::result::Result<T, ReapError>;

impl ReapError {
    /// Creates a new network error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libreap::error::ReapError;
    ///
    /// let err = ReapError::network("connection refused");
    /// assert!(matches!(err, ReapError::Network { .. }));
    /// ```
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new network error with a source error.
    pub fn network_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new authentication error.
    pub fn authentication<S: Into<String>>(message: S, status_code: Option<u16>) -> Self {
        Self::Authentication {
            message: message.into(),
            status_code,
        }
    }

    /// Creates a new not found error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libreap::error::ReapError;
    ///
    /// let err = ReapError::not_found("repository", "hello-world");
    /// assert!(err.is_not_found());
    /// ```
    pub fn not_found<S: Into<String>>(resource_type: S, name: S) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Creates a new rate limit error.
    pub fn rate_limit<S: Into<String>>(message: S, retry_after: Option<u64>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new server error.
    pub fn server<S: Into<String>>(message: S, status_code: u16) -> Self {
        Self::Server {
            message: message.into(),
            status_code,
        }
    }

    /// Creates a new validation error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libreap::error::ReapError;
    ///
    /// let err = ReapError::validation("manifest list body is not JSON");
    /// assert!(matches!(err, ReapError::Validation { .. }));
    /// ```
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new validation error with a source error.
    pub fn validation_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Validation {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S, path: Option<S>) -> Self {
        Self::Config {
            message: message.into(),
            path: path.map(|p| p.into()),
            source: None,
        }
    }

    /// Creates a new configuration error with a source error.
    pub fn config_with_source<S, E>(message: S, path: Option<S>, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            path: path.map(|p| p.into()),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new invalid filter error.
    pub fn invalid_filter<S: Into<String>>(filter: S, message: S) -> Self {
        Self::InvalidFilter {
            filter: filter.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new invalid duration error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libreap::error::ReapError;
    ///
    /// let err = ReapError::invalid_duration("15p", "unknown unit \"p\"");
    /// assert!(err.to_string().contains("15p"));
    /// ```
    pub fn invalid_duration<S: Into<String>>(input: S, message: S) -> Self {
        Self::InvalidDuration {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Creates a new I/O error.
    pub fn io<S: Into<String>>(message: S, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Returns true when the registry reported the resource as absent.
    ///
    /// Listing treats this as an empty repository and deletion treats it as
    /// success.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
