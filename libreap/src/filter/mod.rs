//! Retention filters.
//!
//! A filter expression `<repository>:<regex>` selects the tags of one
//! repository by name. All patterns given for the same repository are joined
//! into a single alternation and combined with an age cutoff into a
//! [`RetentionCriterion`].

use crate::error::{ReapError, Result};
use crate::model::TagAttributes;
use chrono::{DateTime, Utc};
use regex::Regex;


/// The patterns requested for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryFilter {
    pub repository: String,
    pub patterns: Vec<String>,
}

/// Splits a `<repository>:<regex>` expression.
///
/// # Examples
///
/// ```
/// use libreap::filter::parse_filter;
///
/// let (repo, pattern) = parse_filter("hello-world:^v1\\..*").unwrap();
/// assert_eq!(repo, "hello-world");
/// assert_eq!(pattern, "^v1\\..*");
/// ```
pub fn parse_filter(expression: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = expression.split(':').collect();
    match parts.as_slice() {
        [repository, pattern] if !repository.is_empty() => {
            Ok((repository.to_string(), pattern.to_string()))
        }
        [_, _] => Err(ReapError::invalid_filter(
            expression,
            "repository name is empty",
        )),
        _ => Err(ReapError::invalid_filter(
            expression,
            "expected <repository>:<regex>",
        )),
    }
}

/// Groups filter expressions per repository, in first-seen order.
pub fn group_filters<S: AsRef<str>>(expressions: &[S]) -> Result<Vec<RepositoryFilter>> {
    let mut groups: Vec<RepositoryFilter> = Vec::new();

    for expression in expressions {
        let (repository, pattern) = parse_filter(expression.as_ref())?;
        match groups.iter_mut().find(|g| g.repository == repository) {
            Some(group) => group.patterns.push(pattern),
            None => groups.push(RepositoryFilter {
                repository,
                patterns: vec![pattern],
            }),
        }
    }

    Ok(groups)
}

/// Decides which tags of a repository are due for deletion.
#[derive(Debug, Clone)]
pub struct RetentionCriterion {
    pattern: Regex,
    cutoff: DateTime<Utc>,
}

impl RetentionCriterion {
    /// Compiles the alternation of `patterns`.
    pub fn new<S: AsRef<str>>(patterns: &[S], cutoff: DateTime<Utc>) -> Result<Self> {
        let joined = patterns
            .iter()
            .map(|p| p.as_ref())
            .collect::<Vec<_>>()
            .join("|");

        let pattern = Regex::new(&joined).map_err(|e| ReapError::InvalidFilter {
            filter: joined.clone(),
            message: "invalid regular expression".to_string(),
            source: Some(e),
        })?;

        Ok(Self { pattern, cutoff })
    }

    /// Builds the criterion for a grouped filter.
    pub fn for_filter(filter: &RepositoryFilter, cutoff: DateTime<Utc>) -> Result<Self> {
        Self::new(&filter.patterns, cutoff).map_err(|e| match e {
            ReapError::InvalidFilter {
                message, source, ..
            } => ReapError::InvalidFilter {
                filter: format!("{}:{}", filter.repository, filter.patterns.join("|")),
                message,
                source,
            },
            other => other,
        })
    }

    /// The combined pattern.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    /// Whether the tag name matches any of the patterns.
    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    /// Whether the tag should be deleted.
    ///
    /// Non-matching tags are never candidates and their timestamps are not
    /// examined. A matching tag with an unparsable or absent `lastUpdateTime`
    /// is an error.
    pub fn is_candidate(&self, tag: &TagAttributes) -> Result<bool> {
        let name = tag.name.as_deref().unwrap_or_default();
        if !self.matches(name) {
            return Ok(false);
        }

        let value = tag.last_update_time.as_deref().unwrap_or_default();
        let updated = DateTime::parse_from_rfc3339(value).map_err(|e| {
            ReapError::InvalidTimestamp {
                tag: name.to_string(),
                value: value.to_string(),
                source: Some(e),
            }
        })?;

        Ok(updated.with_timezone(&Utc) < self.cutoff && tag.delete_enabled())
    }
}
