//! # Descriptor module
//!
//! This module provides the [`ResourceDescriptor`], the immutable
//! `{group, version, plural, finalizer}` tuple a [`crate::controller::Controller`]
//! is registered with for a given resource type.

use std::fmt::{self, Display, Formatter};

/// Framework-scoped default finalizer token, installed on a resource when the
/// caller did not supply one of their own.
pub const DEFAULT_FINALIZER: &str = "reconcile-core.rs/finalizer";

/// Default server-side watch session timeout, in seconds.
pub const DEFAULT_WATCH_TIMEOUT_SECONDS: u32 = 60 * 60;

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("finalizer '{0}' is not a valid DNS-subdomain-formatted string")]
    InvalidFinalizer(String),
}

// -----------------------------------------------------------------------------
// ResourceDescriptor structure

/// Carries the `(group, version, plural)` triple and the finalizer name
/// associated with a resource type. Constructed once per type at
/// registration time and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceDescriptor {
    group: String,
    version: String,
    plural: String,
    finalizer: String,
}

impl ResourceDescriptor {
    /// Builds a descriptor with the framework's [`DEFAULT_FINALIZER`].
    pub fn new(group: impl Into<String>, version: impl Into<String>, plural: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            plural: plural.into(),
            finalizer: DEFAULT_FINALIZER.to_string(),
        }
    }

    /// Builds a descriptor with a caller-supplied finalizer, validating it is
    /// a non-empty DNS-subdomain-formatted string.
    pub fn with_finalizer(
        group: impl Into<String>,
        version: impl Into<String>,
        plural: impl Into<String>,
        finalizer: impl Into<String>,
    ) -> Result<Self, Error> {
        let finalizer = finalizer.into();
        if !is_dns_subdomain(&finalizer) {
            return Err(Error::InvalidFinalizer(finalizer));
        }

        Ok(Self {
            group: group.into(),
            version: version.into(),
            plural: plural.into(),
            finalizer,
        })
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn plural(&self) -> &str {
        &self.plural
    }

    pub fn finalizer(&self) -> &str {
        &self.finalizer
    }
}

impl Display for ResourceDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group, self.version, self.plural)
    }
}

/// A loose approximation of Kubernetes' qualified-name validation for
/// finalizers: either a bare DNS-1123 label sequence, or a
/// `<dns-subdomain-prefix>/<name>` qualified name — exactly the shape of
/// [`DEFAULT_FINALIZER`] itself. Good enough to reject the obviously-wrong
/// inputs a caller might pass (empty strings, whitespace, uppercase), not a
/// full RFC validator.
fn is_dns_subdomain(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    match s.split_once('/') {
        Some((prefix, name)) => is_dns_label_sequence(prefix) && is_qualified_name(name),
        None => is_dns_label_sequence(s),
    }
}

fn is_dns_label_sequence(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }

    let valid_chars = s
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');

    let valid_edges = !s.starts_with(['-', '.']) && !s.ends_with(['-', '.']);

    valid_chars && valid_edges
}

/// The `<name>` half of a qualified name: non-empty, at most 63 characters,
/// alphanumerics plus `-`, `_`, `.`, and must start/end with an alphanumeric.
fn is_qualified_name(s: &str) -> bool {
    if s.is_empty() || s.len() > 63 {
        return false;
    }

    let valid_chars = s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');

    let valid_edges = s.starts_with(|c: char| c.is_ascii_alphanumeric())
        && s.ends_with(|c: char| c.is_ascii_alphanumeric());

    valid_chars && valid_edges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_finalizer_is_used_when_unspecified() {
        let descriptor = ResourceDescriptor::new("example.com", "v1", "widgets");
        assert_eq!(descriptor.finalizer(), DEFAULT_FINALIZER);
    }

    #[test]
    fn rejects_empty_finalizer() {
        let err = ResourceDescriptor::with_finalizer("example.com", "v1", "widgets", "").unwrap_err();
        assert_eq!(err, Error::InvalidFinalizer("".to_string()));
    }

    #[test]
    fn rejects_non_dns_subdomain_finalizer() {
        let err =
            ResourceDescriptor::with_finalizer("example.com", "v1", "widgets", "Not Valid!").unwrap_err();
        assert!(matches!(err, Error::InvalidFinalizer(_)));
    }

    #[test]
    fn accepts_dns_subdomain_finalizer() {
        let descriptor =
            ResourceDescriptor::with_finalizer("example.com", "v1", "widgets", "example.com/cleanup")
                .unwrap();
        assert_eq!(descriptor.finalizer(), "example.com/cleanup");
    }

    #[test]
    fn accepts_the_framework_default_finalizer_shape() {
        assert!(is_dns_subdomain(DEFAULT_FINALIZER));
    }

    #[test]
    fn rejects_qualified_name_with_empty_name_half() {
        let err = ResourceDescriptor::with_finalizer("example.com", "v1", "widgets", "example.com/").unwrap_err();
        assert!(matches!(err, Error::InvalidFinalizer(_)));
    }

    #[test]
    fn display_formats_as_group_version_plural() {
        let descriptor = ResourceDescriptor::new("example.com", "v1", "widgets");
        assert_eq!(descriptor.to_string(), "example.com/v1/widgets");
    }
}
