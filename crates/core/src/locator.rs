//! Repository locator
//!
//! Resolves a repository descriptor string such as `s3://bucket/releases` or
//! the opaque `gsutil:gs://bucket/releases` into a host (the bucket) and a
//! base directory, and derives the object key prefix from the latter.

use std::fmt;
use std::sync::OnceLock;

use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};

/// Separator used in object keys
pub const DELIMITER: char = '/';

/// Resolved form of a repository descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryDescriptor {
    /// The descriptor exactly as supplied
    pub raw_url: String,
    /// Host component, used as the bucket name
    pub host: String,
    /// Percent-decoded path component
    pub basedir: String,
}

/// Parsed, immutable repository location
#[derive(Debug, Clone)]
pub struct RepositoryLocator {
    descriptor: RepositoryDescriptor,
    scheme: String,
    resolved: Url,
    prefix: OnceLock<String>,
}

impl RepositoryLocator {
    /// Parse a repository descriptor.
    ///
    /// Opaque descriptors (`outer:inner://host/path`) have their
    /// scheme-specific part re-parsed before host and path are extracted.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let outer = Url::parse(raw)
            .map_err(|e| Error::Config(format!("Invalid repository URL '{raw}': {e}")))?;
        let scheme = outer.scheme().to_string();

        let resolved = if outer.cannot_be_a_base() {
            let ssp = raw
                .split_once(':')
                .map(|(_, rest)| rest)
                .unwrap_or_default();
            Url::parse(ssp).map_err(|e| {
                Error::Config(format!("Invalid repository URL '{raw}': '{ssp}': {e}"))
            })?
        } else {
            outer
        };

        let host = match resolved.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => {
                return Err(Error::Config(format!(
                    "Repository URL '{raw}' does not name a bucket"
                )));
            }
        };

        let basedir = urlencoding::decode(resolved.path())
            .map_err(|e| Error::Config(format!("Invalid repository path in '{raw}': {e}")))?
            .into_owned();

        Ok(Self {
            descriptor: RepositoryDescriptor {
                raw_url: raw.to_string(),
                host,
                basedir,
            },
            scheme,
            resolved,
            prefix: OnceLock::new(),
        })
    }

    /// The descriptor as supplied by the caller
    pub fn raw(&self) -> &str {
        &self.descriptor.raw_url
    }

    /// Outer scheme, e.g. `gsutil` for `gsutil:gs://bucket`
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Bucket name
    pub fn host(&self) -> &str {
        &self.descriptor.host
    }

    /// Base directory within the bucket
    pub fn basedir(&self) -> &str {
        &self.descriptor.basedir
    }

    pub fn descriptor(&self) -> &RepositoryDescriptor {
        &self.descriptor
    }

    /// Object key prefix derived from the base directory
    pub fn prefix(&self) -> &str {
        self.prefix.get_or_init(|| key_prefix(&self.descriptor.basedir))
    }

    /// Absolute URL of a resource, for tools that address objects by URL
    pub fn resource_url(&self, name: &str) -> String {
        let base = self.resolved.as_str().trim_end_matches(DELIMITER);
        let name = name.trim_start_matches(DELIMITER);
        if name.is_empty() {
            format!("{base}{DELIMITER}")
        } else {
            format!("{base}{DELIMITER}{name}")
        }
    }
}

impl fmt::Display for RepositoryLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw())
    }
}

/// Key prefix for a base directory.
///
/// Empty when the stripped base directory is empty, otherwise the stripped
/// value followed by exactly one delimiter. Never starts with the delimiter.
pub fn key_prefix(basedir: &str) -> String {
    let stripped = basedir.trim_matches(DELIMITER);
    if stripped.is_empty() {
        String::new()
    } else {
        format!("{stripped}{DELIMITER}")
    }
}
