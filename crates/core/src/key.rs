//! Object key resolution
//!
//! Combines the repository key prefix with relative resource names.

use crate::locator::{DELIMITER, RepositoryLocator};

/// Maps relative resource names onto backend object keys
#[derive(Debug, Clone)]
pub struct ObjectKeyResolver {
    prefix: String,
}

impl ObjectKeyResolver {
    pub fn new(locator: &RepositoryLocator) -> Self {
        Self::with_prefix(locator.prefix())
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Object key for a resource: prefix followed by the name, unchanged
    pub fn key(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    /// Listing prefix for a directory.
    ///
    /// The name is stripped of delimiters and, when non-empty, terminated by
    /// exactly one delimiter. An empty name lists the repository root.
    pub fn dir_key(&self, name: &str) -> String {
        let stripped = name.trim_matches(DELIMITER);
        if stripped.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}{stripped}{DELIMITER}", self.prefix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_prefix_plus_name() {
        let keys = ObjectKeyResolver::with_prefix("releases/");
        assert_eq!(keys.key("com/acme/1.0/acme.jar"), "releases/com/acme/1.0/acme.jar");

        let root = ObjectKeyResolver::with_prefix("");
        assert_eq!(root.key("a.pom"), "a.pom");
    }

    #[test]
    fn test_dir_key() {
        let keys = ObjectKeyResolver::with_prefix("releases/");
        assert_eq!(keys.dir_key("com/acme"), "releases/com/acme/");
        assert_eq!(keys.dir_key("/com/acme/"), "releases/com/acme/");
        assert_eq!(keys.dir_key(""), "releases/");
        assert_eq!(keys.dir_key("/"), "releases/");

        let root = ObjectKeyResolver::with_prefix("");
        assert_eq!(root.dir_key(""), "");
        assert_eq!(root.dir_key("a"), "a/");
    }

    #[test]
    fn test_from_locator() {
        let loc = RepositoryLocator::parse("s3://bucket//nested/base//").unwrap();
        let keys = ObjectKeyResolver::new(&loc);
        assert_eq!(keys.prefix(), "nested/base/");
        assert_eq!(keys.key("x"), "nested/base/x");
    }
}
