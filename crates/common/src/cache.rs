//! Cache directory resolution.
//!
//! Rewritten subgraph manifests are staged on disk before deployment; this
//! module decides where. `~/.testkit/cache` by default, overridable through
//! [`crate::env::TESTKIT_CACHE_DIR`] or an explicit root.

use std::path::PathBuf;

/// Cache path resolver for testkit.
#[derive(Debug, Clone)]
pub struct TestkitCachePath {
    root: Option<PathBuf>,
}

impl Default for TestkitCachePath {
    fn default() -> Self {
        let root = std::env::var_os(crate::env::TESTKIT_CACHE_DIR)
            .map(PathBuf::from)
            .or_else(|| dirs_next::home_dir().map(|p| p.join(".testkit").join("cache")));
        Self { root }
    }
}

impl TestkitCachePath {
    /// Cache rooted at an explicit directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }

    /// Cache that resolves nothing, for callers that must not touch disk.
    pub fn empty() -> Self {
        Self { root: None }
    }

    /// Root cache dir, if one could be resolved.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.root.clone()
    }

    /// Staging dir for rewritten subgraph manifests:
    /// `<cache_root>/graph-manifest`.
    pub fn graph_manifest_dir(&self) -> Option<PathBuf> {
        Some(self.cache_dir()?.join("graph-manifest"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_root_wins() {
        let cache = TestkitCachePath::new("/tmp/tk-cache");
        assert_eq!(cache.cache_dir(), Some(PathBuf::from("/tmp/tk-cache")));
        assert_eq!(
            cache.graph_manifest_dir(),
            Some(PathBuf::from("/tmp/tk-cache/graph-manifest"))
        );
    }

    #[test]
    fn empty_resolves_nothing() {
        let cache = TestkitCachePath::empty();
        assert_eq!(cache.cache_dir(), None);
        assert_eq!(cache.graph_manifest_dir(), None);
    }
}
