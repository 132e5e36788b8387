//! Test utilities for configuring the testkit test environment.

use std::{env, path::PathBuf};

use tracing::info;

/// Creates a throwaway cache directory under the system temp location.
///
/// Each call gets a random suffix so concurrent tests cannot collide on
/// shared cache state.
pub fn create_temp_cache_dir() -> PathBuf {
    use rand::Rng;
    let random_suffix: u32 = rand::thread_rng().gen();
    let temp_dir = env::temp_dir().join(format!("testkit-cache-{random_suffix:08x}"));
    std::fs::create_dir_all(&temp_dir).expect("failed to create temp cache directory");
    info!("created temporary test cache directory: {}", temp_dir.display());
    temp_dir
}

/// Points [`crate::env::TESTKIT_CACHE_DIR`] at a fresh temp directory and
/// initializes test logging. Returns the directory for assertions.
pub fn setup_test_environment() -> PathBuf {
    let cache_dir = create_temp_cache_dir();
    env::set_var(crate::env::TESTKIT_CACHE_DIR, &cache_dir);
    crate::logging::ensure_test_logging(None);
    cache_dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_cache_dirs_are_unique() {
        let a = create_temp_cache_dir();
        let b = create_temp_cache_dir();
        assert_ne!(a, b);
        assert!(a.exists());
        assert!(b.exists());
        let _ = std::fs::remove_dir_all(a);
        let _ = std::fs::remove_dir_all(b);
    }
}
