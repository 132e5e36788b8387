//! Integration test support for testkit components

/// Shared helpers for the tests under `tests/`
pub mod test_utils;
