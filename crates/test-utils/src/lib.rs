//! Shared test utilities for the load generator workspace.
//!
//! This crate provides common testing infrastructure including:
//! - A recording stub `ConnectionFactory` with failure injection
//! - Scenario and payload fixtures
//! - Duration assertion macros
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../../crates/test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{RecordingFactory, fixtures};
//! ```

pub mod fixtures;
pub mod recording;

pub use recording::*;

/// Macro for approximate equality of two `Duration`s.
///
/// The tolerance is an absolute `Duration`.
///
/// # Usage
///
/// ```ignore
/// use std::time::Duration;
/// use test_utils::assert_duration_approx_eq;
///
/// assert_duration_approx_eq!(
///     Duration::from_millis(1003),
///     Duration::from_secs(1),
///     Duration::from_millis(5)
/// );
/// ```
#[macro_export]
macro_rules! assert_duration_approx_eq {
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let left: std::time::Duration = $left;
        let right: std::time::Duration = $right;
        let tolerance: std::time::Duration = $tolerance;
        let diff = if left > right { left - right } else { right - left };
        if diff > tolerance {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > tolerance `{:?}`",
                left, right, diff, tolerance
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    #[test]
    fn test_assert_duration_approx_eq_passes() {
        assert_duration_approx_eq!(
            Duration::from_millis(1003),
            Duration::from_secs(1),
            Duration::from_millis(5)
        );
        assert_duration_approx_eq!(Duration::ZERO, Duration::ZERO, Duration::ZERO);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_duration_approx_eq_fails() {
        assert_duration_approx_eq!(
            Duration::from_millis(900),
            Duration::from_secs(1),
            Duration::from_millis(25)
        );
    }
}
