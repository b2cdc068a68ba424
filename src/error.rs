//! Error taxonomy shared by the engine modules.
//!
//! Every fallible engine call fails synchronously with one of these
//! variants; there are no retries and no partial results.
//!
//! Zero denominators inside mean/ratio computations are *not* errors:
//! those divisions are guarded and yield `0.0`. That permissive policy
//! applies only to derived quantities; required inputs (sample arrays,
//! delays, baselines) are still validated strictly.

use thiserror::Error;

/// Errors returned by the reliability engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LabError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Insufficient data for {metric}: need at least {required} observations, got {actual}")]
    InsufficientData {
        metric: String,
        required: usize,
        actual: usize,
    },
}

/// Engine result alias
pub type Result<T> = std::result::Result<T, LabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LabError::NotFound("profile 'turbo'".to_string());
        assert!(err.to_string().contains("turbo"));

        let err = LabError::InsufficientData {
            metric: "accuracy".to_string(),
            required: 2,
            actual: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("accuracy"));
        assert!(msg.contains("at least 2"));
    }
}
