//! Error types for the animation core

use serde::{Deserialize, Serialize};

/// Result alias for animation core operations.
pub type Result<T> = std::result::Result<T, AnimatorError>;

/// Errors reported by timeline, transform, scheduler and reducer operations.
///
/// Operation-level errors are returned before any state is mutated. Local
/// invariant violations inside a single mutation (bad keyframe counts,
/// out-of-range times) are repaired in place and never surface here.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AnimatorError {
    /// A request would break a timeline or clip invariant.
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    /// Unknown clip or target.
    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    /// The operation cannot run in the current state.
    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// Unrecognized mode identifier.
    #[error("Not implemented: {what}")]
    NotImplemented { what: String },

    /// Configuration document could not be parsed.
    #[error("Config error: {reason}")]
    Config { reason: String },
}

impl AnimatorError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn clip_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Clip".to_string(),
            name: name.into(),
        }
    }

    pub fn target_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Target".to_string(),
            name: name.into(),
        }
    }

    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Error category for logging.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::InvalidOperation { .. } => "invalid_operation",
            Self::NotImplemented { .. } => "not_implemented",
            Self::Config { .. } => "config",
        }
    }
}

impl From<serde_json::Error> for AnimatorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(AnimatorError::validation("x").category(), "validation");
        assert_eq!(AnimatorError::clip_not_found("A").category(), "not_found");
        assert_eq!(
            AnimatorError::invalid_operation("no clip").category(),
            "invalid_operation"
        );
    }

    #[test]
    fn not_found_message_names_the_kind() {
        let err = AnimatorError::target_not_found("hand");
        assert_eq!(err.to_string(), "Target not found: hand");
    }

    #[test]
    fn json_errors_map_to_config() {
        let err: AnimatorError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, AnimatorError::Config { .. }));
    }
}
