//! Result and error types for Tramitar.
//!
//! The fatal error taxonomy is deliberately small: anything that aborts a
//! submission maps to one of the variants below and carries enough context
//! (field role, wizard step) for the caller to see how far the flow got.
//! Degraded-but-survivable conditions (unresolved location, dependent-option
//! fallback, missing confirmation number) are *not* errors; they are recorded
//! as notes on the submission context and execution continues.

use thiserror::Error;

/// Result type for Tramitar operations
pub type TramitarResult<T> = Result<T, TramitarError>;

/// Errors that abort the current submission
#[derive(Debug, Error)]
pub enum TramitarError {
    /// No candidate in a locator list qualified (exists, visible, enabled)
    #[error("ElementNotFound: {role}")]
    ElementNotFound {
        /// Semantic role of the control that could not be resolved
        role: String,
    },

    /// Every activation stage of the dispatcher was exhausted
    #[error("ActionDispatchFailed: {role} (last stage error: {message})")]
    ActionDispatchFailed {
        /// Semantic role of the control being activated
        role: String,
        /// Error reported by the last stage attempted
        message: String,
    },

    /// A step's completion predicate never held within its retry budget
    #[error("StepVerificationTimeout: {step} ({detail})")]
    StepVerificationTimeout {
        /// Wizard step that failed verification
        step: String,
        /// Last observed diagnostic
        detail: String,
    },

    /// Cooperative cancellation observed at a step boundary
    #[error("Cancelled before step {step}")]
    Cancelled {
        /// Step that would have run next
        step: String,
    },

    /// Browser/page driver reported a failure
    #[error("Driver error: {message}")]
    Driver {
        /// Error message from the automation driver
        message: String,
    },

    /// Browser session could not be established
    #[error("Failed to launch browser session: {message}")]
    SessionLaunch {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TramitarError {
    /// Create a driver error from any displayable failure
    #[must_use]
    pub fn driver(message: impl std::fmt::Display) -> Self {
        Self::Driver {
            message: message.to_string(),
        }
    }

    /// True for errors that identify a missing control rather than a broken one
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ElementNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_not_found_display_names_the_role() {
        let err = TramitarError::ElementNotFound {
            role: "primary action control".to_string(),
        };
        assert_eq!(err.to_string(), "ElementNotFound: primary action control");
        assert!(err.is_not_found());
    }

    #[test]
    fn verification_timeout_carries_step_and_diagnostic() {
        let err = TramitarError::StepVerificationTimeout {
            step: "final_submit".to_string(),
            detail: "page token unchanged".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("final_submit"));
        assert!(text.contains("page token unchanged"));
    }

    #[test]
    fn driver_helper_wraps_display_types() {
        let err = TramitarError::driver("socket closed");
        assert!(matches!(err, TramitarError::Driver { .. }));
        assert!(!err.is_not_found());
    }
}
