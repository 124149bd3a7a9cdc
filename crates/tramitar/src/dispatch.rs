//! Activation dispatch with an ordered fallback chain.
//!
//! Municipal form controls are frequently style-hidden-but-logically-active,
//! or wired to listeners that only see bubbling events, so a plain click is
//! not reliable. The dispatcher replaces the nested try/catch cascades the
//! per-form scripts used to repeat with one explicit stage list:
//!
//! 1. direct programmatic invoke
//! 2. synthetic bubbling activation event
//! 3. submission of the control's containing form
//!
//! A later stage runs only after the earlier stage reported failure. The
//! outcome names the stage that succeeded, so a flow that only ever works via
//! container submission shows up in the logs before it becomes a breakage.
//!
//! Before the first stage runs, the target's qualifying predicate
//! (exists ∧ visible ∧ enabled) is re-checked. DOM state can change between
//! resolution and use; a handle that went stale reports `ElementNotFound`
//! instead of being acted on.

use crate::driver::{ElementHandle, FormDriver};
use crate::locator::{self, FieldRole};
use crate::result::{TramitarError, TramitarResult};

/// One stage of the activation fallback chain, in attempt order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActivationStage {
    /// Direct programmatic invoke
    DirectInvoke,
    /// Synthetic bubbling activation event
    SyntheticEvent,
    /// Submit the containing form
    ContainerSubmit,
}

impl ActivationStage {
    /// All stages in attempt order
    pub const ORDER: [Self; 3] = [Self::DirectInvoke, Self::SyntheticEvent, Self::ContainerSubmit];

    /// Stage name for diagnostics
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DirectInvoke => "direct_invoke",
            Self::SyntheticEvent => "synthetic_event",
            Self::ContainerSubmit => "container_submit",
        }
    }
}

impl std::fmt::Display for ActivationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which stage activated the control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Stage that succeeded
    pub stage: ActivationStage,
}

/// Activate a control, walking the stage chain until one succeeds.
///
/// # Errors
///
/// Returns [`TramitarError::ElementNotFound`] when the handle no longer
/// qualifies, or [`TramitarError::ActionDispatchFailed`] carrying the last
/// stage's error once every stage is exhausted.
pub async fn press(
    driver: &dyn FormDriver,
    handle: &ElementHandle,
    role: FieldRole,
) -> TramitarResult<DispatchOutcome> {
    press_from(driver, handle, role, ActivationStage::DirectInvoke).await
}

/// Activate a control starting from a given stage.
///
/// Used when a caller has already observed that an earlier stage "succeeded"
/// without effect (its step predicate stayed false) and wants the retry to
/// escalate instead of repeating the no-op.
pub async fn press_from(
    driver: &dyn FormDriver,
    handle: &ElementHandle,
    role: FieldRole,
    floor: ActivationStage,
) -> TramitarResult<DispatchOutcome> {
    if !locator::revalidate(driver, handle).await? {
        tracing::warn!(role = role.as_str(), "control went stale before activation");
        return Err(TramitarError::ElementNotFound {
            role: role.as_str().to_string(),
        });
    }
    let mut last_error = String::from("no stage attempted");
    for stage in ActivationStage::ORDER.into_iter().filter(|s| *s >= floor) {
        let attempt = match stage {
            ActivationStage::DirectInvoke => driver.invoke(handle).await,
            ActivationStage::SyntheticEvent => driver.dispatch_activation(handle).await,
            ActivationStage::ContainerSubmit => driver.submit_container(handle).await,
        };
        match attempt {
            Ok(()) => {
                tracing::debug!(role = role.as_str(), stage = stage.as_str(), "activated");
                return Ok(DispatchOutcome { stage });
            }
            Err(e) => {
                tracing::debug!(
                    role = role.as_str(),
                    stage = stage.as_str(),
                    error = %e,
                    "activation stage failed, falling through"
                );
                last_error = e.to_string();
            }
        }
    }
    Err(TramitarError::ActionDispatchFailed {
        role: role.as_str().to_string(),
        message: last_error,
    })
}
