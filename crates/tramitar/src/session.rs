//! Scoped ownership of one driver session.
//!
//! The sequencer runs exactly one submission per session. [`SessionHandle`]
//! owns the boxed driver for that span: acquired before the first step,
//! released on every exit path (success, fatal error, cancellation).
//! `release` is idempotent, so belt-and-braces release calls in error paths
//! are harmless. A handle dropped without release logs a warning — the
//! browser process behind a real driver would otherwise outlive the run.

use crate::driver::FormDriver;
use crate::result::TramitarResult;
use uuid::Uuid;

/// Exclusive handle to one live driver session
pub struct SessionHandle {
    id: Uuid,
    driver: Box<dyn FormDriver>,
    released: bool,
}

impl SessionHandle {
    /// Take ownership of a driver for one submission run
    #[must_use]
    pub fn acquire(driver: Box<dyn FormDriver>) -> Self {
        let id = Uuid::new_v4();
        tracing::info!(session = %id, "session acquired");
        Self {
            id,
            driver,
            released: false,
        }
    }

    /// Session identifier, carried into the confirmation record
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Shared access to the driver
    #[must_use]
    pub fn driver(&self) -> &dyn FormDriver {
        self.driver.as_ref()
    }

    /// Mutable access, for navigation
    pub fn driver_mut(&mut self) -> &mut dyn FormDriver {
        self.driver.as_mut()
    }

    /// Whether the session has been released
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }

    /// Close the underlying driver. Idempotent.
    ///
    /// # Errors
    ///
    /// Propagates the driver's close failure; the handle is marked released
    /// either way so the run does not retry the close.
    pub async fn release(&mut self) -> TramitarResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        tracing::info!(session = %self.id, "session released");
        self.driver.close().await
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(session = %self.id, "session dropped without release");
        }
    }
}
