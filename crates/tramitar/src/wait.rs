//! Condition-based wait mechanisms.
//!
//! Every bounded wait in the engine goes through this module: a predicate is
//! polled at a fixed interval until it holds or the deadline passes. There are
//! no fixed-duration sleeps used as implicit sequencing anywhere — the page
//! under automation renders at unpredictable speed, and a predicate keyed to
//! the step's actual completion condition is the only thing that survives
//! varying latency.
//!
//! Timing out is *not* an error at this layer. Callers decide whether an
//! unsatisfied condition is fatal (step verification) or survivable (a zoom
//! control that never appeared).

use crate::result::TramitarResult;
use std::future::Future;
use std::time::{Duration, Instant};

/// Default timeout for wait operations (10 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Options for wait operations
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Derive options with a shorter timeout, keeping the poll interval.
    ///
    /// Used for best-effort waits (map chrome, markers) nested inside a
    /// step that carries the full budget.
    #[must_use]
    pub const fn scaled_down(&self, divisor: u64) -> Self {
        Self {
            timeout_ms: self.timeout_ms / divisor,
            poll_interval_ms: self.poll_interval_ms,
        }
    }
}

/// Result of a wait operation
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    /// Whether the condition held before the deadline
    pub satisfied: bool,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description of what was waited for
    pub waited_for: String,
}

/// Poll an async predicate until it holds or the deadline passes.
///
/// The predicate runs at least once, even with a zero timeout, so a condition
/// that already holds is always observed.
///
/// # Errors
///
/// Propagates errors from the predicate itself (driver failures); a timeout
/// is reported through [`WaitOutcome::satisfied`], not as an error.
pub async fn wait_until<F, Fut>(
    opts: &WaitOptions,
    what: &str,
    mut predicate: F,
) -> TramitarResult<WaitOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TramitarResult<bool>>,
{
    let start = Instant::now();
    loop {
        if predicate().await? {
            return Ok(WaitOutcome {
                satisfied: true,
                elapsed: start.elapsed(),
                waited_for: what.to_string(),
            });
        }
        if start.elapsed() >= opts.timeout() {
            tracing::debug!(what, elapsed_ms = start.elapsed().as_millis() as u64, "wait timed out");
            return Ok(WaitOutcome {
                satisfied: false,
                elapsed: start.elapsed(),
                waited_for: what.to_string(),
            });
        }
        tokio::time::sleep(opts.poll_interval()).await;
    }
}

/// Poll an async producer until it yields a value or the deadline passes.
///
/// # Errors
///
/// Propagates errors from the producer; exhaustion yields `Ok(None)`.
pub async fn wait_for_value<T, F, Fut>(
    opts: &WaitOptions,
    what: &str,
    mut producer: F,
) -> TramitarResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TramitarResult<Option<T>>>,
{
    let start = Instant::now();
    loop {
        if let Some(value) = producer().await? {
            return Ok(Some(value));
        }
        if start.elapsed() >= opts.timeout() {
            tracing::debug!(what, "wait for value timed out");
            return Ok(None);
        }
        tokio::time::sleep(opts.poll_interval()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn options_builder() {
        let opts = WaitOptions::new().with_timeout(250).with_poll_interval(10);
        assert_eq!(opts.timeout(), Duration::from_millis(250));
        assert_eq!(opts.poll_interval(), Duration::from_millis(10));
    }

    #[test]
    fn scaled_down_shrinks_timeout_only() {
        let opts = WaitOptions::new().with_timeout(1000).with_poll_interval(25);
        let short = opts.scaled_down(4);
        assert_eq!(short.timeout_ms, 250);
        assert_eq!(short.poll_interval_ms, 25);
    }

    #[tokio::test]
    async fn wait_until_immediate_success() {
        let opts = WaitOptions::new().with_timeout(0);
        let outcome = wait_until(&opts, "always true", || async { Ok(true) })
            .await
            .unwrap();
        assert!(outcome.satisfied);
        assert_eq!(outcome.waited_for, "always true");
    }

    #[tokio::test]
    async fn wait_until_times_out() {
        let opts = WaitOptions::new().with_timeout(30).with_poll_interval(5);
        let outcome = wait_until(&opts, "never", || async { Ok(false) })
            .await
            .unwrap();
        assert!(!outcome.satisfied);
        assert!(outcome.elapsed >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn wait_until_polls_until_condition_flips() {
        let calls = AtomicU32::new(0);
        let opts = WaitOptions::new().with_timeout(2000).with_poll_interval(5);
        let outcome = wait_until(&opts, "third try", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n >= 2) }
        })
        .await
        .unwrap();
        assert!(outcome.satisfied);
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn wait_for_value_yields_none_on_exhaustion() {
        let opts = WaitOptions::new().with_timeout(20).with_poll_interval(5);
        let got: Option<u8> = wait_for_value(&opts, "nothing", || async { Ok(None) })
            .await
            .unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn wait_until_propagates_predicate_errors() {
        let opts = WaitOptions::new().with_timeout(20).with_poll_interval(5);
        let result = wait_until(&opts, "broken", || async {
            Err(crate::TramitarError::driver("page gone"))
        })
        .await;
        assert!(result.is_err());
    }
}
