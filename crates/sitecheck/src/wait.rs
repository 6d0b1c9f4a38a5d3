//! Wait mechanisms.
//!
//! Every retrying assertion and every auto-waiting action goes through
//! [`poll_until`]: probe, sleep, probe again, until the probe reports ready or
//! the timeout elapses. Hard errors from a probe end the wait immediately.

use crate::result::CheckResult;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default timeout for wait operations (30 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Total time budget
    pub timeout: Duration,
    /// Delay between probes
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    /// Condition met
    Ready(T),
    /// Not yet; carries a description of what was observed
    Pending(String),
}

/// The wait ran out of time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitTimeout {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Description from the last pending probe
    pub last_observed: String,
    /// Number of probes made
    pub attempts: u32,
}

/// Probe until ready or out of time.
///
/// The probe runs at least once, and once more at the deadline.
///
/// # Errors
///
/// Returns the probe's error as soon as one occurs. A timeout is reported as
/// `Ok(Err(WaitTimeout))` so callers can map it to their own error kind.
pub async fn poll_until<T, F, Fut>(
    options: &WaitOptions,
    mut probe: F,
) -> CheckResult<Result<T, WaitTimeout>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CheckResult<Probe<T>>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let last_observed = match probe().await? {
            Probe::Ready(value) => return Ok(Ok(value)),
            Probe::Pending(observed) => observed,
        };

        let elapsed = start.elapsed();
        if elapsed >= options.timeout {
            return Ok(Err(WaitTimeout {
                elapsed,
                last_observed,
                attempts,
            }));
        }

        let remaining = options.timeout - elapsed;
        tokio::time::sleep(options.poll_interval.min(remaining)).await;
    }
}
