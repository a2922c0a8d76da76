use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Bounded retry with exponential backoff for transport failures.
/// `NotFound` and `Compute` errors are returned on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, initial_backoff_ms: 500, max_backoff_ms: 4_000 }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms))
    }

    pub fn run<T>(&self, what: &str, op: impl FnMut() -> Result<T, GatewayError>) -> Result<T, GatewayError> {
        self.run_with_sleep(what, op, thread::sleep)
    }

    pub(crate) fn run_with_sleep<T>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<T, GatewayError>,
        mut sleep: impl FnMut(Duration),
    ) -> Result<T, GatewayError> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.backoff(attempt);
                    log::warn!("{what}: attempt {attempt}/{attempts} failed ({e}), retrying in {delay:?}");
                    sleep(delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetKey;

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(1), Duration::from_millis(500));
        assert_eq!(p.backoff(2), Duration::from_millis(1_000));
        assert_eq!(p.backoff(4), Duration::from_millis(4_000));
        assert_eq!(p.backoff(80), Duration::from_millis(4_000));
    }

    #[test]
    fn transport_errors_retry_until_success() {
        let mut calls = 0;
        let mut slept = Vec::new();
        let r = RetryPolicy::default().run_with_sleep(
            "fetch",
            || {
                calls += 1;
                if calls < 3 {
                    Err(GatewayError::Transport("reset".into()))
                } else {
                    Ok(calls)
                }
            },
            |d| slept.push(d),
        );
        assert_eq!(r, Ok(3));
        assert_eq!(slept, vec![Duration::from_millis(500), Duration::from_millis(1_000)]);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let r: Result<(), _> = RetryPolicy::default().run_with_sleep(
            "fetch",
            || {
                calls += 1;
                Err(GatewayError::Transport("503".into()))
            },
            |_| {},
        );
        assert!(matches!(r, Err(GatewayError::Transport(_))));
        assert_eq!(calls, 3);
    }

    #[test]
    fn not_found_is_never_retried() {
        let mut calls = 0;
        let r: Result<(), _> = RetryPolicy::default().run_with_sleep(
            "fetch",
            || {
                calls += 1;
                Err(GatewayError::NotFound(AssetKey::new("x")))
            },
            |_| panic!("must not sleep"),
        );
        assert!(matches!(r, Err(GatewayError::NotFound(_))));
        assert_eq!(calls, 1);
    }
}
