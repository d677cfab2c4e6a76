//! Retry with exponential backoff.
//!
//! # Design
//! `RetryPolicy` is a plain value handed to the client. It only answers two
//! questions: should this outcome be retried, and how long to wait before
//! retry `n`. The sleeping itself happens in the client on the tokio timer,
//! so tests drive the policy with a paused clock.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpResponse};

/// Gateway and server failure codes retried by default.
pub const DEFAULT_RETRY_STATUSES: [u16; 4] = [500, 502, 503, 504];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Statuses that trigger another attempt.
    #[serde(default = "default_retry_on")]
    pub retry_on: Vec<u16>,
    /// Attempts after the first one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Retry `n` waits `base_delay * 2^n`.
    #[serde(default = "default_base_delay", with = "millis")]
    pub base_delay: Duration,
    /// Also retry POST. Off by default: a retried write may apply twice.
    #[serde(default)]
    pub retry_non_idempotent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_on: default_retry_on(),
            max_retries: default_max_retries(),
            base_delay: default_base_delay(),
            retry_non_idempotent: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_retry_on(mut self, statuses: impl Into<Vec<u16>>) -> Self {
        self.retry_on = statuses.into();
        self
    }

    pub fn retry_non_idempotent(mut self, enabled: bool) -> Self {
        self.retry_non_idempotent = enabled;
        self
    }

    /// Delay before retry `attempt` (1-indexed): 2s, 4s, 8s with the
    /// default one-second base.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }

    /// Decide whether the outcome of the attempt numbered `attempt`
    /// (0 for the initial request) warrants another try. Returns the delay
    /// to wait first.
    pub fn next_delay(
        &self,
        method: HttpMethod,
        outcome: &Result<HttpResponse, ApiError>,
        attempt: u32,
    ) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        if !method.is_idempotent() && !self.retry_non_idempotent {
            return None;
        }
        let retryable = match outcome {
            Ok(response) => self.retry_on.contains(&response.status),
            Err(ApiError::Transport { .. }) => true,
            Err(_) => false,
        };
        retryable.then(|| self.delay(attempt + 1))
    }
}

fn default_retry_on() -> Vec<u16> {
    DEFAULT_RETRY_STATUSES.to_vec()
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> Result<HttpResponse, ApiError> {
        Ok(HttpResponse::new(code, ""))
    }

    fn transport_error() -> Result<HttpResponse, ApiError> {
        Err(ApiError::Transport {
            url: "http://h/".into(),
            message: "connection refused".into(),
        })
    }

    #[test]
    fn backoff_doubles_from_two_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
    }

    #[test]
    fn retries_gateway_statuses_up_to_the_limit() {
        let policy = RetryPolicy::default();
        for code in DEFAULT_RETRY_STATUSES {
            assert_eq!(
                policy.next_delay(HttpMethod::Get, &status(code), 0),
                Some(Duration::from_secs(2))
            );
        }
        assert_eq!(
            policy.next_delay(HttpMethod::Get, &status(503), 2),
            Some(Duration::from_secs(8))
        );
        assert_eq!(policy.next_delay(HttpMethod::Get, &status(503), 3), None);
    }

    #[test]
    fn client_errors_and_success_are_not_retried() {
        let policy = RetryPolicy::default();
        for code in [200, 400, 401, 404, 501] {
            assert_eq!(policy.next_delay(HttpMethod::Get, &status(code), 0), None);
        }
    }

    #[test]
    fn transport_failures_are_retried() {
        let policy = RetryPolicy::default();
        assert!(policy
            .next_delay(HttpMethod::Delete, &transport_error(), 0)
            .is_some());
    }

    #[test]
    fn post_is_retried_only_when_opted_in() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(HttpMethod::Post, &status(503), 0), None);

        let policy = policy.retry_non_idempotent(true);
        assert!(policy.next_delay(HttpMethod::Post, &status(503), 0).is_some());
    }

    #[test]
    fn timeouts_are_never_retried() {
        let outcome = Err(ApiError::Timeout {
            url: "http://h/".into(),
            timeout: Duration::from_millis(10),
        });
        assert_eq!(
            RetryPolicy::default().next_delay(HttpMethod::Get, &outcome, 0),
            None
        );
    }

    #[test]
    fn none_policy_never_retries() {
        assert_eq!(
            RetryPolicy::none().next_delay(HttpMethod::Get, &status(503), 0),
            None
        );
    }

    #[test]
    fn deserializes_with_defaults() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"base_delay": 50}"#).unwrap();
        assert_eq!(policy.base_delay, Duration::from_millis(50));
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_on, DEFAULT_RETRY_STATUSES.to_vec());
    }
}
