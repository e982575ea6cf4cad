//! # Client Configuration
//!
//! Timeouts, connect retries and result policy for the cluster client.
//! Every field has a default, so a config file only names what it changes:
//!
//! ```json
//! { "response_timeout_ms": 5000, "error_policy": "separate" }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::reconcile::ErrorPolicy;

/// Configuration for the cluster client and its TCP transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Deadline for one node round-trip, in milliseconds.
    pub response_timeout_ms: u64,
    /// Deadline for one TCP connect attempt, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Backoff used while (re)establishing a node connection.
    pub connect_retry: RetryStrategy,
    /// Disable Nagle on node sockets.
    pub nodelay: bool,
    /// How per-command error replies appear in transaction results.
    pub error_policy: ErrorPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            response_timeout_ms: 250,
            connect_timeout_ms: 250,
            connect_retry: RetryStrategy::default(),
            nodelay: true,
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Exponential backoff for connection establishment.
///
/// Only connects are retried. A request that may have reached a node is
/// never re-sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryStrategy {
    /// Total connect attempts, including the first one.
    pub attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Multiplier applied to the delay after every retry.
    pub exponent_base: u32,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy {
            attempts: 3,
            base_delay_ms: 10,
            exponent_base: 2,
        }
    }
}

impl RetryStrategy {
    /// Delays to sleep between consecutive attempts.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let retries = self.attempts.saturating_sub(1);
        (0..retries).map(move |retry| {
            let factor = u64::from(self.exponent_base).saturating_pow(retry);
            Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ClientConfig::default();
        assert_eq!(config.response_timeout(), Duration::from_millis(250));
        assert_eq!(config.error_policy, ErrorPolicy::Inline);
        assert!(config.nodelay);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{ "response_timeout_ms": 5000, "error_policy": "separate", "connect_retry": { "attempts": 5 } }"#,
        )
        .unwrap();
        assert_eq!(config.response_timeout(), Duration::from_secs(5));
        assert_eq!(config.connect_timeout(), Duration::from_millis(250));
        assert_eq!(config.error_policy, ErrorPolicy::Separate);
        assert_eq!(config.connect_retry.attempts, 5);
        assert_eq!(config.connect_retry.base_delay_ms, 10);
    }

    #[test]
    fn backoff_grows_exponentially() {
        let strategy = RetryStrategy {
            attempts: 4,
            base_delay_ms: 10,
            exponent_base: 2,
        };
        let delays: Vec<Duration> = strategy.delays().collect();
        assert_eq!(
            delays,
            [10, 20, 40].map(Duration::from_millis).to_vec()
        );
    }

    #[test]
    fn single_attempt_never_sleeps() {
        let strategy = RetryStrategy {
            attempts: 1,
            ..RetryStrategy::default()
        };
        assert_eq!(strategy.delays().count(), 0);
    }
}
