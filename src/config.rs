//! Runtime configuration for sessions

use std::time::Duration;
use tracing::warn;

/// Knobs for role resolution and the change-feed adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Upper bound on a profile fetch before falling back
    pub fetch_timeout: Duration,

    /// Whether the change feed reconnects after a disconnect
    pub auto_reconnect: bool,

    /// Initial delay before resubscribing
    pub reconnect_delay: Duration,

    /// Maximum delay between resubscribe attempts
    pub max_reconnect_delay: Duration,

    /// Events queued per session before the feed applies backpressure
    pub event_buffer: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(5),
            auto_reconnect: true,
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            event_buffer: 64,
        }
    }
}

impl GateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `MENTORGATE_*` environment variables
    ///
    /// Invalid values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let millis = |key: &str| -> Option<Duration> {
            let raw = lookup(key)?;
            match raw.parse::<u64>() {
                Ok(ms) => Some(Duration::from_millis(ms)),
                Err(e) => {
                    warn!(key, value = %raw, error = %e, "Ignoring invalid duration");
                    None
                }
            }
        };

        if let Some(d) = millis("MENTORGATE_FETCH_TIMEOUT_MS") {
            config.fetch_timeout = d;
        }
        if let Some(d) = millis("MENTORGATE_RECONNECT_DELAY_MS") {
            config.reconnect_delay = d;
        }
        if let Some(d) = millis("MENTORGATE_MAX_RECONNECT_DELAY_MS") {
            config.max_reconnect_delay = d;
        }

        config
    }

    /// Set the profile fetch timeout
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Disable change-feed reconnection
    pub fn no_reconnect(mut self) -> Self {
        self.auto_reconnect = false;
        self
    }

    /// Set the reconnection delay range
    pub fn reconnect_delay(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_delay = initial;
        self.max_reconnect_delay = max;
        self
    }

    /// Set the per-session event queue size
    pub fn event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size.max(1);
        self
    }

    /// Delay before resubscribe attempt `attempt` (0-based), doubling up to the max
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        std::cmp::min(
            self.reconnect_delay.saturating_mul(factor),
            self.max_reconnect_delay,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_defaults() {
        let config = GateConfig::new();

        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert!(config.auto_reconnect);
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(30));
        assert_eq!(config.event_buffer, 64);
    }

    #[test]
    fn test_config_builder_chain() {
        let config = GateConfig::new()
            .fetch_timeout(Duration::from_millis(250))
            .no_reconnect()
            .reconnect_delay(Duration::from_millis(10), Duration::from_millis(80))
            .event_buffer(0);

        assert_eq!(config.fetch_timeout, Duration::from_millis(250));
        assert!(!config.auto_reconnect);
        assert_eq!(config.reconnect_delay, Duration::from_millis(10));
        assert_eq!(config.max_reconnect_delay, Duration::from_millis(80));
        assert_eq!(config.event_buffer, 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config =
            GateConfig::new().reconnect_delay(Duration::from_secs(1), Duration::from_secs(30));

        assert_eq!(config.backoff(0), Duration::from_secs(1));
        assert_eq!(config.backoff(1), Duration::from_secs(2));
        assert_eq!(config.backoff(4), Duration::from_secs(16));
        assert_eq!(config.backoff(5), Duration::from_secs(30));
        assert_eq!(config.backoff(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("MENTORGATE_FETCH_TIMEOUT_MS", "1500"),
            ("MENTORGATE_RECONNECT_DELAY_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = GateConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.fetch_timeout, Duration::from_millis(1500));
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_fallback_role_is_not_configurable() {
        let config = GateConfig::from_lookup(|k| {
            (k == "MENTORGATE_DEFAULT_ROLE").then(|| "admin".to_string())
        });
        assert_eq!(config, GateConfig::default());
    }
}
