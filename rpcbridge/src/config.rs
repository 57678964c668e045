//! Bridge configuration.
//!
//! Defaults come from the environment:
//! - `RPCBRIDGE_CALL_TIMEOUT`: default call deadline in seconds (float, `0` disables)
//! - `RPCBRIDGE_MAX_FRAME_BYTES`: largest accepted frame

use std::time::Duration;

pub const CALL_TIMEOUT_ENV: &str = "RPCBRIDGE_CALL_TIMEOUT";
pub const MAX_FRAME_BYTES_ENV: &str = "RPCBRIDGE_MAX_FRAME_BYTES";

/// 8 MiB
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Deadline applied to `Bridge::call`. `None` waits for the reply indefinitely.
    pub call_timeout: Option<Duration>,
    pub max_frame_length: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl BridgeConfig {
    /// Build a config from an arbitrary key lookup. Unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let call_timeout = lookup(CALL_TIMEOUT_ENV)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64);

        let max_frame_length = lookup(MAX_FRAME_BYTES_ENV)
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|len| *len > 0)
            .unwrap_or(DEFAULT_MAX_FRAME_LENGTH);

        Self {
            call_timeout,
            max_frame_length,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn without_call_timeout(mut self) -> Self {
        self.call_timeout = None;
        self
    }

    pub fn with_max_frame_length(mut self, len: usize) -> Self {
        self.max_frame_length = len;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_lookup_uses_defaults() {
        let config = BridgeConfig::from_lookup(|_| None);
        assert_eq!(config.call_timeout, None);
        assert_eq!(config.max_frame_length, DEFAULT_MAX_FRAME_LENGTH);
    }

    #[test]
    fn parses_fractional_timeout() {
        let config = BridgeConfig::from_lookup(lookup_from(&[(CALL_TIMEOUT_ENV, "1.5")]));
        assert_eq!(config.call_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn zero_or_garbage_timeout_disables_deadline() {
        let config = BridgeConfig::from_lookup(lookup_from(&[(CALL_TIMEOUT_ENV, "0")]));
        assert_eq!(config.call_timeout, None);

        let config = BridgeConfig::from_lookup(lookup_from(&[(CALL_TIMEOUT_ENV, "soon")]));
        assert_eq!(config.call_timeout, None);

        let config = BridgeConfig::from_lookup(lookup_from(&[(CALL_TIMEOUT_ENV, "-3")]));
        assert_eq!(config.call_timeout, None);
    }

    #[test]
    fn parses_max_frame_length() {
        let config = BridgeConfig::from_lookup(lookup_from(&[(MAX_FRAME_BYTES_ENV, " 4096 ")]));
        assert_eq!(config.max_frame_length, 4096);

        let config = BridgeConfig::from_lookup(lookup_from(&[(MAX_FRAME_BYTES_ENV, "0")]));
        assert_eq!(config.max_frame_length, DEFAULT_MAX_FRAME_LENGTH);
    }

    #[test]
    fn builder_overrides() {
        let config = BridgeConfig::from_lookup(|_| None)
            .with_call_timeout(Duration::from_secs(2))
            .with_max_frame_length(1024);
        assert_eq!(config.call_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.max_frame_length, 1024);

        let config = config.without_call_timeout();
        assert_eq!(config.call_timeout, None);
    }
}
