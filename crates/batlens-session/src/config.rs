//! Session configuration.

use std::time::Duration;

/// Orchestration and settings behaviour.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Substitute a synthesized result when the service fails
    pub fallback_enabled: bool,
    /// Simulated latency before a fallback result is produced
    pub fallback_latency: Duration,
    /// Fixed seed for fallback synthesis (random when unset)
    pub fallback_seed: Option<u64>,
    /// Quiet period before a sensitivity change is committed
    pub debounce: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fallback_enabled: false,
            fallback_latency: Duration::from_millis(2000),
            fallback_seed: None,
            debounce: Duration::from_millis(300),
        }
    }
}

impl SessionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            fallback_enabled: std::env::var("BATLENS_FALLBACK_ENABLED")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
            fallback_latency: Duration::from_millis(
                std::env::var("BATLENS_FALLBACK_LATENCY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            fallback_seed: std::env::var("BATLENS_FALLBACK_SEED")
                .ok()
                .and_then(|s| s.parse().ok()),
            debounce: Duration::from_millis(
                std::env::var("BATLENS_DEBOUNCE_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
        }
    }

    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::default();
        assert!(!config.fallback_enabled);
        assert_eq!(config.debounce, Duration::from_millis(300));
        assert_eq!(config.fallback_latency, Duration::from_secs(2));
    }
}
