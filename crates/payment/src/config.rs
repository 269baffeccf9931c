//! Payment simulator configuration loaded from environment variables.

use std::time::Duration;

/// Simulator knobs with sensible defaults.
///
/// Reads from environment variables:
/// - `PAYMENT_SUCCESS_RATE` — probability of success (default: `0.8`)
/// - `PAYMENT_MIN_DELAY_MS` — minimum processing delay (default: `100`)
/// - `PAYMENT_MAX_DELAY_MS` — maximum processing delay (default: `500`)
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub success_rate: f64,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl PaymentConfig {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            success_rate: std::env::var("PAYMENT_SUCCESS_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.success_rate),
            min_delay: std::env::var("PAYMENT_MIN_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.min_delay),
            max_delay: std::env::var("PAYMENT_MAX_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
        }
    }

    /// A zero-delay configuration with a fixed outcome probability, for
    /// tests and demos.
    pub fn instant(success_rate: f64) -> Self {
        Self {
            success_rate,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            success_rate: 0.8,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = PaymentConfig::default();
        assert_eq!(config.success_rate, 0.8);
        assert_eq!(config.min_delay, Duration::from_millis(100));
        assert_eq!(config.max_delay, Duration::from_millis(500));
    }

    #[test]
    fn instant_has_no_delay() {
        let config = PaymentConfig::instant(1.0);
        assert!(config.min_delay.is_zero());
        assert!(config.max_delay.is_zero());
    }
}
