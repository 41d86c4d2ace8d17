//! Bus configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Nested dispatch limit used when none is configured.
pub const DEFAULT_MAX_DISPATCH_DEPTH: usize = 64;

/// Construction-time settings for a [`MessageBus`](super::MessageBus).
///
/// ```
/// use rulebus::BusConfig;
///
/// let config = BusConfig::from_json(r#"{ "assert_warnings": true }"#).unwrap();
/// assert!(config.assert_warnings);
/// assert_eq!(config.max_dispatch_depth, rulebus::DEFAULT_MAX_DISPATCH_DEPTH);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Treat "no rule found" on subscribe/unsubscribe as a developer
    /// assertion instead of silently parking or ignoring.
    pub assert_warnings: bool,
    /// Publications nested deeper than this are dropped.
    pub max_dispatch_depth: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            assert_warnings: false,
            max_dispatch_depth: DEFAULT_MAX_DISPATCH_DEPTH,
        }
    }
}

impl BusConfig {
    pub fn new(assert_warnings: bool) -> Self {
        Self {
            assert_warnings,
            ..Self::default()
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.max_dispatch_depth == 0 {
            return Err(ConfigError::ZeroDispatchDepth);
        }
        Ok(self)
    }
}
