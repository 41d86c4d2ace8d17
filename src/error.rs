use thiserror::Error;

use crate::message::TypeTag;

/// Errors from bus mutation operations.
///
/// Publication never fails; only rule and subscription bookkeeping can.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("bus lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

/// Errors raised while building a route rule.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule {rule}: transformer produces {produced} but handlers expect {expected}")]
    OutputMismatch {
        rule: String,
        produced: TypeTag,
        expected: TypeTag,
    },
}

/// Errors loading bus configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid bus configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("max_dispatch_depth must be at least 1")]
    ZeroDispatchDepth,
}
