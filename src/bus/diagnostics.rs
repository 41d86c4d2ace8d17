//! Hooks for observing conditions the bus absorbs silently.

use std::fmt;

use crate::message::{Message, TypeTag};
use crate::rule::RouteRule;
use crate::validation::ValidationContext;

/// Bus operation that looked up a rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Subscribe,
    Unsubscribe,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Subscribe => f.write_str("subscribe"),
            Operation::Unsubscribe => f.write_str("unsubscribe"),
        }
    }
}

/// Receives notice of everything the bus drops or parks without an error.
///
/// Hooks run after the bus has released its internal locks, but on the
/// caller's thread and inside the triggering operation. All methods default
/// to doing nothing.
pub trait Diagnostics: Send + Sync {
    /// No rule matched the handler/message pair.
    fn rule_not_found(&self, _operation: Operation, _handler: TypeTag, _message: TypeTag) {}

    /// `rule` accepts the pair but its transformer output cannot be viewed
    /// as `message`, so it was not bound.
    fn undeliverable_rule(&self, _rule: &RouteRule, _handler: TypeTag, _message: TypeTag) {}

    /// The handler is already bound under `rule`; the attempt was dropped.
    fn duplicate_subscription(&self, _rule: &RouteRule, _handler: TypeTag) {}

    /// A parked registration's handler was gone when a matching rule arrived.
    fn stale_registration(&self, _handler: TypeTag, _message: TypeTag) {}

    /// A command failed validation and was not published.
    fn command_rejected(&self, _command: &dyn Message, _context: &ValidationContext) {}

    /// A publication was dropped by the recursion guard.
    fn dispatch_depth_exceeded(&self, _message: &dyn Message, _depth: usize) {}
}

/// Default hook set: ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentDiagnostics;

impl Diagnostics for SilentDiagnostics {}
