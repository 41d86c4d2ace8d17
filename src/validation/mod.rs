//! Validation contracts consumed by the router.
//!
//! Two flavours exist:
//! - [`Validator`] guards a route: it sees the subscribed handler and the
//!   message about to reach it (rule pre/post conditions).
//! - [`CommandValidator`] admits or drops a command before it is published.
//!
//! Validators must not mutate bus state (rules or subscriptions) while they run.

mod resolver;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::handler::Handler;
use crate::message::Message;

pub use resolver::{NoValidators, TypeValidators, ValidatorResolver};

/// Outcome of a validation step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationResult {
    Accepted,
    Rejected,
}

impl ValidationResult {
    pub fn is_accepted(self) -> bool {
        self == ValidationResult::Accepted
    }

    pub fn from_bool(accepted: bool) -> Self {
        if accepted {
            ValidationResult::Accepted
        } else {
            ValidationResult::Rejected
        }
    }
}

/// Route condition over a (handler, message) pair.
pub trait Validator: Send + Sync {
    fn validate(&self, handler: &dyn Handler, message: &dyn Message) -> ValidationResult;
}

/// Always answers with the same result.
#[derive(Clone, Copy, Debug)]
pub struct ConstValidator(pub ValidationResult);

impl ConstValidator {
    pub fn accept() -> Self {
        Self(ValidationResult::Accepted)
    }

    pub fn reject() -> Self {
        Self(ValidationResult::Rejected)
    }
}

impl Validator for ConstValidator {
    fn validate(&self, _handler: &dyn Handler, _message: &dyn Message) -> ValidationResult {
        self.0
    }
}

/// Closure-backed route condition.
pub struct FnValidator<F> {
    check: F,
}

impl<F> FnValidator<F>
where
    F: Fn(&dyn Handler, &dyn Message) -> bool + Send + Sync,
{
    pub fn new(check: F) -> Self {
        Self { check }
    }
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&dyn Handler, &dyn Message) -> bool + Send + Sync,
{
    fn validate(&self, handler: &dyn Handler, message: &dyn Message) -> ValidationResult {
        ValidationResult::from_bool((self.check)(handler, message))
    }
}

/// Scratch space shared by the validators of a single command.
///
/// A fresh context is created per command; validators may leave reasons for
/// a rejection that the bus then logs.
#[derive(Debug, Default)]
pub struct ValidationContext {
    reasons: Vec<String>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_with(&mut self, reason: impl Into<String>) -> ValidationResult {
        self.reasons.push(reason.into());
        ValidationResult::Rejected
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }
}

/// Admission check for a command.
pub trait CommandValidator: Send + Sync {
    fn validate(&self, command: &dyn Message, context: &mut ValidationContext) -> ValidationResult;
}

impl<F> CommandValidator for F
where
    F: Fn(&dyn Message, &mut ValidationContext) -> ValidationResult + Send + Sync,
{
    fn validate(&self, command: &dyn Message, context: &mut ValidationContext) -> ValidationResult {
        self(command, context)
    }
}

/// Run `validators` in order, stopping at the first non-accepted result.
///
/// An empty list is vacuously accepted.
pub fn run_command_validators(
    validators: &[Arc<dyn CommandValidator>],
    command: &dyn Message,
    context: &mut ValidationContext,
) -> ValidationResult {
    let mut last = ValidationResult::Accepted;
    for validator in validators {
        last = validator.validate(command, context);
        if !last.is_accepted() {
            break;
        }
    }
    last
}
