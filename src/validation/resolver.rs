//! Strategies deciding which validators admit a command.

use std::collections::HashMap;
use std::sync::Arc;

use crate::message::{Command, Message, TypeTag};

use super::CommandValidator;

/// Resolves the ordered validator list for a command.
pub trait ValidatorResolver: Send + Sync {
    fn resolve(&self, command: &dyn Message) -> Vec<Arc<dyn CommandValidator>>;
}

/// Resolver that never returns validators; every command is admitted.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoValidators;

impl ValidatorResolver for NoValidators {
    fn resolve(&self, _command: &dyn Message) -> Vec<Arc<dyn CommandValidator>> {
        Vec::new()
    }
}

/// Ordered validator lists registered per command type.
///
/// Lookup uses the command's exact runtime type; validators registered for a
/// base command type do not apply to its subtypes.
#[derive(Default)]
pub struct TypeValidators {
    by_type: HashMap<TypeTag, Vec<Arc<dyn CommandValidator>>>,
}

impl TypeValidators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `validator` to the list for command type `C`.
    ///
    /// Uses builder pattern - returns `self` for chaining.
    pub fn with<C: Command>(mut self, validator: impl CommandValidator + 'static) -> Self {
        self.register::<C>(Arc::new(validator));
        self
    }

    pub fn register<C: Command>(&mut self, validator: Arc<dyn CommandValidator>) {
        self.by_type.entry(C::tag()).or_default().push(validator);
    }

    pub fn len_for<C: Command>(&self) -> usize {
        self.by_type.get(&C::tag()).map_or(0, Vec::len)
    }
}

impl ValidatorResolver for TypeValidators {
    fn resolve(&self, command: &dyn Message) -> Vec<Arc<dyn CommandValidator>> {
        self.by_type
            .get(&command.type_tag())
            .cloned()
            .unwrap_or_default()
    }
}
