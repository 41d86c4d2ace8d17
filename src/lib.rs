
pub mod bus;
mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod rule;
pub mod stream;
pub mod transform;
pub mod validation;

pub use bus::{
    Binding, BusConfig, Diagnostics, MessageBus, MessageBusBuilder, Operation,
    SilentDiagnostics, DEFAULT_MAX_DISPATCH_DEPTH,
};
pub use error::{BusError, ConfigError, RuleError};
pub use handler::{ActionExecutor, Executor, Handle, Handler, HandlerId};
pub use message::{Command, Event, Message, MessageKind, MessageRef, TypeTag, Typed};
pub use registry::{RegistrySnapshot, SubscriptionRegistry};
pub use rule::{RouteRule, RouteRuleBuilder, RuleId};
pub use transform::{FnTransformer, Transformer};
pub use validation::{
    run_command_validators, CommandValidator, ConstValidator, FnValidator, NoValidators,
    TypeValidators, ValidationContext, ValidationResult, Validator, ValidatorResolver,
};

// Derive macros share names with the traits they implement, like serde's.
#[cfg(feature = "derive")]
pub use rulebus_macros::{Command, Event, Handler};
