//! Message model - typed events and commands routed by the bus.
//!
//! Every routable value (messages and handlers alike) implements [`Typed`],
//! which exposes a [`TypeTag`] and a way to view the value as any of its
//! supertypes. Subtyping is expressed by composition: a derived message embeds
//! its base message in a field and delegates `as_type` to it. The
//! `#[derive(Event)]`, `#[derive(Command)]` and `#[derive(Handler)]` macros
//! write these impls.
//!
//! ```ignore
//! #[derive(Debug, Event)]
//! pub struct SomeMessage { pub text: String }
//!
//! #[derive(Debug, Event)]
//! pub struct SomeDerivedMessage {
//!     #[message(base)]
//!     pub base: SomeMessage,
//! }
//! ```

mod type_tag;

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

pub use type_tag::{Lineage, TypeTag};

/// A value with a static type identity and a supertype chain.
pub trait Typed: Any {
    /// Static tag of the implementing type.
    fn tag() -> TypeTag
    where
        Self: Sized;

    /// Runtime tag of this value.
    fn type_tag(&self) -> TypeTag;

    /// View this value as the type identified by `target`, which must be the
    /// value's own type or one of its supertypes.
    fn as_type(&self, target: TypeId) -> Option<&dyn Any>;
}

/// Whether a message is published freely or admitted by validators first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum MessageKind {
    Event,
    Command,
}

/// A message carried on the bus. Immutable once constructed.
pub trait Message: Typed + fmt::Debug + Send + Sync {
    fn kind(&self) -> MessageKind;
}

/// Marker for messages published without admission control.
pub trait Event: Message {}

/// Marker for messages that pass command validation before publication.
pub trait Command: Message {}

/// Shared handle to a message in flight.
pub type MessageRef = Arc<dyn Message>;

impl dyn Message + '_ {
    /// Typed view of this message through its lineage.
    pub fn view<T: Any>(&self) -> Option<&T> {
        self.as_type(TypeId::of::<T>())
            .and_then(|any| any.downcast_ref::<T>())
    }

    /// True when the runtime type is `tag` or one of its subtypes.
    pub fn is_instance_of(&self, tag: &TypeTag) -> bool {
        tag.is_assignable_from(&self.type_tag())
    }
}
