//! Handlers and the executors that invoke them.
//!
//! The bus never calls a handler directly. Each subscription carries an
//! [`Executor`], so the handler object only contributes its type identity
//! (for rule matching) and its address (for duplicate detection).

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use tracing::warn;

use crate::message::{Message, Typed};

/// A message consumer known to the router.
pub trait Handler: Typed + Send + Sync {}

/// Typed handling of one message type.
pub trait Handle<M: Message>: Handler {
    fn handle(&self, message: &M);
}

impl dyn Handler + '_ {
    /// Typed view of this handler through its lineage.
    pub fn view<T: Any>(&self) -> Option<&T> {
        self.as_type(TypeId::of::<T>())
            .and_then(|any| any.downcast_ref::<T>())
    }
}

/// Stable identity of a handler instance: the address of its allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(usize);

impl HandlerId {
    pub fn of<H: ?Sized>(handler: &Arc<H>) -> Self {
        Self(Arc::as_ptr(handler) as *const () as usize)
    }

    pub fn of_weak<H: ?Sized>(handler: &Weak<H>) -> Self {
        Self(Weak::as_ptr(handler) as *const () as usize)
    }
}

/// "Handle a message of type T", decoupled from the handler object.
pub trait Executor: Send + Sync {
    fn execute(&self, message: &dyn Message);
}

/// Executor backed by a closure over the concrete message type.
///
/// The incoming message is viewed as `M` through its lineage; a message that
/// has no `M` view is skipped.
pub struct ActionExecutor<M, F> {
    action: F,
    _message: PhantomData<fn(&M)>,
}

impl<M, F> ActionExecutor<M, F>
where
    M: Message,
    F: Fn(&M) + Send + Sync,
{
    pub fn new(action: F) -> Self {
        Self {
            action,
            _message: PhantomData,
        }
    }
}

impl<M, F> Executor for ActionExecutor<M, F>
where
    M: Message,
    F: Fn(&M) + Send + Sync,
{
    fn execute(&self, message: &dyn Message) {
        match message.view::<M>() {
            Some(typed) => (self.action)(typed),
            None => {
                debug_assert!(
                    false,
                    "executor for {} received {}",
                    M::tag(),
                    message.type_tag()
                );
                warn!(
                    expected = %M::tag(),
                    actual = %message.type_tag(),
                    "Executor skipped message of unexpected type"
                );
            }
        }
    }
}

/// Executor that forwards to `Handle<M>` on a weakly held handler.
///
/// Holding the handler weakly keeps a parked registration from extending the
/// handler's lifetime.
pub(crate) fn handle_executor<H, M>(handler: &Arc<H>) -> impl Executor + 'static
where
    H: Handle<M> + 'static,
    M: Message,
{
    let handler = Arc::downgrade(handler);
    ActionExecutor::new(move |message: &M| {
        if let Some(handler) = handler.upgrade() {
            handler.handle(message);
        }
    })
}
