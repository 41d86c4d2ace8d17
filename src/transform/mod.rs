//! Message transformers used by route rules.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::message::{Message, MessageRef, TypeTag};

/// Maps a message of one declared type to a message of another.
///
/// The router trusts `output_type` when building pipelines; the value
/// returned by `transform` must carry that tag.
pub trait Transformer: Send + Sync {
    fn input_type(&self) -> TypeTag;
    fn output_type(&self) -> TypeTag;

    /// Returns `None` when the message has no view of the input type.
    fn transform(&self, message: &dyn Message) -> Option<MessageRef>;
}

/// Transformer backed by a closure from `I` to `O`.
pub struct FnTransformer<I, O, F> {
    map: F,
    _types: PhantomData<fn(&I) -> O>,
}

impl<I, O, F> FnTransformer<I, O, F>
where
    I: Message,
    O: Message,
    F: Fn(&I) -> O + Send + Sync,
{
    pub fn new(map: F) -> Self {
        Self {
            map,
            _types: PhantomData,
        }
    }
}

impl<I, O, F> Transformer for FnTransformer<I, O, F>
where
    I: Message,
    O: Message,
    F: Fn(&I) -> O + Send + Sync,
{
    fn input_type(&self) -> TypeTag {
        I::tag()
    }

    fn output_type(&self) -> TypeTag {
        O::tag()
    }

    fn transform(&self, message: &dyn Message) -> Option<MessageRef> {
        let input = message.view::<I>()?;
        Some(Arc::new((self.map)(input)))
    }
}
