//! Route rules - declarative edges between handler types and message types.
//!
//! A rule says "handlers of type H receive messages of type M", optionally
//! widened to subtypes on either axis, guarded by pre/post conditions, and
//! optionally fed by a transformer from another message type.
//!
//! ```ignore
//! let plain = RouteRule::create::<SomeMessage, SomeMessageHandler>("plain", false, false);
//!
//! let converted = RouteRule::transforming::<SomeMessage, SomeMessageHandler>(
//!     "from-other",
//!     SampleTransformer,
//! )
//! .post_condition(ConstValidator::accept())
//! .build()?;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::RuleError;
use crate::handler::Handler;
use crate::message::{Message, TypeTag};
use crate::transform::Transformer;
use crate::validation::Validator;

static NEXT_RULE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique rule identity. Rules compare by id, never by content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RuleId(u64);

impl RuleId {
    fn next() -> Self {
        Self(NEXT_RULE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule-{}", self.0)
    }
}

/// Immutable routing edge. Build with [`RouteRule::builder`],
/// [`RouteRule::transforming`] or [`RouteRule::create`].
pub struct RouteRule {
    id: RuleId,
    name: String,
    handler_type: TypeTag,
    message_type: TypeTag,
    include_derived_handlers: bool,
    include_derived_messages: bool,
    transformer: Option<Arc<dyn Transformer>>,
    pre_condition: Option<Arc<dyn Validator>>,
    post_condition: Option<Arc<dyn Validator>>,
}

impl RouteRule {
    /// Builder for a rule routing `M` to handlers of type `H`.
    pub fn builder<M: Message, H: Handler>(name: impl Into<String>) -> RouteRuleBuilder {
        RouteRuleBuilder {
            name: name.into(),
            handler_type: H::tag(),
            message_type: M::tag(),
            include_derived_handlers: false,
            include_derived_messages: false,
            transformer: None,
            pre_condition: None,
            post_condition: None,
        }
    }

    /// Builder for a rule that converts the transformer's input type into
    /// `M` before handing it to handlers of type `H`.
    pub fn transforming<M: Message, H: Handler>(
        name: impl Into<String>,
        transformer: impl Transformer + 'static,
    ) -> RouteRuleBuilder {
        Self::builder::<M, H>(name).transformer(transformer)
    }

    /// Plain rule with no conditions or transformer.
    pub fn create<M: Message, H: Handler>(
        name: impl Into<String>,
        include_derived_messages: bool,
        include_derived_handlers: bool,
    ) -> Arc<RouteRule> {
        let builder = Self::builder::<M, H>(name)
            .include_derived_messages(include_derived_messages)
            .include_derived_handlers(include_derived_handlers);
        Arc::new(builder.assemble())
    }

    pub fn id(&self) -> RuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler_type(&self) -> TypeTag {
        self.handler_type
    }

    pub fn message_type(&self) -> TypeTag {
        self.message_type
    }

    pub fn includes_derived_handlers(&self) -> bool {
        self.include_derived_handlers
    }

    pub fn includes_derived_messages(&self) -> bool {
        self.include_derived_messages
    }

    pub fn transformer(&self) -> Option<&Arc<dyn Transformer>> {
        self.transformer.as_ref()
    }

    pub fn pre_condition(&self) -> Option<&Arc<dyn Validator>> {
        self.pre_condition.as_ref()
    }

    pub fn post_condition(&self) -> Option<&Arc<dyn Validator>> {
        self.post_condition.as_ref()
    }

    /// Type a published message must match to enter this rule's pipeline.
    ///
    /// Without a transformer this is the handler's declared message type,
    /// which is only known at subscription time and is passed in.
    pub fn effective_input(&self, declared_message_type: TypeTag) -> TypeTag {
        match &self.transformer {
            Some(transformer) => transformer.input_type(),
            None => declared_message_type,
        }
    }

    /// Type delivered to the handler.
    pub fn effective_output(&self) -> TypeTag {
        match &self.transformer {
            Some(transformer) => transformer.output_type(),
            None => self.message_type,
        }
    }

    /// Does this rule route `message_type` to handlers of `handler_type`?
    ///
    /// Each axis matches exactly unless its "include derived" flag is set,
    /// in which case any subtype of the rule's declared type matches.
    pub fn accepts(&self, handler_type: &TypeTag, message_type: &TypeTag) -> bool {
        let handler_matches = if self.include_derived_handlers {
            self.handler_type.is_assignable_from(handler_type)
        } else {
            *handler_type == self.handler_type
        };

        let message_matches = if self.include_derived_messages {
            self.message_type.is_assignable_from(message_type)
        } else {
            *message_type == self.message_type
        };

        handler_matches && message_matches
    }

    /// Can this rule hand something to an executor declared for
    /// `message_type`?
    ///
    /// Without a transformer the type filter already guarantees it. With one,
    /// the transformer's output must be viewable as `message_type`: a handler
    /// subscribed for a subtype of the rule's message type cannot take the
    /// base value the transformer produces.
    pub fn can_deliver(&self, message_type: &TypeTag) -> bool {
        match &self.transformer {
            Some(transformer) => message_type.is_assignable_from(&transformer.output_type()),
            None => true,
        }
    }

    /// Exact-key match used by unsubscribe; ignores the derived flags.
    pub fn is_keyed_by(&self, handler_type: &TypeTag, message_type: &TypeTag) -> bool {
        self.handler_type == *handler_type && self.message_type == *message_type
    }
}

impl fmt::Debug for RouteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("handler_type", &self.handler_type)
            .field("message_type", &self.message_type)
            .field("include_derived_handlers", &self.include_derived_handlers)
            .field("include_derived_messages", &self.include_derived_messages)
            .field(
                "transformer",
                &self
                    .transformer
                    .as_ref()
                    .map(|t| format!("{} -> {}", t.input_type(), t.output_type())),
            )
            .field("pre_condition", &self.pre_condition.is_some())
            .field("post_condition", &self.post_condition.is_some())
            .finish()
    }
}

/// Builder for [`RouteRule`]. All optional parts default to absent/false.
pub struct RouteRuleBuilder {
    name: String,
    handler_type: TypeTag,
    message_type: TypeTag,
    include_derived_handlers: bool,
    include_derived_messages: bool,
    transformer: Option<Arc<dyn Transformer>>,
    pre_condition: Option<Arc<dyn Validator>>,
    post_condition: Option<Arc<dyn Validator>>,
}

impl RouteRuleBuilder {
    pub fn include_derived_messages(mut self, include: bool) -> Self {
        self.include_derived_messages = include;
        self
    }

    pub fn include_derived_handlers(mut self, include: bool) -> Self {
        self.include_derived_handlers = include;
        self
    }

    pub fn transformer(mut self, transformer: impl Transformer + 'static) -> Self {
        self.transformer = Some(Arc::new(transformer));
        self
    }

    pub fn pre_condition(mut self, validator: impl Validator + 'static) -> Self {
        self.pre_condition = Some(Arc::new(validator));
        self
    }

    pub fn post_condition(mut self, validator: impl Validator + 'static) -> Self {
        self.post_condition = Some(Arc::new(validator));
        self
    }

    /// Finish the rule, checking that a transformer feeds the rule's
    /// message type.
    pub fn build(self) -> Result<Arc<RouteRule>, RuleError> {
        if let Some(transformer) = &self.transformer {
            let produced = transformer.output_type();
            if produced != self.message_type {
                return Err(RuleError::OutputMismatch {
                    rule: self.name,
                    produced,
                    expected: self.message_type,
                });
            }
        }
        Ok(Arc::new(self.assemble()))
    }

    fn assemble(self) -> RouteRule {
        RouteRule {
            id: RuleId::next(),
            name: self.name,
            handler_type: self.handler_type,
            message_type: self.message_type,
            include_derived_handlers: self.include_derived_handlers,
            include_derived_messages: self.include_derived_messages,
            transformer: self.transformer,
            pre_condition: self.pre_condition,
            post_condition: self.post_condition,
        }
    }
}
