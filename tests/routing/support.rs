//! Test domain: messages, handlers, a transformer and a route condition.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rulebus::{
    Diagnostics, Handle, Handler, Message, MessageRef, Operation, RouteRule, TypeTag, Transformer,
    Typed, ValidationContext, ValidationResult, Validator,
};

/// Install a fmt subscriber once; `RUST_LOG=rulebus=debug` shows routing.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, rulebus::Event)]
pub struct SomeMessage {
    pub text: String,
}

impl SomeMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, rulebus::Event)]
pub struct SomeDerivedMessage {
    #[message(base)]
    pub base: SomeMessage,
}

impl SomeDerivedMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            base: SomeMessage::new(text),
        }
    }
}

#[derive(Debug, rulebus::Event)]
pub struct SomeOtherMessage {
    pub text: String,
}

impl SomeOtherMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Extends [`SomeOtherMessage`]; the sample transformer accepts it as input.
#[derive(Debug, rulebus::Event)]
pub struct SomeDerivedOtherMessage {
    #[message(base)]
    pub base: SomeOtherMessage,
}

impl SomeDerivedOtherMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            base: SomeOtherMessage::new(text),
        }
    }
}

#[derive(Debug, rulebus::Command)]
pub struct RenameCommand {
    pub name: String,
}

/// Counts and records every `SomeMessage` it handles.
#[derive(rulebus::Handler)]
pub struct SomeMessageHandler {
    pub name: String,
    calls: AtomicUsize,
    handled: Mutex<Vec<String>>,
}

impl SomeMessageHandler {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            calls: AtomicUsize::new(0),
            handled: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn handled(&self) -> Vec<String> {
        self.handled.lock().unwrap().clone()
    }

    fn record(&self, text: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.handled.lock().unwrap().push(text.to_string());
    }
}

impl Handle<SomeMessage> for SomeMessageHandler {
    fn handle(&self, message: &SomeMessage) {
        self.record(&message.text);
    }
}

impl Handle<RenameCommand> for SomeMessageHandler {
    fn handle(&self, message: &RenameCommand) {
        self.record(&message.name);
    }
}

/// Handler type extending [`SomeMessageHandler`].
#[derive(rulebus::Handler)]
pub struct SomeDerivedMessageHandler {
    #[handler(base)]
    pub inner: SomeMessageHandler,
}

impl SomeDerivedMessageHandler {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            inner: SomeMessageHandler {
                name: name.into(),
                calls: AtomicUsize::new(0),
                handled: Mutex::new(Vec::new()),
            },
        })
    }

    pub fn call_count(&self) -> usize {
        self.inner.call_count()
    }
}

impl Handle<SomeMessage> for SomeDerivedMessageHandler {
    fn handle(&self, message: &SomeMessage) {
        self.inner.handle(message);
    }
}

/// `SomeOtherMessage` -> `SomeMessage`, keeping the text.
pub struct SampleTransformer;

impl Transformer for SampleTransformer {
    fn input_type(&self) -> TypeTag {
        SomeOtherMessage::tag()
    }

    fn output_type(&self) -> TypeTag {
        SomeMessage::tag()
    }

    fn transform(&self, message: &dyn Message) -> Option<MessageRef> {
        let other = message.view::<SomeOtherMessage>()?;
        Some(Arc::new(SomeMessage::new(other.text.clone())))
    }
}

/// Accepts only when the handler has the given name and the message carries
/// the given text.
pub struct SampleConditionValidator {
    handler_name: String,
    message_text: String,
}

impl SampleConditionValidator {
    pub fn new(handler_name: impl Into<String>, message_text: impl Into<String>) -> Self {
        Self {
            handler_name: handler_name.into(),
            message_text: message_text.into(),
        }
    }
}

impl Validator for SampleConditionValidator {
    fn validate(&self, handler: &dyn Handler, message: &dyn Message) -> ValidationResult {
        let handler_matches = handler
            .view::<SomeMessageHandler>()
            .is_some_and(|h| h.name == self.handler_name);
        let message_matches = message
            .view::<SomeMessage>()
            .is_some_and(|m| m.text == self.message_text);
        ValidationResult::from_bool(handler_matches && message_matches)
    }
}

pub fn some_rule(name: &str) -> Arc<RouteRule> {
    RouteRule::create::<SomeMessage, SomeMessageHandler>(name, false, false)
}

/// Records every hook call as a short string.
#[derive(Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<String>>,
}

impl RecordingDiagnostics {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn rule_not_found(&self, operation: Operation, handler: TypeTag, message: TypeTag) {
        self.push(format!("not_found:{operation}:{handler}:{message}"));
    }

    fn undeliverable_rule(&self, rule: &RouteRule, handler: TypeTag, message: TypeTag) {
        self.push(format!("undeliverable:{}:{handler}:{message}", rule.name()));
    }

    fn duplicate_subscription(&self, rule: &RouteRule, handler: TypeTag) {
        self.push(format!("duplicate:{}:{handler}", rule.name()));
    }

    fn stale_registration(&self, handler: TypeTag, message: TypeTag) {
        self.push(format!("stale:{handler}:{message}"));
    }

    fn command_rejected(&self, command: &dyn Message, context: &ValidationContext) {
        self.push(format!(
            "rejected:{}:{}",
            command.type_tag(),
            context.reasons().join(",")
        ));
    }

    fn dispatch_depth_exceeded(&self, message: &dyn Message, depth: usize) {
        self.push(format!("depth:{}:{depth}", message.type_tag()));
    }
}
