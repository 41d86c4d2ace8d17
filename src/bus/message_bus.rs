//! The router: rules, registry and broadcast stream behind one owner.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, warn};

use super::config::BusConfig;
use super::diagnostics::{Diagnostics, Operation, SilentDiagnostics};
use super::dispatch::{depth_of, BusId, DepthGuard};
use crate::error::BusError;
use crate::handler::{handle_executor, Executor, Handle, Handler, HandlerId};
use crate::message::{Command, Event, Message, MessageRef, TypeTag};
use crate::registry::{ActiveSubscription, PendingRegistration, RegistrySnapshot, SubscriptionRegistry};
use crate::rule::RouteRule;
use crate::stream::{Pipeline, Subject, Subscription};
use crate::validation::{run_command_validators, NoValidators, ValidationContext, ValidatorResolver};

/// Result of a subscribe call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
    /// At least one rule matched. `rules` new pipelines were attached;
    /// `duplicates` matching rules already had this handler bound.
    Active { rules: usize, duplicates: usize },
    /// No rule matched; the registration is parked until one is added.
    Pending,
}

impl Binding {
    pub fn is_active(&self) -> bool {
        matches!(self, Binding::Active { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Binding::Pending)
    }
}

#[derive(Default)]
struct BusState {
    rules: Vec<Arc<RouteRule>>,
    registry: SubscriptionRegistry,
}

/// What a bind attempt did, reported once the state lock is released.
enum BindOutcome {
    Bound {
        handler_type: TypeTag,
        message_type: TypeTag,
        bound: usize,
        duplicates: Vec<Arc<RouteRule>>,
        undeliverable: Vec<Arc<RouteRule>>,
    },
    Parked {
        handler_type: TypeTag,
        message_type: TypeTag,
        duplicate: bool,
        undeliverable: Vec<Arc<RouteRule>>,
    },
}

impl BindOutcome {
    fn binding(&self) -> Binding {
        match self {
            BindOutcome::Bound {
                bound, duplicates, ..
            } => Binding::Active {
                rules: *bound,
                duplicates: duplicates.len(),
            },
            BindOutcome::Parked { .. } => Binding::Pending,
        }
    }
}

/// In-process, type-driven publish/subscribe router.
///
/// Producers publish events (unconditionally) and commands (after ordered
/// validation) onto one broadcast stream. Consumers subscribe a handler for a
/// message type; every [`RouteRule`] accepting the handler's type and the
/// declared message type attaches its own filter/transform pipeline.
/// Subscribing before the matching rule exists parks the registration until
/// [`add_rule`](Self::add_rule) brings one in.
///
/// Dispatch is synchronous on the publisher's stack, in subscription order.
/// Handlers may publish, subscribe and unsubscribe re-entrantly; nesting is
/// capped by [`BusConfig::max_dispatch_depth`].
///
/// ## Example
///
/// ```ignore
/// let bus = MessageBus::new(true);
/// bus.add_rule(RouteRule::create::<SomeMessage, SomeMessageHandler>("some", false, false))?;
///
/// let handler = Arc::new(SomeMessageHandler::new("first"));
/// bus.subscribe_handler::<_, SomeMessage>(&handler)?;
///
/// bus.publish_event(SomeMessage::new("hello"));
/// assert_eq!(handler.call_count(), 1);
/// ```
pub struct MessageBus {
    id: BusId,
    config: BusConfig,
    subject: Subject,
    state: RwLock<BusState>,
    resolver: Arc<dyn ValidatorResolver>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MessageBus {
    /// Bus with default settings; `assert_warnings` turns "no rule found" on
    /// subscribe/unsubscribe into a developer assertion.
    pub fn new(assert_warnings: bool) -> Self {
        Self::builder().assert_warnings(assert_warnings).build()
    }

    pub fn builder() -> MessageBusBuilder {
        MessageBusBuilder::default()
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Dispatch nesting of this bus on the current thread; 0 outside its
    /// handlers. Dispatches on other buses do not count.
    pub fn dispatch_depth(&self) -> usize {
        depth_of(self.id)
    }

    // ------------------------------------------------------------------
    // Publication
    // ------------------------------------------------------------------

    /// Publish an event to every subscription whose pipeline accepts it.
    pub fn publish_event<E: Event>(&self, event: E) {
        self.publish_event_ref(Some(Arc::new(event)));
    }

    /// Publish an already shared message as an event. `None` is a no-op.
    pub fn publish_event_ref(&self, event: Option<MessageRef>) {
        let Some(event) = event else {
            return;
        };
        self.dispatch(event);
    }

    /// Validate and publish a command.
    ///
    /// Validators resolved for the command run in order and stop at the first
    /// non-accepted result. A rejected command is dropped without error.
    pub fn publish_command<C: Command>(&self, command: C) {
        self.publish_command_ref(Some(Arc::new(command)));
    }

    /// Validate and publish an already shared command. `None` is a no-op.
    pub fn publish_command_ref(&self, command: Option<MessageRef>) {
        let Some(command) = command else {
            return;
        };

        let validators = self.resolver.resolve(command.as_ref());
        let mut context = ValidationContext::new();
        let result = run_command_validators(&validators, command.as_ref(), &mut context);

        if result.is_accepted() {
            self.dispatch(command);
        } else {
            debug!(
                command = %command.type_tag(),
                validators = validators.len(),
                reasons = ?context.reasons(),
                "Command rejected"
            );
            self.diagnostics.command_rejected(command.as_ref(), &context);
        }
    }

    fn dispatch(&self, message: MessageRef) -> usize {
        let message_type = message.type_tag();
        let _guard = match DepthGuard::enter(self.id, self.config.max_dispatch_depth) {
            Ok(guard) => guard,
            Err(depth) => {
                warn!(
                    message = %message_type,
                    depth,
                    "Dispatch depth exceeded, message dropped"
                );
                self.diagnostics
                    .dispatch_depth_exceeded(message.as_ref(), depth);
                return 0;
            }
        };

        let delivered = self.subject.on_next(message);
        debug!(message = %message_type, delivered, "Message published");
        delivered
    }

    /// Tap the raw message stream: `observer` sees every published message
    /// that passed admission, independent of any rule.
    pub fn observe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&dyn Message) + Send + Sync + 'static,
    {
        self.subject.subscribe(Pipeline::new(), observer)
    }

    // ------------------------------------------------------------------
    // Subscription
    // ------------------------------------------------------------------

    /// Subscribe `handler` for messages of type `M`, invoked through `executor`.
    ///
    /// Binds under every rule accepting the handler's runtime type and `M`.
    /// A rule whose transformer output cannot be viewed as `M` is skipped and
    /// reported. With no usable rule the registration is parked (holding the handler
    /// weakly) until [`add_rule`](Self::add_rule) supplies one.
    pub fn subscribe<H, M>(
        &self,
        handler: &Arc<H>,
        executor: impl Executor + 'static,
    ) -> Result<Binding, BusError>
    where
        H: Handler,
        M: Message,
    {
        let handler: Arc<dyn Handler> = handler.clone();
        self.subscribe_dyn(handler, M::tag(), Arc::new(executor))
    }

    /// Subscribe a handler through its own `Handle<M>` impl.
    ///
    /// The generated executor holds the handler weakly.
    pub fn subscribe_handler<H, M>(&self, handler: &Arc<H>) -> Result<Binding, BusError>
    where
        H: Handle<M>,
        M: Message,
    {
        self.subscribe::<H, M>(handler, handle_executor::<H, M>(handler))
    }

    /// Untyped subscribe path.
    pub fn subscribe_dyn(
        &self,
        handler: Arc<dyn Handler>,
        message_type: TypeTag,
        executor: Arc<dyn Executor>,
    ) -> Result<Binding, BusError> {
        let outcome = {
            let mut state = self.write_state("subscribe")?;
            self.bind(&mut state, handler, message_type, executor)
        };
        let binding = outcome.binding();
        self.report(outcome);
        Ok(binding)
    }

    fn bind(
        &self,
        state: &mut BusState,
        handler: Arc<dyn Handler>,
        message_type: TypeTag,
        executor: Arc<dyn Executor>,
    ) -> BindOutcome {
        let handler_type = handler.type_tag();
        let handler_id = HandlerId::of(&handler);

        let (rules, undeliverable): (Vec<Arc<RouteRule>>, Vec<Arc<RouteRule>>) = state
            .rules
            .iter()
            .filter(|rule| rule.accepts(&handler_type, &message_type))
            .cloned()
            .partition(|rule| rule.can_deliver(&message_type));

        if rules.is_empty() {
            let parked = state
                .registry
                .park(PendingRegistration::new(&handler, message_type, executor));
            return BindOutcome::Parked {
                handler_type,
                message_type,
                duplicate: !parked,
                undeliverable,
            };
        }

        let mut bound = 0;
        let mut duplicates = Vec::new();
        for rule in rules {
            if state.registry.contains(rule.id(), handler_id) {
                duplicates.push(rule);
                continue;
            }

            let pipeline = self.pipeline_for(&rule, &handler, message_type);
            let sink = Arc::clone(&executor);
            let subscription = self
                .subject
                .subscribe(pipeline, move |message: &dyn Message| sink.execute(message));

            debug!(
                rule = rule.name(),
                handler = %handler_type,
                message = %message_type,
                "Subscription bound"
            );

            state.registry.add(ActiveSubscription::new(
                rule,
                Arc::clone(&handler),
                message_type,
                Arc::clone(&executor),
                subscription,
            ));
            bound += 1;
        }

        BindOutcome::Bound {
            handler_type,
            message_type,
            bound,
            duplicates,
            undeliverable,
        }
    }

    /// type filter -> pre-condition -> transform -> post-condition
    fn pipeline_for(
        &self,
        rule: &RouteRule,
        handler: &Arc<dyn Handler>,
        message_type: TypeTag,
    ) -> Pipeline {
        let input = rule.effective_input(message_type);
        let mut pipeline = if rule.includes_derived_messages() {
            Pipeline::new().filter(move |message| message.is_instance_of(&input))
        } else {
            Pipeline::new().filter(move |message| message.type_tag() == input)
        };

        if let Some(condition) = rule.pre_condition() {
            let condition = Arc::clone(condition);
            let handler = Arc::clone(handler);
            pipeline = pipeline
                .filter(move |message| condition.validate(handler.as_ref(), message).is_accepted());
        }

        if let Some(transformer) = rule.transformer() {
            let transformer = Arc::clone(transformer);
            let declared = transformer.output_type();
            let rule_name = rule.name().to_string();
            pipeline = pipeline.map(move |message| {
                let output = transformer.transform(message)?;
                let produced = output.type_tag();
                if !declared.is_assignable_from(&produced) {
                    debug_assert!(
                        false,
                        "rule {rule_name}: transformer declared {declared} but produced {produced}"
                    );
                    warn!(
                        rule = %rule_name,
                        declared = %declared,
                        produced = %produced,
                        "Transformer output type mismatch, message dropped"
                    );
                    return None;
                }
                Some(output)
            });
        }

        if let Some(condition) = rule.post_condition() {
            let condition = Arc::clone(condition);
            let handler = Arc::clone(handler);
            pipeline = pipeline
                .filter(move |message| condition.validate(handler.as_ref(), message).is_accepted());
        }

        pipeline
    }

    /// Remove the bindings of `handler` under rules keyed exactly by
    /// (`H`, `M`). Returns how many subscriptions were disposed.
    ///
    /// Only rules declared for exactly these types are consulted: a binding
    /// made through a derived-type rule for other declared types is untouched.
    pub fn unsubscribe<H, M>(&self, handler: &Arc<H>) -> Result<usize, BusError>
    where
        H: Handler,
        M: Message,
    {
        let handler: Arc<dyn Handler> = handler.clone();
        self.unsubscribe_dyn(&handler, H::tag(), M::tag())
    }

    /// Untyped unsubscribe path.
    pub fn unsubscribe_dyn(
        &self,
        handler: &Arc<dyn Handler>,
        handler_type: TypeTag,
        message_type: TypeTag,
    ) -> Result<usize, BusError> {
        let handler_id = HandlerId::of(handler);

        let removed = {
            let mut state = self.write_state("unsubscribe")?;
            let BusState { rules, registry } = &mut *state;

            let keyed: Vec<_> = rules
                .iter()
                .filter(|rule| rule.is_keyed_by(&handler_type, &message_type))
                .map(|rule| rule.id())
                .collect();

            if keyed.is_empty() {
                None
            } else {
                Some(
                    keyed
                        .into_iter()
                        .flat_map(|rule| registry.remove(rule, handler_id))
                        .collect::<Vec<_>>(),
                )
            }
        };

        let Some(removed) = removed else {
            self.rule_not_found(Operation::Unsubscribe, handler_type, message_type);
            return Ok(0);
        };

        for item in &removed {
            item.dispose();
        }
        debug!(
            handler = %handler_type,
            message = %message_type,
            disposed = removed.len(),
            "Unsubscribed"
        );
        Ok(removed.len())
    }

    // ------------------------------------------------------------------
    // Rules
    // ------------------------------------------------------------------

    /// Add a rule and bind every parked registration it now accepts.
    ///
    /// Returns how many parked registrations were activated. Parked entries
    /// whose handler has been dropped are discarded. Adding a rule that is
    /// already present does nothing.
    pub fn add_rule(&self, rule: Arc<RouteRule>) -> Result<usize, BusError> {
        let mut outcomes = Vec::new();
        let mut stale = Vec::new();

        {
            let mut state = self.write_state("add_rule")?;
            if state.rules.iter().any(|existing| existing.id() == rule.id()) {
                warn!(rule = rule.name(), "Rule already added");
                return Ok(0);
            }
            state.rules.push(Arc::clone(&rule));

            for pending in state.registry.take_pending_for(&rule) {
                let handler_type = pending.handler_type();
                let (handler, message_type, executor) = pending.into_parts();
                match handler.upgrade() {
                    Some(handler) => {
                        outcomes.push(self.bind(&mut state, handler, message_type, executor));
                    }
                    None => stale.push((handler_type, message_type)),
                }
            }
        }

        debug!(
            rule = rule.name(),
            handler = %rule.handler_type(),
            message = %rule.message_type(),
            activated = outcomes.len(),
            stale = stale.len(),
            "Rule added"
        );

        for (handler_type, message_type) in stale {
            self.report_stale(handler_type, message_type);
        }

        let activated = outcomes.len();
        for outcome in outcomes {
            self.report(outcome);
        }
        Ok(activated)
    }

    /// Rules in insertion order.
    pub fn rules(&self) -> Vec<Arc<RouteRule>> {
        self.read_state().rules.clone()
    }

    /// Drop parked registrations whose handler no longer exists.
    pub fn prune_pending(&self) -> Result<usize, BusError> {
        let stale = self.write_state("prune_pending")?.registry.take_stale();
        for pending in &stale {
            self.report_stale(pending.handler_type(), pending.message_type());
        }
        Ok(stale.len())
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn active_count(&self) -> usize {
        self.read_state().registry.active_count()
    }

    pub fn pending_count(&self) -> usize {
        self.read_state().registry.pending_count()
    }

    /// Is `handler` bound under `rule`?
    pub fn is_subscribed<H: Handler>(&self, handler: &Arc<H>, rule: &RouteRule) -> bool {
        self.read_state()
            .registry
            .contains(rule.id(), HandlerId::of(handler))
    }

    /// Number of handlers bound under `rule`.
    pub fn subscriptions_for(&self, rule: &RouteRule) -> usize {
        self.read_state().registry.items_by_rule(rule.id()).count()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.read_state().registry.snapshot()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn write_state(&self, operation: &'static str) -> Result<RwLockWriteGuard<'_, BusState>, BusError> {
        self.state
            .write()
            .map_err(|_| BusError::LockPoisoned(operation))
    }

    // Read-only views tolerate poisoning; they never leave state half-written.
    fn read_state(&self) -> RwLockReadGuard<'_, BusState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, outcome: BindOutcome) {
        match outcome {
            BindOutcome::Bound {
                handler_type,
                message_type,
                duplicates,
                undeliverable,
                ..
            } => {
                self.report_undeliverable(&undeliverable, handler_type, message_type);
                for rule in duplicates {
                    warn!(rule = rule.name(), handler = %handler_type, "Duplicate subscription");
                    self.diagnostics.duplicate_subscription(&rule, handler_type);
                }
            }
            BindOutcome::Parked {
                handler_type,
                message_type,
                duplicate,
                undeliverable,
            } => {
                self.report_undeliverable(&undeliverable, handler_type, message_type);
                if duplicate {
                    warn!(
                        handler = %handler_type,
                        message = %message_type,
                        "Duplicate pending registration"
                    );
                }
                self.rule_not_found(Operation::Subscribe, handler_type, message_type);
            }
        }
    }

    fn report_undeliverable(
        &self,
        rules: &[Arc<RouteRule>],
        handler_type: TypeTag,
        message_type: TypeTag,
    ) {
        for rule in rules {
            warn!(
                rule = rule.name(),
                handler = %handler_type,
                message = %message_type,
                output = %rule.effective_output(),
                "Transformer output cannot reach handler, rule skipped"
            );
            self.diagnostics
                .undeliverable_rule(rule, handler_type, message_type);
        }
    }

    fn report_stale(&self, handler_type: TypeTag, message_type: TypeTag) {
        debug!(
            handler = %handler_type,
            message = %message_type,
            "Pending registration dropped, handler no longer exists"
        );
        self.diagnostics.stale_registration(handler_type, message_type);
    }

    fn rule_not_found(&self, operation: Operation, handler_type: TypeTag, message_type: TypeTag) {
        self.diagnostics
            .rule_not_found(operation, handler_type, message_type);

        if self.config.assert_warnings {
            error!(
                %operation,
                handler = %handler_type,
                message = %message_type,
                "Message rule not found"
            );
            debug_assert!(
                false,
                "Message rule for {handler_type}<{message_type}> not found ({operation})"
            );
        } else {
            debug!(
                %operation,
                handler = %handler_type,
                message = %message_type,
                "Message rule not found"
            );
        }
    }
}

/// Builder for [`MessageBus`].
pub struct MessageBusBuilder {
    config: BusConfig,
    resolver: Arc<dyn ValidatorResolver>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl Default for MessageBusBuilder {
    fn default() -> Self {
        Self {
            config: BusConfig::default(),
            resolver: Arc::new(NoValidators),
            diagnostics: Arc::new(SilentDiagnostics),
        }
    }
}

impl MessageBusBuilder {
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    pub fn assert_warnings(mut self, assert_warnings: bool) -> Self {
        self.config.assert_warnings = assert_warnings;
        self
    }

    /// Values below 1 are raised to 1.
    pub fn max_dispatch_depth(mut self, depth: usize) -> Self {
        self.config.max_dispatch_depth = depth.max(1);
        self
    }

    /// Strategy deciding which validators admit each command.
    pub fn validators(mut self, resolver: impl ValidatorResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn diagnostics(mut self, diagnostics: impl Diagnostics + 'static) -> Self {
        self.diagnostics = Arc::new(diagnostics);
        self
    }

    /// Share an existing hook set.
    pub fn diagnostics_arc(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn build(self) -> MessageBus {
        MessageBus {
            id: BusId::next(),
            config: self.config,
            subject: Subject::new(),
            state: RwLock::new(BusState::default()),
            resolver: self.resolver,
            diagnostics: self.diagnostics,
        }
    }
}
