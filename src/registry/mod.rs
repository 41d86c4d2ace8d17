//! Subscription bookkeeping.
//!
//! The registry tracks two kinds of entries:
//! - **active** subscriptions: a live (rule, handler) binding with its tap on
//!   the broadcast stream. The handler is held strongly until unsubscribed.
//! - **pending** registrations: a subscribe attempt parked because no rule
//!   matched yet. The handler is held weakly so parking never keeps it alive.

use std::sync::{Arc, Weak};

use serde::Serialize;

use crate::handler::{Executor, Handler, HandlerId};
use crate::message::TypeTag;
use crate::rule::{RouteRule, RuleId};
use crate::stream::Subscription;

/// A live (rule, handler) binding.
pub struct ActiveSubscription {
    rule: Arc<RouteRule>,
    handler: Arc<dyn Handler>,
    handler_id: HandlerId,
    handler_type: TypeTag,
    message_type: TypeTag,
    executor: Arc<dyn Executor>,
    subscription: Subscription,
}

impl ActiveSubscription {
    pub(crate) fn new(
        rule: Arc<RouteRule>,
        handler: Arc<dyn Handler>,
        message_type: TypeTag,
        executor: Arc<dyn Executor>,
        subscription: Subscription,
    ) -> Self {
        Self {
            handler_id: HandlerId::of(&handler),
            handler_type: handler.type_tag(),
            rule,
            handler,
            message_type,
            executor,
            subscription,
        }
    }

    pub fn rule(&self) -> &Arc<RouteRule> {
        &self.rule
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn handler_id(&self) -> HandlerId {
        self.handler_id
    }

    pub fn handler_type(&self) -> TypeTag {
        self.handler_type
    }

    /// Message type the handler declared when subscribing.
    pub fn message_type(&self) -> TypeTag {
        self.message_type
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub fn is_live(&self) -> bool {
        self.subscription.is_active()
    }

    pub(crate) fn dispose(&self) {
        self.subscription.dispose();
    }
}

/// A parked subscribe attempt waiting for a matching rule.
pub struct PendingRegistration {
    message_type: TypeTag,
    handler: Weak<dyn Handler>,
    handler_id: HandlerId,
    handler_type: TypeTag,
    executor: Arc<dyn Executor>,
}

impl PendingRegistration {
    pub(crate) fn new(
        handler: &Arc<dyn Handler>,
        message_type: TypeTag,
        executor: Arc<dyn Executor>,
    ) -> Self {
        let weak = Arc::downgrade(handler);
        Self {
            message_type,
            handler_id: HandlerId::of_weak(&weak),
            handler: weak,
            handler_type: handler.type_tag(),
            executor,
        }
    }

    pub fn message_type(&self) -> TypeTag {
        self.message_type
    }

    pub fn handler_type(&self) -> TypeTag {
        self.handler_type
    }

    pub fn handler_id(&self) -> HandlerId {
        self.handler_id
    }

    /// The handler, if it is still alive.
    pub fn upgrade(&self) -> Option<Arc<dyn Handler>> {
        self.handler.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.handler.strong_count() > 0
    }

    pub(crate) fn into_parts(self) -> (Weak<dyn Handler>, TypeTag, Arc<dyn Executor>) {
        (self.handler, self.message_type, self.executor)
    }
}

/// Active and pending entries, both in insertion order.
#[derive(Default)]
pub struct SubscriptionRegistry {
    active: Vec<ActiveSubscription>,
    pending: Vec<PendingRegistration>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, rule: RuleId, handler: HandlerId) -> bool {
        self.active
            .iter()
            .any(|item| item.rule.id() == rule && item.handler_id == handler)
    }

    pub(crate) fn add(&mut self, item: ActiveSubscription) {
        self.active.push(item);
    }

    pub fn items_by_rule(&self, rule: RuleId) -> impl Iterator<Item = &ActiveSubscription> {
        self.active.iter().filter(move |item| item.rule.id() == rule)
    }

    pub fn active(&self) -> impl Iterator<Item = &ActiveSubscription> {
        self.active.iter()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingRegistration> {
        self.pending.iter()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Remove every binding of `handler` under `rule`, returning them.
    pub(crate) fn remove(&mut self, rule: RuleId, handler: HandlerId) -> Vec<ActiveSubscription> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|item| item.rule.id() == rule && item.handler_id == handler);
        self.active = kept;
        removed
    }

    /// Park a registration. Returns `false` when an identical entry (same
    /// handler, same message type) is already parked.
    pub(crate) fn park(&mut self, registration: PendingRegistration) -> bool {
        let duplicate = self.pending.iter().any(|p| {
            p.handler_id == registration.handler_id && p.message_type == registration.message_type
        });
        if duplicate {
            return false;
        }
        self.pending.push(registration);
        true
    }

    /// Remove and return parked registrations that `rule` now accepts and
    /// can deliver to.
    pub(crate) fn take_pending_for(&mut self, rule: &RouteRule) -> Vec<PendingRegistration> {
        let (matched, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| {
                rule.accepts(&p.handler_type, &p.message_type) && rule.can_deliver(&p.message_type)
            });
        self.pending = kept;
        matched
    }

    /// Remove and return parked registrations whose handler is gone.
    pub(crate) fn take_stale(&mut self) -> Vec<PendingRegistration> {
        let (stale, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| !p.is_alive());
        self.pending = kept;
        stale
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            active: self
                .active
                .iter()
                .map(|item| ActiveEntry {
                    rule_id: item.rule.id(),
                    rule: item.rule.name().to_string(),
                    handler: item.handler_type.name().to_string(),
                    message: item.message_type.name().to_string(),
                    live: item.is_live(),
                })
                .collect(),
            pending: self
                .pending
                .iter()
                .map(|p| PendingEntry {
                    handler: p.handler_type.name().to_string(),
                    message: p.message_type.name().to_string(),
                    alive: p.is_alive(),
                })
                .collect(),
        }
    }
}

/// Serializable view of the registry, for diagnosing handlers that never fire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    pub active: Vec<ActiveEntry>,
    pub pending: Vec<PendingEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActiveEntry {
    pub rule_id: RuleId,
    pub rule: String,
    pub handler: String,
    pub message: String,
    pub live: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PendingEntry {
    pub handler: String,
    pub message: String,
    pub alive: bool,
}

impl RegistrySnapshot {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
