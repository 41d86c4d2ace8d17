//! Transformer rules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rulebus::{ActionExecutor, FnTransformer, MessageBus, RouteRule, RuleError, Typed};

use crate::support::{
    RecordingDiagnostics, SampleTransformer, SomeDerivedMessage, SomeDerivedOtherMessage,
    SomeMessage, SomeMessageHandler, SomeOtherMessage,
};

fn widening_transform_rule(include_derived: bool) -> Arc<RouteRule> {
    RouteRule::transforming::<SomeMessage, SomeMessageHandler>("t", SampleTransformer)
        .include_derived_messages(include_derived)
        .build()
        .unwrap()
}

#[test]
fn transformed_message_reaches_output_type_subscriber() {
    let bus = MessageBus::new(true);
    let handler = SomeMessageHandler::new("");

    bus.add_rule(
        RouteRule::transforming::<SomeMessage, SomeMessageHandler>("", SampleTransformer)
            .build()
            .unwrap(),
    )
    .unwrap();
    bus.subscribe_handler::<_, SomeMessage>(&handler).unwrap();

    bus.publish_event(SomeOtherMessage::new("First message"));

    assert_eq!(handler.call_count(), 1);
    assert_eq!(handler.handled(), vec!["First message".to_string()]);
}

#[test]
fn transformer_rule_ignores_its_output_type_on_input() {
    let bus = MessageBus::new(true);
    let handler = SomeMessageHandler::new("");
    bus.add_rule(
        RouteRule::transforming::<SomeMessage, SomeMessageHandler>("", SampleTransformer)
            .build()
            .unwrap(),
    )
    .unwrap();
    bus.subscribe_handler::<_, SomeMessage>(&handler).unwrap();

    bus.publish_event(SomeMessage::new("not an input"));

    assert_eq!(handler.call_count(), 0);
}

#[test]
fn each_matching_subscription_gets_one_transformed_copy() {
    let bus = MessageBus::new(true);
    let first = SomeMessageHandler::new("first");
    let second = SomeMessageHandler::new("second");
    bus.add_rule(
        RouteRule::transforming::<SomeMessage, SomeMessageHandler>("", SampleTransformer)
            .build()
            .unwrap(),
    )
    .unwrap();
    bus.subscribe_handler::<_, SomeMessage>(&first).unwrap();
    bus.subscribe_handler::<_, SomeMessage>(&second).unwrap();

    bus.publish_event(SomeOtherMessage::new("x"));

    assert_eq!((first.call_count(), second.call_count()), (1, 1));
}

#[test]
fn transformer_output_must_be_rule_message_type() {
    let to_derived = FnTransformer::<SomeOtherMessage, SomeDerivedMessage, _>::new(
        |other: &SomeOtherMessage| SomeDerivedMessage::new(other.text.clone()),
    );

    let err = RouteRule::transforming::<SomeMessage, SomeMessageHandler>("bad", to_derived)
        .build()
        .unwrap_err();

    assert_eq!(
        err,
        RuleError::OutputMismatch {
            rule: "bad".to_string(),
            produced: SomeDerivedMessage::tag(),
            expected: SomeMessage::tag(),
        }
    );
}

#[test]
fn derived_input_is_transformed_when_rule_includes_derived() {
    let bus = MessageBus::new(true);
    let handler = SomeMessageHandler::new("");
    bus.add_rule(widening_transform_rule(true)).unwrap();
    bus.subscribe_handler::<_, SomeMessage>(&handler).unwrap();

    bus.publish_event(SomeDerivedOtherMessage::new("derived input"));

    assert_eq!(handler.handled(), vec!["derived input".to_string()]);
}

#[test]
fn derived_input_is_ignored_without_the_flag() {
    let bus = MessageBus::new(true);
    let handler = SomeMessageHandler::new("");
    bus.add_rule(widening_transform_rule(false)).unwrap();
    bus.subscribe_handler::<_, SomeMessage>(&handler).unwrap();

    bus.publish_event(SomeDerivedOtherMessage::new("derived input"));
    bus.publish_event(SomeOtherMessage::new("exact input"));

    assert_eq!(handler.handled(), vec!["exact input".to_string()]);
}

#[test]
fn transform_rule_is_not_bound_for_a_subtype_subscription() {
    let diagnostics = Arc::new(RecordingDiagnostics::default());
    let bus = MessageBus::builder()
        .diagnostics_arc(diagnostics.clone())
        .build();
    bus.add_rule(widening_transform_rule(true)).unwrap();

    let handler = SomeMessageHandler::new("");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let binding = bus
        .subscribe::<_, SomeDerivedMessage>(
            &handler,
            ActionExecutor::<SomeDerivedMessage, _>::new(move |_: &SomeDerivedMessage| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

    assert!(binding.is_pending());
    assert_eq!(bus.active_count(), 0);
    assert_eq!(
        diagnostics.events(),
        vec![
            format!(
                "undeliverable:t:{}:{}",
                SomeMessageHandler::tag(),
                SomeDerivedMessage::tag()
            ),
            format!(
                "not_found:subscribe:{}:{}",
                SomeMessageHandler::tag(),
                SomeDerivedMessage::tag()
            ),
        ]
    );

    bus.publish_event(SomeOtherMessage::new("would be widened"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // A rule that can deliver the subtype still activates the parked entry.
    let activated = bus
        .add_rule(RouteRule::create::<SomeDerivedMessage, SomeMessageHandler>(
            "derived", false, false,
        ))
        .unwrap();
    assert_eq!(activated, 1);

    bus.publish_event(SomeOtherMessage::new("still skipped"));
    bus.publish_event(SomeDerivedMessage::new("delivered"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
