//! Pre/post conditions on route rules.

use std::sync::Arc;

use rulebus::{ConstValidator, FnValidator, Handler, Message, MessageBus, RouteRule};

use crate::support::{
    some_rule, SampleConditionValidator, SampleTransformer, SomeMessage, SomeMessageHandler,
    SomeOtherMessage,
};

const FIRST_HANDLER: &str = "handler First";
const SECOND_HANDLER: &str = "handler Second";
const FIRST_MESSAGE: &str = "handler First_Message";
const SECOND_MESSAGE: &str = "handler Second_Message";

fn run_two_handlers(rules: Vec<Arc<RouteRule>>) -> (usize, usize) {
    let bus = MessageBus::new(true);
    let first = SomeMessageHandler::new(FIRST_HANDLER);
    let second = SomeMessageHandler::new(SECOND_HANDLER);

    for rule in rules {
        bus.add_rule(rule).unwrap();
    }
    bus.subscribe_handler::<_, SomeMessage>(&first).unwrap();
    bus.subscribe_handler::<_, SomeMessage>(&second).unwrap();

    bus.publish_event(SomeMessage::new(FIRST_MESSAGE));
    bus.publish_event(SomeMessage::new(SECOND_MESSAGE));

    (first.call_count(), second.call_count())
}

fn conditioned(name: &str, condition: ConstValidator) -> Arc<RouteRule> {
    RouteRule::builder::<SomeMessage, SomeMessageHandler>(name)
        .pre_condition(condition)
        .build()
        .unwrap()
}

#[test]
fn no_condition_routes_both_messages_to_both_handlers() {
    assert_eq!(run_two_handlers(vec![some_rule("handler First_Rule")]), (2, 2));
}

#[test]
fn accepting_condition_routes_both_messages_to_both_handlers() {
    let rule = conditioned("handler First_Rule", ConstValidator::accept());
    assert_eq!(run_two_handlers(vec![rule]), (2, 2));
}

#[test]
fn rejecting_condition_routes_nothing() {
    let rule = conditioned("handler First_Rule", ConstValidator::reject());
    assert_eq!(run_two_handlers(vec![rule]), (0, 0));
}

#[test]
fn content_conditions_pick_the_matching_handler() {
    let first = RouteRule::builder::<SomeMessage, SomeMessageHandler>("handler First_Rule")
        .pre_condition(SampleConditionValidator::new(FIRST_HANDLER, FIRST_MESSAGE))
        .build()
        .unwrap();
    let second = RouteRule::builder::<SomeMessage, SomeMessageHandler>("handler Second_Rule")
        .pre_condition(SampleConditionValidator::new(SECOND_HANDLER, SECOND_MESSAGE))
        .build()
        .unwrap();

    assert_eq!(run_two_handlers(vec![first, second]), (1, 1));
}

#[test]
fn rejecting_post_condition_wins_over_accepting_pre_condition() {
    let rule = RouteRule::builder::<SomeMessage, SomeMessageHandler>("post")
        .pre_condition(ConstValidator::accept())
        .post_condition(ConstValidator::reject())
        .build()
        .unwrap();
    assert_eq!(run_two_handlers(vec![rule]), (0, 0));
}

#[test]
fn rejecting_post_condition_blocks_transformed_messages() {
    let bus = MessageBus::new(true);
    let handler = SomeMessageHandler::new("");
    let rule = RouteRule::transforming::<SomeMessage, SomeMessageHandler>("t", SampleTransformer)
        .post_condition(ConstValidator::reject())
        .build()
        .unwrap();
    bus.add_rule(rule).unwrap();
    bus.subscribe_handler::<_, SomeMessage>(&handler).unwrap();

    bus.publish_event(SomeOtherMessage::new("x"));
    assert_eq!(handler.call_count(), 0);
}

#[test]
fn post_condition_sees_transformed_message() {
    let bus = MessageBus::new(true);
    let handler = SomeMessageHandler::new("");
    let rule = RouteRule::transforming::<SomeMessage, SomeMessageHandler>("t", SampleTransformer)
        .pre_condition(FnValidator::new(|_: &dyn Handler, message: &dyn Message| {
            message.view::<SomeOtherMessage>().is_some()
        }))
        .post_condition(FnValidator::new(|_: &dyn Handler, message: &dyn Message| {
            message
                .view::<SomeMessage>()
                .is_some_and(|m| m.text.starts_with("keep"))
        }))
        .build()
        .unwrap();
    bus.add_rule(rule).unwrap();
    bus.subscribe_handler::<_, SomeMessage>(&handler).unwrap();

    bus.publish_event(SomeOtherMessage::new("keep me"));
    bus.publish_event(SomeOtherMessage::new("drop me"));

    assert_eq!(handler.handled(), vec!["keep me".to_string()]);
}
