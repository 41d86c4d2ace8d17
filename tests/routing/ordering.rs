//! Rule/subscription ordering: both orders route identically.

use rulebus::{ActionExecutor, Binding, MessageBus};

use crate::support::{init_tracing, some_rule, SomeMessage, SomeMessageHandler};

#[test]
fn subscribe_after_add_rule_executes_handler() {
    init_tracing();
    let bus = MessageBus::new(true);
    let handler = SomeMessageHandler::new("");

    bus.add_rule(some_rule("")).unwrap();
    let binding = bus.subscribe_handler::<_, SomeMessage>(&handler).unwrap();
    assert_eq!(binding, Binding::Active { rules: 1, duplicates: 0 });

    bus.publish_event(SomeMessage::new("First message"));

    assert_eq!(handler.call_count(), 1);
}

#[test]
fn subscribe_before_add_rule_executes_handler() {
    let bus = MessageBus::new(false);
    let handler = SomeMessageHandler::new("");

    let binding = bus.subscribe_handler::<_, SomeMessage>(&handler).unwrap();
    assert!(binding.is_pending());
    assert_eq!(bus.pending_count(), 1);

    assert_eq!(bus.add_rule(some_rule("")).unwrap(), 1);
    assert_eq!(bus.pending_count(), 0);
    assert_eq!(bus.active_count(), 1);

    bus.publish_event(SomeMessage::new("First message"));

    assert_eq!(handler.call_count(), 1);
}

#[test]
fn explicit_executor_routes_like_handle_impl() {
    let bus = MessageBus::new(true);
    let handler = SomeMessageHandler::new("explicit");
    bus.add_rule(some_rule("")).unwrap();

    let target = handler.clone();
    bus.subscribe::<_, SomeMessage>(
        &handler,
        ActionExecutor::<SomeMessage, _>::new(move |message: &SomeMessage| {
            rulebus::Handle::handle(target.as_ref(), message)
        }),
    )
    .unwrap();

    bus.publish_event(SomeMessage::new("x"));
    assert_eq!(handler.handled(), vec!["x".to_string()]);
}

#[test]
fn one_rule_routes_to_every_subscribed_handler() {
    let bus = MessageBus::new(true);
    let first = SomeMessageHandler::new("handler First");
    let second = SomeMessageHandler::new("handler Second");

    bus.add_rule(some_rule("handler First_Rule")).unwrap();
    bus.subscribe_handler::<_, SomeMessage>(&first).unwrap();
    bus.subscribe_handler::<_, SomeMessage>(&second).unwrap();

    bus.publish_event(SomeMessage::new("handler First_Message"));

    assert_eq!(first.call_count(), 1);
    assert_eq!(second.call_count(), 1);
}

#[test]
fn handlers_run_in_subscription_order() {
    let bus = MessageBus::new(true);
    bus.add_rule(some_rule("ordered")).unwrap();

    let log = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let handlers: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(SomeMessageHandler::new)
        .collect();
    for handler in &handlers {
        let log = log.clone();
        let name = handler.name.clone();
        bus.subscribe::<_, SomeMessage>(
            handler,
            ActionExecutor::<SomeMessage, _>::new(move |_: &SomeMessage| {
                log.lock().unwrap().push(name.clone());
            }),
        )
        .unwrap();
    }

    bus.publish_event(SomeMessage::new("go"));
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
}
