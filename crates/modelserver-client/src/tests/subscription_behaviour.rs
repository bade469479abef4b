//! BDD step definitions for `tests/features/subscription.feature`.

use std::cell::RefCell;
use std::sync::Arc;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;

use super::support::{ListenerEvent, RecordingChannelFactory, RecordingListener, config_for};
use crate::errors::ModelServerError;
use crate::subscription::{IncrementalUpdate, SubscriptionManager, SubscriptionOptions};

#[derive(Default)]
struct SubscriptionWorld {
    factory: RecordingChannelFactory,
    listener: Arc<RecordingListener>,
    manager: Option<SubscriptionManager<RecordingChannelFactory>>,
    outcome: Option<Result<(), ModelServerError>>,
}

impl SubscriptionWorld {
    fn manager(&self) -> &SubscriptionManager<RecordingChannelFactory> {
        self.manager.as_ref().expect("manager configured")
    }

    fn subscribe(&mut self, modeluri: &str, options: SubscriptionOptions) {
        let listener = Arc::clone(&self.listener);
        let outcome = self.manager().subscribe(modeluri, listener, options);
        self.outcome = Some(outcome);
    }
}

#[fixture]
fn world() -> RefCell<SubscriptionWorld> {
    RefCell::new(SubscriptionWorld::default())
}

fn unquote(text: &str) -> &str {
    text.trim_matches('"')
}

fn parse_json(text: &str) -> Value {
    serde_json::from_str(text).expect("step argument is JSON")
}

#[given("a {version} subscription manager")]
fn given_manager(world: &RefCell<SubscriptionWorld>, version: String) {
    let api_version = version.parse().expect("known API version");
    let mut state = world.borrow_mut();
    let manager = SubscriptionManager::new(state.factory.clone(), &config_for(api_version))
        .expect("manager builds");
    state.manager = Some(manager);
}

#[given("a subscription to {modeluri}")]
fn given_subscription(world: &RefCell<SubscriptionWorld>, modeluri: String) {
    let mut state = world.borrow_mut();
    state.subscribe(unquote(&modeluri), SubscriptionOptions::default());
    assert!(
        matches!(state.outcome, Some(Ok(()))),
        "initial subscription failed"
    );
}

#[when("the channel for {modeluri} opens")]
fn when_channel_opens(world: &RefCell<SubscriptionWorld>, modeluri: String) {
    let state = world.borrow();
    let address = state.factory.address_of(unquote(&modeluri));
    state.manager().handle_open(&address);
}

#[when("the channel for {modeluri} receives {message}")]
fn when_channel_receives(world: &RefCell<SubscriptionWorld>, modeluri: String, message: String) {
    let state = world.borrow();
    let address = state.factory.address_of(unquote(&modeluri));
    state.manager().handle_message(&address, &message);
}

#[when("the channel for {modeluri} closes with code {code}")]
fn when_channel_closes(world: &RefCell<SubscriptionWorld>, modeluri: String, code: String) {
    let close_code: u16 = code.parse().expect("numeric close code");
    let state = world.borrow();
    let address = state.factory.address_of(unquote(&modeluri));
    state.manager().handle_close(&address, close_code, "");
}

#[when("{modeluri} is subscribed again with strict options")]
fn when_subscribed_strictly(world: &RefCell<SubscriptionWorld>, modeluri: String) {
    let options = SubscriptionOptions {
        error_when_unsuccessful: true,
        ..SubscriptionOptions::default()
    };
    world.borrow_mut().subscribe(unquote(&modeluri), options);
}

#[when("{modeluri} is subscribed again")]
fn when_subscribed_again(world: &RefCell<SubscriptionWorld>, modeluri: String) {
    world
        .borrow_mut()
        .subscribe(unquote(&modeluri), SubscriptionOptions::default());
}

#[when("{modeluri} is unsubscribed")]
fn when_unsubscribed(world: &RefCell<SubscriptionWorld>, modeluri: String) {
    world
        .borrow()
        .manager()
        .unsubscribe(unquote(&modeluri))
        .expect("unsubscribe succeeds");
}

#[then("the listener saw the channel open")]
fn then_saw_open(world: &RefCell<SubscriptionWorld>) {
    let events = world.borrow().listener.events();
    assert!(
        events.iter().any(|event| matches!(event, ListenerEvent::Open(_))),
        "no open event in {events:?}"
    );
}

#[then("the listener saw {modeluri} become dirty")]
fn then_saw_dirty(world: &RefCell<SubscriptionWorld>, modeluri: String) {
    let events = world.borrow().listener.events();
    let expected = ListenerEvent::DirtyState {
        modeluri: unquote(&modeluri).to_owned(),
        is_dirty: true,
    };
    assert!(events.contains(&expected), "no dirty state in {events:?}");
}

#[then("applying the received patch to {model} yields {expected}")]
fn then_patch_applies(world: &RefCell<SubscriptionWorld>, model: String, expected: String) {
    let events = world.borrow().listener.events();
    let Some(ListenerEvent::IncrementalUpdate(IncrementalUpdate::Patch(patch))) = events.last()
    else {
        panic!("expected a patch update, saw {events:?}");
    };
    let updated = patch.apply(&parse_json(&model)).expect("patch applies");
    assert_eq!(updated, parse_json(&expected));
}

#[then("the listener saw an error mentioning {snippet}")]
fn then_saw_error(world: &RefCell<SubscriptionWorld>, snippet: String) {
    let events = world.borrow().listener.events();
    let snippet_text = unquote(&snippet);
    assert!(
        events.iter().any(|event| matches!(
            event,
            ListenerEvent::Error(error) if error.message.contains(snippet_text)
        )),
        "no error mentioning {snippet_text:?} in {events:?}"
    );
}

#[then("the listener saw the channel close with reason {reason}")]
fn then_saw_close(world: &RefCell<SubscriptionWorld>, reason: String) {
    let events = world.borrow().listener.events();
    let Some(ListenerEvent::Close(close)) = events.last() else {
        panic!("expected a close event, saw {events:?}");
    };
    assert_eq!(close.reason, unquote(&reason));
}

#[then("the subscription fails because the model is already subscribed")]
fn then_already_subscribed(world: &RefCell<SubscriptionWorld>) {
    let state = world.borrow();
    assert!(
        matches!(
            state.outcome,
            Some(Err(ModelServerError::AlreadySubscribed { .. }))
        ),
        "unexpected outcome {:?}",
        state.outcome
    );
}

#[then("the subscription succeeds")]
fn then_subscription_succeeds(world: &RefCell<SubscriptionWorld>) {
    let state = world.borrow();
    assert!(
        matches!(state.outcome, Some(Ok(()))),
        "unexpected outcome {:?}",
        state.outcome
    );
}

#[then("{count} channel was opened")]
fn then_channels_opened(world: &RefCell<SubscriptionWorld>, count: String) {
    let expected: usize = count.parse().expect("numeric count");
    assert_eq!(world.borrow().factory.opened().len(), expected);
}

#[then("the channel for {modeluri} was closed")]
fn then_channel_closed(world: &RefCell<SubscriptionWorld>, modeluri: String) {
    let closed = world.borrow().factory.closed();
    assert_eq!(closed, [unquote(&modeluri)]);
}

#[then("no subscriptions remain")]
fn then_no_subscriptions(world: &RefCell<SubscriptionWorld>) {
    assert!(world.borrow().manager().subscriptions().is_empty());
}

#[scenario(path = "tests/features/subscription.feature")]
fn subscription_behaviour(world: RefCell<SubscriptionWorld>) {
    let _ = world;
}
