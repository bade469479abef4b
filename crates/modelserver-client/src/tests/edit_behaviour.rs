//! BDD step definitions for `tests/features/edit.feature`.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};

use super::support::{BREWER, ScriptedTransport, config_for};
use crate::client::ModelServerClient;
use crate::command::Command;
use crate::errors::ModelServerError;
use crate::model::ModelReference;
use crate::patch::PatchOperation;
use crate::transport::{Method, TransportError};
use crate::update::UpdateResult;

#[derive(Default)]
struct EditWorld {
    client: Option<ModelServerClient<ScriptedTransport>>,
    local_copy: Value,
    outcome: Option<Result<UpdateResult, ModelServerError>>,
}

impl EditWorld {
    fn client(&self) -> &ModelServerClient<ScriptedTransport> {
        self.client.as_ref().expect("client configured")
    }

    fn answer(&self, response: Result<Value, TransportError>) {
        self.client().transport().respond(response);
    }

    fn result(&self) -> &UpdateResult {
        match &self.outcome {
            Some(Ok(result)) => result,
            other => panic!("expected a successful edit, saw {other:?}"),
        }
    }
}

#[fixture]
fn world() -> RefCell<EditWorld> {
    RefCell::new(EditWorld::default())
}

fn unquote(text: &str) -> &str {
    text.trim_matches('"')
}

fn parse_json(text: &str) -> Value {
    serde_json::from_str(text).expect("step argument is JSON")
}

#[given("a {version} client holding the model {model}")]
fn given_client(world: &RefCell<EditWorld>, version: String, model: String) {
    let api_version = version.parse().expect("known API version");
    let client = ModelServerClient::new(ScriptedTransport::default(), &config_for(api_version))
        .expect("client builds");
    let mut state = world.borrow_mut();
    state.client = Some(client);
    state.local_copy = parse_json(&model);
}

#[given("the server answers edits with the patch {patch}")]
fn given_patch_answer(world: &RefCell<EditWorld>, patch: String) {
    world.borrow().answer(Ok(json!({
        "type": "success",
        "data": {"message": "Model successfully patched", "patch": parse_json(&patch)}
    })));
}

#[given("the server acknowledges edits without a patch")]
fn given_plain_answer(world: &RefCell<EditWorld>) {
    world.borrow().answer(Ok(json!({
        "type": "success",
        "data": "Model successfully updated"
    })));
}

#[given("the server rejects edits with {message}")]
fn given_rejection(world: &RefCell<EditWorld>, message: String) {
    world.borrow().answer(Err(TransportError::new("HTTP 409")
        .with_code(409)
        .with_body(json!({"type": "error", "data": unquote(&message)}))));
}

#[when("the name is replaced with {name} by patch")]
fn when_replaced_by_patch(world: &RefCell<EditWorld>, name: String) {
    let operation = PatchOperation::Replace {
        path: String::from("/name"),
        value: Value::String(unquote(&name).to_owned()),
    };
    let mut state = world.borrow_mut();
    let outcome = state.client().edit(BREWER, operation);
    state.outcome = Some(outcome);
}

#[when("the name is set to {name} by command")]
fn when_set_by_command(world: &RefCell<EditWorld>, name: String) {
    let owner = ModelReference::new(BREWER, "/");
    let command = Command::set(owner, "name", vec![Value::String(unquote(&name).to_owned())]);
    let mut state = world.borrow_mut();
    let outcome = state.client().edit(BREWER, command);
    state.outcome = Some(outcome);
}

#[then("the edit was sent as PATCH to {path}")]
fn then_sent_as_patch(world: &RefCell<EditWorld>, path: String) {
    let requests = world.borrow().client().transport().requests();
    let [request] = requests.as_slice() else {
        panic!("expected one request, saw {requests:?}");
    };
    assert_eq!(request.method, Method::Patch);
    assert_eq!(request.path, unquote(&path));
    assert_eq!(request.query_value("modeluri"), Some(BREWER));
}

#[then("the local copy is {expected}")]
fn then_local_copy(world: &RefCell<EditWorld>, expected: String) {
    let state = world.borrow();
    let updated = state
        .result()
        .patch_model(&state.local_copy)
        .expect("patch applies")
        .expect("edit returned a patch");
    assert_eq!(updated, parse_json(&expected));
}

#[then("the local copy must be re-fetched")]
fn then_refetch(world: &RefCell<EditWorld>) {
    let state = world.borrow();
    let result = state.result();
    assert!(result.success);
    assert!(result.patch.is_none());
}

#[then("the edit fails with the server message {message}")]
fn then_edit_fails(world: &RefCell<EditWorld>, message: String) {
    let state = world.borrow();
    let Some(Err(error)) = &state.outcome else {
        panic!("expected a failed edit, saw {:?}", state.outcome);
    };
    assert!(matches!(error, ModelServerError::Server { .. }));
    assert_eq!(error.message(), unquote(&message));
}

#[scenario(path = "tests/features/edit.feature")]
fn edit_behaviour(world: RefCell<EditWorld>) {
    let _ = world;
}
