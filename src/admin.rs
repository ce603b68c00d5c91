//! Management API served under the reserved `/__phiremock` prefix.
//!
//! Test suites drive the server through these endpoints: create and list
//! expectations, force and reset scenarios, query the request journal, and
//! reset everything between test cases. Mutations answer with the JSON
//! envelope; malformed payloads, unknown fields and invalid matchers are
//! rejected with a 400 envelope carrying every violation found.

use bytes::Bytes;
use http::{Method, StatusCode, request::Parts};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{
    dispatcher::Dispatcher,
    expectation::{Expectation, RequestPattern},
    request::ReceivedRequest,
    responder::{Json, Responder, error_envelope, ok_envelope},
    types::Response,
};

/// Reserved URL prefix for management traffic.
pub const ADMIN_PREFIX: &str = "/__phiremock";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeleteById {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ForceScenario {
    scenario_name: String,
    scenario_state: String,
}

/// Routes a management request to its endpoint.
pub(crate) async fn handle(dispatcher: &Dispatcher, parts: &Parts, body: Bytes) -> Response {
    let path = parts.uri.path();
    let route = path.strip_prefix(ADMIN_PREFIX).unwrap_or(path);

    match (&parts.method, route) {
        (&Method::GET, "/expectations") => list_expectations(dispatcher),
        (&Method::POST, "/expectations") => add_expectation(dispatcher, &body),
        (&Method::DELETE, "/expectations") => delete_expectations(dispatcher, &body),
        (&Method::GET, "/scenarios") => list_scenarios(dispatcher),
        (&Method::PUT, "/scenarios") => force_scenario(dispatcher, &body),
        (&Method::DELETE, "/scenarios") => {
            dispatcher.scenarios.reset_all();
            ok_envelope()
        }
        (&Method::GET, "/executions") => search_executions(dispatcher, &body),
        (&Method::POST, "/executions/count") => count_executions(dispatcher, &body),
        (&Method::DELETE, "/executions") => {
            dispatcher.journal.reset();
            ok_envelope()
        }
        (&Method::POST, "/reset") => {
            dispatcher.expectations.reset();
            dispatcher.scenarios.reset_all();
            dispatcher.journal.reset();
            ok_envelope()
        }
        _ => {
            debug!("unknown management endpoint: {} {}", parts.method, path);
            error_envelope(
                StatusCode::NOT_FOUND,
                [format!("unknown management endpoint: {} {}", parts.method, path)],
            )
        }
    }
}

fn parse_json<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|err| {
        info!("rejected management payload: {err}");
        error_envelope(StatusCode::BAD_REQUEST, [err.to_string()])
    })
}

/// The journal search pattern; an absent body matches every entry.
fn parse_pattern(body: &[u8]) -> Result<RequestPattern, Response> {
    if body.is_empty() {
        return Ok(RequestPattern::default());
    }
    parse_json(body)
}

fn list_expectations(dispatcher: &Dispatcher) -> Response {
    let snapshot = dispatcher.expectations.list();
    let entries: Vec<&Expectation> = snapshot.iter().map(|e| e.as_ref()).collect();
    match serde_json::to_value(&entries) {
        Ok(value) => Json(value).into_response(),
        Err(err) => error_envelope(StatusCode::INTERNAL_SERVER_ERROR, [err.to_string()]),
    }
}

fn add_expectation(dispatcher: &Dispatcher, body: &Bytes) -> Response {
    let expectation: Expectation = match parse_json(body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };
    if let Err(details) = expectation.validate() {
        info!("rejected expectation: {}", details.join("; "));
        return error_envelope(StatusCode::BAD_REQUEST, details);
    }
    let id = dispatcher.expectations.add(expectation);
    info!("expectation {id} registered");
    (
        StatusCode::CREATED,
        Json(json!({ "result": "OK", "details": [], "id": id })),
    )
        .into_response()
}

fn delete_expectations(dispatcher: &Dispatcher, body: &Bytes) -> Response {
    if body.is_empty() {
        dispatcher.expectations.reset();
        return ok_envelope();
    }
    let target: DeleteById = match parse_json(body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };
    if dispatcher.expectations.delete(&target.id) {
        ok_envelope()
    } else {
        debug!("delete of absent expectation {}", target.id);
        error_envelope(
            StatusCode::NOT_FOUND,
            [format!("no expectation with id {}", target.id)],
        )
    }
}

fn list_scenarios(dispatcher: &Dispatcher) -> Response {
    let entries: Vec<Value> = dispatcher
        .scenarios
        .snapshot()
        .into_iter()
        .map(|(name, state)| json!({ "name": name, "state": state }))
        .collect();
    Json(Value::Array(entries)).into_response()
}

fn force_scenario(dispatcher: &Dispatcher, body: &Bytes) -> Response {
    let force: ForceScenario = match parse_json(body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };
    if force.scenario_name.is_empty() || force.scenario_state.is_empty() {
        return error_envelope(
            StatusCode::BAD_REQUEST,
            ["scenarioName and scenarioState must be non-empty"],
        );
    }
    dispatcher
        .scenarios
        .set(&force.scenario_name, &force.scenario_state);
    info!(
        "scenario {} forced to {}",
        force.scenario_name, force.scenario_state
    );
    ok_envelope()
}

fn search_executions(dispatcher: &Dispatcher, body: &Bytes) -> Response {
    let pattern = match parse_pattern(body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };
    let entries: Vec<Value> = dispatcher
        .journal
        .search(&pattern)
        .iter()
        .map(|entry| entry_json(entry))
        .collect();
    Json(Value::Array(entries)).into_response()
}

fn count_executions(dispatcher: &Dispatcher, body: &Bytes) -> Response {
    let pattern = match parse_pattern(body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };
    Json(json!({ "count": dispatcher.journal.count(&pattern) })).into_response()
}

fn entry_json(entry: &ReceivedRequest) -> Value {
    let mut headers = serde_json::Map::new();
    for name in entry.headers().keys() {
        let values: Vec<Value> = entry
            .headers()
            .get_all(name)
            .iter()
            .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).to_string()))
            .collect();
        headers.insert(name.as_str().to_string(), Value::Array(values));
    }
    json!({
        "method": entry.method(),
        "url": entry.url(),
        "headers": headers,
        "body": entry.body_utf8(),
        "receivedAt": entry.received_at().to_rfc3339(),
    })
}
