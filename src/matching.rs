//! Expectation selection for incoming requests.
//!
//! Matching runs against an immutable snapshot of the expectation store.
//! Candidates are filtered by their request pattern and scenario
//! precondition, then the highest priority wins; ties break by insertion
//! order, oldest first. Under a fixed snapshot and scenario state the
//! selection is deterministic.

use std::sync::Arc;

use http::HeaderName;

use crate::{
    expectation::{Expectation, RequestPattern, SCENARIO_START},
    request::ReceivedRequest,
    scenario::ScenarioStore,
};

/// Whether a request satisfies every declared condition of a pattern.
pub fn pattern_matches(pattern: &RequestPattern, request: &ReceivedRequest) -> bool {
    if let Some(method) = &pattern.method {
        if !method.matches_method(request.method()) {
            return false;
        }
    }
    if let Some(url) = &pattern.url {
        if !url.matches_value(request.url()) {
            return false;
        }
    }
    if let Some(body) = &pattern.body {
        if !body.matches_value(&request.body_utf8()) {
            return false;
        }
    }
    if let Some(headers) = &pattern.headers {
        for (name, matcher) in headers {
            let Ok(header_name) = HeaderName::try_from(name.as_str()) else {
                return false;
            };
            let any_value_matches = request
                .headers()
                .get_all(&header_name)
                .iter()
                .any(|value| {
                    value
                        .to_str()
                        .map(|v| matcher.matches_value(v))
                        .unwrap_or(false)
                });
            if !any_value_matches {
                return false;
            }
        }
    }
    if let Some(form_fields) = &pattern.form_fields {
        let parsed = request.form_fields();
        for (field, matcher) in form_fields {
            match parsed.get(field) {
                Some(value) if matcher.matches_value(value) => {}
                _ => return false,
            }
        }
    }
    true
}

/// Whether the scenario precondition of an expectation holds.
fn scenario_allows(expectation: &Expectation, scenarios: &ScenarioStore) -> bool {
    match (&expectation.scenario_name, &expectation.scenario_state_is) {
        (Some(name), Some(required)) => {
            let current = scenarios.get(name);
            if required == SCENARIO_START {
                current == SCENARIO_START
            } else {
                current == *required
            }
        }
        _ => true,
    }
}

/// Selects the winning expectation for a request, if any.
pub fn select(
    request: &ReceivedRequest,
    snapshot: &[Arc<Expectation>],
    scenarios: &ScenarioStore,
) -> Option<Arc<Expectation>> {
    let mut winner: Option<&Arc<Expectation>> = None;
    for candidate in snapshot {
        if !scenario_allows(candidate, scenarios) {
            continue;
        }
        if !pattern_matches(&candidate.request, request) {
            continue;
        }
        // Strictly-greater keeps the oldest entry on priority ties.
        match winner {
            Some(best) if candidate.priority <= best.priority => {}
            _ => winner = Some(candidate),
        }
    }
    winner.cloned()
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn request(method: &str, uri: &str) -> ReceivedRequest {
        let parts = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts()
            .0;
        ReceivedRequest::new(&parts, Bytes::new())
    }

    fn form_request(uri: &str, body: &str) -> ReceivedRequest {
        let parts = http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        ReceivedRequest::new(&parts, Bytes::from(body.to_string()))
    }

    fn expectation(json: &str) -> Arc<Expectation> {
        Arc::new(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn empty_pattern_matches_anything() {
        let e = expectation(r#"{"request":{},"response":{}}"#);
        assert!(pattern_matches(&e.request, &request("GET", "/whatever")));
    }

    #[test]
    fn url_matches_path_plus_query() {
        let e = expectation(
            r#"{"request":{"url":{"isEqualTo":"/a?x=1"}},"response":{}}"#,
        );
        assert!(pattern_matches(&e.request, &request("GET", "/a?x=1")));
        assert!(!pattern_matches(&e.request, &request("GET", "/a")));
    }

    #[test]
    fn header_condition_accepts_any_value_under_the_name() {
        let e = expectation(
            r#"{"request":{"headers":{"X-Tag":{"isEqualTo":"two"}}},"response":{}}"#,
        );
        let parts = http::Request::builder()
            .method("GET")
            .uri("/h")
            .header("x-tag", "one")
            .header("x-tag", "two")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        let req = ReceivedRequest::new(&parts, Bytes::new());
        assert!(pattern_matches(&e.request, &req));
    }

    #[test]
    fn form_field_condition_requires_parsed_field() {
        let e = expectation(
            r#"{"request":{"formFields":{"name":{"isEqualTo":"jane"}}},"response":{}}"#,
        );
        assert!(pattern_matches(&e.request, &form_request("/f", "name=jane&age=30")));
        assert!(!pattern_matches(&e.request, &form_request("/f", "name=john")));
        assert!(!pattern_matches(&e.request, &request("POST", "/f")));
    }

    #[test]
    fn no_candidates_yields_none() {
        let scenarios = ScenarioStore::new();
        assert!(select(&request("GET", "/x"), &[], &scenarios).is_none());
    }

    #[test]
    fn higher_priority_wins() {
        let scenarios = ScenarioStore::new();
        let a = expectation(
            r#"{"request":{"url":{"isEqualTo":"/x"}},"response":{"body":"A"},"priority":1}"#,
        );
        let b = expectation(
            r#"{"request":{"url":{"isEqualTo":"/x"}},"response":{"body":"B"},"priority":5}"#,
        );
        let winner = select(&request("GET", "/x"), &[a, b.clone()], &scenarios).unwrap();
        assert_eq!(winner.response, b.response);
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let scenarios = ScenarioStore::new();
        let first = expectation(r#"{"request":{"url":{"isEqualTo":"/x"}},"response":{"body":"first"}}"#);
        let second = expectation(r#"{"request":{"url":{"isEqualTo":"/x"}},"response":{"body":"second"}}"#);
        let winner = select(
            &request("GET", "/x"),
            &[first.clone(), second],
            &scenarios,
        )
        .unwrap();
        assert_eq!(winner.response, first.response);
    }

    #[test]
    fn selection_is_deterministic_under_fixed_state() {
        let scenarios = ScenarioStore::new();
        let snapshot = vec![
            expectation(r#"{"request":{"url":{"contains":"/x"}},"response":{"body":"A"}}"#),
            expectation(r#"{"request":{"url":{"contains":"/x"}},"response":{"body":"B"}}"#),
        ];
        let req = request("GET", "/x");
        let first = select(&req, &snapshot, &scenarios).unwrap();
        let second = select(&req, &snapshot, &scenarios).unwrap();
        assert_eq!(first.response, second.response);
    }

    #[test]
    fn scenario_precondition_gates_matching() {
        let scenarios = ScenarioStore::new();
        let started = expectation(
            r#"{"scenarioName":"S","scenarioStateIs":"Scenario.START","request":{"url":{"isEqualTo":"/s"}},"response":{"body":"1"}}"#,
        );
        let second = expectation(
            r#"{"scenarioName":"S","scenarioStateIs":"second","request":{"url":{"isEqualTo":"/s"}},"response":{"body":"2"}}"#,
        );
        let snapshot = vec![started.clone(), second.clone()];
        let req = request("GET", "/s");

        // Never-set scenario satisfies the start sentinel.
        let winner = select(&req, &snapshot, &scenarios).unwrap();
        assert_eq!(winner.response, started.response);

        scenarios.set("S", "second");
        let winner = select(&req, &snapshot, &scenarios).unwrap();
        assert_eq!(winner.response, second.response);

        scenarios.set("S", "done");
        assert!(select(&req, &snapshot, &scenarios).is_none());
    }
}
