//! The expectation data model.
//!
//! An expectation pairs a request pattern with a response directive (a stub
//! response, a proxy target, or both) and optional scenario logic. The serde
//! shapes here are the wire format of the management API and of the `*.json`
//! files loaded at boot: field names are fixed, unknown fields are rejected,
//! and regular expressions are compiled during parsing.

use std::collections::HashMap;

use http::{HeaderName, HeaderValue, StatusCode, Uri};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::matcher::{MethodMatcher, StringMatcher};

/// The matcher-bearing portion of an expectation.
///
/// Every field is optional; a declared field must be satisfied by an incoming
/// request for the expectation to match. An empty pattern matches every
/// request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RequestPattern {
    /// Case-insensitive method condition, e.g. `"get"`.
    #[serde(default)]
    pub method: Option<MethodMatcher>,
    /// Condition over the request path plus raw query string.
    #[serde(default)]
    pub url: Option<StringMatcher>,
    /// Condition over the raw request body interpreted as UTF-8.
    #[serde(default)]
    pub body: Option<StringMatcher>,
    /// Conditions keyed by header name (case-insensitive).
    #[serde(default)]
    pub headers: Option<HashMap<String, StringMatcher>>,
    /// Conditions over fields of an `application/x-www-form-urlencoded` body.
    #[serde(default)]
    pub form_fields: Option<HashMap<String, StringMatcher>>,
}

/// The response directive of an expectation.
///
/// Carries the stub response fields and the optional delay. A directive with
/// none of `statusCode`, `body`, `bodyFileName` or `headers` set is a pure
/// delay carrier, which lets an expectation combine `delayMillis` with a
/// `proxyTo` target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ResponseSpec {
    /// Status code of the stub response; `200` when absent.
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Literal response body.
    #[serde(default)]
    pub body: Option<String>,
    /// Path of a file whose contents become the response body, read at send
    /// time.
    #[serde(default)]
    pub body_file_name: Option<String>,
    /// Response headers.
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    /// Milliseconds to wait before emitting anything.
    #[serde(default)]
    pub delay_millis: Option<u64>,
}

impl ResponseSpec {
    /// Whether this directive describes a stub response, as opposed to only
    /// carrying a delay for a proxied call.
    pub fn is_stub(&self) -> bool {
        self.status_code.is_some()
            || self.body.is_some()
            || self.body_file_name.is_some()
            || self.headers.as_ref().is_some_and(|h| !h.is_empty())
    }

    /// Effective status code, defaulting to `200`.
    pub fn status(&self) -> u16 {
        self.status_code.unwrap_or(200)
    }
}

/// State name sentinel meaning "scenario absent or unset".
pub const SCENARIO_START: &str = "Scenario.START";

/// A declarative rule pairing a request pattern with a response or proxy
/// directive and optional scenario logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Expectation {
    /// Stable identifier; assigned from a content hash on insertion when
    /// absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Scenario this expectation participates in.
    #[serde(default)]
    pub scenario_name: Option<String>,
    /// State the scenario must be in for this expectation to match.
    /// `"Scenario.START"` also matches a scenario that was never set.
    #[serde(default)]
    pub scenario_state_is: Option<String>,
    /// State the scenario transitions to when this expectation wins.
    #[serde(default)]
    pub new_scenario_state: Option<String>,
    /// Match criteria.
    pub request: RequestPattern,
    /// Stub response and/or delay.
    #[serde(default)]
    pub response: Option<ResponseSpec>,
    /// Upstream URL to forward the original request to.
    #[serde(default)]
    pub proxy_to: Option<String>,
    /// Higher priority wins when several expectations match.
    #[serde(default)]
    pub priority: i32,
}

impl Expectation {
    /// Whether the winning response is the stub response. When an expectation
    /// carries both a stub response and a proxy target, the stub wins and the
    /// proxy is ignored.
    pub fn has_stub_response(&self) -> bool {
        self.response.as_ref().is_some_and(ResponseSpec::is_stub)
            || (self.response.is_some() && self.proxy_to.is_none())
    }

    /// Declared delay, from whichever directive carries it.
    pub fn delay_millis(&self) -> Option<u64> {
        self.response.as_ref().and_then(|r| r.delay_millis)
    }

    /// Checks the structural constraints that serde alone cannot express.
    ///
    /// Returns the full list of violations so the management API can report
    /// them all in one envelope.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut details = Vec::new();

        if self.response.is_none() && self.proxy_to.is_none() {
            details.push("expectation must declare a response or a proxyTo target".to_string());
        }
        if self.scenario_state_is.is_some() && self.scenario_name.is_none() {
            details.push("scenarioStateIs requires a scenarioName".to_string());
        }
        if self.new_scenario_state.is_some() && self.scenario_name.is_none() {
            details.push("newScenarioState requires a scenarioName".to_string());
        }

        if let Some(response) = &self.response {
            if let Some(code) = response.status_code {
                if StatusCode::from_u16(code).is_err() {
                    details.push(format!("invalid status code: {code}"));
                }
            }
            if response.body.is_some() && response.body_file_name.is_some() {
                details.push("response declares both body and bodyFileName".to_string());
            }
            if let Some(headers) = &response.headers {
                for (name, value) in headers {
                    if HeaderName::try_from(name.as_str()).is_err() {
                        details.push(format!("invalid response header name: {name}"));
                    }
                    if HeaderValue::try_from(value.as_str()).is_err() {
                        details.push(format!("invalid response header value for {name}"));
                    }
                }
            }
        }

        if let Some(headers) = &self.request.headers {
            for name in headers.keys() {
                if HeaderName::try_from(name.as_str()).is_err() {
                    details.push(format!("invalid request header name: {name}"));
                }
            }
        }

        if let Some(target) = &self.proxy_to {
            match target.parse::<Uri>() {
                Ok(uri) => {
                    let scheme_ok = matches!(uri.scheme_str(), Some("http") | Some("https"));
                    if !scheme_ok || uri.authority().is_none() {
                        details.push(format!("proxyTo must be an absolute http(s) URL: {target}"));
                    }
                }
                Err(_) => details.push(format!("proxyTo is not a valid URL: {target}")),
            }
        }

        if details.is_empty() { Ok(()) } else { Err(details) }
    }

    /// Derives the stable content-hash identifier used when no id was given.
    pub fn content_id(&self) -> String {
        let mut unidentified = self.clone();
        unidentified.id = None;
        let canonical = serde_json::to_vec(&unidentified).unwrap_or_default();
        let mut hasher = Sha1::new();
        hasher.update(&canonical);
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}
