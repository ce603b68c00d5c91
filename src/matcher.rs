//! String matcher primitives for request patterns.
//!
//! A request pattern is built from small tagged predicates over strings. Each
//! matcher is a closed sum type with exactly one of four variants, mirroring
//! the wire format where a matcher is a JSON object with a single key:
//! `isEqualTo`, `isSameString`, `matches` or `contains`. Regular expressions
//! are compiled once at parse time, so a pattern that reaches the store can
//! never fail to compile during matching.
//!
//! # Examples
//!
//! ```rust
//! use phiremock::matcher::StringMatcher;
//!
//! let m: StringMatcher = serde_json::from_str(r#"{"isEqualTo": "/hello"}"#).unwrap();
//! assert!(m.matches_value("/hello"));
//! assert!(!m.matches_value("/other"));
//! ```

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A compiled regular expression that serializes as its source pattern.
///
/// Deserialization compiles the pattern eagerly; an invalid pattern is a
/// deserialization error, which the management API surfaces as a 400.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Returns the source text of the pattern.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Tests the pattern against a value with partial-match semantics.
    pub fn is_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        let regex = Regex::new(&source).map_err(|e| {
            serde::de::Error::custom(format!("invalid regular expression: {e}"))
        })?;
        Ok(Pattern(regex))
    }
}

/// A tagged predicate over a string value.
///
/// The serde representation is externally tagged, which matches the wire
/// format exactly: `{"isEqualTo": "x"}`, `{"isSameString": "X"}`,
/// `{"matches": "^x.*"}` or `{"contains": "x"}`. An object with an unknown
/// key or more than one key is rejected at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StringMatcher {
    /// Exact equality.
    #[serde(rename = "isEqualTo")]
    IsEqualTo(String),
    /// Case-insensitive equality, Unicode-aware.
    #[serde(rename = "isSameString")]
    IsSameString(String),
    /// Regular expression, partial-match semantics.
    #[serde(rename = "matches")]
    Matches(Pattern),
    /// Substring containment.
    #[serde(rename = "contains")]
    Contains(String),
}

impl StringMatcher {
    /// Evaluates the matcher against a value. Evaluation is pure.
    pub fn matches_value(&self, value: &str) -> bool {
        match self {
            StringMatcher::IsEqualTo(expected) => value == expected,
            StringMatcher::IsSameString(expected) => {
                value.to_lowercase() == expected.to_lowercase()
            }
            StringMatcher::Matches(pattern) => pattern.is_match(value),
            StringMatcher::Contains(needle) => value.contains(needle),
        }
    }
}

/// Case-insensitive method matcher.
///
/// On the wire the method of a request pattern is a bare string rather than
/// a matcher object, and it compares case-insensitively, so `"get"` matches
/// an incoming `GET`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodMatcher(pub String);

impl MethodMatcher {
    /// Tests the matcher against an incoming (uppercased) method.
    pub fn matches_method(&self, method: &str) -> bool {
        self.0.eq_ignore_ascii_case(method)
    }
}
