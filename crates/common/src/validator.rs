//! Response validators
//!
//! A validator is a pure predicate over `(status, body)`. Probes invoke it
//! once per response; a `true` ends the probe.

use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

type Predicate = dyn Fn(u16, &str) -> bool + Send + Sync;

/// Caller-supplied classification of a response
#[derive(Clone)]
pub struct Validator {
    description: String,
    predicate: Arc<Predicate>,
}

impl Validator {
    pub fn new<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(u16, &str) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Classify a response. A panicking predicate counts as no match.
    pub fn check(&self, status: u16, body: &str) -> bool {
        match catch_unwind(AssertUnwindSafe(|| (self.predicate)(status, body))) {
            Ok(matched) => matched,
            Err(_) => {
                warn!(validator = %self.description, "Validator panicked, treating as no match");
                false
            }
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Accept any 2xx response
pub fn any_success() -> Validator {
    Validator::new("status 2xx", |status, _| (200..300).contains(&status))
}

pub fn status_is(expected: u16) -> Validator {
    Validator::new(format!("status == {expected}"), move |status, _| status == expected)
}

pub fn body_contains(needle: impl Into<String>) -> Validator {
    let needle = needle.into();
    Validator::new(format!("body contains {needle:?}"), move |_, body| body.contains(&needle))
}

/// Exact status and body; surrounding whitespace in the body is ignored
pub fn status_and_body(expected_status: u16, expected_body: impl Into<String>) -> Validator {
    let expected_body = expected_body.into();
    Validator::new(
        format!("status == {expected_status} and body == {expected_body:?}"),
        move |status, body| status == expected_status && body.trim() == expected_body.trim(),
    )
}

pub fn status_and_body_contains(expected_status: u16, needle: impl Into<String>) -> Validator {
    all_of(vec![status_is(expected_status), body_contains(needle)])
}

/// Match only when every validator matches
pub fn all_of(validators: Vec<Validator>) -> Validator {
    let description = validators
        .iter()
        .map(Validator::description)
        .collect::<Vec<_>>()
        .join(" and ");
    Validator::new(description, move |status, body| {
        validators.iter().all(|v| v.check(status, body))
    })
}

/// Declarative form of a validator, as found in scenario files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Expectation {
    /// Required status code; any 2xx when unset
    pub status: Option<u16>,

    /// Required body, compared after trimming
    pub body: Option<String>,

    /// Required body substring
    pub body_contains: Option<String>,
}

impl Expectation {
    pub fn validator(&self) -> Validator {
        let mut parts = vec![match self.status {
            Some(code) => status_is(code),
            None => any_success(),
        }];

        if let Some(body) = &self.body {
            let body = body.clone();
            parts.push(Validator::new(format!("body == {body:?}"), move |_, actual| {
                actual.trim() == body.trim()
            }));
        }
        if let Some(needle) = &self.body_contains {
            parts.push(body_contains(needle.clone()));
        }

        if parts.len() == 1 {
            parts.remove(0)
        } else {
            all_of(parts)
        }
    }
}
