//! Normalized results of data calls

use serde_json::{json, Value};
use std::fmt;

use crate::error::Error;

/// An HTTP-level failure on a data call.
///
/// `status` is `0` when no response was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub status: u16,
    pub reason: String,
    pub body: Option<String>,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.reason)
    }
}

/// Result of a dispatched request once the token check has passed
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 2xx with a JSON body
    Record(Value),
    /// 2xx with no body
    Empty,
    Failed(TransportFailure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    /// The `result` member of a record body, if any
    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Record(value) => value.get("result"),
            _ => None,
        }
    }

    /// Render in the `{ "result": ... }` shape older consumers expect
    pub fn to_legacy(&self) -> Value {
        match self {
            Self::Record(value) => value.clone(),
            Self::Empty => json!({ "result": "success" }),
            Self::Failed(failure) => json!({ "result": failure.to_string() }),
        }
    }
}

/// Legacy rendering that also folds token-layer errors into `result`
pub fn legacy_result(result: &Result<Outcome, Error>) -> Value {
    match result {
        Ok(outcome) => outcome.to_legacy(),
        Err(err) => json!({ "result": err.to_string() }),
    }
}
