//! Error types for token and data operations

use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Which OAuth2 grant a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Password,
    RefreshToken,
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password => f.write_str("password"),
            Self::RefreshToken => f.write_str("refresh_token"),
        }
    }
}

/// A rejected or failed token grant
#[derive(Debug, Clone, Error)]
#[error("{grant} grant failed{}: {detail}", status_suffix(.status))]
pub struct AuthFailure {
    pub grant: Grant,
    /// HTTP status, when the server answered
    pub status: Option<u16>,
    /// Response headers, when the server answered
    pub headers: Vec<(String, String)>,
    pub detail: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum Error {
    /// No token has ever been acquired
    #[error("Must initialize token")]
    Uninitialized,

    #[error("No instance stored; call initialize first")]
    InstanceMissing,

    #[error("{0} must not be empty")]
    EmptyArgument(&'static str),

    #[error(transparent)]
    Auth(#[from] AuthFailure),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_display() {
        let err = AuthFailure {
            grant: Grant::RefreshToken,
            status: Some(401),
            headers: vec![],
            detail: "invalid_grant".into(),
        };
        assert_eq!(
            err.to_string(),
            "refresh_token grant failed (HTTP 401): invalid_grant"
        );

        let err = AuthFailure {
            grant: Grant::Password,
            status: None,
            headers: vec![],
            detail: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "password grant failed: connection refused");
    }

    #[test]
    fn test_uninitialized_message() {
        assert_eq!(Error::Uninitialized.to_string(), "Must initialize token");
    }
}
