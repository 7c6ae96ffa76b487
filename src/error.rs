// Error handling module
// Defines the failures surfaced by the credential manager and the remote client

use thiserror::Error;

/// Failure of a single call to the auth service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Request never produced a response (connect, TLS, timeout)
    #[error("transport error: {0}")]
    Transport(String),

    /// Remote endpoint answered with a non-success status
    #[error("remote error: {status} - {message}")]
    Status { status: u16, message: String },

    /// Response body could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Reasons a bearer token could not be produced.
///
/// `Clone` so that one outcome can be handed to every caller waiting on the
/// same acquisition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No auth gateway is bound to the manager
    #[error("no auth gateway configured")]
    Unconfigured,

    /// Login or refresh call failed; cached tokens were left as they were
    #[error("token acquisition failed: {0}")]
    NetworkFailure(#[from] GatewayError),

    /// The auth service answered but the answer is unusable
    #[error("auth protocol violation: {0}")]
    ProtocolViolation(String),

    /// The acquisition task died before producing an outcome
    #[error("token acquisition aborted: {0}")]
    Aborted(String),
}

/// Errors from authenticated domain calls
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("remote error: {status} - {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err)
        }
    }
}

/// Result type alias for domain calls
pub type Result<T> = std::result::Result<T, ClientError>;
