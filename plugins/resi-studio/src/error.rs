//! Error taxonomy for everything that talks to the Resi Studio API.
//!
//! The `Display` strings double as the operator-facing messages written into the
//! encoder error table and the `encoderErrorStatus` variable, so they are phrased
//! for a person looking at a button, not for a log file.

use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResiError {
    #[error("Client ID and Client Secret are required to connect to Resi Studio")]
    MissingCredentials,

    #[error("Authentication with Resi Studio failed: {0}")]
    AuthenticationFailed(String),

    #[error("Too Many Requests: Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Bad Request: Check your input values.")]
    BadRequest,

    #[error("Unauthorized: Check your API credentials.")]
    Unauthorized,

    #[error("Forbidden: You may not have access to this resource.")]
    Forbidden,

    #[error("Not Found: The requested resource does not exist.")]
    NotFound,

    #[error("Conflict: Encoder may already be live or there is an overlapping schedule.")]
    Conflict,

    #[error("Error {}: The server encountered an unexpected condition.", .0.as_u16())]
    ServerUnavailable(StatusCode),

    #[error("Unexpected error: {0}")]
    UnexpectedStatus(StatusCode),

    #[error("Network failure talking to Resi Studio: {0}")]
    NetworkFailure(#[source] reqwest::Error),

    #[error("Malformed response from Resi Studio: {0}")]
    MalformedResponse(String),
}

impl ResiError {
    /// Classifies a non-2xx response status.
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST => Self::BadRequest,
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::CONFLICT => Self::Conflict,
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
            s if s.is_server_error() => Self::ServerUnavailable(s),
            s => Self::UnexpectedStatus(s),
        }
    }

    /// True when the failure happened before any API request could be made,
    /// because no usable bearer token is available.
    pub fn is_session_error(&self) -> bool {
        matches!(self, Self::MissingCredentials | Self::AuthenticationFailed(_))
    }
}
