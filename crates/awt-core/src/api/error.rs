//! API error types

use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by the tracking API client
///
/// Variants fall into two classes: authentication failures and data fetch
/// failures. See [`ApiError::is_auth`].
#[derive(Error, Debug)]
pub enum ApiError {
    /// HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Token request never got a response
    #[error("Authentication request failed: {0}")]
    AuthTransport(#[source] reqwest::Error),

    /// Token endpoint answered with a non-success status
    #[error("Authentication rejected with status {status}: {body}")]
    AuthRejected { status: StatusCode, body: String },

    /// Token endpoint answered with something other than JSON
    #[error("Authentication response was not valid JSON: {0}")]
    InvalidAuthResponse(#[source] reqwest::Error),

    /// Token response had none of the accepted token fields
    #[error("Authentication response did not contain a token (expected one of: {expected})")]
    MissingToken { expected: String },

    /// Data request never got a response
    #[error("Tracking data request failed: {0}")]
    FetchTransport(#[source] reqwest::Error),

    /// Data endpoint answered with a non-success status
    #[error("Tracking data request returned status {status}: {body}")]
    FetchRejected { status: StatusCode, body: String },

    /// Data endpoint answered with something other than JSON
    #[error("Tracking data response was not valid JSON: {0}")]
    InvalidPayload(#[source] reqwest::Error),
}

impl ApiError {
    /// Check if this error happened while obtaining a token
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ApiError::AuthTransport(_)
                | ApiError::AuthRejected { .. }
                | ApiError::InvalidAuthResponse(_)
                | ApiError::MissingToken { .. }
        )
    }
}
