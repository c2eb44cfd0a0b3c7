use thiserror::Error;

/// Failures talking to the backend HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// `create_scan` was given a blank target.
    #[error("scan target must not be empty")]
    EmptyTarget,

    /// The id is blank or would change the request path.
    #[error("invalid scan id '{0}'")]
    InvalidScanId(String),

    /// The configured base URL does not parse.
    #[error("invalid API base URL '{url}'")]
    InvalidBaseUrl {
        /// Rejected value.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },

    /// `reqwest` could not build its client.
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    /// Connection, timeout or other transport failure.
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("request failed with status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for the error message.
        body: String,
    },

    /// The response body is not the expected JSON.
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),
}

impl ApiError {
    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            _ => false,
        }
    }
}
