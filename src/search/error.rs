use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(String),
    #[error("search endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed search response: {0}")]
    Decode(String),
    #[error("invalid search endpoint url: {0}")]
    InvalidUrl(String),
    #[error("search cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for SearchError {
    fn from(e: serde_json::Error) -> Self {
        SearchError::Decode(e.to_string())
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        SearchError::Request(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    Server,
    Network,
    Timeout,
    Client,
    Unknown,
}

impl FailureKind {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureKind::RateLimited
                | FailureKind::Server
                | FailureKind::Network
                | FailureKind::Timeout
        )
    }
}

pub fn classify_status(status: StatusCode) -> FailureKind {
    if status == StatusCode::TOO_MANY_REQUESTS {
        FailureKind::RateLimited
    } else if status.is_server_error() {
        FailureKind::Server
    } else if status.is_client_error() {
        FailureKind::Client
    } else {
        FailureKind::Unknown
    }
}

pub fn classify_transport(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() || err.is_body() || err.is_request() {
        FailureKind::Network
    } else {
        FailureKind::Unknown
    }
}
