use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid crawl configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Per-page failure. Recorded on the page's node, never propagated out of a crawl.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Request(String),

    #[error("unreadable response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else if err.is_body() || err.is_decode() {
            FetchError::Body(err.to_string())
        } else {
            FetchError::Request(err.to_string())
        }
    }
}
