//! Custom error types for the manual sync.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Invalid path segment: {0}")]
    InvalidPath(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl SyncError {
    /// Whether retrying the same call may succeed.
    ///
    /// Timeouts, connection failures, HTTP 429 and HTTP 5xx are transient.
    /// Everything else (4xx, bad data, bad config) fails the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Http(e) => e.is_timeout() || e.is_connect(),
            SyncError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// Build a `Status` error from a non-success response, consuming its body.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        SyncError::Status { status, url, body }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> SyncError {
        SyncError::Status {
            status: code,
            url: "https://host/x".to_string(),
            body: String::new(),
        }
    }

    #[test]
    fn test_server_errors_are_transient() {
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
    }

    #[test]
    fn test_client_errors_are_permanent() {
        assert!(!status(400).is_transient());
        assert!(!status(403).is_transient());
        assert!(!status(404).is_transient());
        assert!(!SyncError::InvalidPath("..".into()).is_transient());
        assert!(!SyncError::Config("missing".into()).is_transient());
    }

    #[test]
    fn test_status_display() {
        let err = SyncError::Status {
            status: 502,
            url: "https://host/manual.pdf".to_string(),
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 502 from https://host/manual.pdf: bad gateway");
    }
}
