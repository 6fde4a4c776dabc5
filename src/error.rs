use thiserror::Error;

/// Failure taxonomy for the fetch path. Auth, NotFound and Schema are
/// user-correctable and fatal for the current configuration; Transient
/// failures may be retried by the caller.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient fetch failure: {0}")]
    Transient(String),

    #[error("sheet schema mismatch; missing columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Transient(format!("request timed out: {err}"))
        } else if err.is_connect() {
            FetchError::Transient(format!("connection failed: {err}"))
        } else {
            FetchError::Transient(err.to_string())
        }
    }
}

impl From<jsonwebtoken::errors::Error> for FetchError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        FetchError::Auth(format!("failed to sign service-account assertion: {err}"))
    }
}
