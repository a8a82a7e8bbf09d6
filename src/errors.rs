use thiserror::Error;

use crate::wire::QuotaCategory;

#[derive(Error, Debug)]
pub enum GenError {
    #[error("monthly {category} limit of {limit} reached; upgrade the plan to keep generating")]
    QuotaExceeded { category: QuotaCategory, limit: i64 },
    #[error("provider unavailable: {0}")] ProviderUnavailable(String),
    #[error("provider rate limited: {0}")] RateLimited(String),
    #[error("provider rejected credentials: {0}")] AuthFailure(String),
    #[error("provider returned no text")] EmptyResponse,
    #[error("no JSON object found in provider output")] NoJsonFound,
    #[error("malformed response: {0}")] MalformedResponse(String),
    #[error("response shape mismatch at `{field}`")]
    ShapeMismatch { field: String },
    #[error("invalid request: {0}")] InvalidRequest(String),
    #[error("not found: {0}")] NotFound(String),
    #[error("store error: {0}")] Store(String),
    #[error("config error: {0}")] Config(String),
}

impl GenError {
    pub fn shape(field: impl Into<String>) -> Self {
        GenError::ShapeMismatch { field: field.into() }
    }

    /// Errors the end user can act on (upgrade, change input).
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, GenError::QuotaExceeded { .. } | GenError::InvalidRequest(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, GenError::ProviderUnavailable(_) | GenError::RateLimited(_))
    }
}

impl From<rusqlite::Error> for GenError {
    fn from(e: rusqlite::Error) -> Self {
        GenError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for GenError {
    fn from(e: serde_json::Error) -> Self {
        GenError::Store(format!("serialization: {e}"))
    }
}

impl From<reqwest::Error> for GenError {
    fn from(e: reqwest::Error) -> Self {
        // request URLs may carry credentials
        let timed_out = e.is_timeout();
        let e = e.without_url();
        if timed_out {
            GenError::ProviderUnavailable(format!("timed out: {e}"))
        } else {
            GenError::ProviderUnavailable(e.to_string())
        }
    }
}

pub type GenResult<T> = Result<T, GenError>;
