use std::time::Duration;

/// Failure of a call through [`crate::api_client::ApiClient`] or any other document source.
///
/// Carries plain data so one outcome can be handed to every caller joining the same sync cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Refused before any network I/O
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },
    #[error("unexpected response body: {0}")]
    Body(String),
    /// The cycle this caller joined was dropped before it finished
    #[error("sync cycle was abandoned before completing")]
    Aborted,
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Why a persisted blob could not be turned back into state.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("storage read failed: {0}")]
    Storage(String),
    #[error("blob is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("blob is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("blob rejected by schema: {0}")]
    Schema(String),
}
