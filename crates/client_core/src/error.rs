use shared::{
    domain::ReviewId,
    error::{ApiError, ErrorCode},
};
use thiserror::Error;

/// Failure of a single call against the catalog service.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("catalog service returned {status}: {detail}")]
    Status {
        status: u16,
        code: ErrorCode,
        detail: String,
    },
    #[error("catalog service error: {0}")]
    Api(#[from] ApiError),
    #[error("catalog response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid catalog url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid request: {0}")]
    Validation(String),
}

impl CatalogError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Status { code, .. } => *code,
            Self::Api(err) => err.code,
            Self::Validation(_) => ErrorCode::Validation,
            Self::Transport(_) | Self::Decode(_) | Self::Url(_) => ErrorCode::Unknown,
        }
    }
}

/// A like request the service did not confirm. The locally held count is left as it was.
#[derive(Debug, Error)]
#[error("failed to like review {review_id}: {source}")]
pub struct LikeSubmissionFailure {
    pub review_id: ReviewId,
    #[source]
    pub source: CatalogError,
}
