use std::collections::BTreeMap;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

use crate::{
    domain::Rating,
    error::{ApiError, ErrorCode},
};

/// `{success, data, error}` wrapper used by the review endpoints.
///
/// Catalog endpoints answer with bare bodies instead; a body is enveloped
/// exactly when it is an object carrying a `success` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(ApiError::new(
                ErrorCode::Internal,
                "response envelope reported success without data",
            )),
            (false, _) => Err(ApiError::new(
                ErrorCode::Unknown,
                self.error.unwrap_or_else(|| "unspecified service error".to_string()),
            )),
        }
    }
}

/// Body of a non-2xx response. Catalog endpoints send `detail`, review
/// endpoints send `error`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn message(self) -> Option<String> {
        self.detail.or(self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    pub author: String,
    pub rating: Rating,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeResponse {
    pub likes: u32,
}

/// Server-side aggregate from `GET /api/apps/{id}/rating`.
///
/// Older review services only send `average_rating` and `total_reviews`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default, alias = "total_reviews")]
    pub reviews_count: u64,
    #[serde(default, deserialize_with = "star_keyed_counts")]
    pub rating_distribution: BTreeMap<u8, u64>,
}

// JSON object keys are strings ("5": 3); parse them into star values.
fn star_keyed_counts<'de, D>(deserializer: D) -> Result<BTreeMap<u8, u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, u64>>::deserialize(deserializer)?.unwrap_or_default();
    raw.into_iter()
        .map(|(stars, count)| {
            stars
                .trim()
                .parse::<u8>()
                .map(|stars| (stars, count))
                .map_err(|_| D::Error::custom(format!("invalid star key '{stars}'")))
        })
        .collect()
}
