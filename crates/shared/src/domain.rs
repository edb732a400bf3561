use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(ItemId);
id_newtype!(ReviewId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rating must be between 1 and 5, got {0}")]
pub struct InvalidRating(pub i64);

/// Star rating attached to a single review. Always within `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(stars: u8) -> Result<Self, InvalidRating> {
        Self::try_from(i64::from(stars))
    }

    pub fn stars(self) -> u8 {
        self.0
    }

    /// Every valid rating, lowest first.
    pub fn all() -> impl DoubleEndedIterator<Item = Rating> {
        (Self::MIN..=Self::MAX).map(Rating)
    }
}

impl TryFrom<i64> for Rating {
    type Error = InvalidRating;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(InvalidRating(value))
        }
    }
}

impl From<Rating> for u8 {
    fn from(value: Rating) -> Self {
        value.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    pub category: String,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<String>,
}

impl CatalogItem {
    pub fn new(id: i64, name: impl Into<String>, category: impl Into<String>, rating: f64) -> Self {
        Self {
            id: ItemId(id),
            name: name.into(),
            category: category.into(),
            rating,
            developer: None,
            description: None,
            icon_url: None,
            downloads: None,
            size: None,
            version: None,
            price: None,
            screenshots: Vec::new(),
        }
    }

    pub fn with_downloads(mut self, downloads: impl Into<String>) -> Self {
        self.downloads = Some(downloads.into());
        self
    }
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub name: String,
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Plain(String),
            Named { name: String },
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Plain(name) | Raw::Named { name } => Category { name },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    #[serde(default = "anonymous_author", deserialize_with = "author_or_anonymous")]
    pub author: String,
    pub rating: Rating,
    #[serde(alias = "text")]
    pub comment: String,
    #[serde(default)]
    pub likes: u32,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl Review {
    pub fn new(
        id: i64,
        author: impl Into<String>,
        rating: Rating,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            id: ReviewId(id),
            author: author.into(),
            rating,
            comment: comment.into(),
            likes: 0,
            created_at: None,
        }
    }
}

// Review services emit either RFC 3339 or HTTP-date (RFC 2822) timestamps.
// Anything else is dropped rather than failing the whole review.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let parsed = DateTime::parse_from_rfc3339(&raw).or_else(|_| DateTime::parse_from_rfc2822(&raw));
    Ok(parsed.ok().map(|ts| ts.with_timezone(&Utc)))
}

fn anonymous_author() -> String {
    "Anonymous".to_string()
}

// Reviews posted without an account come back with `"author": null`.
fn author_or_anonymous<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|author| !author.trim().is_empty())
        .unwrap_or_else(anonymous_author))
}
