use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{CatalogItem, Category, ItemId, Review, ReviewId},
    error::ErrorCode,
    protocol::{ApiEnvelope, ErrorBody, LikeResponse, NewReview, RatingSummary},
};
use tracing::debug;
use url::Url;

pub mod carousel;
pub mod error;
pub mod feeds;
pub mod fetch;
pub mod listing;
pub mod reviews;
pub mod testing;

pub use carousel::{CarouselController, CarouselEvent, ManualTicker, TickerHost, TokioTicker};
pub use error::{CatalogError, LikeSubmissionFailure};
pub use fetch::{FetchBatch, FetchBatchResult, FetchFailure};
pub use reviews::{RatingDistribution, ReviewAggregator, ReviewFilter, ReviewSort};

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// The remote catalog and reviews service, as seen by the engine.
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn fetch_item(&self, id: ItemId) -> CatalogResult<CatalogItem>;
    async fn fetch_items(&self) -> CatalogResult<Vec<CatalogItem>>;
    async fn fetch_featured(&self, limit: usize) -> CatalogResult<Vec<CatalogItem>>;
    async fn fetch_by_category(&self, category: &str) -> CatalogResult<Vec<CatalogItem>>;
    async fn search(&self, text: &str) -> CatalogResult<Vec<CatalogItem>>;
    async fn fetch_categories(&self) -> CatalogResult<Vec<Category>>;
    async fn fetch_reviews(&self, item_id: ItemId) -> CatalogResult<Vec<Review>>;
    async fn fetch_rating_summary(&self, item_id: ItemId) -> CatalogResult<RatingSummary>;
    async fn submit_review(&self, item_id: ItemId, review: NewReview) -> CatalogResult<Review>;
    async fn like_review(&self, review_id: ReviewId) -> CatalogResult<u32>;
}

/// [`CatalogService`] over the catalog REST API.
#[derive(Clone)]
pub struct HttpCatalogClient {
    http: Client,
    base_url: Url,
}

impl HttpCatalogClient {
    pub fn new(base_url: &str, timeout: Duration) -> CatalogResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Self::with_client(http, base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> CatalogResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> CatalogResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> CatalogResult<T> {
        debug!("catalog: GET {url}");
        let res = self.http.get(url).send().await?;
        decode(res).await
    }

    async fn post<B, T>(&self, url: Url, body: Option<&B>) -> CatalogResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        debug!("catalog: POST {url}");
        let mut req = self.http.post(url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let res = req.send().await?;
        decode(res).await
    }
}

async fn decode<T: DeserializeOwned>(res: Response) -> CatalogResult<T> {
    let status = res.status();
    if !status.is_success() {
        let detail = res
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(ErrorBody::message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown status").to_string());
        return Err(CatalogError::Status {
            status: status.as_u16(),
            code: ErrorCode::from_status(status.as_u16()),
            detail,
        });
    }

    let body = res.bytes().await?;
    decode_body(&body)
}

// Review endpoints wrap their payload in an `ApiEnvelope`, catalog endpoints
// send it bare. Branch on the `success` key instead of guessing by shape.
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> CatalogResult<T> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    if value.get("success").is_some() {
        let envelope: ApiEnvelope<T> = serde_json::from_value(value)?;
        Ok(envelope.into_result()?)
    } else {
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl CatalogService for HttpCatalogClient {
    async fn fetch_item(&self, id: ItemId) -> CatalogResult<CatalogItem> {
        self.get(self.endpoint(&format!("api/apps/{id}"))?).await
    }

    async fn fetch_items(&self) -> CatalogResult<Vec<CatalogItem>> {
        self.get(self.endpoint("api/apps")?).await
    }

    async fn fetch_featured(&self, limit: usize) -> CatalogResult<Vec<CatalogItem>> {
        let mut items: Vec<CatalogItem> = self.get(self.endpoint("api/featured")?).await?;
        items.truncate(limit);
        Ok(items)
    }

    async fn fetch_by_category(&self, category: &str) -> CatalogResult<Vec<CatalogItem>> {
        let mut url = self.endpoint("api/apps")?;
        url.query_pairs_mut().append_pair("category", category);
        self.get(url).await
    }

    async fn search(&self, text: &str) -> CatalogResult<Vec<CatalogItem>> {
        let mut url = self.endpoint("api/search")?;
        url.query_pairs_mut().append_pair("q", text);
        self.get(url).await
    }

    async fn fetch_categories(&self) -> CatalogResult<Vec<Category>> {
        self.get(self.endpoint("api/categories")?).await
    }

    async fn fetch_reviews(&self, item_id: ItemId) -> CatalogResult<Vec<Review>> {
        self.get(self.endpoint(&format!("api/apps/{item_id}/reviews"))?).await
    }

    async fn fetch_rating_summary(&self, item_id: ItemId) -> CatalogResult<RatingSummary> {
        self.get(self.endpoint(&format!("api/apps/{item_id}/rating"))?).await
    }

    async fn submit_review(&self, item_id: ItemId, review: NewReview) -> CatalogResult<Review> {
        let url = self.endpoint(&format!("api/apps/{item_id}/reviews"))?;
        self.post(url, Some(&review)).await
    }

    async fn like_review(&self, review_id: ReviewId) -> CatalogResult<u32> {
        let url = self.endpoint(&format!("api/reviews/{review_id}/like"))?;
        let res: LikeResponse = self.post::<(), _>(url, None).await?;
        Ok(res.likes)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
