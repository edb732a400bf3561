//! In-memory [`CatalogService`] for exercising the engine without a network.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{CatalogItem, Category, ItemId, Review, ReviewId},
    error::{ApiError, ErrorCode},
    protocol::{NewReview, RatingSummary},
};

use crate::{listing, reviews, CatalogError, CatalogResult, CatalogService};

/// Fixed catalog with per-operation failure and latency injection.
///
/// Operations are named after the [`CatalogService`] methods (`"fetch_items"`,
/// `"like_review"`, ...).
#[derive(Default)]
pub struct StaticCatalog {
    items: Vec<CatalogItem>,
    reviews: Mutex<HashMap<ItemId, Vec<Review>>>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: Mutex<HashMap<String, usize>>,
}

impl StaticCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn with_reviews(self, item_id: ItemId, reviews: Vec<Review>) -> Self {
        lock(&self.reviews).insert(item_id, reviews);
        self
    }

    pub fn failing(mut self, operation: &str) -> Self {
        self.failing.insert(operation.to_string());
        self
    }

    pub fn delayed(mut self, operation: &str, delay: Duration) -> Self {
        self.delays.insert(operation.to_string(), delay);
        self
    }

    pub fn calls(&self, operation: &str) -> usize {
        lock(&self.calls).get(operation).copied().unwrap_or_default()
    }

    pub fn stored_reviews(&self, item_id: ItemId) -> Vec<Review> {
        lock(&self.reviews).get(&item_id).cloned().unwrap_or_default()
    }

    async fn enter(&self, operation: &str) -> CatalogResult<()> {
        *lock(&self.calls).entry(operation.to_string()).or_default() += 1;
        if let Some(delay) = self.delays.get(operation) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(operation) {
            return Err(CatalogError::Status {
                status: 503,
                code: ErrorCode::Internal,
                detail: format!("{operation} unavailable"),
            });
        }
        Ok(())
    }
}

fn not_found(what: impl Into<String>) -> CatalogError {
    CatalogError::Api(ApiError::new(ErrorCode::NotFound, what))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl CatalogService for StaticCatalog {
    async fn fetch_item(&self, id: ItemId) -> CatalogResult<CatalogItem> {
        self.enter("fetch_item").await?;
        self.items
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .ok_or_else(|| not_found(format!("app {id} not found")))
    }

    async fn fetch_items(&self) -> CatalogResult<Vec<CatalogItem>> {
        self.enter("fetch_items").await?;
        Ok(self.items.clone())
    }

    async fn fetch_featured(&self, limit: usize) -> CatalogResult<Vec<CatalogItem>> {
        self.enter("fetch_featured").await?;
        Ok(listing::top_rated(&self.items, limit))
    }

    async fn fetch_by_category(&self, category: &str) -> CatalogResult<Vec<CatalogItem>> {
        self.enter("fetch_by_category").await?;
        Ok(self
            .items
            .iter()
            .filter(|item| item.category == category)
            .cloned()
            .collect())
    }

    async fn search(&self, text: &str) -> CatalogResult<Vec<CatalogItem>> {
        self.enter("search").await?;
        Ok(listing::search_items(&self.items, text))
    }

    async fn fetch_categories(&self) -> CatalogResult<Vec<Category>> {
        self.enter("fetch_categories").await?;
        let mut names: Vec<String> = Vec::new();
        for item in &self.items {
            if !names.contains(&item.category) {
                names.push(item.category.clone());
            }
        }
        Ok(names.into_iter().map(|name| Category { name }).collect())
    }

    async fn fetch_reviews(&self, item_id: ItemId) -> CatalogResult<Vec<Review>> {
        self.enter("fetch_reviews").await?;
        Ok(self.stored_reviews(item_id))
    }

    async fn fetch_rating_summary(&self, item_id: ItemId) -> CatalogResult<RatingSummary> {
        self.enter("fetch_rating_summary").await?;
        let stats = reviews::distribution(&self.stored_reviews(item_id));
        Ok(RatingSummary {
            average_rating: stats.average(),
            reviews_count: stats.total() as u64,
            rating_distribution: stats
                .buckets()
                .iter()
                .map(|bucket| (bucket.rating.stars(), bucket.count as u64))
                .collect(),
        })
    }

    async fn submit_review(&self, item_id: ItemId, review: NewReview) -> CatalogResult<Review> {
        self.enter("submit_review").await?;
        let mut all = lock(&self.reviews);
        let next_id = all
            .values()
            .flatten()
            .map(|existing| existing.id.0)
            .max()
            .unwrap_or_default()
            + 1;
        let created = Review::new(next_id, review.author, review.rating, review.text);
        all.entry(item_id).or_default().push(created.clone());
        Ok(created)
    }

    async fn like_review(&self, review_id: ReviewId) -> CatalogResult<u32> {
        self.enter("like_review").await?;
        let mut all = lock(&self.reviews);
        let review = all
            .values_mut()
            .flatten()
            .find(|review| review.id == review_id)
            .ok_or_else(|| not_found(format!("review {review_id} not found")))?;
        review.likes += 1;
        Ok(review.likes)
    }
}
