//! The fetch batches behind each catalog screen.
//!
//! Every loader returns a fully settled feed: failed slots fall back to empty
//! defaults and are listed in `failures`, leaving the caller to decide whether
//! a missing slot is fatal.

use std::sync::Arc;

use shared::{
    domain::{CatalogItem, Category, ItemId, Review},
    protocol::RatingSummary,
};
use tracing::info;

use crate::{
    fetch::{FetchBatch, FetchBatchResult, FetchFailure},
    listing::{self, ItemSort},
    CatalogService,
};

pub const TOP_WEEK_LIMIT: usize = 5;

/// Payload of one slot in a catalog batch.
#[derive(Debug, Clone)]
pub enum CatalogPayload {
    Item(CatalogItem),
    Items(Vec<CatalogItem>),
    Categories(Vec<Category>),
    Reviews(Vec<Review>),
    Rating(RatingSummary),
}

impl CatalogPayload {
    pub fn into_item(self) -> Option<CatalogItem> {
        match self {
            Self::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn into_items(self) -> Option<Vec<CatalogItem>> {
        match self {
            Self::Items(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_categories(self) -> Option<Vec<Category>> {
        match self {
            Self::Categories(categories) => Some(categories),
            _ => None,
        }
    }

    pub fn into_reviews(self) -> Option<Vec<Review>> {
        match self {
            Self::Reviews(reviews) => Some(reviews),
            _ => None,
        }
    }

    pub fn into_rating(self) -> Option<RatingSummary> {
        match self {
            Self::Rating(summary) => Some(summary),
            _ => None,
        }
    }
}

fn collect_failures(result: &FetchBatchResult<CatalogPayload>) -> Vec<FetchFailure> {
    result.failures().cloned().collect()
}

#[derive(Debug, Clone, Default)]
pub struct HomeFeed {
    pub featured: Vec<CatalogItem>,
    pub top_week: Vec<CatalogItem>,
    pub categories: Vec<Category>,
    pub failures: Vec<FetchFailure>,
}

pub async fn load_home(service: Arc<dyn CatalogService>, featured_limit: usize) -> HomeFeed {
    let mut result = FetchBatch::new()
        .with("featured", || {
            let service = Arc::clone(&service);
            async move {
                service
                    .fetch_featured(featured_limit)
                    .await
                    .map(CatalogPayload::Items)
            }
        })
        .with("top_week", || {
            let service = Arc::clone(&service);
            async move {
                service
                    .fetch_items()
                    .await
                    .map(|items| CatalogPayload::Items(listing::top_rated(&items, TOP_WEEK_LIMIT)))
            }
        })
        .with("categories", || {
            let service = Arc::clone(&service);
            async move {
                service
                    .fetch_categories()
                    .await
                    .map(CatalogPayload::Categories)
            }
        })
        .run()
        .await;

    let feed = HomeFeed {
        failures: collect_failures(&result),
        featured: result
            .take_with("featured", CatalogPayload::into_items)
            .unwrap_or_default(),
        top_week: result
            .take_with("top_week", CatalogPayload::into_items)
            .unwrap_or_default(),
        categories: result
            .take_with("categories", CatalogPayload::into_categories)
            .unwrap_or_default(),
    };
    info!(
        "feeds: home loaded featured={} top_week={} categories={} failed={}",
        feed.featured.len(),
        feed.top_week.len(),
        feed.categories.len(),
        feed.failures.len()
    );
    feed
}

#[derive(Debug, Clone, Default)]
pub struct ItemDetailsFeed {
    pub item: Option<CatalogItem>,
    pub reviews: Vec<Review>,
    pub rating: RatingSummary,
    pub failures: Vec<FetchFailure>,
}

pub async fn load_item_details(service: Arc<dyn CatalogService>, id: ItemId) -> ItemDetailsFeed {
    let mut result = FetchBatch::new()
        .with("item", || {
            let service = Arc::clone(&service);
            async move { service.fetch_item(id).await.map(CatalogPayload::Item) }
        })
        .with("reviews", || {
            let service = Arc::clone(&service);
            async move { service.fetch_reviews(id).await.map(CatalogPayload::Reviews) }
        })
        .with("rating", || {
            let service = Arc::clone(&service);
            async move {
                service
                    .fetch_rating_summary(id)
                    .await
                    .map(CatalogPayload::Rating)
            }
        })
        .run()
        .await;

    let feed = ItemDetailsFeed {
        failures: collect_failures(&result),
        item: result.take_with("item", CatalogPayload::into_item),
        reviews: result
            .take_with("reviews", CatalogPayload::into_reviews)
            .unwrap_or_default(),
        rating: result
            .take_with("rating", CatalogPayload::into_rating)
            .unwrap_or_default(),
    };
    info!(
        "feeds: item details loaded item={id} found={} reviews={} failed={}",
        feed.item.is_some(),
        feed.reviews.len(),
        feed.failures.len()
    );
    feed
}

#[derive(Debug, Clone, Default)]
pub struct CategoryFeed {
    pub category: String,
    pub items: Vec<CatalogItem>,
    pub failures: Vec<FetchFailure>,
}

pub async fn load_category(
    service: Arc<dyn CatalogService>,
    category: &str,
    sort: ItemSort,
) -> CategoryFeed {
    let mut result = FetchBatch::new()
        .with("items", || {
            let service = Arc::clone(&service);
            let category = category.to_string();
            async move {
                service
                    .fetch_by_category(&category)
                    .await
                    .map(CatalogPayload::Items)
            }
        })
        .run()
        .await;

    let failures = collect_failures(&result);
    let items = result
        .take_with("items", CatalogPayload::into_items)
        .unwrap_or_default();
    info!(
        "feeds: category loaded category={category} items={} sort={sort}",
        items.len()
    );
    CategoryFeed {
        category: category.to_string(),
        items: listing::sort_items(&items, sort),
        failures,
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchFeed {
    pub query: String,
    pub results: Vec<CatalogItem>,
    pub failures: Vec<FetchFailure>,
}

pub async fn load_search(service: Arc<dyn CatalogService>, query: &str) -> SearchFeed {
    let query = query.trim().to_string();
    if query.is_empty() {
        return SearchFeed::default();
    }

    let mut result = FetchBatch::new()
        .with("results", || {
            let service = Arc::clone(&service);
            let query = query.clone();
            async move { service.search(&query).await.map(CatalogPayload::Items) }
        })
        .run()
        .await;

    SearchFeed {
        failures: collect_failures(&result),
        results: result
            .take_with("results", CatalogPayload::into_items)
            .unwrap_or_default(),
        query,
    }
}

#[cfg(test)]
#[path = "tests/feeds_tests.rs"]
mod tests;
