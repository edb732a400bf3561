//! Rating statistics and filtered/sorted projections over an item's reviews.

use std::{fmt, str::FromStr, sync::Arc};

use shared::{
    domain::{ItemId, Rating, Review, ReviewId},
    protocol::NewReview,
};
use tracing::{info, warn};

use crate::{CatalogError, CatalogService, LikeSubmissionFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewFilter {
    #[default]
    All,
    ExactRating(Rating),
}

impl ReviewFilter {
    pub fn matches(self, review: &Review) -> bool {
        match self {
            Self::All => true,
            Self::ExactRating(rating) => review.rating == rating,
        }
    }
}

impl FromStr for ReviewFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        let stars: i64 = s
            .parse()
            .map_err(|_| format!("expected 'all' or a star value 1-5, got '{s}'"))?;
        Rating::try_from(stars)
            .map(Self::ExactRating)
            .map_err(|err| err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewSort {
    /// Highest review id first. Ids stand in for creation time.
    #[default]
    Newest,
    Oldest,
    HighestRating,
    LowestRating,
}

impl FromStr for ReviewSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "highest" | "highest-rating" => Ok(Self::HighestRating),
            "lowest" | "lowest-rating" => Ok(Self::LowestRating),
            other => Err(format!(
                "unknown review sort '{other}' (expected newest, oldest, highest, lowest)"
            )),
        }
    }
}

impl fmt::Display for ReviewSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::HighestRating => "highest",
            Self::LowestRating => "lowest",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingBucket {
    pub rating: Rating,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingDistribution {
    // Indexed by `stars - 1`.
    buckets: Vec<RatingBucket>,
    total: usize,
    average: f64,
}

impl RatingDistribution {
    pub fn bucket(&self, rating: Rating) -> &RatingBucket {
        &self.buckets[usize::from(rating.stars() - Rating::MIN)]
    }

    /// Buckets from one star up to five.
    pub fn buckets(&self) -> &[RatingBucket] {
        &self.buckets
    }

    /// Buckets from five stars down to one, the order rating panels show them in.
    pub fn buckets_descending(&self) -> impl Iterator<Item = &RatingBucket> {
        self.buckets.iter().rev()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn average(&self) -> f64 {
        self.average
    }
}

/// Per-star counts and shares of `reviews`. An empty slice yields five zeroed buckets.
pub fn distribution(reviews: &[Review]) -> RatingDistribution {
    let mut counts = [0usize; Rating::MAX as usize];
    let mut stars_sum = 0u64;
    for review in reviews {
        counts[usize::from(review.rating.stars() - Rating::MIN)] += 1;
        stars_sum += u64::from(review.rating.stars());
    }

    let total = reviews.len();
    let share = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / total as f64
        }
    };

    let buckets = Rating::all()
        .zip(counts)
        .map(|(rating, count)| RatingBucket {
            rating,
            count,
            percentage: share(count),
        })
        .collect();

    let average = if total == 0 {
        0.0
    } else {
        stars_sum as f64 / total as f64
    };

    RatingDistribution {
        buckets,
        total,
        average,
    }
}

/// Filters, then stably sorts, a copy of `reviews`.
pub fn apply_view(reviews: &[Review], filter: ReviewFilter, sort: ReviewSort) -> Vec<Review> {
    let mut view: Vec<Review> = reviews
        .iter()
        .filter(|review| filter.matches(review))
        .cloned()
        .collect();

    match sort {
        ReviewSort::Newest => view.sort_by(|a, b| b.id.cmp(&a.id)),
        ReviewSort::Oldest => view.sort_by(|a, b| a.id.cmp(&b.id)),
        ReviewSort::HighestRating => view.sort_by(|a, b| b.rating.cmp(&a.rating)),
        ReviewSort::LowestRating => view.sort_by(|a, b| a.rating.cmp(&b.rating)),
    }
    view
}

/// Review set of one catalog item plus the reader's current filter and sort.
///
/// Derived output ([`ReviewAggregator::view`], [`ReviewAggregator::distribution`])
/// is recomputed from the raw set on every call, so it always agrees with the
/// current inputs.
pub struct ReviewAggregator {
    service: Arc<dyn CatalogService>,
    item_id: ItemId,
    reviews: Vec<Review>,
    filter: ReviewFilter,
    sort: ReviewSort,
}

impl ReviewAggregator {
    pub fn new(service: Arc<dyn CatalogService>, item_id: ItemId, reviews: Vec<Review>) -> Self {
        Self {
            service,
            item_id,
            reviews,
            filter: ReviewFilter::default(),
            sort: ReviewSort::default(),
        }
    }

    pub async fn load(
        service: Arc<dyn CatalogService>,
        item_id: ItemId,
    ) -> Result<Self, CatalogError> {
        let reviews = service.fetch_reviews(item_id).await?;
        Ok(Self::new(service, item_id, reviews))
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    pub fn replace_reviews(&mut self, reviews: Vec<Review>) {
        self.reviews = reviews;
    }

    pub fn filter(&self) -> ReviewFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: ReviewFilter) {
        self.filter = filter;
    }

    pub fn sort(&self) -> ReviewSort {
        self.sort
    }

    pub fn set_sort(&mut self, sort: ReviewSort) {
        self.sort = sort;
    }

    pub fn view(&self) -> Vec<Review> {
        apply_view(&self.reviews, self.filter, self.sort)
    }

    pub fn distribution(&self) -> RatingDistribution {
        distribution(&self.reviews)
    }

    /// Asks the service to count a like. Only a confirmed count is written back.
    pub async fn like(&mut self, review_id: ReviewId) -> Result<u32, LikeSubmissionFailure> {
        let likes = self
            .service
            .like_review(review_id)
            .await
            .map_err(|source| {
                warn!("reviews: like failed review={review_id} err={source}");
                LikeSubmissionFailure { review_id, source }
            })?;

        match self.reviews.iter_mut().find(|review| review.id == review_id) {
            Some(review) => review.likes = likes,
            None => warn!(
                "reviews: liked review not in local set review={review_id} item={}",
                self.item_id
            ),
        }
        Ok(likes)
    }

    /// Posts a new review and, once the service accepts it, adds it to the raw set.
    pub async fn submit(&mut self, review: NewReview) -> Result<Review, CatalogError> {
        if review.text.trim().is_empty() {
            return Err(CatalogError::Validation("review text is required".to_string()));
        }
        let created = self.service.submit_review(self.item_id, review).await?;
        info!(
            "reviews: submitted review={} item={} rating={}",
            created.id, self.item_id, created.rating
        );
        self.reviews.push(created.clone());
        Ok(created)
    }
}

#[cfg(test)]
#[path = "tests/reviews_tests.rs"]
mod tests;
