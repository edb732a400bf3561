use std::{io::Write, sync::Arc, time::Duration};

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use client_core::{
    feeds,
    listing::ItemSort,
    CarouselController, CatalogService, ReviewAggregator, ReviewFilter, ReviewSort, TickerHost,
};
use shared::{
    domain::{CatalogItem, ItemId, Rating, ReviewId},
    protocol::NewReview,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::render;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Featured items, the week's top rated and the category list.
    Home,
    /// One item with its rating breakdown and reviews.
    App {
        id: i64,
        /// `all` or a star value from 1 to 5.
        #[arg(long, default_value = "all")]
        stars: ReviewFilter,
        #[arg(long, default_value_t = ReviewSort::Newest)]
        sort: ReviewSort,
    },
    Category {
        name: String,
        #[arg(long, default_value_t = ItemSort::Rating)]
        sort: ItemSort,
    },
    Search {
        query: String,
    },
    /// Likes a review of the given item.
    Like {
        app_id: i64,
        review_id: i64,
    },
    Review {
        app_id: i64,
        #[arg(long)]
        rating: u8,
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "Anonymous")]
        author: String,
    },
    /// Rotates the featured items until `ticks` automatic advances were shown.
    Carousel {
        #[arg(long, default_value_t = 3)]
        ticks: usize,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::App { .. } => "app",
            Self::Category { .. } => "category",
            Self::Search { .. } => "search",
            Self::Like { .. } => "like",
            Self::Review { .. } => "review",
            Self::Carousel { .. } => "carousel",
        }
    }
}

pub struct CommandContext {
    pub service: Arc<dyn CatalogService>,
    pub ticker: Arc<dyn TickerHost>,
    pub featured_limit: usize,
    pub carousel_interval: Duration,
}

pub async fn dispatch(command: Command, ctx: &CommandContext, out: &mut impl Write) -> Result<()> {
    let cmd_name = command.name();
    debug!(command = cmd_name, "storefront: dispatching command");

    match command {
        Command::Home => {
            let feed = feeds::load_home(Arc::clone(&ctx.service), ctx.featured_limit).await;
            render::home(out, &feed)?;
        }
        Command::App { id, stars, sort } => {
            let id = ItemId(id);
            let mut feed = feeds::load_item_details(Arc::clone(&ctx.service), id).await;
            let loaded = std::mem::take(&mut feed.reviews);
            let mut reviews = ReviewAggregator::new(Arc::clone(&ctx.service), id, loaded);
            reviews.set_filter(stars);
            reviews.set_sort(sort);
            render::item_details(out, &feed, &reviews.distribution(), &reviews.view())?;
        }
        Command::Category { name, sort } => {
            let feed = feeds::load_category(Arc::clone(&ctx.service), &name, sort).await;
            render::category(out, &feed)?;
        }
        Command::Search { query } => {
            let feed = feeds::load_search(Arc::clone(&ctx.service), &query).await;
            render::search(out, &feed)?;
        }
        Command::Like { app_id, review_id } => {
            let mut reviews =
                ReviewAggregator::new(Arc::clone(&ctx.service), ItemId(app_id), Vec::new());
            let likes = reviews.like(ReviewId(review_id)).await?;
            writeln!(out, "review {review_id} now has {likes} likes")?;
        }
        Command::Review {
            app_id,
            rating,
            text,
            author,
        } => {
            let mut reviews =
                ReviewAggregator::new(Arc::clone(&ctx.service), ItemId(app_id), Vec::new());
            let created = reviews
                .submit(NewReview {
                    author,
                    rating: Rating::new(rating)?,
                    text,
                })
                .await
                .with_context(|| format!("submitting review for app {app_id}"))?;
            writeln!(out, "posted {}", render::review_line(&created))?;
        }
        Command::Carousel { ticks } => {
            let featured = ctx
                .service
                .fetch_featured(ctx.featured_limit)
                .await
                .context("loading featured items")?;
            run_carousel(featured, ticks, ctx, out).await?;
        }
    }
    Ok(())
}

async fn run_carousel(
    items: Vec<CatalogItem>,
    ticks: usize,
    ctx: &CommandContext,
    out: &mut impl Write,
) -> Result<()> {
    if items.is_empty() {
        writeln!(out, "no featured items to rotate")?;
        return Ok(());
    }

    let mut carousel = CarouselController::new(Arc::clone(&ctx.ticker));
    carousel.set_items(items);
    let mut events = carousel.subscribe();
    carousel.start_auto_advance(ctx.carousel_interval)?;
    info!(
        "storefront: carousel started len={} interval_ms={}",
        carousel.len(),
        ctx.carousel_interval.as_millis()
    );

    let mut shown = 0;
    while shown < ticks {
        match events.recv().await {
            Ok(event) => {
                render::carousel_frame(out, event, carousel.len(), &carousel.window(1))?;
                shown += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("storefront: carousel frames skipped count={skipped}");
            }
            Err(RecvError::Closed) => bail!("carousel event stream closed"),
        }
    }

    carousel.stop_auto_advance();
    Ok(())
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
