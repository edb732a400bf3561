use std::io::{self, Write};

use client_core::{
    carousel::CarouselEvent,
    feeds::{CategoryFeed, HomeFeed, ItemDetailsFeed, SearchFeed},
    FetchFailure, RatingDistribution,
};
use shared::domain::{CatalogItem, Review};

const BAR_WIDTH: usize = 20;

pub fn item_line(item: &CatalogItem) -> String {
    let mut line = format!(
        "#{:<4} {:<28} {:<16} {:.1}",
        item.id, item.name, item.category, item.rating
    );
    if let Some(downloads) = &item.downloads {
        line.push_str(&format!("  {downloads}"));
    }
    line
}

fn items(out: &mut impl Write, title: &str, items: &[CatalogItem]) -> io::Result<()> {
    writeln!(out, "== {title} ==")?;
    if items.is_empty() {
        writeln!(out, "  (nothing here)")?;
    }
    for item in items {
        writeln!(out, "  {}", item_line(item))?;
    }
    Ok(())
}

fn failures(out: &mut impl Write, failures: &[FetchFailure]) -> io::Result<()> {
    for failure in failures {
        writeln!(out, "! {} unavailable: {}", failure.name, failure.reason)?;
    }
    Ok(())
}

pub fn home(out: &mut impl Write, feed: &HomeFeed) -> io::Result<()> {
    items(out, "Featured", &feed.featured)?;
    items(out, "Top of the week", &feed.top_week)?;
    writeln!(out, "== Categories ==")?;
    let names: Vec<&str> = feed.categories.iter().map(|c| c.name.as_str()).collect();
    writeln!(out, "  {}", names.join(", "))?;
    failures(out, &feed.failures)
}

pub fn distribution(out: &mut impl Write, stats: &RatingDistribution) -> io::Result<()> {
    writeln!(out, "Rating {:.1} from {} reviews", stats.average(), stats.total())?;
    for bucket in stats.buckets_descending() {
        let filled = (bucket.percentage / 100.0 * BAR_WIDTH as f64).round() as usize;
        writeln!(
            out,
            "  {} [{}{}] {:>3} ({:.0}%)",
            bucket.rating,
            "#".repeat(filled),
            " ".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)),
            bucket.count,
            bucket.percentage
        )?;
    }
    Ok(())
}

pub fn review_line(review: &Review) -> String {
    format!(
        "[{}] {} {}/5 ({} likes): {}",
        review.id, review.author, review.rating, review.likes, review.comment
    )
}

pub fn item_details(
    out: &mut impl Write,
    feed: &ItemDetailsFeed,
    stats: &RatingDistribution,
    view: &[Review],
) -> io::Result<()> {
    match &feed.item {
        Some(item) => {
            writeln!(out, "{}", item_line(item))?;
            if let Some(developer) = &item.developer {
                writeln!(out, "  by {developer}")?;
            }
            if let Some(description) = &item.description {
                writeln!(out, "  {description}")?;
            }
        }
        None => writeln!(out, "(item unavailable)")?,
    }
    if !feed.failures.iter().any(|failure| failure.name == "rating") {
        writeln!(
            out,
            "Service rating {:.1} from {} reviews",
            feed.rating.average_rating, feed.rating.reviews_count
        )?;
    }
    distribution(out, stats)?;
    writeln!(out, "== Reviews ({} shown) ==", view.len())?;
    for review in view {
        writeln!(out, "  {}", review_line(review))?;
    }
    failures(out, &feed.failures)
}

pub fn category(out: &mut impl Write, feed: &CategoryFeed) -> io::Result<()> {
    items(out, &feed.category, &feed.items)?;
    failures(out, &feed.failures)
}

pub fn search(out: &mut impl Write, feed: &SearchFeed) -> io::Result<()> {
    items(out, &format!("Results for \"{}\"", feed.query), &feed.results)?;
    failures(out, &feed.failures)
}

pub fn carousel_frame(
    out: &mut impl Write,
    event: CarouselEvent,
    len: usize,
    window: &[(isize, CatalogItem)],
) -> io::Result<()> {
    let names: Vec<String> = window
        .iter()
        .map(|(offset, item)| {
            if *offset == 0 {
                format!("[{}]", item.name)
            } else {
                item.name.clone()
            }
        })
        .collect();
    writeln!(
        out,
        "{}/{} {:?}: {}",
        event.index + 1,
        len,
        event.cause,
        names.join("  ")
    )
}

#[cfg(test)]
mod tests {
    use client_core::{carousel::AdvanceCause, reviews};
    use shared::{domain::Rating, protocol::RatingSummary};

    use super::*;

    fn rendered(write: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        write(&mut buf).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    fn rating(stars: u8) -> Rating {
        Rating::new(stars).expect("rating")
    }

    #[test]
    fn distribution_lists_five_stars_first() {
        let reviews = vec![
            Review::new(1, "a", rating(5), "x"),
            Review::new(2, "b", rating(3), "y"),
            Review::new(3, "c", rating(5), "z"),
        ];
        let text = rendered(|out| distribution(out, &reviews::distribution(&reviews)));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("Rating 4.3 from 3 reviews"));
        assert!(lines[1].trim_start().starts_with('5'));
        assert!(lines[1].ends_with("2 (67%)"));
        assert!(lines[5].trim_start().starts_with('1'));
        assert!(lines[5].ends_with("0 (0%)"));
    }

    #[test]
    fn item_details_show_service_summary_unless_its_slot_failed() {
        let mut feed = ItemDetailsFeed {
            item: Some(CatalogItem::new(3, "Travel Guide", "Travel", 4.8)),
            rating: RatingSummary {
                average_rating: 4.5,
                reviews_count: 12,
                ..RatingSummary::default()
            },
            ..ItemDetailsFeed::default()
        };
        let stats = reviews::distribution(&[]);
        let text = rendered(|out| item_details(out, &feed, &stats, &[]));
        assert!(text.contains("Service rating 4.5 from 12 reviews"));

        feed.failures.push(FetchFailure {
            name: "rating".into(),
            reason: "timeout".into(),
        });
        let text = rendered(|out| item_details(out, &feed, &stats, &[]));
        assert!(!text.contains("Service rating"));
        assert!(text.contains("! rating unavailable: timeout"));
    }

    #[test]
    fn home_reports_failed_slots() {
        let feed = HomeFeed {
            featured: vec![CatalogItem::new(3, "Travel Guide", "Travel", 4.8)],
            failures: vec![FetchFailure {
                name: "categories".into(),
                reason: "timeout".into(),
            }],
            ..HomeFeed::default()
        };
        let text = rendered(|out| home(out, &feed));
        assert!(text.contains("Travel Guide"));
        assert!(text.contains("(nothing here)"));
        assert!(text.contains("! categories unavailable: timeout"));
    }

    #[test]
    fn carousel_frame_marks_active_item() {
        let window = vec![
            (-1, CatalogItem::new(1, "Weather", "Tools", 4.0)),
            (0, CatalogItem::new(2, "Budget", "Finance", 4.5)),
            (1, CatalogItem::new(3, "Travel", "Travel", 4.8)),
        ];
        let event = CarouselEvent {
            index: 1,
            cause: AdvanceCause::Auto,
        };
        let text = rendered(|out| carousel_frame(out, event, 3, &window));
        assert_eq!(text, "2/3 Auto: Weather  [Budget]  Travel\n");
    }
}
