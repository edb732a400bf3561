//! Sorting and text search over catalog item lists.

use std::{cmp::Ordering, fmt, str::FromStr};

use shared::domain::CatalogItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemSort {
    #[default]
    Rating,
    Name,
    Downloads,
}

impl FromStr for ItemSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rating" => Ok(Self::Rating),
            "name" => Ok(Self::Name),
            "downloads" => Ok(Self::Downloads),
            other => Err(format!(
                "unknown item sort '{other}' (expected rating, name, downloads)"
            )),
        }
    }
}

impl fmt::Display for ItemSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rating => "rating",
            Self::Name => "name",
            Self::Downloads => "downloads",
        })
    }
}

/// Numeric part of an opaque downloads label: `"12M+"` is 12, `"1.5K"` is 1.5.
pub fn downloads_value(label: Option<&str>) -> f64 {
    let digits: String = label
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits.parse().unwrap_or(0.0)
}

fn by_rating_desc(a: &CatalogItem, b: &CatalogItem) -> Ordering {
    b.rating.total_cmp(&a.rating)
}

/// Stable sort into a new list.
pub fn sort_items(items: &[CatalogItem], sort: ItemSort) -> Vec<CatalogItem> {
    let mut sorted = items.to_vec();
    match sort {
        ItemSort::Rating => sorted.sort_by(by_rating_desc),
        ItemSort::Name => sorted.sort_by_cached_key(|item| item.name.to_lowercase()),
        ItemSort::Downloads => sorted.sort_by(|a, b| {
            let (a, b) = (a.downloads.as_deref(), b.downloads.as_deref());
            downloads_value(b).total_cmp(&downloads_value(a))
        }),
    }
    sorted
}

/// Items whose name or category contains `query`, ignoring case. A blank
/// query matches everything.
pub fn search_items(items: &[CatalogItem], query: &str) -> Vec<CatalogItem> {
    let needle = query.trim().to_lowercase();
    items
        .iter()
        .filter(|item| {
            needle.is_empty()
                || item.name.to_lowercase().contains(&needle)
                || item.category.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

pub fn top_rated(items: &[CatalogItem], limit: usize) -> Vec<CatalogItem> {
    let mut top = sort_items(items, ItemSort::Rating);
    top.truncate(limit);
    top
}
