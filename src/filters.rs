use serde::{Deserialize, Serialize};

use crate::extract::format_price;
use crate::models::Listing;

/// User-configured search criteria applied to stored listings.
///
/// Every clause is skip-if-absent: a listing is never rejected just because
/// a field could not be scraped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub min_rooms: i64,
    pub max_rooms: i64,
    pub min_floor: i64,
    pub max_price: f64,
    /// OR-matched, case-insensitively, against area + address. Empty means
    /// any location is fine.
    pub areas: Vec<String>,
    /// Any match against description + address excludes the listing.
    pub exclude_keywords: Vec<String>,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            min_rooms: 2,
            max_rooms: 4,
            min_floor: 2,
            max_price: 1500.0,
            areas: Vec::new(),
            exclude_keywords: Vec::new(),
        }
    }
}

impl SearchCriteria {
    /// Decide whether a listing passes every applicable criterion.
    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(rooms) = listing.rooms {
            if rooms < self.min_rooms || rooms > self.max_rooms {
                return false;
            }
        }

        if let Some(floor) = listing.floor {
            if floor < self.min_floor {
                return false;
            }
        }

        if let Some(price) = listing.price {
            if price > self.max_price {
                return false;
            }
        }

        if !self.areas.is_empty() {
            let location = format!(
                "{} {}",
                listing.area.as_deref().unwrap_or(""),
                listing.address.as_deref().unwrap_or("")
            )
            .to_lowercase();
            if !self
                .areas
                .iter()
                .any(|area| location.contains(&area.to_lowercase()))
            {
                return false;
            }
        }

        if !self.exclude_keywords.is_empty() {
            let haystack = format!(
                "{} {}",
                listing.description.as_deref().unwrap_or(""),
                listing.address.as_deref().unwrap_or("")
            )
            .to_lowercase();
            if self
                .exclude_keywords
                .iter()
                .any(|kw| haystack.contains(&kw.to_lowercase()))
            {
                return false;
            }
        }

        true
    }

    /// Human-readable summary for chat messages.
    pub fn summary(&self) -> String {
        let areas = if self.areas.is_empty() {
            "Any".to_string()
        } else {
            self.areas.join(", ")
        };
        let keywords = if self.exclude_keywords.is_empty() {
            "None".to_string()
        } else {
            self.exclude_keywords.join(", ")
        };
        format!(
            "🛏️ Rooms: {}–{}\n🏢 Min Floor: {}\n💰 Max Price: {}/month\n📍 Areas: {}\n🚫 Excluded: {}",
            self.min_rooms,
            self.max_rooms,
            self.min_floor,
            format_price(self.max_price),
            areas,
            keywords
        )
    }
}
