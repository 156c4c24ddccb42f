use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::extract::{extract_floor, extract_price, extract_rooms, normalize_address};
use crate::models::ScrapedListing;
use crate::scrapers::http::PoliteClient;
use crate::scrapers::{absolute_url, area_from_address, element_text, select_first, Scraper, MAX_PAGES};

const DOMAIN: &str = "https://www.immobilienscout24.de";

static ITEM_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["li[data-obid]", "article[data-obid]"]
        .iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
});
static LINK_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "a.result-list-entry__brand-title-container",
        "a[data-nav-ref='result_list_entry']",
        "a[href*='/expose/']",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("valid selector"))
    .collect()
});
static ADDRESS_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        ".result-list-entry__address",
        "[data-testid='result-list-entry-address']",
        "button.result-list-entry__map-link",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("valid selector"))
    .collect()
});
static CRITERION_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("dd.result-list-entry__primary-criterion, .result-list-entry__primary-criterion")
        .expect("valid selector")
});
static CRITERIA_LIST_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("li.result-list-entry__criteria-item, dl dt, dl dd").expect("valid selector")
});
static NEXT_LINK_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "a[data-nav-ref='resultlist_pagination_next']",
        "li.pagination-next a",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("valid selector"))
    .collect()
});

const FLOOR_KEYWORDS: [&str; 5] = ["OG", "EG", "DG", "Etage", "Geschoss"];

/// Scraper for ImmobilienScout24 rental listings.
pub struct Scout24Scraper {
    base_url: String,
    client: PoliteClient,
}

/// One parsed result page plus the resolved "next page" link, if any.
struct ParsedPage {
    listings: Vec<ScrapedListing>,
    next_url: Option<String>,
}

impl Scout24Scraper {
    pub fn new(base_url: String) -> Result<Self> {
        Ok(Self {
            base_url,
            client: PoliteClient::new()?,
        })
    }

    /// Parse one result page. `None` means no recognizable result items.
    fn parse_page(&self, body: &str) -> Option<ParsedPage> {
        let document = Html::parse_document(body);
        let items: Vec<ElementRef> = ITEM_SELECTORS
            .iter()
            .map(|sel| document.select(sel).collect::<Vec<_>>())
            .find(|found| !found.is_empty())?;

        let mut listings = Vec::new();
        for item in &items {
            match self.parse_item(item) {
                Some(listing) if listing.is_valid() => listings.push(listing),
                Some(_) => debug!("Scout24: dropping item without url/site id"),
                None => debug!("Scout24: skipping unparseable item"),
            }
        }

        // Scout24 paginates by "next" link rather than a page parameter.
        let root = document.root_element();
        let next_url = select_first(&root, &NEXT_LINK_SELECTORS)
            .and_then(|el| el.value().attr("href"))
            .map(|href| absolute_url(DOMAIN, href));

        Some(ParsedPage { listings, next_url })
    }

    fn parse_item(&self, item: &ElementRef<'_>) -> Option<ScrapedListing> {
        // The provider-native object ID is the stable site-scoped key.
        let obid = item.value().attr("data-obid")?;
        if obid.is_empty() {
            return None;
        }
        let site_id = format!("scout24_{obid}");

        let link = select_first(item, &LINK_SELECTORS)?;
        let href = link.value().attr("href")?;
        let url = absolute_url(DOMAIN, href);

        let address = select_first(item, &ADDRESS_SELECTORS)
            .map(|el| normalize_address(&element_text(&el)));

        // Primary criteria carry price and rooms, distinguished by content.
        let mut price = None;
        let mut rooms = None;
        for criterion in item.select(&CRITERION_SELECTOR) {
            let text = element_text(&criterion);
            let text = text.trim();
            if text.contains('€') || text.contains("EUR") {
                price = extract_price(text);
            } else if text.contains("Zi") || text.contains("Zimmer") {
                rooms = extract_rooms(text);
            }
        }

        let mut floor = None;
        for entry in item.select(&CRITERIA_LIST_SELECTOR) {
            let text = element_text(&entry);
            let text = text.trim();
            if FLOOR_KEYWORDS.iter().any(|kw| text.contains(kw)) {
                floor = extract_floor(text);
            }
        }

        let area = area_from_address(address.as_deref());

        Some(ScrapedListing {
            site_id,
            url,
            address,
            rooms,
            floor,
            price,
            area,
            description: None,
            scraped_at: Utc::now(),
        })
    }
}

#[async_trait]
impl Scraper for Scout24Scraper {
    async fn scrape(&self) -> Result<Vec<ScrapedListing>> {
        let mut listings = Vec::new();
        let mut url = self.base_url.clone();

        for page in 1..=MAX_PAGES {
            info!("Scout24: scraping page {} — {}", page, url);

            let Some(body) = self.client.fetch(&url).await else {
                warn!("Scout24: failed to fetch page {}", page);
                break;
            };

            let Some(parsed) = self.parse_page(&body) else {
                info!("Scout24: no items on page {}, stopping", page);
                break;
            };

            info!("Scout24: found {} items on page {}", parsed.listings.len(), page);
            listings.extend(parsed.listings);

            match parsed.next_url {
                Some(next) => url = next,
                None => break,
            }
        }

        info!("Scout24: total listings collected: {}", listings.len());
        Ok(listings)
    }

    fn name(&self) -> &'static str {
        "Scout24"
    }
}
