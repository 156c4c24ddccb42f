use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::extract::{extract_price, extract_rooms, normalize_address};
use crate::models::ScrapedListing;
use crate::scrapers::http::PoliteClient;
use crate::scrapers::{
    absolute_url, area_from_address, element_text, select_first, url_site_id, Scraper, MAX_PAGES,
};

const DOMAIN: &str = "https://www.immonet.de";

static ITEM_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["div[id^='selObject_']", "div.item-container"]
        .iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
});
static LINK_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "a[id^='lnkImgToObject']",
        "a.result-list-entry",
        "a[href*='expose']",
        "a[href]",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("valid selector"))
    .collect()
});
static ADDRESS_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [".item-info-outer", ".box-25.left", ".location"]
        .iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
});
static PRICE_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [".price", ".item-price"]
        .iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
});
static ROOMS_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".item-zimmer, .rooms, [class*='zimmer']").expect("valid selector")
});

/// Scraper for Immonet rental listings.
pub struct ImmonetScraper {
    base_url: String,
    client: PoliteClient,
}

impl ImmonetScraper {
    pub fn new(base_url: String) -> Result<Self> {
        Ok(Self {
            base_url,
            client: PoliteClient::new()?,
        })
    }

    /// Page 1 is the bare base URL; later pages add the `pageno` parameter.
    fn page_url(&self, page: u32) -> String {
        if page == 1 {
            return self.base_url.clone();
        }
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}pageno={}", self.base_url, separator, page)
    }

    /// Parse one result page. `None` means the page held no recognizable
    /// item containers (pagination should stop).
    fn parse_page(&self, body: &str) -> Option<Vec<ScrapedListing>> {
        let document = Html::parse_document(body);
        let items: Vec<ElementRef> = ITEM_SELECTORS
            .iter()
            .map(|sel| document.select(sel).collect::<Vec<_>>())
            .find(|found| !found.is_empty())?;

        let mut listings = Vec::new();
        for item in &items {
            match self.parse_item(item) {
                Some(listing) if listing.is_valid() => listings.push(listing),
                Some(_) => debug!("Immonet: dropping item without url/site id"),
                None => debug!("Immonet: skipping unparseable item"),
            }
        }
        Some(listings)
    }

    fn parse_item(&self, item: &ElementRef<'_>) -> Option<ScrapedListing> {
        let link = select_first(item, &LINK_SELECTORS)?;
        let href = link.value().attr("href")?;
        let url = absolute_url(DOMAIN, href);

        let address = select_first(item, &ADDRESS_SELECTORS)
            .map(|el| normalize_address(&element_text(&el)));

        let price =
            select_first(item, &PRICE_SELECTORS).and_then(|el| extract_price(&element_text(&el)));

        let rooms = item
            .select(&ROOMS_SELECTOR)
            .next()
            .and_then(|el| extract_rooms(&element_text(&el)));

        let area = area_from_address(address.as_deref());

        Some(ScrapedListing {
            site_id: url_site_id("immonet", &url),
            url,
            address,
            rooms,
            floor: None,
            price,
            area,
            description: None,
            scraped_at: Utc::now(),
        })
    }
}

#[async_trait]
impl Scraper for ImmonetScraper {
    async fn scrape(&self) -> Result<Vec<ScrapedListing>> {
        let mut listings = Vec::new();

        for page in 1..=MAX_PAGES {
            let url = self.page_url(page);
            info!("Immonet: scraping page {} — {}", page, url);

            let Some(body) = self.client.fetch(&url).await else {
                warn!("Immonet: failed to fetch page {}", page);
                break;
            };

            let Some(page_listings) = self.parse_page(&body) else {
                info!("Immonet: no items on page {}, stopping", page);
                break;
            };

            info!("Immonet: found {} items on page {}", page_listings.len(), page);
            listings.extend(page_listings);
        }

        info!("Immonet: total listings collected: {}", listings.len());
        Ok(listings)
    }

    fn name(&self) -> &'static str {
        "Immonet"
    }
}
