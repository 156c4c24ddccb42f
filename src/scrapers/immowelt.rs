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

const DOMAIN: &str = "https://www.immowelt.de";

static ITEM_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "div[data-testid='serp-card']",
        "article.estate-item",
        "div.listItem",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("valid selector"))
    .collect()
});
static LINK_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["a[href*='/expose/']", "a[href]"]
        .iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
});
static ADDRESS_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        ".card-content__address",
        "[data-testid='card-address']",
        ".location",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("valid selector"))
    .collect()
});
static PRICE_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        ".card-content__price-information",
        "[data-testid='card-price']",
        ".price",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("valid selector"))
    .collect()
});
static KEYFACT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".card-content__keyfacts li, .keyfact, .hard-fact").expect("valid selector")
});

/// Scraper for Immowelt rental listings.
pub struct ImmoweltScraper {
    base_url: String,
    client: PoliteClient,
}

impl ImmoweltScraper {
    pub fn new(base_url: String) -> Result<Self> {
        Ok(Self {
            base_url,
            client: PoliteClient::new()?,
        })
    }

    /// Page 1 is the bare base URL; later pages add the `cp` parameter.
    fn page_url(&self, page: u32) -> String {
        if page == 1 {
            return self.base_url.clone();
        }
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}cp={}", self.base_url, separator, page)
    }

    /// Parse one result page. `None` means no recognizable cards.
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
                Some(_) => debug!("Immowelt: dropping item without url/site id"),
                None => debug!("Immowelt: skipping unparseable card"),
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

        // Rooms hide in the key-facts line ("3 Zi. · 75 m² · EG").
        let mut rooms = None;
        for fact in item.select(&KEYFACT_SELECTOR) {
            let text = element_text(&fact);
            let text = text.trim();
            if text.contains("Zi") || text.contains("Zimmer") {
                rooms = extract_rooms(text);
            }
        }

        let area = area_from_address(address.as_deref());

        Some(ScrapedListing {
            site_id: url_site_id("immowelt", &url),
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
impl Scraper for ImmoweltScraper {
    async fn scrape(&self) -> Result<Vec<ScrapedListing>> {
        let mut listings = Vec::new();

        for page in 1..=MAX_PAGES {
            let url = self.page_url(page);
            info!("Immowelt: scraping page {} — {}", page, url);

            let Some(body) = self.client.fetch(&url).await else {
                warn!("Immowelt: failed to fetch page {}", page);
                break;
            };

            let Some(page_listings) = self.parse_page(&body) else {
                info!("Immowelt: no items on page {}, stopping", page);
                break;
            };

            info!("Immowelt: found {} items on page {}", page_listings.len(), page);
            listings.extend(page_listings);
        }

        info!("Immowelt: total listings collected: {}", listings.len());
        Ok(listings)
    }

    fn name(&self) -> &'static str {
        "Immowelt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div data-testid="serp-card">
            <a href="/expose/abc123">Schöne Wohnung</a>
            <div class="card-content__address">Bergmannstraße 3, 10961 Berlin, Kreuzberg</div>
            <div class="card-content__price-information">1.450 € Kaltmiete</div>
            <ul class="card-content__keyfacts">
              <li>3 Zi.</li>
              <li>82 m²</li>
            </ul>
          </div>
        </body></html>"#;

    fn scraper() -> ImmoweltScraper {
        ImmoweltScraper::new("https://www.immowelt.de/liste/berlin".to_string()).unwrap()
    }

    #[test]
    fn parses_serp_card() {
        let listings = scraper().parse_page(PAGE).unwrap();
        assert_eq!(listings.len(), 1);

        let listing = &listings[0];
        assert_eq!(listing.url, "https://www.immowelt.de/expose/abc123");
        assert_eq!(listing.rooms, Some(3));
        assert_eq!(listing.price, Some(1450.0));
        assert_eq!(listing.area.as_deref(), Some("Kreuzberg"));
        assert!(listing.site_id.starts_with("immowelt_"));
    }

    #[test]
    fn legacy_layout_still_parses() {
        let page = r#"
            <div class="listItem">
              <a href="https://www.immowelt.de/expose/x1">Wohnung</a>
              <div class="location">Schillerkiez 7</div>
              <div class="price">980 €</div>
            </div>"#;
        let listings = scraper().parse_page(page).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].price, Some(980.0));
        assert_eq!(listings[0].rooms, None);
    }

    #[test]
    fn pagination_uses_cp_param() {
        let s = scraper();
        assert_eq!(s.page_url(1), "https://www.immowelt.de/liste/berlin");
        assert_eq!(s.page_url(2), "https://www.immowelt.de/liste/berlin?cp=2");
    }
}
