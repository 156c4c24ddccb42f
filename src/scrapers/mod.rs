pub mod http;
pub mod immonet;
pub mod immowelt;
pub mod scout24;
pub mod traits;

pub use immonet::ImmonetScraper;
pub use immowelt::ImmoweltScraper;
pub use scout24::Scout24Scraper;
pub use traits::Scraper;

use scraper::{ElementRef, Selector};
use sha2::{Digest, Sha256};

/// Pages fetched per source per cycle, hard cap.
pub(crate) const MAX_PAGES: u32 = 3;

/// Site-scoped ID derived from the canonical URL, e.g. `immonet_1a2b3c4d`.
pub(crate) fn url_site_id(prefix: &str, url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{}_{}", prefix, &hex[..8])
}

/// First element matched by any of the candidate selectors, in order.
/// Target sites ship several layouts at once; the candidates reflect that.
pub(crate) fn select_first<'a>(
    item: &ElementRef<'a>,
    selectors: &[Selector],
) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|sel| item.select(sel).next())
}

/// Concatenated text content of an element.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// Heuristic area: the part of the address after the last comma.
pub(crate) fn area_from_address(address: Option<&str>) -> Option<String> {
    let address = address?;
    let (_, area) = address.rsplit_once(',')?;
    let area = area.trim();
    if area.is_empty() {
        None
    } else {
        Some(area.to_string())
    }
}

/// Resolve a possibly-relative href against the site's domain.
pub(crate) fn absolute_url(domain: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{domain}{href}")
    }
}
