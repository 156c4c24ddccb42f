//! Best-effort field extraction from scraped text fragments.
//!
//! Every function here is total: unparseable input yields `None` (or an
//! unchanged string), never an error. German notation is assumed throughout
//! ("1.200,50" means 1200.50; "Erdgeschoss" is the ground floor).

use std::sync::LazyLock;

use regex::Regex;

static ROOMS_DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)[,.](\d+)").expect("valid regex"));
static FIRST_INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").expect("valid regex"));
// Grouped-thousands form first so "1.200,50" wins over a bare "1"; plain
// digits (optionally with a decimal comma) as the fallback.
static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3}(?:\.\d{3})+(?:,\d+)?|\d+(?:,\d+)?)").expect("valid regex"));

/// Parse a room count from strings like "3 Zimmer" or "3,5 Zimmer".
///
/// Fractional counts are floored ("3,5 Zimmer" is 3 rooms).
pub fn extract_rooms(text: &str) -> Option<i64> {
    if text.is_empty() {
        return None;
    }
    if let Some(caps) = ROOMS_DECIMAL_RE.captures(text) {
        return caps[1].parse().ok();
    }
    FIRST_INT_RE
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Parse a floor number from German floor descriptions.
///
/// "Erdgeschoss"/"EG" map to 0 and "DG"/"Dachgeschoss" (attic) to the
/// sentinel 99. The "dg" check is a plain substring test and can misfire on
/// unrelated text; kept permissive on purpose.
pub fn extract_floor(text: &str) -> Option<i64> {
    if text.is_empty() {
        return None;
    }
    let lower = text.to_lowercase();
    let lower = lower.trim();
    if lower.contains("erdgeschoss") || lower == "eg" {
        return Some(0);
    }
    if lower.contains("dg") || lower.contains("dachgeschoss") {
        return Some(99);
    }
    FIRST_INT_RE
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Parse a price from German-formatted strings like "1.200,50 €".
///
/// Periods are thousands separators, the comma is the decimal separator.
pub fn extract_price(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }
    let cleaned = text.replace('\u{a0}', "");
    let cleaned = cleaned.trim();
    let raw = PRICE_RE.captures(cleaned)?.get(1)?.as_str();
    let normalized = raw.replace('.', "").replace(',', ".");
    normalized.parse().ok()
}

/// Collapse runs of whitespace to single spaces and trim the ends.
pub fn normalize_address(address: &str) -> String {
    address.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Format a price as a thousands-grouped euro amount without decimals,
/// e.g. `€1,200`.
pub fn format_price(price: f64) -> String {
    let whole = price.round() as i64;
    let digits = whole.abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if whole < 0 {
        format!("-€{grouped}")
    } else {
        format!("€{grouped}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooms_from_plain_integer() {
        assert_eq!(extract_rooms("3 Zimmer"), Some(3));
    }

    #[test]
    fn rooms_decimal_is_floored() {
        assert_eq!(extract_rooms("3,5 Zimmer"), Some(3));
        assert_eq!(extract_rooms("2.5 rooms"), Some(2));
    }

    #[test]
    fn rooms_absent() {
        assert_eq!(extract_rooms(""), None);
        assert_eq!(extract_rooms("Zimmer"), None);
    }

    #[test]
    fn floor_ground() {
        assert_eq!(extract_floor("Erdgeschoss"), Some(0));
        assert_eq!(extract_floor("EG"), Some(0));
    }

    #[test]
    fn floor_attic_sentinel() {
        assert_eq!(extract_floor("Dachgeschoss"), Some(99));
        assert_eq!(extract_floor("DG"), Some(99));
    }

    #[test]
    fn floor_literal_number() {
        assert_eq!(extract_floor("4. OG"), Some(4));
        assert_eq!(extract_floor("2. Etage"), Some(2));
    }

    #[test]
    fn floor_absent() {
        assert_eq!(extract_floor(""), None);
        assert_eq!(extract_floor("Etage"), None);
    }

    #[test]
    fn price_german_format() {
        assert_eq!(extract_price("1.200,50 €"), Some(1200.50));
        assert_eq!(extract_price("1.200 €/Monat"), Some(1200.0));
    }

    #[test]
    fn price_plain() {
        assert_eq!(extract_price("1500 €"), Some(1500.0));
        assert_eq!(extract_price("950,00\u{a0}€"), Some(950.0));
    }

    #[test]
    fn price_absent() {
        assert_eq!(extract_price(""), None);
        assert_eq!(extract_price("auf Anfrage"), None);
    }

    #[test]
    fn address_whitespace_collapsed() {
        assert_eq!(
            normalize_address("  Hauptstraße 5,\n  10115   Berlin "),
            "Hauptstraße 5, 10115 Berlin"
        );
    }

    #[test]
    fn price_formatting_groups_thousands() {
        assert_eq!(format_price(1200.0), "€1,200");
        assert_eq!(format_price(950.4), "€950");
        assert_eq!(format_price(1500000.0), "€1,500,000");
    }
}
