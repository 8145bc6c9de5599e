use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{debug, info};
use utoipa::ToSchema;

/// One business entry from the results feed. `business_name` and
/// `listing_link` are required; everything else is best-effort.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Listing {
    pub business_name: String,
    pub service_category: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub website_url: Option<String>,
    pub rating: Option<f64>,
    pub review_count: u32,
    pub listing_link: String,
}

// Google Maps ships hardcoded, versioned class names that drift over time.
// Every selector below is one strategy in a per-field fallback chain, so a
// drift repair is a table edit rather than a control-flow change.

static CARD_PRIMARY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.Nv2PK.THOPZb").unwrap());
static CARD_FALLBACK: Lazy<Selector> = Lazy::new(|| Selector::parse("div.Nv2PK").unwrap());
static DETAILS: Lazy<Selector> = Lazy::new(|| Selector::parse("div.lI9IFe").unwrap());
static NAME_HEADLINE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".qBF1Pd.fontHeadlineSmall").unwrap());
static NAME_LOOSE: Lazy<Selector> = Lazy::new(|| Selector::parse(".qBF1Pd").unwrap());
static LISTING_ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a.hfpxzc").unwrap());
static RATING_TEXT: Lazy<Selector> = Lazy::new(|| Selector::parse("span.MW4etd").unwrap());
static REVIEW_TEXT: Lazy<Selector> = Lazy::new(|| Selector::parse("span.UY7F9").unwrap());
static RATING_BADGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"span[role="img"]"#).unwrap());
static TEXT_BLOCK: Lazy<Selector> = Lazy::new(|| Selector::parse(".W4Efsd span").unwrap());
static PHONE_TEXT: Lazy<Selector> = Lazy::new(|| Selector::parse("span.UsdlK").unwrap());
static WEBSITE_ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a.lcr4fd").unwrap());

/// Where a strategy reads its value from once its selector matches.
enum Source {
    Text,
    Attr(&'static str),
}

struct FieldStrategy {
    selector: &'static Lazy<Selector>,
    source: Source,
}

static NAME_STRATEGIES: &[FieldStrategy] = &[
    FieldStrategy { selector: &NAME_HEADLINE, source: Source::Text },
    FieldStrategy { selector: &NAME_LOOSE, source: Source::Text },
];
static LISTING_LINK_STRATEGIES: &[FieldStrategy] = &[FieldStrategy {
    selector: &LISTING_ANCHOR,
    source: Source::Attr("href"),
}];
static RATING_STRATEGIES: &[FieldStrategy] = &[FieldStrategy {
    selector: &RATING_TEXT,
    source: Source::Text,
}];
static REVIEW_STRATEGIES: &[FieldStrategy] = &[FieldStrategy {
    selector: &REVIEW_TEXT,
    source: Source::Text,
}];
static ARIA_LABEL_STRATEGIES: &[FieldStrategy] = &[FieldStrategy {
    selector: &RATING_BADGE,
    source: Source::Attr("aria-label"),
}];
static PHONE_STRATEGIES: &[FieldStrategy] = &[FieldStrategy {
    selector: &PHONE_TEXT,
    source: Source::Text,
}];
static WEBSITE_STRATEGIES: &[FieldStrategy] = &[FieldStrategy {
    selector: &WEBSITE_ANCHOR,
    source: Source::Attr("href"),
}];

static ARIA_RATING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)").unwrap());
static ARIA_REVIEWS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d[\d,]*)\s+reviews?").unwrap());
static RATING_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d+)?$").unwrap());
static REVIEW_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\(\d[\d,.]*\)$").unwrap());
static PHONE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}$").unwrap());
static LEADING_AREA_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\(\d{3}\)").unwrap());
static STREET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d+.*\b(Ave|St|Rd|Dr|Ln|Blvd|Circle|Ct|Way|Highway|Hwy)\b").unwrap()
});
static PO_BOX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)P\.?O\.?\s*Box\s*\d+").unwrap());
static LEADING_JUNK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^A-Za-z0-9]+").unwrap());

const HOURS_MARKERS: &[&str] = &["Open", "Opens", "Closes", "Closed", "24 hours"];
const UI_CHROME: &[&str] = &["Website", "Directions"];
const SEPARATORS: &[char] = &['\u{00B7}', '\u{22C5}']; // middle dot / dot operator

/// Parses the rendered results page into listing records, preserving DOM
/// order (order is the de facto ranking). Cards missing a required field are
/// dropped, never nulled.
pub fn extract_listings(html: &str) -> Vec<Listing> {
    let document = Html::parse_document(html);
    let mut cards: Vec<ElementRef> = document.select(&CARD_PRIMARY).collect();
    if cards.is_empty() {
        cards = document.select(&CARD_FALLBACK).collect();
    }
    debug!(cards = cards.len(), "matched result cards");

    let listings: Vec<Listing> = cards
        .into_iter()
        .enumerate()
        .filter_map(|(index, card)| parse_card(index, card))
        .collect();
    info!(listings = listings.len(), "extracted listings");
    listings
}

fn parse_card(index: usize, card: ElementRef<'_>) -> Option<Listing> {
    // The listing's own detail link doubles as its identity and sits at the
    // card level, outside the details region.
    let listing_link = first_value(card, LISTING_LINK_STRATEGIES).map(absolutize);

    // No details region means a distinct sub-layout (ad unit etc.), not a
    // business listing.
    let Some(details) = card.select(&DETAILS).next() else {
        debug!(index, "skipping card without details region");
        return None;
    };

    let business_name = first_value(details, NAME_STRATEGIES);
    let (Some(business_name), Some(listing_link)) = (business_name, listing_link) else {
        debug!(index, "skipping card missing business name or listing link");
        return None;
    };

    let blocks = text_blocks(details);

    Some(Listing {
        business_name,
        service_category: category_from_blocks(&blocks),
        phone_number: first_value(details, PHONE_STRATEGIES),
        address: address_from_blocks(&blocks),
        website_url: first_value(card, WEBSITE_STRATEGIES),
        rating: extract_rating(details),
        review_count: extract_review_count(details),
        listing_link,
    })
}

/// Tries each strategy in order; the first non-empty value wins.
fn first_value(scope: ElementRef<'_>, strategies: &[FieldStrategy]) -> Option<String> {
    strategies.iter().find_map(|strategy| {
        scope
            .select(strategy.selector)
            .next()
            .and_then(|element| match strategy.source {
                Source::Text => {
                    let text = element.text().collect::<String>().trim().to_string();
                    (!text.is_empty()).then_some(text)
                }
                Source::Attr(name) => element
                    .value()
                    .attr(name)
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty()),
            })
    })
}

fn absolutize(href: String) -> String {
    if href.starts_with('/') {
        format!("https://www.google.com{href}")
    } else {
        href
    }
}

fn extract_rating(details: ElementRef<'_>) -> Option<f64> {
    first_value(details, RATING_STRATEGIES)
        .and_then(|text| text.parse::<f64>().ok())
        .or_else(|| {
            // Accessibility label fallback, e.g. "4.8 stars 132 Reviews".
            first_value(details, ARIA_LABEL_STRATEGIES).and_then(|label| {
                ARIA_RATING_RE
                    .captures(&label)
                    .and_then(|captures| captures[1].parse::<f64>().ok())
            })
        })
        .filter(|rating| (0.0..=5.0).contains(rating))
}

fn extract_review_count(details: ElementRef<'_>) -> u32 {
    first_value(details, REVIEW_STRATEGIES)
        .map(|text| text.chars().filter(|c| c.is_ascii_digit()).collect::<String>())
        .filter(|digits| !digits.is_empty())
        .and_then(|digits| digits.parse::<u32>().ok())
        .or_else(|| {
            first_value(details, ARIA_LABEL_STRATEGIES).and_then(|label| {
                ARIA_REVIEWS_RE
                    .captures(&label)
                    .and_then(|captures| captures[1].replace(',', "").parse::<u32>().ok())
            })
        })
        .unwrap_or(0)
}

/// Candidate text blocks from the details region, in DOM order. Blocks with
/// no alphanumeric content (separator glyphs, icon spans) are dropped.
fn text_blocks(details: ElementRef<'_>) -> Vec<String> {
    details
        .select(&TEXT_BLOCK)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|text| text.chars().any(char::is_alphanumeric))
        .collect()
}

/// A block qualifies as the category only if it is none of: the bare rating
/// number, the parenthesized review count, a phone number, operating-hours
/// text, UI chrome, or the no-reviews placeholder.
fn is_junk_block(text: &str) -> bool {
    RATING_BLOCK_RE.is_match(text)
        || REVIEW_BLOCK_RE.is_match(text)
        || PHONE_BLOCK_RE.is_match(text)
        || HOURS_MARKERS.iter().any(|marker| text.contains(marker))
        || UI_CHROME.iter().any(|chrome| *chrome == text)
        || text.eq_ignore_ascii_case("No reviews")
}

fn category_from_blocks(blocks: &[String]) -> Option<String> {
    blocks
        .iter()
        .filter(|block| !is_junk_block(block))
        .find_map(|block| {
            // "Plumber · 123 Main St" inlines an address fragment after the
            // separator; only the head is the category.
            let head = block.split(SEPARATORS).next().unwrap_or("").trim();
            (!head.is_empty()).then(|| head.to_string())
        })
}

fn address_from_blocks(blocks: &[String]) -> Option<String> {
    blocks.iter().find_map(|block| {
        let looks_like_address = STREET_RE.is_match(block) || PO_BOX_RE.is_match(block);
        if !looks_like_address
            || LEADING_AREA_CODE_RE.is_match(block)
            || HOURS_MARKERS.iter().any(|marker| block.contains(marker))
        {
            return None;
        }
        let cleaned = LEADING_JUNK_RE.replace(block, "").trim().to_string();
        (!cleaned.is_empty()).then_some(cleaned)
    })
}
