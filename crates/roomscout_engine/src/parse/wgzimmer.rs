use std::sync::LazyLock;

use chrono::NaiveDate;
use engine_logging::{engine_debug, engine_warn};
use regex::Regex;
use roomscout_core::{ListingCandidate, PaginationState, Website};
use scraper::{ElementRef, Html};
use url::Url;

use super::{absolute_url, element_text, select_all, select_first, PageParser, ParsedPage};

const COUNTER: &str = "div.skip span.counter";
const LIST_CONTAINER: &str = "ul.list#search-result-list";
const LIST_ITEMS: &str = "li.search-result-entry:not(.search-result-entry-slot)";
const POSTED: &str = "div.create-date strong";
const AVAILABLE_FROM: &str = "span.from-date strong";
const PRICE: &str = "span.cost strong";
const ADDRESS: &str = "span.state.image span.thumbState";
const THUMBNAIL: &str = "span.thumb img";

/// Placeholder the site serves before lazy images load.
pub(crate) const LOADING_PLACEHOLDER: &str = "/docroot/img.wgzimmer.ch/loading.gif";

const DATE_FORMAT: &str = "%d.%m.%Y";

static COUNTER_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Seite\s*(\d+)/(\d+)").ok());

/// Results page of the wgzimmer.ch room search.
#[derive(Debug, Default, Clone, Copy)]
pub struct WgZimmerParser;

impl PageParser for WgZimmerParser {
    fn website(&self) -> Website {
        Website::WgZimmer
    }

    fn parse(&self, html: &str, base_url: &Url) -> ParsedPage {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let pagination = parse_counter(root);

        let Some(container) = select_first(root, LIST_CONTAINER) else {
            engine_debug!("no result list on page, returning no items");
            return ParsedPage {
                pagination,
                items: Vec::new(),
            };
        };

        let items = select_all(container, LIST_ITEMS)
            .into_iter()
            .filter_map(|item| parse_item(item, base_url))
            .collect();

        ParsedPage { pagination, items }
    }
}

fn parse_counter(root: ElementRef<'_>) -> PaginationState {
    let Some(text) = select_first(root, COUNTER).and_then(element_text) else {
        return PaginationState::unknown();
    };
    match parse_counter_text(&text) {
        Some((current, total)) => PaginationState::new(current, total),
        None => {
            engine_warn!("pagination text format unexpected: {text}");
            PaginationState::unknown()
        }
    }
}

/// `(current, total)` from a counter such as `Seite 2/7`.
pub(crate) fn parse_counter_text(text: &str) -> Option<(u32, u32)> {
    let captures = COUNTER_PATTERN.as_ref()?.captures(text)?;
    let current = captures.get(1)?.as_str().parse().ok()?;
    let total = captures.get(2)?.as_str().parse().ok()?;
    Some((current, total))
}

fn parse_item(item: ElementRef<'_>, base_url: &Url) -> Option<ListingCandidate> {
    let href = select_first(item, "a").and_then(|a| a.value().attr("href"));
    let Some(url) = href.and_then(|href| absolute_url(base_url, href)) else {
        engine_debug!("skipping list item without a usable link");
        return None;
    };

    let mut candidate = ListingCandidate::new(url, Website::WgZimmer);
    candidate.posted = field_text(item, POSTED).and_then(|text| parse_date(&text));
    candidate.available_from = field_text(item, AVAILABLE_FROM).and_then(|text| parse_date(&text));
    candidate.price_chf = field_text(item, PRICE).and_then(|text| parse_price(&text));
    candidate.address = select_first(item, ADDRESS).and_then(stripped_strings);
    candidate.image_url = select_first(item, THUMBNAIL)
        .and_then(|img| img.value().attr("src"))
        .filter(|src| *src != LOADING_PLACEHOLDER)
        .and_then(|src| base_url.join(src).ok())
        .map(String::from);
    Some(candidate)
}

fn field_text(item: ElementRef<'_>, css: &str) -> Option<String> {
    select_first(item, css).and_then(element_text)
}

/// Every text node, trimmed, blank ones dropped, joined by a space.
fn stripped_strings(element: ElementRef<'_>) -> Option<String> {
    let parts: Vec<&str> = element
        .text()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    let cleaned = text.split_whitespace().next().unwrap_or_default();
    match NaiveDate::parse_from_str(cleaned, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(err) => {
            engine_warn!("could not parse date {text:?}: {err}");
            None
        }
    }
}

/// CHF amount with `.` and `'` thousand separators removed.
pub(crate) fn parse_price(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != '.' && *c != '\'')
        .collect();
    let cleaned = cleaned
        .trim()
        .trim_start_matches("CHF")
        .trim_end_matches(['-', '–'])
        .trim();
    match cleaned.parse::<f64>() {
        Ok(price) => Some(price),
        Err(err) => {
            engine_warn!("could not parse price {text:?}: {err}");
            None
        }
    }
}
