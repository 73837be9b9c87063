//! Per-site HTML parsers turning one page into listing candidates.
mod students;
mod wgzimmer;
mod woko;

use engine_logging::engine_warn;
use roomscout_core::{canonical_url, ListingCandidate, PaginationState, Website};
use scraper::{ElementRef, Html, Selector};
use url::Url;

pub use students::StudentsChParser;
pub use wgzimmer::WgZimmerParser;
pub(crate) use wgzimmer::LOADING_PLACEHOLDER;
pub use woko::WokoParser;

/// What one page yields: its counter (if any) and the listings it shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    pub pagination: PaginationState,
    pub items: Vec<ListingCandidate>,
}

/// Pure HTML to candidates conversion for one site.
///
/// Parsers never fail: a missing container yields an empty page and a broken
/// field yields `None` with a warning in the log.
pub trait PageParser: Send + Sync {
    fn website(&self) -> Website;
    fn parse(&self, html: &str, base_url: &Url) -> ParsedPage;
}

/// Parser registered for the given site.
pub fn parser_for(website: Website) -> Box<dyn PageParser> {
    match website {
        Website::WgZimmer => Box::new(WgZimmerParser),
        Website::Woko => Box::new(WokoParser),
        Website::StudentsCh => Box::new(StudentsChParser),
    }
}

/// Elements under `root` matching `css`; an unparsable selector matches nothing.
pub(crate) fn select_all<'a>(root: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => root.select(&selector).collect(),
        Err(err) => {
            engine_warn!("invalid selector {css}: {err}");
            Vec::new()
        }
    }
}

pub(crate) fn select_first<'a>(root: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    select_all(root, css).into_iter().next()
}

/// Collapsed text of an element, `None` when blank.
pub(crate) fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}

/// Resolve `href` against `base` and canonicalise it.
pub(crate) fn absolute_url(base: &Url, href: &str) -> Option<String> {
    let joined = base.join(href.trim()).ok()?;
    canonical_url(joined.as_str())
}

/// Candidates for every link matching `links`, in document order.
pub(crate) fn candidates_from_links(
    document: &Html,
    links: &str,
    base_url: &Url,
    website: Website,
) -> Vec<ListingCandidate> {
    select_all(document.root_element(), links)
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| absolute_url(base_url, href))
        .map(|url| ListingCandidate::new(url, website))
        .collect()
}
