use std::sync::{Arc, LazyLock};

use engine_logging::{engine_debug, engine_warn};
use regex::Regex;
use roomscout_core::{Coordinate, ListingDetails};
use scraper::{ElementRef, Html};
use url::Url;

use crate::enrich::EnrichError;
use crate::fetch::Fetcher;
use crate::parse::{element_text, select_all, select_first, LOADING_PLACEHOLDER};

const ADDRESS_BLOCK: &str = "div.adress-region";
const DESCRIPTION: &str = "div.mate-content > p";
const LOOKING_FOR: &str = "div.room-content > p";
const ABOUT_US: &str = "div.person-content > p";
const IMAGE_PREFIX: &str = "/docroot/img.wgzimmer.ch";

static MAP_CENTER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"ol\.proj\.fromLonLat\(\[\s*([+-]?\d+\.\d+)\s*,\s*([+-]?\d+\.\d+)\s*\]\)").ok()
});

/// Loads the facts a listing's own page adds to the list entry.
#[async_trait::async_trait]
pub trait DetailSource: Send + Sync {
    async fn details(&self, url: &str) -> Result<ListingDetails, EnrichError>;
}

/// Detail pages of wgzimmer.ch, fetched over plain HTTP.
pub struct WgZimmerDetails {
    fetcher: Arc<dyn Fetcher>,
}

impl WgZimmerDetails {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait::async_trait]
impl DetailSource for WgZimmerDetails {
    async fn details(&self, url: &str) -> Result<ListingDetails, EnrichError> {
        let page = self.fetcher.fetch_page(url).await?;
        Ok(extract_details(&page.html, &page.url))
    }
}

/// Pure extraction of a wgzimmer.ch detail page.
pub fn extract_details(html: &str, base_url: &Url) -> ListingDetails {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let mut details = ListingDetails::default();
    if let Some(block) = select_first(root, ADDRESS_BLOCK) {
        details.region = labelled_value(block, "Region");
        details.street = labelled_value(block, "Adresse");
        details.locality = labelled_value(block, "Ort");
    } else {
        engine_debug!("no address block on {base_url}");
    }
    details.description = select_first(root, DESCRIPTION).and_then(element_text);
    details.looking_for = select_first(root, LOOKING_FOR).and_then(element_text);
    details.about_us = select_first(root, ABOUT_US).and_then(element_text);
    details.image_urls = image_urls(root, base_url);
    details.coordinate = map_center(html);
    details
}

/// Text right after `<strong>{label}</strong>` inside `block`.
fn labelled_value(block: ElementRef<'_>, label: &str) -> Option<String> {
    let strong = select_all(block, "strong")
        .into_iter()
        .find(|strong| element_text(*strong).as_deref() == Some(label))?;
    let sibling = strong.next_sibling()?;
    let text = sibling.value().as_text()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn image_urls(root: ElementRef<'_>, base_url: &Url) -> Vec<String> {
    let og_images = select_all(root, r#"meta[property="og:image"]"#)
        .into_iter()
        .filter_map(|meta| meta.value().attr("content"))
        .map(str::to_string);
    let site_images = select_all(root, "img")
        .into_iter()
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| src.starts_with(IMAGE_PREFIX) && *src != LOADING_PLACEHOLDER)
        .filter_map(|src| base_url.join(src).ok())
        .map(String::from);

    let mut urls: Vec<String> = Vec::new();
    for url in og_images.chain(site_images) {
        if url.is_empty() || url.ends_with(LOADING_PLACEHOLDER) || urls.contains(&url) {
            continue;
        }
        urls.push(url);
    }
    urls
}

/// Coordinate of the embedded map; the page script passes `[lon, lat]`.
pub fn map_center(html: &str) -> Option<Coordinate> {
    let captures = MAP_CENTER.as_ref()?.captures(html)?;
    let lon = captures.get(1)?.as_str().parse::<f64>();
    let lat = captures.get(2)?.as_str().parse::<f64>();
    match (lat, lon) {
        (Ok(lat), Ok(lon)) => Some(Coordinate::new(lat, lon)),
        _ => {
            engine_warn!("map center present but not numeric");
            None
        }
    }
}
