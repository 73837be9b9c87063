//! Single-page listing tables fetched over plain HTTP.
use std::sync::Arc;

use engine_logging::{engine_info, engine_warn};
use roomscout_core::{CandidateSet, ListingCandidate, Website};

use crate::fetch::Fetcher;
use crate::parse::{parser_for, PageParser};
use crate::FetchError;

pub const WOKO_LIST_URL: &str = "https://www.woko.ch/de/nachmieter-gesucht";
pub const STUDENTS_CH_LIST_URL: &str = "https://www.students.ch/wohnen/list/140?type=wg&price-range-min=0&price-range-max=1000&room-range-min=1&room-range-max=10&square-meter-range-min=0&square-meter-range-max=500";

/// Site whose listings come from one static list page.
#[async_trait::async_trait]
pub trait ListingSource: Send + Sync {
    fn website(&self) -> Website;
    async fn collect(&self) -> Result<Vec<ListingCandidate>, FetchError>;
}

pub struct HttpListSource {
    list_url: String,
    fetcher: Arc<dyn Fetcher>,
    parser: Box<dyn PageParser>,
}

impl HttpListSource {
    pub fn new(website: Website, list_url: impl Into<String>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            list_url: list_url.into(),
            fetcher,
            parser: parser_for(website),
        }
    }

    pub fn woko(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::new(Website::Woko, WOKO_LIST_URL, fetcher)
    }

    pub fn students_ch(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::new(Website::StudentsCh, STUDENTS_CH_LIST_URL, fetcher)
    }
}

#[async_trait::async_trait]
impl ListingSource for HttpListSource {
    fn website(&self) -> Website {
        self.parser.website()
    }

    async fn collect(&self) -> Result<Vec<ListingCandidate>, FetchError> {
        let fetched = self.fetcher.fetch_page(&self.list_url).await?;
        let page = self.parser.parse(&fetched.html, &fetched.url);
        if page.items.is_empty() {
            engine_warn!("no listings found on {}", self.list_url);
        }

        let mut unique = CandidateSet::new();
        unique.extend(page.items);
        engine_info!(
            "{}: {} listing(s), {} duplicate link(s)",
            self.website(),
            unique.len(),
            unique.duplicates()
        );
        Ok(unique.into_vec())
    }
}
