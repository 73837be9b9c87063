use roomscout_core::{PaginationState, Website};
use scraper::Html;
use url::Url;

use super::{candidates_from_links, PageParser, ParsedPage};

const DETAIL_LINKS: &str = ".inserat a[href*='/de/zimmer-in-zuerich-details/']";

/// Room list on woko.ch. The site shows every offer on one page.
#[derive(Debug, Default, Clone, Copy)]
pub struct WokoParser;

impl PageParser for WokoParser {
    fn website(&self) -> Website {
        Website::Woko
    }

    fn parse(&self, html: &str, base_url: &Url) -> ParsedPage {
        let document = Html::parse_document(html);
        ParsedPage {
            pagination: PaginationState::unknown(),
            items: candidates_from_links(&document, DETAIL_LINKS, base_url, Website::Woko),
        }
    }
}
