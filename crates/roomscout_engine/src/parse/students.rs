use roomscout_core::{PaginationState, Website};
use scraper::Html;
use url::Url;

use super::{candidates_from_links, PageParser, ParsedPage};

const DETAIL_LINKS: &str = r#"table.list_table a[href*="/wohnen/details/"]"#;

/// Housing table on students.ch.
#[derive(Debug, Default, Clone, Copy)]
pub struct StudentsChParser;

impl PageParser for StudentsChParser {
    fn website(&self) -> Website {
        Website::StudentsCh
    }

    fn parse(&self, html: &str, base_url: &Url) -> ParsedPage {
        let document = Html::parse_document(html);
        ParsedPage {
            pagination: PaginationState::unknown(),
            items: candidates_from_links(&document, DETAIL_LINKS, base_url, Website::StudentsCh),
        }
    }
}
