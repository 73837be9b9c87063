//! Scripted browser and in-memory enrichment services shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use roomscout_core::{BikeConnection, Coordinate, Leg, LegMode, ListingDetails, TransitConnection};
use roomscout_engine::{
    BikeRouter, BrowserError, BrowserSession, DetailSource, EnrichError, Geocoder, Locator,
    SearchConfig, SessionLauncher, TransitRouter, CAPTCHA_MARKER,
};
use scraper::{Html, Selector};

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(engine_logging::initialize_for_tests);
}

pub const SEARCH_URL: &str = "https://www.wgzimmer.ch/wgzimmer/search/mate.html";

/// Search config for the fake browser: same targets, no pauses.
pub fn fast_config() -> SearchConfig {
    SearchConfig::default().without_delays()
}

pub const FORM_PAGE: &str = r#"
<html><body>
  <form id="searchMateForm">
    <select name="priceMin"><option>200</option></select>
    <select name="priceMax"><option>1500</option></select>
    <select name="wgState"><option>zurich-stadt</option></select>
    <input type="checkbox" name="permanent" value="true">
    <input type="button" value="Suchen">
  </form>
</body></html>
"#;

pub const PREVIOUS_RESULTS_PAGE: &str = r#"
<html><body>
  <a href="/wgzimmer/search/mate.html?new">Neue Suche</a>
  <ul class="list" id="search-result-list"></ul>
</body></html>
"#;

pub const UNCONFIRMED_PAGE: &str = "<html><body><p>Bitte warten</p></body></html>";

pub fn captcha_page() -> String {
    format!("<html><body><h1>{CAPTCHA_MARKER} hat zu lange gedauert</h1></body></html>")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextControl {
    Enabled,
    Disabled,
    Missing,
}

/// Listing URL of a fake result entry.
pub fn listing_url(id: u32) -> String {
    format!("https://www.wgzimmer.ch/wglink/de/{id}.html")
}

/// One results page in the site's markup.
///
/// `counter` is rendered as `Seite current/total`; `None` omits the counter.
pub fn results_page(counter: Option<(u32, u32)>, ids: &[u32], next: NextControl) -> String {
    let counter = counter
        .map(|(current, total)| {
            format!(r#"<div class="skip"><span class="counter">Seite {current}/{total}</span></div>"#)
        })
        .unwrap_or_default();
    let entries: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<li class="search-result-entry">
                     <a href="/wglink/de/{id}.html">
                       <div class="create-date"><strong>01.04.2025</strong></div>
                       <span class="from-date"><strong>01.05.2025</strong></span>
                       <span class="cost"><strong>{price}.-</strong></span>
                       <span class="state image"><span class="thumbState">Zürich Kreis {kreis}</span></span>
                     </a>
                   </li>"#,
                price = 600 + id % 10 * 50,
                kreis = id % 12 + 1,
            )
        })
        .collect();
    let next = match next {
        NextControl::Enabled => r##"<a class="next" href="#">Weiter</a>"##,
        NextControl::Disabled => r##"<a class="next disabled" href="#">Weiter</a>"##,
        NextControl::Missing => "",
    };
    format!(
        r#"<html><body>
             <a href="/wgzimmer/search/mate.html?new">Neue Suche</a>
             {counter}
             <ul class="list" id="search-result-list">
               <li class="search-result-entry search-result-entry-slot"><a href="/ad">Anzeige</a></li>
               {entries}
             </ul>
             {next}
           </body></html>"#
    )
}

/// Pages of a `total`-page result with `per_page` listings each, numbered from `first_id`.
pub fn paged_results(total: u32, per_page: u32, first_id: u32) -> Vec<String> {
    (1..=total)
        .map(|page| {
            let start = first_id + (page - 1) * per_page;
            let ids: Vec<u32> = (start..start + per_page).collect();
            let next = if page < total {
                NextControl::Enabled
            } else {
                NextControl::Missing
            };
            results_page(Some((page, total)), &ids, next)
        })
        .collect()
}

/// What the fake site shows.
#[derive(Debug, Clone)]
pub struct FakeSite {
    /// First page after navigation.
    pub landing: String,
    /// Page shown after submitting instead of the first results page.
    pub after_submit: Option<String>,
    pub results: Vec<String>,
    /// Clicking next on this 1-based page leaves the page unchanged.
    pub next_is_noop_on: Option<usize>,
    /// Every `content()` call fails once this many results pages were read.
    pub content_fails_after: Option<usize>,
}

impl FakeSite {
    pub fn with_results(results: Vec<String>) -> Self {
        Self {
            landing: FORM_PAGE.to_string(),
            after_submit: None,
            results,
            next_is_noop_on: None,
            content_fails_after: None,
        }
    }
}

/// Everything the fake browser was asked to do.
#[derive(Debug, Default)]
pub struct BrowserLog {
    pub visited: Vec<String>,
    pub selects: Vec<(String, String)>,
    pub checks: Vec<(String, bool)>,
    pub clicks: Vec<String>,
    pub screenshots: Vec<String>,
    pub closed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Showing {
    Blank,
    Landing,
    Form,
    AfterSubmit,
    Results(usize),
}

/// Browser session answering from static HTML with `scraper`.
///
/// Every wait resolves immediately: a missing element is an element timeout.
pub struct FakeBrowser {
    site: FakeSite,
    showing: Showing,
    contents_read: usize,
    log: Arc<Mutex<BrowserLog>>,
}

impl FakeBrowser {
    pub fn new(site: FakeSite) -> Self {
        Self::with_log(site, Arc::new(Mutex::new(BrowserLog::default())))
    }

    pub fn with_log(site: FakeSite, log: Arc<Mutex<BrowserLog>>) -> Self {
        Self {
            site,
            showing: Showing::Blank,
            contents_read: 0,
            log,
        }
    }

    pub fn log(&self) -> Arc<Mutex<BrowserLog>> {
        Arc::clone(&self.log)
    }

    fn html(&self) -> String {
        match &self.showing {
            Showing::Blank => "<html></html>".to_string(),
            Showing::Landing => self.site.landing.clone(),
            Showing::Form => FORM_PAGE.to_string(),
            Showing::AfterSubmit => self.site.after_submit.clone().unwrap_or_default(),
            Showing::Results(index) => self.site.results.get(*index).cloned().unwrap_or_default(),
        }
    }

    /// Texts of every element matching `locator`, plus whether it looks disabled.
    fn matches(&self, locator: &Locator) -> Result<Vec<(String, bool)>, BrowserError> {
        let selector = Selector::parse(&locator.css)
            .map_err(|err| BrowserError::interaction("select", err.to_string()))?;
        let document = Html::parse_document(&self.html());
        Ok(document
            .select(&selector)
            .map(|el| {
                let text = el.text().collect::<String>();
                let disabled = el.value().attr("disabled").is_some()
                    || el.value().classes().any(|class| class == "disabled");
                (text, disabled)
            })
            .filter(|(text, _)| locator.matches_text(text))
            .collect())
    }

    fn first_match(&self, locator: &Locator) -> Result<(String, bool), BrowserError> {
        self.matches(locator)?
            .into_iter()
            .next()
            .ok_or_else(|| BrowserError::ElementTimeout {
                locator: locator.to_string(),
                timeout: Duration::ZERO,
            })
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        self.log.lock().unwrap().visited.push(url.to_string());
        self.showing = Showing::Landing;
        Ok(())
    }

    async fn wait_for_visible(
        &mut self,
        locator: &Locator,
        _timeout: Duration,
    ) -> Result<(), BrowserError> {
        self.first_match(locator).map(|_| ())
    }

    async fn wait_for_text(
        &mut self,
        locator: &Locator,
        text: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        if self.matches(locator)?.iter().any(|(t, _)| t.contains(text)) {
            Ok(())
        } else {
            Err(BrowserError::ElementTimeout {
                locator: locator.to_string(),
                timeout,
            })
        }
    }

    async fn is_enabled(&mut self, locator: &Locator) -> Result<bool, BrowserError> {
        self.first_match(locator).map(|(_, disabled)| !disabled)
    }

    async fn fill_select(&mut self, locator: &Locator, value: &str) -> Result<(), BrowserError> {
        self.first_match(locator)?;
        self.log
            .lock()
            .unwrap()
            .selects
            .push((locator.css.clone(), value.to_string()));
        Ok(())
    }

    async fn check(&mut self, locator: &Locator, checked: bool) -> Result<(), BrowserError> {
        self.first_match(locator)?;
        self.log
            .lock()
            .unwrap()
            .checks
            .push((locator.css.clone(), checked));
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> Result<(), BrowserError> {
        let (text, _) = self.first_match(locator)?;
        self.log.lock().unwrap().clicks.push(text.trim().to_string());
        self.showing = match &self.showing {
            Showing::Landing if text.contains("Neue Suche") => Showing::Form,
            Showing::Landing | Showing::Form if locator.css.contains("Suchen") => {
                if self.site.after_submit.is_some() {
                    Showing::AfterSubmit
                } else {
                    Showing::Results(0)
                }
            }
            Showing::Results(index) => {
                if self.site.next_is_noop_on == Some(index + 1) {
                    Showing::Results(*index)
                } else {
                    Showing::Results(index + 1)
                }
            }
            other => other.clone(),
        };
        Ok(())
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        if matches!(self.showing, Showing::Results(_) | Showing::AfterSubmit) {
            self.contents_read += 1;
        }
        if let Some(limit) = self.site.content_fails_after {
            // The first read happens while verifying, before any results page.
            if self.contents_read > limit + 1 {
                return Err(BrowserError::interaction("content", "target crashed"));
            }
        }
        Ok(self.html())
    }

    async fn screenshot(&mut self, name: &str) -> Result<PathBuf, BrowserError> {
        self.log.lock().unwrap().screenshots.push(name.to_string());
        Ok(PathBuf::from(format!("{name}.png")))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.log.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// Hands out one scripted site per launch; all sessions share one log.
pub struct FakeLauncher {
    sites: Mutex<VecDeque<FakeSite>>,
    pub log: Arc<Mutex<BrowserLog>>,
    pub launches: Mutex<usize>,
}

impl FakeLauncher {
    pub fn new(sites: Vec<FakeSite>) -> Self {
        Self {
            sites: Mutex::new(sites.into()),
            log: Arc::new(Mutex::new(BrowserLog::default())),
            launches: Mutex::new(0),
        }
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        *self.launches.lock().unwrap() += 1;
        let site = self
            .sites
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BrowserError::Launch("no more scripted sites".into()))?;
        Ok(Box::new(FakeBrowser::with_log(site, Arc::clone(&self.log))))
    }
}

/// Geocoder answering from a table; unknown queries fail.
#[derive(Default)]
pub struct TableGeocoder {
    answers: HashMap<String, Coordinate>,
    pub calls: Mutex<Vec<String>>,
}

impl TableGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, query: &str, coordinate: Coordinate) -> Self {
        self.answers.insert(query.to_string(), coordinate);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Geocoder for TableGeocoder {
    async fn geocode(&self, query: &str) -> Result<Coordinate, EnrichError> {
        self.calls.lock().unwrap().push(query.to_string());
        self.answers
            .get(query)
            .copied()
            .ok_or(EnrichError::NoResult("geocoder"))
    }
}

/// Geocoder that places every query at the same spot.
pub struct FixedGeocoder(pub Coordinate);

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn geocode(&self, _query: &str) -> Result<Coordinate, EnrichError> {
        Ok(self.0)
    }
}

/// Transit router returning a fixed 20 minute tram ride.
#[derive(Default)]
pub struct FixedTransit {
    pub calls: Mutex<usize>,
}

#[async_trait]
impl TransitRouter for FixedTransit {
    async fn connection(
        &self,
        from: Coordinate,
        _to: Coordinate,
    ) -> Result<TransitConnection, EnrichError> {
        *self.calls.lock().unwrap() += 1;
        Ok(TransitConnection {
            total_min: 20,
            legs: vec![Leg {
                mode: LegMode::Transit("T".into()),
                duration_min: 20,
                coordinate: Some(from),
            }],
        })
    }
}

/// Bike router that always fails.
#[derive(Default)]
pub struct FailingBike {
    pub calls: Mutex<usize>,
}

#[async_trait]
impl BikeRouter for FailingBike {
    async fn route(&self, _from: Coordinate, _to: Coordinate) -> Result<BikeConnection, EnrichError> {
        *self.calls.lock().unwrap() += 1;
        Err(EnrichError::Status {
            service: "openrouteservice",
            status: 503,
        })
    }
}

/// Bike router returning a fixed 12 minute ride.
pub struct FixedBike;

#[async_trait]
impl BikeRouter for FixedBike {
    async fn route(&self, from: Coordinate, to: Coordinate) -> Result<BikeConnection, EnrichError> {
        Ok(BikeConnection {
            duration_min: 12.0,
            distance_km: 3.4,
            waypoints: vec![from, to],
        })
    }
}

/// Detail source that knows a street address for every listing.
pub struct StaticDetails;

#[async_trait]
impl DetailSource for StaticDetails {
    async fn details(&self, _url: &str) -> Result<ListingDetails, EnrichError> {
        Ok(ListingDetails {
            region: Some("Zürich (Stadt)".into()),
            street: Some("Universitätstrasse 6".into()),
            locality: Some("8006 Zürich".into()),
            ..ListingDetails::default()
        })
    }
}
