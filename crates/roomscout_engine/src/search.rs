//! Browser-driven search: open form, fill, submit, verify, paginate.
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use roomscout_core::{
    advance, check_page, CandidateSet, FailureReason, LastPageReached, ListingCandidate,
    PageContext, PageVerdict, SearchParams, SearchState, SearchStep, StopPredicate, Termination,
};
use url::Url;

use crate::browser::{BrowserError, BrowserSession, Jitter, Locator};
use crate::parse::PageParser;
use crate::sink::EventSink;
use crate::PipelineEvent;

pub const START_URL: &str = "https://www.wgzimmer.ch/wgzimmer/search/mate.html";
pub const CAPTCHA_MARKER: &str = "Das Verarbeiten der Anfrage";

const FORM: &str = "form#searchMateForm";
const COUNTER: &str = "div.skip span.counter";
const NEW_SEARCH_TEXT: &str = "Neue Suche";
const NEXT_TEXTS: [&str; 3] = ["Next", "Weiter", "Nächste"];

/// Timeouts, pauses and target of one search run.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Search page; relative links on result pages resolve against it.
    pub start_url: String,
    pub captcha_marker: String,
    pub navigation_timeout: Duration,
    pub form_timeout: Duration,
    pub submit_timeout: Duration,
    pub settle_delay: Duration,
    pub verify_timeout: Duration,
    pub next_page_timeout: Duration,
    pub next_control_timeout: Duration,
    pub reset_probe_timeout: Duration,
    pub initial_jitter: Jitter,
    pub action_jitter: Jitter,
    pub page_jitter: Jitter,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            start_url: START_URL.to_string(),
            captcha_marker: CAPTCHA_MARKER.to_string(),
            navigation_timeout: Duration::from_secs(60),
            form_timeout: Duration::from_secs(20),
            submit_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(10),
            verify_timeout: Duration::from_secs(5),
            next_page_timeout: Duration::from_secs(30),
            next_control_timeout: Duration::from_secs(5),
            reset_probe_timeout: Duration::from_secs(2),
            initial_jitter: Jitter::millis(2000, 4000),
            action_jitter: Jitter::millis(300, 800),
            page_jitter: Jitter::millis(1000, 2500),
        }
    }
}

impl SearchConfig {
    /// Same targets, every pause removed.
    pub fn without_delays(mut self) -> Self {
        self.settle_delay = Duration::ZERO;
        self.initial_jitter = Jitter::none();
        self.action_jitter = Jitter::none();
        self.page_jitter = Jitter::none();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("captcha detected after submitting the search")]
    Captcha,
    #[error("results page could not be confirmed after submitting the search")]
    VerificationFailed,
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("search left its expected path: {0}")]
    Transition(FailureReason),
    #[error("invalid start url {url}: {message}")]
    InvalidStartUrl { url: String, message: String },
}

/// Listings collected by one run, deduplicated by canonical URL.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub candidates: Vec<ListingCandidate>,
    pub pages_visited: u32,
    pub termination: Termination,
    pub duplicates: usize,
}

pub struct SearchStateMachine<'a> {
    session: &'a mut dyn BrowserSession,
    parser: &'a dyn PageParser,
    /// Checked after the page counter, so it can only end pagination earlier.
    stop: &'a dyn StopPredicate,
    events: &'a dyn EventSink,
    config: &'a SearchConfig,
    state: SearchState,
}

impl<'a> SearchStateMachine<'a> {
    pub fn new(
        session: &'a mut dyn BrowserSession,
        parser: &'a dyn PageParser,
        stop: &'a dyn StopPredicate,
        events: &'a dyn EventSink,
        config: &'a SearchConfig,
    ) -> Self {
        Self {
            session,
            parser,
            stop,
            events,
            config,
            state: SearchState::Init,
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Drives the whole search. Errors before the first results page surface;
    /// problems while paginating end the run gracefully with partial results.
    pub async fn run(&mut self, params: &SearchParams) -> Result<SearchOutcome, SearchError> {
        let base_url =
            Url::parse(&self.config.start_url).map_err(|err| SearchError::InvalidStartUrl {
                url: self.config.start_url.clone(),
                message: err.to_string(),
            })?;
        self.open_form().await?;
        self.fill_and_submit(params).await?;
        self.verify().await?;
        let outcome = self.paginate(&base_url).await?;
        engine_info!(
            "search finished after {} page(s): {} unique listing(s), {} duplicate(s); {}",
            outcome.pages_visited,
            outcome.candidates.len(),
            outcome.duplicates,
            outcome.termination
        );
        Ok(outcome)
    }

    fn step(&mut self, step: SearchStep) -> Result<(), SearchError> {
        let next = advance(self.state.clone(), step);
        engine_debug!("search state {:?} -> {:?}", self.state, next);
        self.state = next;
        match &self.state {
            SearchState::Failed(reason @ FailureReason::UnexpectedStep { .. }) => {
                Err(SearchError::Transition(reason.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Records the failure, takes a diagnostic screenshot, hands the error back.
    async fn fail(&mut self, shot: &str, err: SearchError) -> SearchError {
        let reason = match &err {
            SearchError::Captcha => FailureReason::Captcha,
            SearchError::VerificationFailed => FailureReason::VerificationFailed,
            SearchError::Browser(inner) => FailureReason::Browser(inner.to_string()),
            SearchError::Transition(reason) => reason.clone(),
            SearchError::InvalidStartUrl { message, .. } => FailureReason::Browser(message.clone()),
        };
        self.state = advance(self.state.clone(), SearchStep::Fail(reason));
        engine_error!("{err}");
        self.snapshot(shot).await;
        err
    }

    async fn snapshot(&mut self, name: &str) {
        if let Err(err) = self.session.screenshot(name).await {
            engine_warn!("screenshot {name} failed: {err}");
        }
    }

    async fn open_form(&mut self) -> Result<(), SearchError> {
        let config = self.config;
        engine_info!("navigating to {}", config.start_url);
        if let Err(err) = self
            .session
            .goto(&config.start_url, config.navigation_timeout)
            .await
        {
            return Err(self.fail("error_navigation", err.into()).await);
        }
        self.snapshot("01_initial_page").await;
        config.initial_jitter.pause().await;

        let form = Locator::css(FORM);
        let new_search = Locator::with_text("a", NEW_SEARCH_TEXT);
        match self.shows_previous_results(&form, &new_search).await {
            Ok(true) => {
                engine_info!("previous search results shown, starting a new search");
                if let Err(err) = self.session.click(&new_search).await {
                    return Err(self.fail("error_new_search", err.into()).await);
                }
                self.snapshot("01a_navigated_to_new_search").await;
                config.action_jitter.pause().await;
            }
            Ok(false) => engine_debug!("search form page shown"),
            Err(err) => return Err(self.fail("error_navigation", err.into()).await),
        }

        if let Err(err) = self
            .session
            .wait_for_visible(&form, config.form_timeout)
            .await
        {
            return Err(self.fail("error_form_not_visible", err.into()).await);
        }
        self.step(SearchStep::FormReady)
    }

    /// Results of an earlier search are shown instead of the form.
    async fn shows_previous_results(
        &mut self,
        form: &Locator,
        new_search: &Locator,
    ) -> Result<bool, BrowserError> {
        let probe = self.config.reset_probe_timeout;
        let shows_results = self.session.is_visible(new_search, probe).await?;
        let form_visible = self.session.is_visible(form, probe).await?;
        Ok(shows_results && !form_visible)
    }

    async fn fill_and_submit(&mut self, params: &SearchParams) -> Result<(), SearchError> {
        if let Err(err) = self.fill(params).await {
            return Err(self.fail("error_form_fill", err.into()).await);
        }
        self.snapshot("02_form_filled").await;

        if let Err(err) = self.submit().await {
            return Err(self.fail("error_submit", err.into()).await);
        }
        engine_info!("search submitted");
        self.step(SearchStep::FormSubmitted)
    }

    async fn submit(&mut self) -> Result<(), BrowserError> {
        let submit = Locator::css(format!(r#"{FORM} input[type="button"][value="Suchen"]"#));
        self.session
            .wait_for_visible(&submit, self.config.submit_timeout)
            .await?;
        self.config.action_jitter.pause().await;
        self.session.click(&submit).await
    }

    async fn fill(&mut self, params: &SearchParams) -> Result<(), BrowserError> {
        let jitter = self.config.action_jitter;
        let selects = [
            ("priceMin", params.min_price().to_string()),
            ("priceMax", params.max_price().to_string()),
            ("wgState", params.region().to_string()),
        ];
        for (name, value) in selects {
            engine_debug!("setting {name} to {value}");
            let select = Locator::css(format!(r#"{FORM} select[name="{name}"]"#));
            self.session.fill_select(&select, &value).await?;
            jitter.pause().await;
        }
        let permanent = Locator::css(format!(r#"{FORM} input[name="permanent"][value="true"]"#));
        self.session
            .check(&permanent, params.permanent_only())
            .await?;
        jitter.pause().await;
        Ok(())
    }

    async fn verify(&mut self) -> Result<(), SearchError> {
        if !self.config.settle_delay.is_zero() {
            engine_debug!("waiting {:?} for results to settle", self.config.settle_delay);
            tokio::time::sleep(self.config.settle_delay).await;
        }
        self.snapshot("03_after_submit").await;
        self.step(SearchStep::Settled)?;

        let html = match self.session.content().await {
            Ok(html) => html,
            Err(err) => return Err(self.fail("error_submit", err.into()).await),
        };
        if contains_marker(&html, &self.config.captcha_marker) {
            return Err(self
                .fail("error_captcha_detected", SearchError::Captcha)
                .await);
        }

        let new_search = Locator::with_text("a", NEW_SEARCH_TEXT);
        match self
            .session
            .is_visible(&new_search, self.config.verify_timeout)
            .await
        {
            Ok(true) => {
                engine_info!("results page confirmed");
                self.step(SearchStep::ResultsConfirmed)
            }
            Ok(false) => Err(self
                .fail("error_results_not_confirmed", SearchError::VerificationFailed)
                .await),
            Err(err) => Err(self.fail("error_results_not_confirmed", err.into()).await),
        }
    }

    async fn paginate(&mut self, base_url: &Url) -> Result<SearchOutcome, SearchError> {
        let mut collected = CandidateSet::new();
        let mut known_total: Option<u32> = None;
        let mut page: u32 = 1;

        let termination = loop {
            if let Some(stop) = self.load_page(page).await {
                break stop;
            }

            let html = match self.session.content().await {
                Ok(html) => html,
                Err(err) => {
                    engine_error!("could not read page {page}: {err}");
                    self.snapshot(&format!("error_get_content_p{page}")).await;
                    break Termination::BrowserFailure {
                        page,
                        message: err.to_string(),
                    };
                }
            };

            let parsed = self.parser.parse(&html, base_url);
            if let Some(total) = parsed.pagination.total_pages {
                known_total = Some(total);
            }
            if let PageVerdict::Stale { expected, parsed } = check_page(page, &parsed.pagination) {
                engine_warn!("page counter shows {parsed}, expected {expected}; content may be stale");
                self.snapshot(&format!("warning_page_mismatch_p{page}")).await;
                break Termination::PaginationStale { expected, parsed };
            }
            if parsed.items.is_empty() && page > 1 {
                engine_warn!("no listings found on page {page}");
            }

            let added = collected.extend(parsed.items.iter().cloned());
            engine_info!(
                "page {page}/{}: {} listing(s), {added} new",
                known_total.map_or_else(|| "?".to_string(), |t| t.to_string()),
                parsed.items.len()
            );
            self.events.emit(PipelineEvent::PageCollected {
                page,
                total_pages: known_total,
                items: parsed.items.len(),
            });

            let ctx = PageContext {
                page,
                known_total,
                pagination: parsed.pagination,
                items: &parsed.items,
            };
            let stop = LastPageReached
                .should_stop(&ctx)
                .or_else(|| self.stop.should_stop(&ctx));
            if let Some(stop) = stop {
                break stop;
            }

            if let Some(stop) = self.click_next(page).await {
                break stop;
            }
            self.step(SearchStep::NextPageRequested)?;
            page += 1;
        };

        engine_info!("pagination ended: {termination}");
        self.step(SearchStep::Finished(termination.clone()))?;
        let duplicates = collected.duplicates();
        Ok(SearchOutcome {
            candidates: collected.into_vec(),
            pages_visited: page,
            termination,
            duplicates,
        })
    }

    /// For pages after the first, waits for the counter to show `page`.
    async fn load_page(&mut self, page: u32) -> Option<Termination> {
        if page > 1 {
            let counter = Locator::css(COUNTER);
            let expected = format!("Seite {page}/");
            engine_debug!("waiting for pagination counter {expected}");
            match self
                .session
                .wait_for_text(&counter, &expected, self.config.next_page_timeout)
                .await
            {
                Ok(()) => self.config.page_jitter.pause().await,
                Err(err) => {
                    engine_error!("page {page} did not load: {err}");
                    self.snapshot(&format!("error_page_load_timeout_p{page}"))
                        .await;
                    return Some(if err.is_timeout() {
                        Termination::PageLoadTimeout { page }
                    } else {
                        Termination::BrowserFailure {
                            page,
                            message: err.to_string(),
                        }
                    });
                }
            }
        }
        self.snapshot(&format!("page_{page}")).await;
        None
    }

    async fn click_next(&mut self, page: u32) -> Option<Termination> {
        match self.try_click_next(page).await {
            Ok(stop) => stop,
            Err(err) => {
                engine_warn!("next control on page {page} unusable: {err}");
                self.snapshot(&format!("warning_next_control_p{page}")).await;
                Some(Termination::BrowserFailure {
                    page,
                    message: err.to_string(),
                })
            }
        }
    }
}

impl SearchStateMachine<'_> {
    async fn try_click_next(&mut self, page: u32) -> Result<Option<Termination>, BrowserError> {
        let next = Locator::with_any_text("a", NEXT_TEXTS);
        if !self
            .session
            .is_visible(&next, self.config.next_control_timeout)
            .await?
        {
            return Ok(Some(Termination::NextControlMissing { page }));
        }
        if !self.session.is_enabled(&next).await? {
            return Ok(Some(Termination::NextControlDisabled { page }));
        }
        engine_info!("clicking next on page {page}");
        self.session.click(&next).await?;
        Ok(None)
    }
}

fn contains_marker(html: &str, marker: &str) -> bool {
    html.to_lowercase().contains(&marker.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captcha_marker_is_case_insensitive() {
        assert!(contains_marker(
            "<p>DAS VERARBEITEN DER ANFRAGE dauert</p>",
            CAPTCHA_MARKER
        ));
        assert!(!contains_marker("<p>Seite 1/3</p>", CAPTCHA_MARKER));
    }

    #[test]
    fn default_config_targets_room_search() {
        let config = SearchConfig::default();
        assert_eq!(
            Url::parse(&config.start_url).unwrap().host_str(),
            Some("www.wgzimmer.ch")
        );
        assert_eq!(config.navigation_timeout, Duration::from_secs(60));
        assert_eq!(config.without_delays().settle_delay, Duration::ZERO);
    }
}
