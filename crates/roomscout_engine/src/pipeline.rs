//! One acquisition run: search, list sources, enrichment, store.
use std::collections::HashSet;

use chrono::Utc;
use engine_logging::{engine_error, engine_info, engine_warn};
use roomscout_core::{
    EnrichedListing, LastPageReached, ListingCandidate, RetryPolicy, SearchParams, StopPredicate,
    Termination, Website,
};

use crate::browser::SessionLauncher;
use crate::enrich::EnrichmentBatcher;
use crate::parse::{PageParser, WgZimmerParser};
use crate::retry::run_with_retry;
use crate::search::{SearchConfig, SearchError, SearchOutcome, SearchStateMachine};
use crate::sink::EventSink;
use crate::sources::ListingSource;
use crate::store::{ListingStore, StoreError};
use crate::{PipelineEvent, RunSummary, Stage, StoreSummary};

pub const FINAL_SCREENSHOT: &str = "99_final_page_state";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("search failed: {0}")]
    Search(#[from] SearchError),
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
}

/// Browser search of wgzimmer.ch.
pub struct BrowserSearch {
    pub launcher: Box<dyn SessionLauncher>,
    pub params: SearchParams,
    pub config: SearchConfig,
    pub retry: RetryPolicy,
    pub stop: Box<dyn StopPredicate>,
}

impl BrowserSearch {
    pub fn new(launcher: Box<dyn SessionLauncher>, params: SearchParams) -> Self {
        Self {
            launcher,
            params,
            config: SearchConfig::default(),
            retry: RetryPolicy::default(),
            stop: Box::new(LastPageReached),
        }
    }

    /// One attempt with a fresh session. The final screenshot is taken and the
    /// session closed whatever the outcome.
    async fn run_once(
        &self,
        attempt: u32,
        events: &dyn EventSink,
    ) -> Result<SearchOutcome, SearchError> {
        engine_info!("search attempt {attempt}");
        let parser = WgZimmerParser;
        let mut session = self.launcher.launch().await?;
        let result = SearchStateMachine::new(
            session.as_mut(),
            &parser as &dyn PageParser,
            self.stop.as_ref(),
            events,
            &self.config,
        )
        .run(&self.params)
        .await;

        if let Err(err) = session.screenshot(FINAL_SCREENSHOT).await {
            engine_warn!("final screenshot failed: {err}");
        }
        if let Err(err) = session.close().await {
            engine_warn!("closing browser failed: {err}");
        }
        result
    }
}

pub struct Pipeline {
    search: Option<BrowserSearch>,
    sources: Vec<Box<dyn ListingSource>>,
    batcher: EnrichmentBatcher,
    store: Box<dyn ListingStore>,
}

/// Listings gathered for one site.
struct Collected {
    website: Website,
    candidates: Vec<ListingCandidate>,
}

impl Pipeline {
    pub fn new(batcher: EnrichmentBatcher, store: Box<dyn ListingStore>) -> Self {
        Self {
            search: None,
            sources: Vec::new(),
            batcher,
            store,
        }
    }

    pub fn with_search(mut self, search: BrowserSearch) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_source(mut self, source: Box<dyn ListingSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub async fn run(&mut self, events: &dyn EventSink) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary {
            listings: 0,
            duplicates: 0,
            pages: 0,
            termination: None,
            geocoded: 0,
            store: StoreSummary::default(),
        };
        let mut collected = Vec::new();

        if let Some(search) = &self.search {
            events.emit(PipelineEvent::Stage(Stage::Launching));
            let outcome = run_with_retry(search.retry, events, |attempt| {
                events.emit(PipelineEvent::Stage(Stage::Searching));
                search.run_once(attempt, events)
            })
            .await;
            match outcome {
                Ok(outcome) => {
                    summary.pages = outcome.pages_visited;
                    summary.duplicates += outcome.duplicates;
                    if outcome.termination.is_partial() {
                        engine_warn!("search ended early, results are partial: {}", outcome.termination);
                    }
                    summary.termination = Some(outcome.termination);
                    collected.push(Collected {
                        website: Website::WgZimmer,
                        candidates: outcome.candidates,
                    });
                }
                Err(SearchError::VerificationFailed) => {
                    engine_warn!("search results not confirmed, continuing without wgzimmer listings");
                }
                Err(err) => {
                    engine_error!("search failed: {err}");
                    events.emit(PipelineEvent::Failed(err.to_string()));
                    return Err(err.into());
                }
            }
        }

        if !self.sources.is_empty() {
            events.emit(PipelineEvent::Stage(Stage::CollectingSources));
        }
        for source in &self.sources {
            match source.collect().await {
                Ok(candidates) => {
                    events.emit(PipelineEvent::SourceCollected {
                        website: source.website(),
                        items: candidates.len(),
                    });
                    collected.push(Collected {
                        website: source.website(),
                        candidates,
                    });
                }
                Err(err) => engine_warn!("{} unavailable, skipping: {err}", source.website()),
            }
        }

        events.emit(PipelineEvent::Stage(Stage::Enriching));
        let listings: Vec<EnrichedListing> = collected
            .iter()
            .flat_map(|group| group.candidates.iter())
            .map(|candidate| self.resume(candidate))
            .collect();
        let enriched = self.batcher.enrich_listings(listings, events).await;
        summary.listings = enriched.len();
        summary.geocoded = enriched.iter().filter(|l| l.coordinate().is_some()).count();

        events.emit(PipelineEvent::Stage(Stage::Storing));
        summary.store = self.persist(&collected, &enriched)?;

        events.emit(PipelineEvent::Stage(Stage::Done));
        engine_info!(
            "run finished: {} listing(s), {} located, {} new, {} updated, {} deleted",
            summary.listings,
            summary.geocoded,
            summary.store.new,
            summary.store.updated,
            summary.store.deleted
        );
        events.emit(PipelineEvent::Finished(summary.clone()));
        Ok(summary)
    }

    /// Fresh list data on top of whatever enrichment the store already holds.
    fn resume(&self, candidate: &ListingCandidate) -> EnrichedListing {
        match self.store.get(&candidate.url) {
            Some(stored) => EnrichedListing {
                candidate: candidate.clone(),
                ..stored.listing.clone()
            },
            None => EnrichedListing::from_candidate(candidate.clone()),
        }
    }

    fn persist(
        &mut self,
        collected: &[Collected],
        enriched: &[EnrichedListing],
    ) -> Result<StoreSummary, StoreError> {
        let counts = self.store.upsert(enriched, Utc::now())?;
        let websites: Vec<Website> = collected.iter().map(|group| group.website).collect();
        let active: HashSet<String> = enriched.iter().map(|l| l.url().to_string()).collect();
        let deleted = self.store.mark_deleted_except(&websites, &active)?;
        Ok(StoreSummary {
            new: counts.new,
            updated: counts.updated,
            deleted,
        })
    }
}

impl RunSummary {
    /// Whether pagination stopped before the result set was exhausted.
    pub fn is_partial(&self) -> bool {
        self.termination.as_ref().is_some_and(Termination::is_partial)
    }
}
