//! Roomscout engine: browser search, page parsing, enrichment and storage.
mod browser;
mod config;
mod detail;
mod engine;
mod enrich;
mod fetch;
mod parse;
mod persist;
mod pipeline;
mod rate_limit;
mod retry;
mod search;
mod sink;
mod sources;
mod store;
mod types;

pub use browser::{
    BrowserError, BrowserSession, ChromiumLauncher, ChromiumSession, ChromiumSettings, Jitter,
    Locator, SessionLauncher,
};
pub use config::{parse_coordinate, ConfigError, EngineConfig, DEFAULT_DESTINATION};
pub use detail::{extract_details, map_center, DetailSource, WgZimmerDetails};
pub use engine::{HandleError, PipelineHandle};
pub use enrich::{
    decode_polyline, monday_morning, summarize, BatchSettings, BikeRouter, EnrichError,
    EnrichmentBatcher, EnrichmentClients, Geocoder, LocationIqClient, OpenRouteServiceClient,
    OpendataTransitClient, TransitRouter, LOCATIONIQ_BASE_URL, OPENDATA_BASE_URL, ORS_BASE_URL,
};
pub use fetch::{decode_body, FetchSettings, Fetcher, ReqwestFetcher};
pub use parse::{parser_for, PageParser, ParsedPage, StudentsChParser, WgZimmerParser, WokoParser};
pub use persist::{ensure_dir, write_atomic, PersistError};
pub use pipeline::{BrowserSearch, Pipeline, PipelineError, FINAL_SCREENSHOT};
pub use rate_limit::{for_each_windowed, RateLimiter};
pub use retry::run_with_retry;
pub use search::{
    SearchConfig, SearchError, SearchOutcome, SearchStateMachine, CAPTCHA_MARKER, START_URL,
};
pub use sink::{ChannelEventSink, EventSink, NullSink, RecordingSink};
pub use sources::{HttpListSource, ListingSource, STUDENTS_CH_LIST_URL, WOKO_LIST_URL};
pub use store::{
    JsonListingStore, ListingStatus, ListingStore, StoreError, StoredListing, UpsertCounts,
};
pub use types::{
    FailureKind, FetchError, FetchMetadata, FetchOutput, FetchedPage, PipelineEvent, RunSummary, Stage,
    StoreSummary,
};
