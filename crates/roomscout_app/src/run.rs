//! Wires configuration into a pipeline and follows it to completion.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use engine_logging::{engine_info, engine_warn};
use roomscout_core::{SearchParams, Website};
use roomscout_engine::{
    BatchSettings, BrowserSearch, ChromiumLauncher, ChromiumSettings, EngineConfig,
    EnrichmentBatcher, EnrichmentClients, FetchSettings, Fetcher, HttpListSource, JsonListingStore,
    LocationIqClient, OpenRouteServiceClient, OpendataTransitClient, Pipeline, PipelineEvent,
    PipelineHandle, ReqwestFetcher, RunSummary, Stage, WgZimmerDetails,
};

use crate::cli::Cli;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn build_pipeline(cli: &Cli, config: &EngineConfig, run_dir: &Path) -> Result<Pipeline> {
    let fetcher: Arc<dyn Fetcher> =
        Arc::new(ReqwestFetcher::new(FetchSettings::default()).context("creating http client")?);
    let clients = EnrichmentClients::new(
        Arc::new(
            LocationIqClient::new(config.locationiq_api_key.clone(), config.locationiq_url.clone())
                .context("creating geocoding client")?,
        ),
        Arc::new(
            OpendataTransitClient::new(config.transit_url.clone(), config.time_zone)
                .context("creating transit client")?,
        ),
        Arc::new(
            OpenRouteServiceClient::new(
                config.openrouteservice_api_key.clone(),
                config.openrouteservice_url.clone(),
            )
            .context("creating bike routing client")?,
        ),
        config.commute_destination,
    )
    .with_details(Website::WgZimmer, Arc::new(WgZimmerDetails::new(fetcher.clone())));
    let batcher = EnrichmentBatcher::new(
        clients,
        BatchSettings {
            max_per_minute: config.rate_limit_per_minute,
            workers: config.enrich_workers,
            ..BatchSettings::default()
        },
    );

    let store = JsonListingStore::open(&cli.store)
        .with_context(|| format!("opening listing store {}", cli.store.display()))?;
    let mut pipeline = Pipeline::new(batcher, Box::new(store));

    if cli.skip_search {
        engine_info!("browser search disabled");
    } else {
        let params = SearchParams::new(cli.min_price, cli.max_price, &cli.region, cli.permanent_only)
            .context("invalid search parameters")?;
        let mut settings = ChromiumSettings::new(cli.profile_dir.clone(), run_dir.to_path_buf());
        settings.headless = !cli.headed;
        let launcher = ChromiumLauncher::new(settings);
        pipeline = pipeline.with_search(BrowserSearch::new(Box::new(launcher), params));
    }

    if !cli.skip_sources {
        pipeline = pipeline
            .with_source(Box::new(HttpListSource::woko(fetcher.clone())))
            .with_source(Box::new(HttpListSource::students_ch(fetcher)));
    }
    Ok(pipeline)
}

/// Logs progress until the pipeline thread ends.
pub fn follow(handle: PipelineHandle) -> Result<RunSummary> {
    while !handle.is_finished() {
        if let Some(event) = handle.recv_timeout(POLL_INTERVAL) {
            report(&event);
        }
    }
    let (outcome, remaining) = handle.join();
    remaining.iter().for_each(report);
    outcome.context("pipeline run failed")
}

fn report(event: &PipelineEvent) {
    match event {
        PipelineEvent::Stage(Stage::Done) => {}
        PipelineEvent::Stage(stage) => engine_info!("stage: {stage:?}"),
        PipelineEvent::PageCollected {
            page,
            total_pages,
            items,
        } => match total_pages {
            Some(total) => engine_info!("page {page}/{total}: {items} listing(s)"),
            None => engine_info!("page {page}: {items} listing(s)"),
        },
        PipelineEvent::CaptchaBackoff { attempt, delay } => {
            engine_warn!("captcha on attempt {attempt}, waiting {delay:?}")
        }
        PipelineEvent::SourceCollected { website, items } => {
            engine_info!("{website}: {items} listing(s)")
        }
        PipelineEvent::ListingEnriched { .. } => {}
        PipelineEvent::Finished(summary) => engine_info!(
            "{} listing(s) stored, {} new, {} deleted",
            summary.listings,
            summary.store.new,
            summary.store.deleted
        ),
        PipelineEvent::Failed(message) => engine_warn!("run failed: {message}"),
    }
}
