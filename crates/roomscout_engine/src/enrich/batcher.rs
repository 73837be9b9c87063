use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use roomscout_core::{Coordinate, EnrichedListing, ListingCandidate, Website};

use super::{BikeRouter, Geocoder, TransitRouter};
use crate::detail::DetailSource;
use crate::rate_limit::for_each_windowed;
use crate::sink::EventSink;
use crate::PipelineEvent;

/// External collaborators used to enrich one listing.
#[derive(Clone)]
pub struct EnrichmentClients {
    pub geocoder: Arc<dyn Geocoder>,
    pub transit: Arc<dyn TransitRouter>,
    pub bike: Arc<dyn BikeRouter>,
    /// Commute target for transit and bike lookups.
    pub destination: Coordinate,
    details: HashMap<Website, Arc<dyn DetailSource>>,
}

impl EnrichmentClients {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        transit: Arc<dyn TransitRouter>,
        bike: Arc<dyn BikeRouter>,
        destination: Coordinate,
    ) -> Self {
        Self {
            geocoder,
            transit,
            bike,
            destination,
            details: HashMap::new(),
        }
    }

    /// Registers a detail-page source for listings of `website`.
    pub fn with_details(mut self, website: Website, source: Arc<dyn DetailSource>) -> Self {
        self.details.insert(website, source);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Listings started per window.
    pub max_per_minute: usize,
    /// Listings in flight at once within a window.
    pub workers: usize,
    pub window: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_per_minute: 40,
            workers: 4,
            window: Duration::from_secs(60),
        }
    }
}

/// Rate-limited fan-out of detail, geocode, transit and bike lookups.
///
/// Output has the input's length and order. A failed lookup leaves its field
/// unset and never affects other listings.
pub struct EnrichmentBatcher {
    clients: EnrichmentClients,
    settings: BatchSettings,
}

impl EnrichmentBatcher {
    pub fn new(clients: EnrichmentClients, settings: BatchSettings) -> Self {
        Self { clients, settings }
    }

    pub async fn enrich(
        &self,
        candidates: Vec<ListingCandidate>,
        events: &dyn EventSink,
    ) -> Vec<EnrichedListing> {
        let listings = candidates
            .into_iter()
            .map(EnrichedListing::from_candidate)
            .collect();
        self.enrich_listings(listings, events).await
    }

    /// Fills whatever is still missing on already known listings.
    pub async fn enrich_listings(
        &self,
        listings: Vec<EnrichedListing>,
        events: &dyn EventSink,
    ) -> Vec<EnrichedListing> {
        let total = listings.len();
        engine_info!(
            "enriching {total} listing(s), {} per {:?} with {} worker(s)",
            self.settings.max_per_minute,
            self.settings.window,
            self.settings.workers
        );

        let done = for_each_windowed(
            listings.clone(),
            self.settings.max_per_minute,
            self.settings.window,
            self.settings.workers,
            |listing| self.enrich_one(listing, events),
        )
        .await;

        let by_url: HashMap<String, EnrichedListing> = done
            .into_iter()
            .map(|listing| (listing.url().to_string(), listing))
            .collect();
        let ordered: Vec<EnrichedListing> = listings
            .into_iter()
            .map(|input| by_url.get(input.url()).cloned().unwrap_or(input))
            .collect();
        let geocoded = ordered.iter().filter(|l| l.coordinate().is_some()).count();
        engine_info!("enrichment done: {geocoded}/{total} listing(s) located");
        ordered
    }

    async fn enrich_one(
        &self,
        mut listing: EnrichedListing,
        events: &dyn EventSink,
    ) -> EnrichedListing {
        self.attach_details(&mut listing).await;
        self.locate(&mut listing).await;
        if let Some(origin) = listing.coordinate() {
            self.attach_commutes(&mut listing, origin).await;
        }
        events.emit(PipelineEvent::ListingEnriched {
            url: listing.url().to_string(),
            geocoded: listing.coordinate().is_some(),
        });
        listing
    }

    async fn attach_details(&self, listing: &mut EnrichedListing) {
        if listing.details.is_some() {
            return;
        }
        let Some(source) = self.clients.details.get(&listing.candidate.website) else {
            return;
        };
        match source.details(listing.url()).await {
            Ok(details) => {
                if listing.coordinate().is_none() {
                    if let Some(coordinate) = details.coordinate {
                        engine_debug!("{} located from its map", listing.url());
                        listing.set_coordinate(coordinate);
                    }
                }
                listing.details = Some(details);
            }
            Err(err) => engine_warn!("details for {} unavailable: {err}", listing.url()),
        }
    }

    async fn locate(&self, listing: &mut EnrichedListing) {
        if listing.coordinate().is_some() {
            return;
        }
        let Some(query) = listing.geocode_query() else {
            engine_warn!("{} has no address to geocode", listing.url());
            return;
        };
        match self.clients.geocoder.geocode(&query).await {
            Ok(coordinate) => listing.set_coordinate(coordinate),
            Err(err) => engine_warn!("geocoding {} failed: {err}", listing.url()),
        }
    }

    async fn attach_commutes(&self, listing: &mut EnrichedListing, origin: Coordinate) {
        let destination = self.clients.destination;
        if listing.transit.is_none() {
            match self.clients.transit.connection(origin, destination).await {
                Ok(connection) => listing.transit = Some(connection),
                Err(err) => engine_warn!("transit for {} failed: {err}", listing.url()),
            }
        }
        if listing.bike.is_none() {
            match self.clients.bike.route(origin, destination).await {
                Ok(connection) => listing.bike = Some(connection),
                Err(err) => engine_warn!("bike route for {} failed: {err}", listing.url()),
            }
        }
    }
}
