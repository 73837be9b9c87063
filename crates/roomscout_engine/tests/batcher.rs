mod support;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use roomscout_core::{
    BikeConnection, Coordinate, EnrichedListing, ListingCandidate, TransitConnection, Website,
};
use roomscout_engine::{
    BatchSettings, EnrichmentBatcher, EnrichmentClients, NullSink, PipelineEvent, RecordingSink,
};
use support::{init_logging, FailingBike, FixedBike, FixedTransit, StaticDetails, TableGeocoder};

const ETH: Coordinate = Coordinate {
    latitude: 47.3763,
    longitude: 8.5477,
};

fn candidate(n: u32) -> ListingCandidate {
    let mut candidate = ListingCandidate::new(
        format!("https://www.wgzimmer.ch/wglink/de/{n}.html"),
        Website::WgZimmer,
    );
    candidate.address = Some(format!("Street {n}"));
    candidate
}

fn spot(n: u32) -> Coordinate {
    Coordinate::new(47.0 + f64::from(n) / 100.0, 8.5)
}

fn settings() -> BatchSettings {
    BatchSettings {
        max_per_minute: 2,
        workers: 2,
        window: Duration::from_secs(60),
    }
}

#[tokio::test(start_paused = true)]
async fn one_failed_geocode_leaves_the_rest_intact() {
    init_logging();
    let mut geocoder = TableGeocoder::new();
    for n in [1, 2, 4, 5] {
        geocoder = geocoder.answer(&format!("Street {n}, Switzerland"), spot(n));
    }
    let transit = Arc::new(FixedTransit::default());
    let bike = Arc::new(FailingBike::default());
    let clients = EnrichmentClients::new(Arc::new(geocoder), transit.clone(), bike.clone(), ETH);
    let batcher = EnrichmentBatcher::new(clients, settings());

    let input: Vec<ListingCandidate> = (1..=5).map(candidate).collect();
    let enriched = batcher.enrich(input.clone(), &NullSink).await;

    assert_eq!(enriched.len(), 5);
    let urls: Vec<&str> = enriched.iter().map(EnrichedListing::url).collect();
    let expected: Vec<&str> = input.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(urls, expected);

    assert_eq!(enriched[2].coordinate(), None);
    assert!(enriched[2].transit.is_none());
    for index in [0, 1, 3, 4] {
        let n = index as u32 + 1;
        assert_eq!(enriched[index].coordinate(), Some(spot(n)));
        assert_eq!(enriched[index].transit.as_ref().map(|t| t.total_min), Some(20));
        assert_eq!(enriched[index].bike, None);
    }
    assert_eq!(*transit.calls.lock().unwrap(), 4);
    assert_eq!(*bike.calls.lock().unwrap(), 4);
}

#[tokio::test(start_paused = true)]
async fn listings_are_started_at_most_capacity_per_window() {
    let clients = EnrichmentClients::new(
        Arc::new(TableGeocoder::new()),
        Arc::new(FixedTransit::default()),
        Arc::new(FixedBike),
        ETH,
    );
    let batcher = EnrichmentBatcher::new(clients, settings());

    let started = tokio::time::Instant::now();
    let enriched = batcher.enrich((1..=5).map(candidate).collect(), &NullSink).await;
    let elapsed = started.elapsed();

    assert_eq!(enriched.len(), 5);
    // Three windows of 2, 2 and 1: two full waits, none after the last.
    assert!(elapsed >= Duration::from_secs(120), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(180), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn known_enrichment_is_not_looked_up_again() {
    let geocoder = Arc::new(TableGeocoder::new());
    let transit = Arc::new(FixedTransit::default());
    let clients = EnrichmentClients::new(geocoder.clone(), transit.clone(), Arc::new(FixedBike), ETH);
    let batcher = EnrichmentBatcher::new(clients, settings());

    let mut listing = EnrichedListing::from_candidate(candidate(1));
    listing.set_coordinate(spot(1));
    listing.transit = Some(TransitConnection {
        total_min: 31,
        legs: Vec::new(),
    });
    listing.bike = Some(BikeConnection {
        duration_min: 9.0,
        distance_km: 2.0,
        waypoints: Vec::new(),
    });

    let enriched = batcher.enrich_listings(vec![listing.clone()], &NullSink).await;

    assert_eq!(enriched, vec![listing]);
    assert_eq!(geocoder.call_count(), 0);
    assert_eq!(*transit.calls.lock().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn detail_address_is_preferred_for_geocoding() {
    let detail_query = "Universitätstrasse 6, 8006 Zürich, Zürich (Stadt), Switzerland";
    let geocoder = Arc::new(TableGeocoder::new().answer(detail_query, ETH));
    let clients = EnrichmentClients::new(
        geocoder.clone(),
        Arc::new(FixedTransit::default()),
        Arc::new(FixedBike),
        ETH,
    )
    .with_details(Website::WgZimmer, Arc::new(StaticDetails));
    let batcher = EnrichmentBatcher::new(clients, settings());

    let woko = ListingCandidate::new(
        "https://www.woko.ch/de/zimmer-in-zuerich-details/7",
        Website::Woko,
    );
    let sink = RecordingSink::new();
    let enriched = batcher.enrich(vec![candidate(1), woko], &sink).await;

    assert_eq!(enriched[0].coordinate(), Some(ETH));
    assert!(enriched[0].details.is_some());
    assert_eq!(enriched[0].bike.as_ref().map(|b| b.distance_km), Some(3.4));
    assert_eq!(*geocoder.calls.lock().unwrap(), vec![detail_query.to_string()]);

    // No detail source and no address: nothing to look up.
    assert!(enriched[1].details.is_none());
    assert_eq!(enriched[1].coordinate(), None);

    let mut located: Vec<(String, bool)> = sink
        .take()
        .into_iter()
        .filter_map(|event| match event {
            PipelineEvent::ListingEnriched { url, geocoded } => Some((url, geocoded)),
            _ => None,
        })
        .collect();
    located.sort();
    assert_eq!(
        located,
        [
            ("https://www.wgzimmer.ch/wglink/de/1.html".to_string(), true),
            (
                "https://www.woko.ch/de/zimmer-in-zuerich-details/7".to_string(),
                false
            ),
        ]
    );
}

#[tokio::test]
async fn empty_input_returns_immediately() {
    let clients = EnrichmentClients::new(
        Arc::new(TableGeocoder::new()),
        Arc::new(FixedTransit::default()),
        Arc::new(FixedBike),
        ETH,
    );
    let batcher = EnrichmentBatcher::new(clients, BatchSettings::default());
    assert!(batcher.enrich(Vec::new(), &NullSink).await.is_empty());
}
