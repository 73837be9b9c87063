use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use roomscout_core::{
    Coordinate, EnrichedListing, Leg, LegMode, ListingCandidate, TransitConnection, Website,
};
use serde_json::json;

#[test]
fn enriched_listing_serializes_flat() {
    let mut candidate = ListingCandidate::new(
        "https://www.students.ch/wohnen/details/55501",
        Website::StudentsCh,
    );
    candidate.available_from = NaiveDate::from_ymd_opt(2025, 6, 1);
    let mut listing = EnrichedListing::from_candidate(candidate);
    listing.set_coordinate(Coordinate::new(47.4, 8.5));
    listing.transit = Some(TransitConnection {
        total_min: 12,
        legs: vec![
            Leg {
                mode: LegMode::Walk,
                duration_min: 2,
                coordinate: None,
            },
            Leg {
                mode: LegMode::Transit("S".into()),
                duration_min: 10,
                coordinate: Some(Coordinate::new(47.41, 8.51)),
            },
        ],
    });

    let value = serde_json::to_value(&listing).unwrap();
    assert_eq!(value["website"], json!("students-ch"));
    assert_eq!(value["available_from"], json!("2025-06-01"));
    assert_eq!(value["latitude"], json!(47.4));
    assert_eq!(value["transit"]["legs"][0]["mode"], json!({"kind": "walk"}));
    assert_eq!(
        value["transit"]["legs"][1]["mode"],
        json!({"kind": "transit", "line": "S"})
    );

    let back: EnrichedListing = serde_json::from_value(value).unwrap();
    assert_eq!(back, listing);
}
