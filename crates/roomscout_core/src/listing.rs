use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Housing site a listing was discovered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Website {
    WgZimmer,
    Woko,
    StudentsCh,
}

impl Website {
    pub const ALL: [Website; 3] = [Website::WgZimmer, Website::Woko, Website::StudentsCh];

    /// Base URL used to resolve relative links found on the site.
    pub fn base_url(self) -> &'static str {
        match self {
            Website::WgZimmer => "https://www.wgzimmer.ch",
            Website::Woko => "https://www.woko.ch",
            Website::StudentsCh => "https://www.students.ch",
        }
    }

    pub fn host(self) -> &'static str {
        match self {
            Website::WgZimmer => "wgzimmer.ch",
            Website::Woko => "woko.ch",
            Website::StudentsCh => "students.ch",
        }
    }
}

impl fmt::Display for Website {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.host())
    }
}

/// A listing discovered during one page parse, not yet enriched.
///
/// `url` is the canonical absolute URL and the identity of the listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingCandidate {
    pub url: String,
    pub website: Website,
    pub posted: Option<NaiveDate>,
    pub available_from: Option<NaiveDate>,
    pub price_chf: Option<f64>,
    pub address: Option<String>,
    pub image_url: Option<String>,
}

impl ListingCandidate {
    /// Candidate with only its identity known; every raw field unset.
    pub fn new(url: impl Into<String>, website: Website) -> Self {
        Self {
            url: url.into(),
            website,
            posted: None,
            available_from: None,
            price_chf: None,
            address: None,
            image_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "line", rename_all = "snake_case")]
pub enum LegMode {
    Walk,
    Wait,
    /// A scheduled line, tagged with the operator's category code (`T`, `B`, `S`, `IR`, ...).
    Transit(String),
}

/// One segment of a journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub mode: LegMode,
    pub duration_min: i64,
    pub coordinate: Option<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitConnection {
    pub total_min: i64,
    pub legs: Vec<Leg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BikeConnection {
    pub duration_min: f64,
    pub distance_km: f64,
    pub waypoints: Vec<Coordinate>,
}

/// Facts only available on a listing's own detail page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingDetails {
    pub region: Option<String>,
    pub street: Option<String>,
    pub locality: Option<String>,
    pub description: Option<String>,
    pub looking_for: Option<String>,
    pub about_us: Option<String>,
    pub image_urls: Vec<String>,
    pub coordinate: Option<Coordinate>,
}

impl ListingDetails {
    /// Geocoding query built from street, locality and region.
    ///
    /// `None` unless all three parts are present.
    pub fn geocode_query(&self) -> Option<String> {
        let street = non_empty(self.street.as_deref())?;
        let locality = non_empty(self.locality.as_deref())?;
        let region = non_empty(self.region.as_deref())?;
        Some(format!("{street}, {locality}, {region}, Switzerland"))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A candidate plus everything enrichment managed to attach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedListing {
    #[serde(flatten)]
    pub candidate: ListingCandidate,
    pub details: Option<ListingDetails>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub transit: Option<TransitConnection>,
    pub bike: Option<BikeConnection>,
}

impl EnrichedListing {
    pub fn from_candidate(candidate: ListingCandidate) -> Self {
        Self {
            candidate,
            details: None,
            latitude: None,
            longitude: None,
            transit: None,
            bike: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.candidate.url
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        }
    }

    pub fn set_coordinate(&mut self, coordinate: Coordinate) {
        self.latitude = Some(coordinate.latitude);
        self.longitude = Some(coordinate.longitude);
    }

    /// Address to geocode: the detail-page address when complete, else the raw list address.
    pub fn geocode_query(&self) -> Option<String> {
        self.details
            .as_ref()
            .and_then(ListingDetails::geocode_query)
            .or_else(|| {
                non_empty(self.candidate.address.as_deref())
                    .map(|addr| format!("{addr}, Switzerland"))
            })
    }
}
