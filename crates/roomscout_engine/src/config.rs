use std::env;

use chrono_tz::Tz;
use roomscout_core::Coordinate;
use url::Url;

use crate::enrich::{LOCATIONIQ_BASE_URL, OPENDATA_BASE_URL, ORS_BASE_URL};

/// ETH Zurich main building.
pub const DEFAULT_DESTINATION: Coordinate = Coordinate {
    latitude: 47.3763,
    longitude: 8.5477,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Settings for the enrichment services, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub locationiq_api_key: Option<String>,
    pub openrouteservice_api_key: Option<String>,
    pub time_zone: Tz,
    pub rate_limit_per_minute: usize,
    pub enrich_workers: usize,
    pub commute_destination: Coordinate,
    pub locationiq_url: Url,
    pub transit_url: Url,
    pub openrouteservice_url: Url,
}

impl EngineConfig {
    /// Reads process environment. Call `dotenvy::dotenv()` first to honour `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let time_zone = match var("TIME_ZONE") {
            Some(raw) => raw
                .trim()
                .parse::<Tz>()
                .map_err(|err| ConfigError::invalid("TIME_ZONE", &raw, err))?,
            None => chrono_tz::Europe::Zurich,
        };
        let rate_limit_per_minute = positive(var("RATE_LIMIT_PER_MINUTE"), "RATE_LIMIT_PER_MINUTE", 40)?;
        let enrich_workers = positive(var("ENRICH_WORKERS"), "ENRICH_WORKERS", 4)?;
        let commute_destination = match var("COMMUTE_DESTINATION") {
            Some(raw) => parse_coordinate(&raw)
                .ok_or_else(|| ConfigError::invalid("COMMUTE_DESTINATION", &raw, "expected lat,lon"))?,
            None => DEFAULT_DESTINATION,
        };

        Ok(Self {
            locationiq_api_key: var("LOCATIONIQ_API_KEY"),
            openrouteservice_api_key: var("OPENROUTESERVICE_API_KEY"),
            time_zone,
            rate_limit_per_minute,
            enrich_workers,
            commute_destination,
            locationiq_url: service_url(var("LOCATIONIQ_URL"), "LOCATIONIQ_URL", LOCATIONIQ_BASE_URL)?,
            transit_url: service_url(var("TRANSIT_URL"), "TRANSIT_URL", OPENDATA_BASE_URL)?,
            openrouteservice_url: service_url(
                var("OPENROUTESERVICE_URL"),
                "OPENROUTESERVICE_URL",
                ORS_BASE_URL,
            )?,
        })
    }
}

fn positive(raw: Option<String>, key: &'static str, default: usize) -> Result<usize, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::invalid(key, &raw, "must be at least 1")),
        Ok(value) => Ok(value),
        Err(err) => Err(ConfigError::invalid(key, &raw, err)),
    }
}

fn service_url(raw: Option<String>, key: &'static str, default: &str) -> Result<Url, ConfigError> {
    let raw = raw.unwrap_or_else(|| default.to_string());
    Url::parse(raw.trim()).map_err(|err| ConfigError::invalid(key, &raw, err))
}

/// `lat,lon` as written by [`Coordinate`]'s `Display`.
pub fn parse_coordinate(raw: &str) -> Option<Coordinate> {
    let (lat, lon) = raw.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon))
        .then(|| Coordinate::new(lat, lon))
}
