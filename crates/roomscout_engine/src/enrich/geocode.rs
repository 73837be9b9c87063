use std::time::Duration;

use engine_logging::{engine_debug, engine_error};
use roomscout_core::Coordinate;
use serde::Deserialize;
use url::Url;

use super::{ensure_success, http_client, EnrichError, Geocoder};

pub const LOCATIONIQ_BASE_URL: &str = "https://us1.locationiq.com";
const SERVICE: &str = "LocationIQ";

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// Forward geocoding through LocationIQ's search endpoint.
pub struct LocationIqClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl LocationIqClient {
    pub fn new(api_key: Option<String>, base_url: Url) -> Result<Self, EnrichError> {
        Ok(Self {
            client: http_client(Duration::from_secs(5))?,
            base_url,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    fn search_url(&self, key: &str, query: &str) -> Result<Url, EnrichError> {
        let mut url = self
            .base_url
            .join("v1/search.php")
            .map_err(|err| EnrichError::Request(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("key", key)
            .append_pair("q", query)
            .append_pair("format", "json")
            .append_pair("limit", "1");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Geocoder for LocationIqClient {
    async fn geocode(&self, query: &str) -> Result<Coordinate, EnrichError> {
        let Some(key) = self.api_key.as_deref() else {
            engine_error!("LOCATIONIQ_API_KEY not set, cannot geocode {query:?}");
            return Err(EnrichError::MissingApiKey("LOCATIONIQ_API_KEY"));
        };
        let url = self.search_url(key, query)?;
        let response = ensure_success(SERVICE, self.client.get(url).send().await?)?;
        let places: Vec<Place> = response
            .json()
            .await
            .map_err(|err| EnrichError::decode(SERVICE, err))?;
        let place = places.into_iter().next().ok_or(EnrichError::NoResult(SERVICE))?;
        let lat = place.lat.parse::<f64>().map_err(|err| EnrichError::decode(SERVICE, err))?;
        let lon = place.lon.parse::<f64>().map_err(|err| EnrichError::decode(SERVICE, err))?;
        engine_debug!("geocoded {query:?} to {lat},{lon}");
        Ok(Coordinate::new(lat, lon))
    }
}
