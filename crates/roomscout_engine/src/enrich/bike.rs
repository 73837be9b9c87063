use std::time::Duration;

use engine_logging::engine_debug;
use reqwest::header::AUTHORIZATION;
use roomscout_core::{BikeConnection, Coordinate};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{ensure_success, http_client, BikeRouter, EnrichError};

pub const ORS_BASE_URL: &str = "https://api.openrouteservice.org";
const SERVICE: &str = "openrouteservice";

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    summary: Summary,
    geometry: String,
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct Summary {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct Segment {
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct Step {
    way_points: [usize; 2],
}

/// Cycling directions from openrouteservice.
pub struct OpenRouteServiceClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl OpenRouteServiceClient {
    pub fn new(api_key: Option<String>, base_url: Url) -> Result<Self, EnrichError> {
        Ok(Self {
            client: http_client(Duration::from_secs(5))?,
            base_url,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }
}

#[async_trait::async_trait]
impl BikeRouter for OpenRouteServiceClient {
    async fn route(&self, from: Coordinate, to: Coordinate) -> Result<BikeConnection, EnrichError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(EnrichError::MissingApiKey("OPENROUTESERVICE_API_KEY"))?;
        let url = self
            .base_url
            .join("v2/directions/cycling-regular")
            .map_err(|err| EnrichError::Request(err.to_string()))?;
        let body = json!({
            "coordinates": [[from.longitude, from.latitude], [to.longitude, to.latitude]]
        });
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(SERVICE, response)?;
        let directions: DirectionsResponse = response
            .json()
            .await
            .map_err(|err| EnrichError::decode(SERVICE, err))?;
        let connection = best_route(directions)?;
        engine_debug!(
            "bike route {from} -> {to}: {:.1} min, {:.2} km",
            connection.duration_min,
            connection.distance_km
        );
        Ok(connection)
    }
}

fn best_route(directions: DirectionsResponse) -> Result<BikeConnection, EnrichError> {
    let best = directions
        .routes
        .into_iter()
        .min_by(|a, b| a.summary.duration.total_cmp(&b.summary.duration))
        .ok_or(EnrichError::NoResult(SERVICE))?;
    let points = decode_polyline(&best.geometry)
        .ok_or_else(|| EnrichError::decode(SERVICE, "malformed polyline geometry"))?;

    let mut waypoints = Vec::new();
    for step in best.segments.iter().flat_map(|segment| &segment.steps) {
        let [start, end] = step.way_points;
        if start >= points.len() || end < start {
            continue;
        }
        let end = end.min(points.len() - 1);
        waypoints.extend(points[start..=end].iter().step_by(2).copied());
    }

    Ok(BikeConnection {
        duration_min: best.summary.duration / 60.0,
        distance_km: best.summary.distance / 1000.0,
        waypoints,
    })
}

/// Decodes an encoded polyline with five decimal places of precision.
pub fn decode_polyline(encoded: &str) -> Option<Vec<Coordinate>> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let (mut lat, mut lon) = (0i64, 0i64);
    let mut points = Vec::new();

    while index < bytes.len() {
        lat += next_delta(bytes, &mut index)?;
        lon += next_delta(bytes, &mut index)?;
        points.push(Coordinate::new(lat as f64 / 1e5, lon as f64 / 1e5));
    }
    Some(points)
}

fn next_delta(bytes: &[u8], index: &mut usize) -> Option<i64> {
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let byte = i64::from(*bytes.get(*index)?) - 63;
        if !(0..64).contains(&byte) || shift > 60 {
            return None;
        }
        *index += 1;
        result |= (byte & 0x1f) << shift;
        shift += 5;
        if byte < 0x20 {
            break;
        }
    }
    Some(if result & 1 == 1 { !(result >> 1) } else { result >> 1 })
}
