//! Geocoding and commute lookups, and the throttled batcher that runs them.
mod batcher;
mod bike;
mod geocode;
mod transit;

use roomscout_core::{BikeConnection, Coordinate, TransitConnection};

use crate::FetchError;

pub use batcher::{BatchSettings, EnrichmentBatcher, EnrichmentClients};
pub use bike::{decode_polyline, OpenRouteServiceClient, ORS_BASE_URL};
pub use geocode::{LocationIqClient, LOCATIONIQ_BASE_URL};
pub use transit::{monday_morning, summarize, OpendataTransitClient, OPENDATA_BASE_URL};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnrichError {
    #[error("{0} is not configured")]
    MissingApiKey(&'static str),
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected status {status} from {service}")]
    Status { service: &'static str, status: u16 },
    #[error("could not decode {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
    #[error("{0} returned no result")]
    NoResult(&'static str),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl EnrichError {
    pub(crate) fn decode(service: &'static str, message: impl ToString) -> Self {
        EnrichError::Decode {
            service,
            message: message.to_string(),
        }
    }
}

impl From<reqwest::Error> for EnrichError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if err.is_status() => EnrichError::Status {
                service: "http",
                status: status.as_u16(),
            },
            _ => EnrichError::Request(err.to_string()),
        }
    }
}

/// Address to coordinate lookup.
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Coordinate, EnrichError>;
}

/// Public transport connection from `from` to `to`.
#[async_trait::async_trait]
pub trait TransitRouter: Send + Sync {
    async fn connection(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<TransitConnection, EnrichError>;
}

#[async_trait::async_trait]
pub trait BikeRouter: Send + Sync {
    async fn route(&self, from: Coordinate, to: Coordinate) -> Result<BikeConnection, EnrichError>;
}

/// Shared HTTP client for the enrichment services.
pub(crate) fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client, EnrichError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(crate::fetch::USER_AGENT)
        .build()
        .map_err(|err| EnrichError::Request(err.to_string()))
}

/// Fails with [`EnrichError::Status`] on a non-success response.
pub(crate) fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, EnrichError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(EnrichError::Status {
            service,
            status: status.as_u16(),
        })
    }
}
