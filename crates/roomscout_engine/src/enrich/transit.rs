use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use engine_logging::{engine_debug, engine_warn};
use roomscout_core::{Coordinate, Leg, LegMode, TransitConnection};
use serde::Deserialize;
use url::Url;

use super::{ensure_success, http_client, EnrichError, TransitRouter};

pub const OPENDATA_BASE_URL: &str = "https://transport.opendata.ch";
const SERVICE: &str = "transport.opendata.ch";

/// Gaps between sections longer than this become wait legs.
const MIN_WAIT_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct ConnectionsResponse {
    #[serde(default)]
    connections: Vec<Connection>,
}

#[derive(Debug, Deserialize)]
struct Connection {
    duration: Option<String>,
    from: Checkpoint,
    #[serde(default)]
    sections: Vec<Section>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Checkpoint {
    departure_timestamp: Option<i64>,
    arrival_timestamp: Option<i64>,
    location: Option<Location>,
}

#[derive(Debug, Deserialize)]
struct Location {
    coordinate: Option<RawCoordinate>,
}

/// `x` is the latitude and `y` the longitude in this API.
#[derive(Debug, Deserialize)]
struct RawCoordinate {
    x: Option<f64>,
    y: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Section {
    departure: Checkpoint,
    arrival: Checkpoint,
    walk: Option<Walk>,
    journey: Option<Journey>,
}

#[derive(Debug, Deserialize)]
struct Walk {
    duration: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Journey {
    category: Option<String>,
}

impl Checkpoint {
    fn coordinate(&self) -> Option<Coordinate> {
        let raw = self.location.as_ref()?.coordinate.as_ref()?;
        Some(Coordinate::new(raw.x?, raw.y?))
    }
}

/// Connections from transport.opendata.ch, queried for Monday 08:00 of the current week.
pub struct OpendataTransitClient {
    client: reqwest::Client,
    base_url: Url,
    time_zone: Tz,
}

impl OpendataTransitClient {
    pub fn new(base_url: Url, time_zone: Tz) -> Result<Self, EnrichError> {
        Ok(Self {
            client: http_client(Duration::from_secs(10))?,
            base_url,
            time_zone,
        })
    }

    fn connections_url(
        &self,
        from: Coordinate,
        to: Coordinate,
        at: NaiveDateTime,
    ) -> Result<Url, EnrichError> {
        let mut url = self
            .base_url
            .join("v1/connections")
            .map_err(|err| EnrichError::Request(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("from", &from.to_string())
            .append_pair("to", &to.to_string())
            .append_pair("date", &at.format("%Y-%m-%d").to_string())
            .append_pair("time", &at.format("%H:%M").to_string());
        Ok(url)
    }
}

#[async_trait::async_trait]
impl TransitRouter for OpendataTransitClient {
    async fn connection(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<TransitConnection, EnrichError> {
        let at = monday_morning(Utc::now().with_timezone(&self.time_zone));
        let url = self.connections_url(from, to, at)?;
        engine_debug!("transit lookup {from} -> {to} at {at}");
        let response = ensure_success(SERVICE, self.client.get(url).send().await?)?;
        let body = response.text().await?;
        summarize(&body)
    }
}

/// Monday 08:00 of the week containing `now`, as local wall-clock time.
pub fn monday_morning<Z: TimeZone>(now: DateTime<Z>) -> NaiveDateTime {
    let today = now.date_naive();
    let monday = today - chrono::Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let eight = NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN);
    monday.and_time(eight)
}

/// Shortest connection in a `/v1/connections` response, as legs.
pub fn summarize(body: &str) -> Result<TransitConnection, EnrichError> {
    let response: ConnectionsResponse =
        serde_json::from_str(body).map_err(|err| EnrichError::decode(SERVICE, err))?;
    let best = response
        .connections
        .iter()
        .filter_map(|c| Some((parse_duration(c.duration.as_deref()?)?, c)))
        .min_by_key(|(secs, _)| *secs);
    let Some((total_secs, best)) = best else {
        engine_warn!("no connection found");
        return Err(EnrichError::NoResult(SERVICE));
    };

    let mut legs = Vec::new();
    let mut previous = best.from.departure_timestamp;
    for section in &best.sections {
        let Some(departure) = section.departure.departure_timestamp.or(previous) else {
            continue;
        };
        let arrival = section.arrival.arrival_timestamp.unwrap_or(departure);

        let wait = departure - previous.unwrap_or(departure);
        if wait > MIN_WAIT_SECS {
            legs.push(Leg {
                mode: LegMode::Wait,
                duration_min: wait / 60,
                coordinate: None,
            });
        }

        let coordinate = section.departure.coordinate();
        if let Some(walk) = &section.walk {
            let secs = walk.duration.filter(|d| *d > 0).unwrap_or(arrival - departure);
            legs.push(Leg {
                mode: LegMode::Walk,
                duration_min: secs / 60,
                coordinate,
            });
        } else if let Some(journey) = &section.journey {
            let category = journey.category.clone().unwrap_or_default();
            legs.push(Leg {
                mode: LegMode::Transit(category),
                duration_min: (arrival - departure) / 60,
                coordinate,
            });
        }
        previous = Some(arrival);
    }

    Ok(TransitConnection {
        total_min: total_secs / 60,
        legs,
    })
}

/// Seconds in a duration such as `00d00:34:00`.
fn parse_duration(text: &str) -> Option<i64> {
    let (days, hms) = text.split_once('d').unwrap_or(("0", text));
    let mut parts = hms.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next()?.parse().ok()?;
    let days: i64 = days.parse().ok()?;
    Some(((days * 24 + hours) * 60 + minutes) * 60 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn durations_include_days() {
        assert_eq!(parse_duration("00d00:34:00"), Some(34 * 60));
        assert_eq!(parse_duration("01d02:00:30"), Some(26 * 3600 + 30));
        assert_eq!(parse_duration("bogus"), None);
    }

    #[test]
    fn monday_morning_of_current_week() {
        let thursday = chrono_tz::Europe::Zurich
            .with_ymd_and_hms(2025, 5, 15, 17, 30, 0)
            .unwrap();
        assert_eq!(
            monday_morning(thursday),
            NaiveDate::from_ymd_opt(2025, 5, 12)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap()
        );
        let monday = chrono_tz::Europe::Zurich
            .with_ymd_and_hms(2025, 5, 12, 6, 0, 0)
            .unwrap();
        assert_eq!(monday_morning(monday).date(), monday.date_naive());
    }

    #[test]
    fn shortest_connection_becomes_legs_with_waits() {
        let body = r#"{"connections": [
            {"duration": "00d00:50:00", "from": {"departureTimestamp": 1000}, "sections": []},
            {"duration": "00d00:30:00", "from": {"departureTimestamp": 1000}, "sections": [
                {"walk": {"duration": 240},
                 "departure": {"departureTimestamp": null, "location": {"coordinate": {"x": 47.38, "y": 8.53}}},
                 "arrival": {"arrivalTimestamp": 1240}},
                {"journey": {"category": "T"},
                 "departure": {"departureTimestamp": 1600, "location": {"coordinate": {"x": 47.37, "y": 8.54}}},
                 "arrival": {"arrivalTimestamp": 2500}}
            ]}
        ]}"#;
        let connection = summarize(body).unwrap();
        assert_eq!(connection.total_min, 30);
        assert_eq!(
            connection.legs,
            vec![
                Leg {
                    mode: LegMode::Walk,
                    duration_min: 4,
                    coordinate: Some(Coordinate::new(47.38, 8.53)),
                },
                Leg {
                    mode: LegMode::Wait,
                    duration_min: 6,
                    coordinate: None,
                },
                Leg {
                    mode: LegMode::Transit("T".into()),
                    duration_min: 15,
                    coordinate: Some(Coordinate::new(47.37, 8.54)),
                },
            ]
        );
    }

    #[test]
    fn empty_response_is_no_result() {
        assert_eq!(
            summarize(r#"{"connections": []}"#),
            Err(EnrichError::NoResult(SERVICE))
        );
    }
}
