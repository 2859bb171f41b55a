//! Walking directions from a Google-style directions web service.
//!
//! Every call fails closed: transport errors and unexpected payloads are
//! logged and reported as `None`.

use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use crate::{config::AppConfig, services::location::Coordinate};

/// One leg step of a walking route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectionStep {
    /// Instruction text, HTML formatted by the service.
    pub html_instructions: String,
    /// Distance label such as `40 m`.
    pub distance: String,
    /// Duration label such as `1 min`.
    pub duration: String,
    /// Turn hint; empty when the service sends none.
    pub maneuver: String,
}

/// Client for the walking directions web service.
#[derive(Debug, Clone)]
pub struct DirectionsClient {
    http: Client,
    url: String,
    api_key: String,
}

impl DirectionsClient {
    /// Client posting to `url` with `api_key`.
    pub fn new(http: Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    /// Client for the configured provider, `None` when no API key is set.
    pub fn from_config(http: Client, config: &AppConfig) -> Option<Self> {
        config
            .directions_api_key
            .as_ref()
            .map(|key| Self::new(http, config.directions_url.clone(), key.clone()))
    }

    async fn fetch(&self, from: Coordinate, to: Coordinate) -> Option<Value> {
        let origin = format!("{},{}", from.latitude, from.longitude);
        let destination = format!("{},{}", to.latitude, to.longitude);
        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("origin", origin.as_str()),
                ("destination", destination.as_str()),
                ("mode", "walking"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await;

        let body = match response {
            Ok(response) => response.json::<Value>().await,
            Err(err) => {
                warn!(error = %err, "directions request failed");
                return None;
            }
        };
        match body {
            Ok(body) => Some(body),
            Err(err) => {
                warn!(error = %err, "directions response is not JSON");
                None
            }
        }
    }

    /// Encoded overview polyline of the first walking route.
    pub async fn walking_polyline(&self, from: Coordinate, to: Coordinate) -> Option<String> {
        let body = self.fetch(from, to).await?;
        let polyline = polyline_from_response(&body);
        if polyline.is_none() {
            warn!("directions response has no overview polyline");
        }
        polyline
    }

    /// Turn-by-turn steps of the first walking route.
    pub async fn walking_steps(&self, from: Coordinate, to: Coordinate) -> Option<Vec<DirectionStep>> {
        let body = self.fetch(from, to).await?;
        let steps = steps_from_response(&body);
        if steps.is_none() {
            warn!("directions response has no route legs");
        }
        steps
    }
}

/// `routes[0].overview_polyline.points`.
pub fn polyline_from_response(body: &Value) -> Option<String> {
    body.get("routes")?
        .get(0)?
        .get("overview_polyline")?
        .get("points")?
        .as_str()
        .map(str::to_string)
}

/// `routes[0].legs[*].steps[*]`, flattened in travel order.
pub fn steps_from_response(body: &Value) -> Option<Vec<DirectionStep>> {
    let legs = body.get("routes")?.get(0)?.get("legs")?.as_array()?;
    let mut steps = Vec::new();
    for leg in legs {
        for step in leg.get("steps")?.as_array()? {
            steps.push(DirectionStep {
                html_instructions: text(step, &["html_instructions"])?,
                distance: text(step, &["distance", "text"])?,
                duration: text(step, &["duration", "text"])?,
                maneuver: text(step, &["maneuver"]).unwrap_or_default(),
            });
        }
    }
    Some(steps)
}

fn text(value: &Value, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(value, |node, key| node.get(key))?
        .as_str()
        .map(str::to_string)
}

/// Decode an encoded polyline into coordinates (precision 1e-5).
///
/// Truncated input, or deltas that overflow the accumulator, yield `None`.
pub fn decode_polyline(points: &str) -> Option<Vec<Coordinate>> {
    let bytes = points.as_bytes();
    let mut index = 0;
    let mut latitude: i64 = 0;
    let mut longitude: i64 = 0;
    let mut path = Vec::new();

    while index < bytes.len() {
        latitude = latitude.checked_add(next_delta(bytes, &mut index)?)?;
        longitude = longitude.checked_add(next_delta(bytes, &mut index)?)?;
        path.push(Coordinate::new(
            latitude as f64 / 1e5,
            longitude as f64 / 1e5,
        ));
    }
    Some(path)
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_reference_polyline() {
        let path = decode_polyline("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        let expected = [(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)];
        assert_eq!(path.len(), expected.len());
        for (point, (lat, lng)) in path.iter().zip(expected) {
            assert!((point.latitude - lat).abs() < 1e-9);
            assert!((point.longitude - lng).abs() < 1e-9);
        }
        assert_eq!(decode_polyline("").unwrap(), Vec::new());
        assert!(decode_polyline("_p~iF~ps|U_").is_none());
    }

    #[test]
    fn oversized_deltas_fail_closed() {
        let huge = format!("}}{}F", "~".repeat(11));
        assert!(decode_polyline(&huge.repeat(6)).is_none());
    }

    #[test]
    fn extracts_polyline_and_steps() {
        let body = json!({
            "routes": [{
                "overview_polyline": {"points": "_p~iF~ps|U"},
                "legs": [{
                    "steps": [
                        {
                            "html_instructions": "Head <b>north</b>",
                            "distance": {"text": "40 m"},
                            "duration": {"text": "1 min"}
                        },
                        {
                            "html_instructions": "Turn <b>left</b>",
                            "distance": {"text": "0.1 km"},
                            "duration": {"text": "2 mins"},
                            "maneuver": "turn-left"
                        }
                    ]
                }]
            }]
        });

        assert_eq!(polyline_from_response(&body).as_deref(), Some("_p~iF~ps|U"));
        let steps = steps_from_response(&body).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].maneuver, "");
        assert_eq!(steps[1].maneuver, "turn-left");
        assert_eq!(steps[1].distance, "0.1 km");
    }

    #[test]
    fn shape_mismatch_fails_closed() {
        let body = json!({"status": "ZERO_RESULTS", "routes": []});
        assert!(polyline_from_response(&body).is_none());
        assert!(steps_from_response(&body).is_none());

        let body = json!({"routes": [{"legs": [{"steps": [{"html_instructions": "x"}]}]}]});
        assert!(steps_from_response(&body).is_none());
    }

    #[test]
    fn client_requires_api_key() {
        let config = AppConfig::default();
        assert!(DirectionsClient::from_config(Client::new(), &config).is_none());

        let config = AppConfig {
            directions_api_key: Some("key".into()),
            ..AppConfig::default()
        };
        assert!(DirectionsClient::from_config(Client::new(), &config).is_some());
    }
}
