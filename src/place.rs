//! Place-name to timezone resolution.
//!
//! Given the free-text locality from the organization panel, resolve an IANA
//! timezone and coordinates through a geocoding service. Resolution failure
//! is never fatal: callers degrade to UTC via [`tz_or_utc`] and carry on.

use chrono_tz::Tz;
use serde::Deserialize;
use thiserror::Error;

const GEOCODE_ENDPOINT: &str = "https://geocoding-api.open-meteo.com/v1/search";

/// A resolved place: IANA timezone plus coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceResolution {
    pub timezone: Tz,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Error)]
pub enum PlaceError {
    #[error("Geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No geocoding result for '{0}'")]
    NotFound(String),

    #[error("Geocoding response was not understood: {0}")]
    Malformed(String),

    #[error("Unknown IANA timezone '{0}'")]
    UnknownTimezone(String),
}

#[derive(Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeHit>,
}

#[derive(Deserialize)]
struct GeocodeHit {
    latitude: f64,
    longitude: f64,
    timezone: Option<String>,
}

/// Resolve a free-text place name to a timezone and coordinates.
pub async fn resolve_place(
    client: &reqwest::Client,
    name: &str,
) -> Result<PlaceResolution, PlaceError> {
    let body = client
        .get(GEOCODE_ENDPOINT)
        .query(&[("name", name), ("count", "1")])
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    parse_geocode_response(name, &body)
}

/// Parse a geocoding payload. Factored out of the request path so the parse
/// rules are testable without the network.
fn parse_geocode_response(name: &str, body: &str) -> Result<PlaceResolution, PlaceError> {
    let response: GeocodeResponse =
        serde_json::from_str(body).map_err(|e| PlaceError::Malformed(e.to_string()))?;
    let hit = response
        .results
        .into_iter()
        .next()
        .ok_or_else(|| PlaceError::NotFound(name.to_string()))?;
    let tz_name = hit
        .timezone
        .ok_or_else(|| PlaceError::NotFound(name.to_string()))?;
    let timezone: Tz = tz_name
        .parse()
        .map_err(|_| PlaceError::UnknownTimezone(tz_name))?;
    Ok(PlaceResolution {
        timezone,
        latitude: hit.latitude,
        longitude: hit.longitude,
    })
}

/// Unwrap a resolution, degrading to UTC with a warning on failure.
pub fn tz_or_utc(resolved: Result<PlaceResolution, PlaceError>) -> Tz {
    match resolved {
        Ok(place) => place.timezone,
        Err(e) => {
            log::warn!("Timezone resolution failed, falling back to UTC: {e}");
            Tz::UTC
        }
    }
}
