use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::GeocodeError;
use crate::model::Coords;

/// Resolves free-text addresses to coordinates. `Ok(None)` means the service
/// found nothing; errors are transport or response failures.
pub trait Geocoder: Send {
    fn resolve(&self, address: &str) -> Result<Option<Coords>, GeocodeError>;
}

/// Geocoder that never finds anything, for offline use
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineGeocoder;

impl Geocoder for OfflineGeocoder {
    fn resolve(&self, _address: &str) -> Result<Option<Coords>, GeocodeError> {
        Ok(None)
    }
}

/// One entry of a Nominatim `format=json` search response
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// Client for a Nominatim-compatible search endpoint
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, user_agent: &str, timeout: Option<Duration>) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Geocoder for NominatimGeocoder {
    fn resolve(&self, address: &str) -> Result<Option<Coords>, GeocodeError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("format", "json"), ("q", address)])
            .send()?;
        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }
        let body = response.text()?;
        debug!(address, bytes = body.len(), "geocoder response");
        first_place(&body)
    }
}

/// Take the first result of a search response, if any
fn first_place(body: &str) -> Result<Option<Coords>, GeocodeError> {
    let places: Vec<Place> = match serde_json::from_str(body) {
        Ok(places) => places,
        Err(_) => return Ok(None),
    };
    let Some(place) = places.into_iter().next() else {
        return Ok(None);
    };

    let lat = place.lat.trim().parse::<f64>().ok();
    let lon = place.lon.trim().parse::<f64>().ok();
    match (lat, lon) {
        (Some(lat), Some(lon)) => match Coords::new(lat, lon) {
            Some(coords) => Ok(Some(coords)),
            None => Err(GeocodeError::InvalidCoordinate { lat: place.lat, lon: place.lon }),
        },
        _ => Err(GeocodeError::InvalidCoordinate { lat: place.lat, lon: place.lon }),
    }
}
