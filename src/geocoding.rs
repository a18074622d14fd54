use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::config::GeocodingConfig;
use crate::geo_utils::GeoPoint;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeocodeRequest {
    /// What the user typed; used in the spoken feedback.
    pub query: String,
    /// `query` scoped to the estate's region, sent to the service.
    pub scoped_query: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GeocodeError {
    Timeout,
    Http(String),
    InvalidResponse(String),
}

impl fmt::Display for GeocodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeocodeError::Timeout => write!(f, "geocoding request timed out"),
            GeocodeError::Http(e) => write!(f, "geocoding request failed: {}", e),
            GeocodeError::InvalidResponse(e) => write!(f, "invalid geocoding response: {}", e),
        }
    }
}

impl std::error::Error for GeocodeError {}

/// Free-text address lookup. `Ok(None)` means the service found nothing.
pub trait GeocodingService: Send + Sync {
    fn geocode(
        &self,
        request: &GeocodeRequest,
    ) -> impl Future<Output = Result<Option<GeoPoint>, GeocodeError>> + Send;
}

pub struct NominatimGeocoder {
    http: reqwest::Client,
    service_url: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodingConfig) -> anyhow::Result<Self> {
        // Nominatim's usage policy requires an identifying User-Agent.
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(NominatimGeocoder {
            http,
            service_url: config.service_url.clone(),
        })
    }
}

// Nominatim returns coordinates as strings.
#[derive(Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

pub fn parse_nominatim_response(body: &[u8]) -> Result<Option<GeoPoint>, GeocodeError> {
    let places: Vec<Place> =
        serde_json::from_slice(body).map_err(|e| GeocodeError::InvalidResponse(e.to_string()))?;
    match places.first() {
        None => Ok(None),
        Some(place) => {
            let lat = place.lat.parse::<f64>();
            let lon = place.lon.parse::<f64>();
            match (lat, lon) {
                (Ok(lat), Ok(lon)) => Ok(Some(GeoPoint::new(lat, lon))),
                _ => Err(GeocodeError::InvalidResponse(format!(
                    "bad coordinates: {}, {}",
                    place.lat, place.lon
                ))),
            }
        }
    }
}

impl GeocodingService for NominatimGeocoder {
    async fn geocode(&self, request: &GeocodeRequest) -> Result<Option<GeoPoint>, GeocodeError> {
        let response = self
            .http
            .get(&self.service_url)
            .query(&[
                ("format", "json"),
                ("limit", "1"),
                ("q", request.scoped_query.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeocodeError::Timeout
                } else {
                    GeocodeError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(GeocodeError::Http(format!(
                "HTTP {} from {}",
                response.status(),
                self.service_url
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GeocodeError::Http(e.to_string()))?;
        parse_nominatim_response(&bytes)
    }
}
