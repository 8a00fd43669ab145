//! Address geocoding.
//!
//! [`Geocoder`] turns a free-form address or zipcode into candidate
//! coordinates. Only the first candidate is ever used. [`MapQuestGeocoder`]
//! calls the MapQuest HTTP API; [`StaticGeocoder`] answers from a fixed table
//! and backs tests, seeding and offline runs.

use async_trait::async_trait;
use devcamper_core::model::location::GeocodedAddress;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const MAPQUEST_URL: &str = "https://www.mapquestapi.com/geocoding/v1/address";
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocoder returned status {0}")]
    Status(u16),

    #[error("geocoder fixtures: {0}")]
    Fixtures(String),

    #[error("geocoder misconfigured: {0}")]
    Config(String),
}

/// Address lookup service.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Candidate matches for `query`, best first. An unknown address is an
    /// empty list, not an error.
    async fn geocode(&self, query: &str) -> Result<Vec<GeocodedAddress>, GeocodeError>;
}

/// Best match for `query`, if any.
pub async fn first_match(
    geocoder: &dyn Geocoder,
    query: &str,
) -> Result<Option<GeocodedAddress>, GeocodeError> {
    Ok(geocoder.geocode(query).await?.into_iter().next())
}

/// Provider selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GeocoderProvider {
    Mapquest,
    Static,
}

/// Geocoder command-line flags, shared by the server and the seeder.
#[derive(Debug, Clone, clap::Args)]
pub struct GeocoderArgs {
    /// Geocoding provider
    #[arg(long, env = "GEOCODER_PROVIDER", value_enum, default_value_t = GeocoderProvider::Static)]
    pub geocoder_provider: GeocoderProvider,

    /// API key for the mapquest provider
    #[arg(long, env = "GEOCODER_API_KEY", hide_env_values = true)]
    pub geocoder_api_key: Option<String>,

    /// JSON file mapping queries to addresses, for the static provider
    #[arg(long, env = "GEOCODER_FIXTURES")]
    pub geocoder_fixtures: Option<PathBuf>,
}

impl GeocoderArgs {
    pub fn build(&self) -> Result<Arc<dyn Geocoder>, GeocodeError> {
        build_geocoder(
            self.geocoder_provider,
            self.geocoder_api_key.as_deref(),
            self.geocoder_fixtures.as_deref(),
        )
    }
}

/// Build the configured geocoder. `mapquest` needs an API key; `static`
/// loads `fixtures` when given and is empty otherwise.
pub fn build_geocoder(
    provider: GeocoderProvider,
    api_key: Option<&str>,
    fixtures: Option<&Path>,
) -> Result<Arc<dyn Geocoder>, GeocodeError> {
    match provider {
        GeocoderProvider::Mapquest => {
            let key = api_key
                .filter(|k| !k.is_empty())
                .ok_or_else(|| GeocodeError::Config("mapquest requires GEOCODER_API_KEY".into()))?;
            Ok(Arc::new(MapQuestGeocoder::new(key)?))
        }
        GeocoderProvider::Static => match fixtures {
            Some(path) => Ok(Arc::new(StaticGeocoder::from_file(path)?)),
            None => Ok(Arc::new(StaticGeocoder::default())),
        },
    }
}

/// MapQuest geocoding API client.
pub struct MapQuestGeocoder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl MapQuestGeocoder {
    pub fn new(api_key: &str) -> Result<Self, GeocodeError> {
        Self::with_base_url(api_key, MAPQUEST_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct MapQuestResponse {
    #[serde(default)]
    results: Vec<MapQuestResult>,
}

#[derive(Debug, Deserialize)]
struct MapQuestResult {
    #[serde(default)]
    locations: Vec<MapQuestLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapQuestLocation {
    lat_lng: MapQuestLatLng,
    #[serde(default)]
    street: Option<String>,
    /// City.
    #[serde(default, rename = "adminArea5")]
    admin_area5: Option<String>,
    /// State.
    #[serde(default, rename = "adminArea3")]
    admin_area3: Option<String>,
    /// Country.
    #[serde(default, rename = "adminArea1")]
    admin_area1: Option<String>,
    #[serde(default)]
    postal_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MapQuestLatLng {
    lat: f64,
    lng: f64,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl MapQuestLocation {
    fn into_address(self) -> GeocodedAddress {
        let street = non_empty(self.street);
        let city = non_empty(self.admin_area5);
        let state = non_empty(self.admin_area3);
        let zipcode = non_empty(self.postal_code);
        let country = non_empty(self.admin_area1);
        let state_zip = match (&state, &zipcode) {
            (Some(s), Some(z)) => Some(format!("{s} {z}")),
            (Some(s), None) => Some(s.clone()),
            (None, z) => z.clone(),
        };
        let formatted: Vec<String> = [street.clone(), city.clone(), state_zip, country.clone()]
            .into_iter()
            .flatten()
            .collect();
        GeocodedAddress {
            latitude: self.lat_lng.lat,
            longitude: self.lat_lng.lng,
            formatted_address: (!formatted.is_empty()).then(|| formatted.join(", ")),
            street_name: street,
            city,
            state,
            zipcode,
            country,
        }
    }
}

fn parse_mapquest(response: MapQuestResponse) -> Vec<GeocodedAddress> {
    response
        .results
        .into_iter()
        .next()
        .map(|r| r.locations.into_iter().map(MapQuestLocation::into_address).collect())
        .unwrap_or_default()
}

#[async_trait]
impl Geocoder for MapQuestGeocoder {
    async fn geocode(&self, query: &str) -> Result<Vec<GeocodedAddress>, GeocodeError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("key", self.api_key.as_str()), ("location", query)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }
        let body: MapQuestResponse = response.json().await?;
        let matches = parse_mapquest(body);
        tracing::debug!(query, matches = matches.len(), "mapquest geocode");
        Ok(matches)
    }
}

/// Geocoder backed by a fixed query → address table. Queries are matched
/// case-insensitively after trimming.
#[derive(Debug, Default, Clone)]
pub struct StaticGeocoder {
    entries: HashMap<String, GeocodedAddress>,
}

fn normalize(query: &str) -> String {
    query.trim().to_lowercase()
}

impl StaticGeocoder {
    pub fn new(entries: impl IntoIterator<Item = (String, GeocodedAddress)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(query, address)| (normalize(&query), address))
                .collect(),
        }
    }

    /// Load a JSON object mapping queries to addresses.
    pub fn from_file(path: &Path) -> Result<Self, GeocodeError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| GeocodeError::Fixtures(format!("{}: {e}", path.display())))?;
        let entries: HashMap<String, GeocodedAddress> = serde_json::from_str(&raw)
            .map_err(|e| GeocodeError::Fixtures(format!("{}: {e}", path.display())))?;
        tracing::info!(entries = entries.len(), path = %path.display(), "Loaded geocoder fixtures");
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, query: &str) -> Result<Vec<GeocodedAddress>, GeocodeError> {
        Ok(self
            .entries
            .get(&normalize(query))
            .cloned()
            .into_iter()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn boston() -> GeocodedAddress {
        GeocodedAddress {
            latitude: 42.35,
            longitude: -71.1,
            formatted_address: None,
            street_name: None,
            city: Some("Boston".into()),
            state: Some("MA".into()),
            zipcode: Some("02215".into()),
            country: Some("US".into()),
        }
    }

    #[tokio::test]
    async fn test_static_lookup_is_case_insensitive() {
        let geo = StaticGeocoder::new([("02215".to_string(), boston())]);
        assert_eq!(geo.len(), 1);
        let found = first_match(&geo, " 02215 ").await.unwrap();
        assert_eq!(found, Some(boston()));
        assert!(first_match(&geo, "99999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_static_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("geo.json");
        std::fs::write(
            &path,
            json!({"233 Bay State Rd Boston MA 02215": {"latitude": 42.35, "longitude": -71.1}})
                .to_string(),
        )
        .unwrap();
        let geo = StaticGeocoder::from_file(&path).unwrap();
        let hits = geo.geocode("233 bay state rd boston ma 02215").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].longitude, -71.1);

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            StaticGeocoder::from_file(&path),
            Err(GeocodeError::Fixtures(_))
        ));
    }

    #[test]
    fn test_parse_mapquest_response() {
        let body: MapQuestResponse = serde_json::from_value(json!({
            "results": [{
                "providedLocation": {"location": "02118"},
                "locations": [{
                    "street": "",
                    "adminArea5": "Boston",
                    "adminArea3": "MA",
                    "adminArea1": "US",
                    "postalCode": "02118",
                    "latLng": {"lat": 42.3374, "lng": -71.0726}
                }]
            }]
        }))
        .unwrap();
        let matches = parse_mapquest(body);
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.latitude, 42.3374);
        assert_eq!(m.street_name, None);
        assert_eq!(m.city.as_deref(), Some("Boston"));
        assert_eq!(m.formatted_address.as_deref(), Some("Boston, MA 02118, US"));
    }

    #[test]
    fn test_parse_mapquest_empty() {
        let body: MapQuestResponse = serde_json::from_value(json!({"results": []})).unwrap();
        assert!(parse_mapquest(body).is_empty());
    }

    #[test]
    fn test_build_geocoder_requires_key() {
        assert!(matches!(
            build_geocoder(GeocoderProvider::Mapquest, None, None),
            Err(GeocodeError::Config(_))
        ));
        assert!(build_geocoder(GeocoderProvider::Static, None, None).is_ok());
    }
}
