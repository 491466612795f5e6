//! Geocoding backed by the Nominatim search API.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ServiceError;
use crate::geo::Coordinates;
use crate::http::{CallScope, DownstreamClient, Endpoint};

/// Peer name of the geocoding provider.
pub const NOMINATIM: &str = "nominatim";

/// Resolves place names to coordinates.
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Best match for `place`, or `None` when nothing matches.
    async fn geocode(
        &self,
        place: &str,
        scope: &CallScope<'_>,
    ) -> Result<Option<Coordinates>, ServiceError>;
}

/// One search hit. Nominatim encodes coordinates as decimal strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl Place {
    fn coordinates(&self) -> Option<Coordinates> {
        let latitude = self.lat.trim().parse().ok()?;
        let longitude = self.lon.trim().parse().ok()?;
        Some(Coordinates::new(latitude, longitude))
    }
}

pub struct NominatimProvider {
    client: DownstreamClient,
    endpoint: Endpoint,
}

impl NominatimProvider {
    pub fn new(client: DownstreamClient, search_url: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: Endpoint::new(NOMINATIM, "nominatim.search", search_url),
        }
    }
}

#[async_trait]
impl GeocodingProvider for NominatimProvider {
    async fn geocode(
        &self,
        place: &str,
        scope: &CallScope<'_>,
    ) -> Result<Option<Coordinates>, ServiceError> {
        let query = [
            ("q", place.to_string()),
            ("format", "jsonv2".to_string()),
            ("limit", "1".to_string()),
        ];
        let reply = self.client.get(&self.endpoint, &query, scope).await?;
        if !reply.is_success() {
            return Err(ServiceError::UpstreamUnavailable {
                service: NOMINATIM,
                reason: format!("responded with {}", reply.status),
            });
        }

        let places: Vec<Place> = reply.decode(NOMINATIM)?;
        match places.first() {
            None => Ok(None),
            Some(hit) => hit
                .coordinates()
                .map(Some)
                .ok_or_else(|| ServiceError::MalformedUpstreamResponse {
                    service: NOMINATIM,
                    reason: format!("unparseable coordinates ({}, {})", hit.lat, hit.lon),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_parses_string_coordinates() {
        let places: Vec<Place> = serde_json::from_str(
            r#"[{"place_id": 1, "lat": "51.5073219", "lon": "-0.1276474", "display_name": "London"}]"#,
        )
        .unwrap();
        assert_eq!(
            places[0].coordinates(),
            Some(Coordinates::new(51.5073219, -0.1276474))
        );
    }

    #[test]
    fn test_place_rejects_garbage() {
        let place = Place {
            lat: "north".into(),
            lon: "0".into(),
        };
        assert_eq!(place.coordinates(), None);
    }
}
