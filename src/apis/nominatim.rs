use crate::app::ports::{HttpClientPort, HttpRequest};
use crate::constants::{BOT_USER_AGENT, NOMINATIM_SEARCH_URL};
use crate::error::{BotError, Result};
use crate::types::Place;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// OpenStreetMap Nominatim search, used to find the street of a venue.
pub struct NominatimClient {
    http: Arc<dyn HttpClientPort>,
    base_url: String,
}

impl NominatimClient {
    pub fn new(http: Arc<dyn HttpClientPort>) -> Self {
        Self::with_base_url(http, NOMINATIM_SEARCH_URL)
    }

    pub fn with_base_url(http: Arc<dyn HttpClientPort>, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    pub fn search_url(&self, amenity: &str, city: &str) -> Result<Url> {
        Ok(Url::parse_with_params(
            &self.base_url,
            &[
                ("amenity", amenity),
                ("city", city),
                ("format", "json"),
                ("addressdetails", "1"),
            ],
        )?)
    }

    pub async fn search(&self, amenity: &str, city: &str) -> Result<Vec<Place>> {
        let url = self.search_url(amenity, city)?;
        debug!(%url, "geocoder lookup");
        let request = HttpRequest::get(url.as_str()).with_header("User-Agent", BOT_USER_AGENT);
        let resp = self.http.execute(request).await?;
        if !resp.is_success() {
            return Err(BotError::Status {
                status: resp.status,
                url: url.to_string(),
            });
        }
        resp.parse_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{HttpResponse, Method};
    use crate::infra::in_memory_http::InMemoryHttp;
    use serde_json::json;

    #[test]
    fn test_search_url_params() {
        let client = NominatimClient::new(Arc::new(InMemoryHttp::new()));
        let url = client.search_url("Club X", "Bern").unwrap();
        assert_eq!(
            url.query(),
            Some("amenity=Club+X&city=Bern&format=json&addressdetails=1")
        );
    }

    #[tokio::test]
    async fn test_search_parses_places_and_identifies_itself() {
        let http = Arc::new(InMemoryHttp::new());
        http.on(
            Method::Get,
            NOMINATIM_SEARCH_URL,
            vec![HttpResponse::json(
                200,
                json!([{
                    "name": "Club X", "lat": "46.9", "lon": "7.4", "type": "nightclub",
                    "address": {"road": "Main 1", "city": "Bern", "postcode": "3000"},
                    "display_name": "Club X, Main 1, Bern"
                }]),
            )],
        );
        let client = NominatimClient::new(http.clone());

        let places = client.search("Club X", "Bern").await.unwrap();

        assert_eq!(places[0].place_type, "nightclub");
        assert_eq!(places[0].address.road, "Main 1");
        assert_eq!(http.requests()[0].header("user-agent"), Some(BOT_USER_AGENT));
    }
}
