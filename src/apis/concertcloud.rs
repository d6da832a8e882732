use crate::apis::{decode_events, EventSource};
use crate::app::ports::{HttpClientPort, HttpRequest};
use crate::constants::{CONCERTCLOUD_EVENTS_URL, NO_CITY};
use crate::error::{BotError, Result};
use crate::types::{EventPage, SourceEvent};
use std::sync::Arc;
use tracing::{error, info, instrument};
use url::Url;

/// Query parameters understood by the ConcertCloud events endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    pub city: String,
    pub country: Option<String>,
    pub limit: Option<String>,
    pub page: Option<String>,
    pub radius: Option<String>,
    pub date: Option<String>,
}

impl EventQuery {
    pub fn for_city(city: &str) -> Self {
        Self {
            city: city.to_string(),
            ..Self::default()
        }
    }

    /// Upstream request URL. `city` is always present so that an unset
    /// city falls back to a value that matches nothing.
    pub fn to_url(&self, base: &str) -> Result<Url> {
        let mut url = Url::parse(base)?;
        {
            let mut pairs = url.query_pairs_mut();
            let city = if self.city.is_empty() { NO_CITY } else { &self.city };
            pairs.append_pair("city", city);
            let optional = [
                ("country", &self.country),
                ("limit", &self.limit),
                ("page", &self.page),
                ("radius", &self.radius),
                ("date", &self.date),
            ];
            for (name, value) in optional {
                if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                    pairs.append_pair(name, value);
                }
            }
        }
        Ok(url)
    }
}

pub struct ConcertCloudApi {
    http: Arc<dyn HttpClientPort>,
    base_url: String,
    query: EventQuery,
}

impl ConcertCloudApi {
    pub fn new(http: Arc<dyn HttpClientPort>, query: EventQuery) -> Self {
        Self::with_base_url(http, CONCERTCLOUD_EVENTS_URL, query)
    }

    pub fn with_base_url(http: Arc<dyn HttpClientPort>, base_url: &str, query: EventQuery) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            query,
        }
    }
}

#[async_trait::async_trait]
impl EventSource for ConcertCloudApi {
    fn source_name(&self) -> &str {
        "concertcloud"
    }

    #[instrument(skip(self), fields(city = %self.query.city))]
    async fn fetch_events(&self) -> Result<Vec<SourceEvent>> {
        let url = self.query.to_url(&self.base_url)?;
        let resp = self.http.execute(HttpRequest::get(url.as_str())).await?;
        if !resp.is_success() {
            return Err(BotError::Status {
                status: resp.status,
                url: url.to_string(),
            });
        }

        match resp.parse_json::<EventPage>() {
            Ok(page) => {
                let received = page.records.len();
                let events = decode_events(page.records);
                info!(
                    "Fetched {} events from ConcertCloud (page {} of {}, {} total, {} skipped)",
                    events.len(),
                    page.page,
                    page.last_page,
                    page.total,
                    received - events.len()
                );
                Ok(events)
            }
            Err(e) => {
                error!(error = %e, "ConcertCloud returned malformed JSON, treating as empty batch");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{HttpResponse, Method};
    use crate::infra::in_memory_http::InMemoryHttp;
    use serde_json::json;

    #[test]
    fn test_query_always_carries_city() {
        let url = EventQuery::default().to_url(CONCERTCLOUD_EVENTS_URL).unwrap();
        assert_eq!(url.query(), Some("city=X"));
    }

    #[test]
    fn test_query_encodes_optional_params_in_order() {
        let query = EventQuery {
            city: "Biel/Bienne".into(),
            country: Some("Switzerland".into()),
            limit: Some("50".into()),
            page: None,
            radius: Some(String::new()),
            date: Some("2025-06-01".into()),
        };
        let url = query.to_url(CONCERTCLOUD_EVENTS_URL).unwrap();
        assert_eq!(
            url.query(),
            Some("city=Biel%2FBienne&country=Switzerland&limit=50&date=2025-06-01")
        );
    }

    #[tokio::test]
    async fn test_fetch_events_reads_data_array() {
        let http = Arc::new(InMemoryHttp::new());
        http.on(
            Method::Get,
            CONCERTCLOUD_EVENTS_URL,
            vec![HttpResponse::json(
                200,
                json!({
                    "data": [{
                        "title": "Gig", "location": "Club X", "city": "Bern",
                        "url": "https://ex.com/e/1", "date": "2025-06-01T20:00:00+02:00"
                    }],
                    "page": 1, "limit": 10, "total": 1, "last_page": 1
                }),
            )],
        );
        let api = ConcertCloudApi::new(http.clone(), EventQuery::for_city("Bern"));

        let events = api.fetch_events().await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].location, "Club X");
        assert!(http.requests()[0].url.ends_with("?city=Bern"));
    }

    #[tokio::test]
    async fn test_dateless_record_is_skipped_not_the_page() {
        let http = Arc::new(InMemoryHttp::new());
        http.on(
            Method::Get,
            CONCERTCLOUD_EVENTS_URL,
            vec![HttpResponse::json(
                200,
                json!({
                    "data": [
                        {"title": "Gig", "url": "https://ex.com/e/1", "date": "2025-06-01T20:00:00+02:00"},
                        {"title": "Date TBA", "url": "https://ex.com/e/2", "date": null}
                    ],
                    "page": 1, "limit": 10, "total": 2, "last_page": 1
                }),
            )],
        );
        let api = ConcertCloudApi::new(http, EventQuery::for_city("Bern"));

        let events = api.fetch_events().await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].url, "https://ex.com/e/1");
    }

    #[tokio::test]
    async fn test_malformed_payload_is_an_empty_batch() {
        let http = Arc::new(InMemoryHttp::new());
        http.on(
            Method::Get,
            CONCERTCLOUD_EVENTS_URL,
            vec![HttpResponse::new(200, "<html>maintenance</html>")],
        );
        let api = ConcertCloudApi::new(http, EventQuery::for_city("Bern"));
        assert!(api.fetch_events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        let http = Arc::new(InMemoryHttp::new());
        http.fail(Method::Get, CONCERTCLOUD_EVENTS_URL, "dns failure");
        let api = ConcertCloudApi::new(http, EventQuery::for_city("Bern"));
        assert!(matches!(api.fetch_events().await, Err(BotError::Transport(_))));
    }
}
