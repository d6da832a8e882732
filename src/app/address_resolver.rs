use crate::apis::nominatim::NominatimClient;
use crate::constants::{ADDRESS_SEARCH_PAUSE, VENUE_PLACE_TYPES};
use crate::error::Result;
use crate::graphql::MobilizonClient;
use crate::storage::AddressCache;
use crate::types::{CanonicalAddress, Place, SourceEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Two-step venue lookup: the geocoder supplies the street, then the
/// destination's own `searchAddress` supplies the address object it will accept.
pub struct AddressResolver {
    geocoder: NominatimClient,
    graphql: Arc<MobilizonClient>,
    pause: Duration,
}

impl AddressResolver {
    pub fn new(geocoder: NominatimClient, graphql: Arc<MobilizonClient>) -> Self {
        Self {
            geocoder,
            graphql,
            pause: ADDRESS_SEARCH_PAUSE,
        }
    }

    /// Resolve every distinct venue of the batch before any event is published.
    pub async fn resolve_all(&self, events: &[SourceEvent], cache: &mut AddressCache) -> Result<usize> {
        let mut resolved = 0;
        for event in events {
            if self.resolve(event, cache).await?.is_some() {
                resolved += 1;
            }
        }
        info!(resolved, total = events.len(), "address pass finished");
        Ok(resolved)
    }

    /// Cached lookup. `Ok(None)` means the destination knows no such address
    /// and the event will be published without one.
    #[instrument(skip(self, cache), fields(location = %event.location, city = %event.city))]
    pub async fn resolve(
        &self,
        event: &SourceEvent,
        cache: &mut AddressCache,
    ) -> Result<Option<CanonicalAddress>> {
        if let Some(hit) = cache.get(&event.location, &event.city) {
            debug!("Skipping cached location");
            return Ok(Some(hit.clone()));
        }

        let probe = self.probe(event).await;
        debug!(%probe, "searching destination addresses");
        let found = match self.graphql.search_address(&probe).await {
            Ok(found) => found,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, "searchAddress failed, retrying once");
                tokio::time::sleep(self.pause).await;
                match self.graphql.search_address(&probe).await {
                    Ok(found) => found,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(error = %e, "searchAddress failed again");
                        Vec::new()
                    }
                }
            }
        };

        let Some(address) = pick_address(found, event) else {
            info!(%probe, "Address not found");
            return Ok(None);
        };
        cache.insert(&event.location, &event.city, address.clone());
        Ok(Some(address))
    }

    /// Search phrase for the destination, built from the geocoder's best guess.
    async fn probe(&self, event: &SourceEvent) -> String {
        let places = match self.geocoder.search(&event.location, &event.city).await {
            Ok(places) => places,
            Err(e) => {
                warn!(error = %e, "geocoder lookup failed");
                Vec::new()
            }
        };
        match pick_place(&places) {
            Some(place) => format!(
                "{} {} {}",
                event.location,
                place.address.road,
                place.address.locality().unwrap_or(&event.city)
            ),
            None => {
                debug!("OSM place not found");
                format!("{} {}", event.location, event.city)
            }
        }
    }
}

/// First venue-like place, else the first place.
fn pick_place(places: &[Place]) -> Option<&Place> {
    places
        .iter()
        .find(|p| VENUE_PLACE_TYPES.contains(&p.place_type.as_str()))
        .or_else(|| places.first())
}

/// Exact `(description, locality)` match, else the last candidate.
fn pick_address(found: Vec<CanonicalAddress>, event: &SourceEvent) -> Option<CanonicalAddress> {
    let exact = found
        .iter()
        .position(|a| a.matches_venue(&event.location, &event.city));
    match exact {
        Some(i) => found.into_iter().nth(i),
        None => found.into_iter().last(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{HttpResponse, Method, RequestBody};
    use crate::constants::NOMINATIM_SEARCH_URL;
    use crate::infra::in_memory_http::InMemoryHttp;
    use chrono::DateTime;
    use serde_json::{json, Value};

    const API: &str = "https://m.example/api";

    fn event(location: &str, city: &str) -> SourceEvent {
        SourceEvent {
            title: "Gig".into(),
            location: location.into(),
            city: city.into(),
            country: String::new(),
            url: "https://ex.com/e/1".into(),
            comment: String::new(),
            event_type: "MUSIC".into(),
            source_url: String::new(),
            date: DateTime::parse_from_rfc3339("2025-06-01T20:00:00+02:00").unwrap(),
            image_url: String::new(),
        }
    }

    fn resolver(http: &Arc<InMemoryHttp>) -> AddressResolver {
        AddressResolver::new(
            NominatimClient::new(http.clone()),
            Arc::new(MobilizonClient::new(http.clone(), "https://m.example")),
        )
    }

    fn geocoder_returns(http: &InMemoryHttp, places: Value) {
        http.on(Method::Get, NOMINATIM_SEARCH_URL, vec![HttpResponse::json(200, places)]);
    }

    fn probes(http: &InMemoryHttp) -> Vec<String> {
        http.requests()
            .iter()
            .filter_map(|r| match &r.body {
                RequestBody::Json(v) if v["query"].as_str().unwrap_or("").contains("searchAddress") => {
                    v["variables"]["query"].as_str().map(str::to_string)
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_resolves_once_then_serves_from_cache() {
        let http = Arc::new(InMemoryHttp::new());
        geocoder_returns(&http, json!([{"type": "nightclub", "address": {"road": "Main 1", "city": "Bern"}}]));
        http.on_graphql(
            API,
            "searchAddress",
            json!({"searchAddress": [{"description": "Club X", "locality": "Bern", "street": "Main 1"}]}),
        );
        let resolver = resolver(&http);
        let mut cache = AddressCache::default();
        let gig = event("Club X", "Bern");

        let first = resolver.resolve(&gig, &mut cache).await.unwrap().unwrap();
        assert_eq!(first.street, "Main 1");
        assert_eq!(probes(&http), vec!["Club X Main 1 Bern"]);

        http.clear_log();
        let second = resolver.resolve(&gig, &mut cache).await.unwrap();
        assert_eq!(second, Some(first));
        assert!(http.requests().is_empty());
    }

    #[tokio::test]
    async fn test_prefers_venue_like_geocoder_results() {
        let http = Arc::new(InMemoryHttp::new());
        geocoder_returns(
            &http,
            json!([
                {"type": "bus_stop", "address": {"road": "Stop Lane", "city": "Bern"}},
                {"type": "bar", "address": {"road": "Bar Street 5", "town": "Köniz"}}
            ]),
        );
        http.on_graphql(API, "searchAddress", json!({"searchAddress": []}));

        resolver(&http)
            .resolve(&event("Club X", "Bern"), &mut AddressCache::default())
            .await
            .unwrap();

        assert_eq!(probes(&http), vec!["Club X Bar Street 5 Köniz"]);
    }

    #[tokio::test]
    async fn test_unknown_venue_searches_verbatim_and_is_not_cached() {
        let http = Arc::new(InMemoryHttp::new());
        geocoder_returns(&http, json!([]));
        http.on_graphql(API, "searchAddress", json!({"searchAddress": []}));
        let mut cache = AddressCache::default();

        let found = resolver(&http)
            .resolve(&event("Club X", "Bern"), &mut cache)
            .await
            .unwrap();

        assert_eq!(found, None);
        assert!(cache.is_empty());
        assert_eq!(probes(&http), vec!["Club X Bern"]);
    }

    #[tokio::test]
    async fn test_without_exact_match_the_last_candidate_wins() {
        let http = Arc::new(InMemoryHttp::new());
        geocoder_returns(&http, json!([]));
        http.on_graphql(
            API,
            "searchAddress",
            json!({"searchAddress": [
                {"description": "Club Y", "locality": "Bern"},
                {"description": "Club X", "locality": "Zürich"}
            ]}),
        );
        let mut cache = AddressCache::default();

        let found = resolver(&http)
            .resolve(&event("Club X", "Bern"), &mut cache)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.locality, "Zürich");
        assert!(cache.get("Club X", "Bern").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_is_retried_once_after_a_pause() {
        let http = Arc::new(InMemoryHttp::new());
        geocoder_returns(&http, json!([]));
        http.on_graphql_replies(
            API,
            "searchAddress",
            vec![
                HttpResponse::json(200, json!({"data": null, "errors": [{"message": "internal"}]})),
                HttpResponse::json(200, json!({"data": {"searchAddress": [{"description": "Club X", "locality": "Bern"}]}})),
            ],
        );
        let start = tokio::time::Instant::now();

        let found = resolver(&http)
            .resolve(&event("Club X", "Bern"), &mut AddressCache::default())
            .await
            .unwrap();

        assert!(found.is_some());
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert_eq!(probes(&http).len(), 2);
    }

    #[tokio::test]
    async fn test_geocoder_failure_falls_back_to_verbatim_probe() {
        let http = Arc::new(InMemoryHttp::new());
        http.fail(Method::Get, NOMINATIM_SEARCH_URL, "connection refused");
        http.on_graphql(API, "searchAddress", json!({"searchAddress": []}));

        resolver(&http)
            .resolve(&event("Club X", "Bern"), &mut AddressCache::default())
            .await
            .unwrap();

        assert_eq!(probes(&http), vec!["Club X Bern"]);
    }
}
