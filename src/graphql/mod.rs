//! Minimal client for the Mobilizon GraphQL API.
pub mod operations;

use crate::app::ports::{HttpClientPort, HttpRequest};
use crate::error::{BotError, Result};
use crate::types::CanonicalAddress;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    status_code: Option<u16>,
}

impl GraphQlError {
    fn describe(&self) -> String {
        let mut out = self.message.clone();
        if let Some(code) = &self.code {
            out.push_str(&format!(" [{code}]"));
        }
        if let Some(status) = self.status_code {
            out.push_str(&format!(" ({status})"));
        }
        out
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: String,
    pub uuid: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub begins_on: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventSearch {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub elements: Vec<EventSummary>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEvent {
    pub id: String,
    #[serde(default)]
    pub online_address: Option<String>,
}

/// `{id, uuid}` returned by the create and update mutations.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRef {
    pub id: String,
    pub uuid: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchAddressData {
    #[serde(default)]
    search_address: Option<Vec<CanonicalAddress>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchEventsData {
    search_events: Option<EventSearch>,
}

#[derive(Deserialize)]
struct FetchEventData {
    event: Option<RemoteEvent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventData {
    create_event: EventRef,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateEventData {
    update_event: EventRef,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenData {
    refresh_token: TokenPair,
}

pub struct MobilizonClient {
    http: Arc<dyn HttpClientPort>,
    endpoint: String,
}

impl MobilizonClient {
    pub fn new(http: Arc<dyn HttpClientPort>, base_url: &str) -> Self {
        Self {
            http,
            endpoint: api_endpoint(base_url),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one operation and decode its `data` member.
    pub async fn execute<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let request = HttpRequest::post_json(
            &self.endpoint,
            json!({ "query": query, "variables": variables }),
        );
        let resp = self.http.execute(request).await?;
        if !resp.is_success() {
            return Err(BotError::Status {
                status: resp.status,
                url: self.endpoint.clone(),
            });
        }
        decode(&resp.bytes)
    }

    pub async fn search_address(&self, query: &str) -> Result<Vec<CanonicalAddress>> {
        let data: SearchAddressData = self
            .execute(operations::SEARCH_ADDRESS, json!({ "query": query }))
            .await?;
        Ok(data.search_address.unwrap_or_default())
    }

    pub async fn search_events(&self, term: &str, begins_on: &str) -> Result<EventSearch> {
        let data: SearchEventsData = self
            .execute(
                operations::SEARCH_EVENTS,
                json!({ "term": term, "beginsOn": begins_on }),
            )
            .await?;
        Ok(data.search_events.unwrap_or_default())
    }

    pub async fn fetch_event(&self, uuid: &Uuid) -> Result<RemoteEvent> {
        debug!(%uuid, "fetching event by uuid");
        let data: FetchEventData = self
            .execute(operations::FETCH_EVENT, json!({ "uuid": uuid }))
            .await?;
        data.event
            .ok_or_else(|| BotError::GraphQl(format!("event {uuid} not found")))
    }

    pub async fn create_event(&self, variables: Value) -> Result<EventRef> {
        let data: CreateEventData = self.execute(operations::CREATE_EVENT, variables).await?;
        Ok(data.create_event)
    }

    pub async fn update_event(&self, variables: Value) -> Result<EventRef> {
        let data: UpdateEventData = self.execute(operations::UPDATE_EVENT, variables).await?;
        Ok(data.update_event)
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair> {
        let data: RefreshTokenData = self
            .execute(
                operations::REFRESH_TOKEN,
                json!({ "refreshToken": refresh_token }),
            )
            .await?;
        Ok(data.refresh_token)
    }
}

pub fn api_endpoint(base_url: &str) -> String {
    format!("{}/api", base_url.trim_end_matches('/'))
}

/// Decode a GraphQL response body, turning an `errors` array into `BotError::GraphQl`.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let parsed: GraphQlResponse<T> = serde_json::from_slice(body)?;
    if !parsed.errors.is_empty() {
        let message = parsed
            .errors
            .iter()
            .map(GraphQlError::describe)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(BotError::GraphQl(message));
    }
    parsed
        .data
        .ok_or_else(|| BotError::GraphQl("response carried no data".into()))
}
