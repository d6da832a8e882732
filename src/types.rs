use crate::constants::{MIN_TITLE_CHARS, TITLE_PADDING};
use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Event record as delivered by the upstream aggregator (or a local file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEvent {
    #[serde(default, deserialize_with = "nullable_string")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub location: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub city: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub country: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub url: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub comment: String,
    #[serde(default, rename = "type", deserialize_with = "nullable_string")]
    pub event_type: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub source_url: String,
    pub date: DateTime<FixedOffset>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub image_url: String,
}

impl SourceEvent {
    /// Trim the title and pad it to the minimum length Mobilizon accepts.
    pub fn normalize_title(&mut self) {
        let trimmed = self.title.trim();
        self.title = if trimmed.chars().count() < MIN_TITLE_CHARS {
            format!("{trimmed}{TITLE_PADDING}")
        } else {
            trimmed.to_string()
        };
    }

    pub fn key(&self) -> EventKey {
        EventKey::new(&self.url, &self.date)
    }

    /// Start time in the form the destination and the cache key use.
    pub fn begins_on(&self) -> String {
        rfc3339(&self.date)
    }
}

pub fn rfc3339(date: &DateTime<FixedOffset>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Local cache identity of a source event: `url + ('#' | ':') + RFC3339(date)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKey(String);

impl EventKey {
    pub fn new(url: &str, date: &DateTime<FixedOffset>) -> Self {
        let separator = if url.contains('#') { ':' } else { '#' };
        EventKey(format!("{url}{separator}{}", rfc3339(date)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address object as Mobilizon's own `searchAddress` returns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanonicalAddress {
    #[serde(deserialize_with = "id_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(deserialize_with = "nullable_string")]
    pub description: String,
    #[serde(deserialize_with = "nullable_string")]
    pub locality: String,
    #[serde(deserialize_with = "nullable_string")]
    pub postal_code: String,
    #[serde(deserialize_with = "nullable_string")]
    pub street: String,
    #[serde(deserialize_with = "nullable_string")]
    pub country: String,
    #[serde(deserialize_with = "nullable_string")]
    pub region: String,
    #[serde(deserialize_with = "nullable_string")]
    pub geom: String,
}

impl CanonicalAddress {
    pub fn matches_venue(&self, location: &str, city: &str) -> bool {
        self.description == location && self.locality == city
    }
}

/// GraphQL IDs show up as strings, numbers or null depending on the server version.
fn id_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn nullable_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A source event that exists on the destination server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedEvent {
    #[serde(flatten)]
    pub event: SourceEvent,
    #[serde(rename = "mobilizonUuid")]
    pub mobilizon_uuid: Uuid,
}

impl PublishedEvent {
    pub fn new(event: SourceEvent, mobilizon_uuid: Uuid) -> Self {
        Self { event, mobilizon_uuid }
    }
}

/// OAuth2 token envelope, persisted verbatim in `auth.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthState {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: String,
    pub refresh_token_expires_in: i64,
    #[serde(alias = "scope")]
    pub scopes: String,
    pub token_type: String,
}

/// Page of events from the ConcertCloud API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventPage {
    /// Raw records, decoded one by one so a bad record cannot sink the page.
    #[serde(rename = "data")]
    pub records: Vec<serde_json::Value>,
    pub page: u32,
    pub limit: u32,
    pub total: u32,
    pub last_page: u32,
}

/// One result of a Nominatim search.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Place {
    pub name: String,
    pub lat: String,
    pub lon: String,
    #[serde(rename = "type")]
    pub place_type: String,
    pub address: PlaceAddress,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaceAddress {
    pub amenity: String,
    pub house_number: String,
    pub road: String,
    pub city: String,
    pub town: String,
    pub village: String,
    pub postcode: String,
    pub country: String,
    pub country_code: String,
}

impl PlaceAddress {
    /// City-like name, falling back through the smaller settlement kinds.
    pub fn locality(&self) -> Option<&str> {
        [&self.city, &self.town, &self.village]
            .into_iter()
            .map(String::as_str)
            .find(|s| !s.is_empty())
    }
}
