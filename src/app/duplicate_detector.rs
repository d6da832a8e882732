use crate::app::ports::TokenProvider;
use crate::error::Result;
use crate::graphql::{EventSearch, MobilizonClient};
use crate::storage::Caches;
use crate::types::SourceEvent;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Where an event was found, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    CreatedThisRun(Uuid),
    Cached(Uuid),
    Remote(Uuid),
    Absent,
}

impl Presence {
    pub fn uuid(&self) -> Option<Uuid> {
        match self {
            Presence::CreatedThisRun(u) | Presence::Cached(u) | Presence::Remote(u) => Some(*u),
            Presence::Absent => None,
        }
    }

    pub fn exists(&self) -> bool {
        !matches!(self, Presence::Absent)
    }
}

/// Exact match, tolerating one trailing slash on either side.
pub fn urls_match(source: &str, online: &str) -> bool {
    source == online || format!("{source}/") == online || source == format!("{online}/")
}

pub struct DuplicateDetector {
    graphql: Arc<MobilizonClient>,
    tokens: Arc<dyn TokenProvider>,
}

impl DuplicateDetector {
    pub fn new(graphql: Arc<MobilizonClient>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self { graphql, tokens }
    }

    /// Local caches first, then the destination server.
    pub async fn exists(&self, event: &SourceEvent, caches: &Caches) -> Result<Presence> {
        let key = event.key();
        if let Some(hit) = caches.created.get(&key) {
            return Ok(Presence::CreatedThisRun(hit.mobilizon_uuid));
        }
        if let Some(hit) = caches.existing.get(&key) {
            return Ok(Presence::Cached(hit.mobilizon_uuid));
        }
        Ok(match self.find_remote(event).await? {
            Some(uuid) => Presence::Remote(uuid),
            None => Presence::Absent,
        })
    }

    /// Search by title and start, then confirm through the event URL.
    #[instrument(skip(self, event), fields(title = %event.title, date = %event.begins_on()))]
    pub async fn find_remote(&self, event: &SourceEvent) -> Result<Option<Uuid>> {
        let search = self.search(event).await?;
        for element in &search.elements {
            let remote = match self.graphql.fetch_event(&element.uuid).await {
                Ok(remote) => remote,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!(uuid = %element.uuid, error = %e, "Failed fetching event by uuid");
                    continue;
                }
            };
            let online = remote.online_address.unwrap_or_default();
            if urls_match(&event.url, &online) {
                debug!(uuid = %element.uuid, %online, "Found event matching");
                return Ok(Some(element.uuid));
            }
        }
        info!(location = %event.location, candidates = search.elements.len(), "Event not found");
        Ok(None)
    }

    async fn search(&self, event: &SourceEvent) -> Result<EventSearch> {
        let begins_on = event.begins_on();
        match self.graphql.search_events(&event.title, &begins_on).await {
            Err(e) if e.is_auth_expired() => {
                warn!(error = %e, "event search rejected our token, refreshing");
                self.tokens.refresh().await?;
                self.graphql.search_events(&event.title, &begins_on).await
            }
            other => other,
        }
    }
}
