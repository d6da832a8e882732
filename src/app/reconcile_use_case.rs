use crate::apis::nominatim::NominatimClient;
use crate::app::address_resolver::AddressResolver;
use crate::app::context::BotContext;
use crate::app::duplicate_detector::{DuplicateDetector, Presence};
use crate::app::image_acquirer::ImageAcquirer;
use crate::app::media_uploader::MediaUploader;
use crate::app::variables::{EventVariables, PublishSettings};
use crate::error::{BotError, Result};
use crate::graphql::{EventRef, MobilizonClient};
use crate::storage::{CacheStore, Caches};
use crate::types::{CanonicalAddress, PublishedEvent, SourceEvent};
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Knobs of a reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Gather and report, but never mutate the destination.
    pub noop: bool,
    /// Event URLs matching any of these are never published.
    pub opt_out: Vec<Regex>,
    pub settings: PublishSettings,
    pub default_image_url: String,
}

/// Terminal state of one source event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    DuplicateInBatch,
    Unchanged,
    Updated,
    FoundRemote,
    Created,
    Reported,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub found_remote: usize,
    pub unchanged: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub reported: usize,
    pub failed: usize,
}

impl ReconcileReport {
    fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        let counter = match outcome {
            Outcome::Skipped => &mut self.skipped,
            Outcome::DuplicateInBatch => &mut self.duplicates,
            Outcome::Unchanged => &mut self.unchanged,
            Outcome::Updated => &mut self.updated,
            Outcome::FoundRemote => &mut self.found_remote,
            Outcome::Created => &mut self.created,
            Outcome::Reported => &mut self.reported,
            Outcome::Failed => &mut self.failed,
        };
        *counter += 1;
    }

    /// Number of create and update mutations issued.
    pub fn mutations(&self) -> usize {
        self.created + self.updated
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} events: {} created, {} updated, {} found remote, {} unchanged, {} duplicates, {} skipped, {} reported, {} failed",
            self.total,
            self.created,
            self.updated,
            self.found_remote,
            self.unchanged,
            self.duplicates,
            self.skipped,
            self.reported,
            self.failed
        )
    }
}

/// Materializes each source event exactly once on the destination server.
pub struct ReconcileUseCase {
    resolver: AddressResolver,
    detector: DuplicateDetector,
    images: ImageAcquirer,
    uploader: MediaUploader,
    graphql: Arc<MobilizonClient>,
    options: ReconcileOptions,
}

impl ReconcileUseCase {
    pub fn new(ctx: &BotContext, options: ReconcileOptions) -> Self {
        Self::with_geocoder(ctx, NominatimClient::new(ctx.plain_http.clone()), options)
    }

    pub fn with_geocoder(ctx: &BotContext, geocoder: NominatimClient, options: ReconcileOptions) -> Self {
        Self {
            resolver: AddressResolver::new(geocoder, ctx.graphql.clone()),
            detector: DuplicateDetector::new(ctx.graphql.clone(), ctx.tokens.clone()),
            images: ImageAcquirer::new(ctx.plain_http.clone(), &options.default_image_url),
            uploader: MediaUploader::new(ctx.api_http.clone(), &ctx.base_url),
            graphql: ctx.graphql.clone(),
            options,
        }
    }

    /// Address pass, address flush, reconciliation pass, created flush.
    ///
    /// Caches are written even when a fatal error cuts the batch short; in
    /// that case events the run never reached keep their earlier entries.
    pub async fn run_batch(&self, events: Vec<SourceEvent>, store: &CacheStore) -> Result<ReconcileReport> {
        let mut caches = store.load();

        let resolved = self.resolver.resolve_all(&events, &mut caches.addresses).await;
        store.save_addresses(&caches)?;
        resolved?;

        let outcome = self.reconcile(events, &mut caches).await;
        if outcome.is_err() {
            caches.keep_unvisited();
        }
        store.save_created(&caches)?;
        outcome
    }

    /// Second pass over the batch, strictly in order.
    pub async fn reconcile(&self, events: Vec<SourceEvent>, caches: &mut Caches) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        for event in events {
            let span = info_span!("event", title = %event.title, url = %event.url);
            match self.process(event, caches).instrument(span).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(error = %e, %report, "fatal error, stopping batch");
                    return Err(e);
                }
            }
        }
        info!(%report, "reconciliation finished");
        Ok(report)
    }

    /// Drive one event to a terminal state. Only fatal errors escape.
    async fn process(&self, mut event: SourceEvent, caches: &mut Caches) -> Result<Outcome> {
        if self.options.opt_out.iter().any(|re| re.is_match(&event.url)) {
            info!("Skipping opted-out venue");
            return Ok(Outcome::Skipped);
        }
        event.normalize_title();
        let key = event.key();
        let address = caches.addresses.get(&event.location, &event.city).cloned();
        debug!(%key, "Checking for existing events");

        let presence = match self.detector.exists(&event, caches).await {
            Ok(presence) => presence,
            Err(e) => return self.failed(&event, e),
        };

        match presence {
            Presence::CreatedThisRun(_) => {
                debug!("already handled earlier in this batch");
                Ok(Outcome::DuplicateInBatch)
            }
            Presence::Cached(uuid) => {
                let Some(cached) = caches.existing.get(&key).cloned() else {
                    return Ok(Outcome::Unchanged);
                };
                let current = PublishedEvent::new(event, uuid);
                if current == cached {
                    caches.created.insert(key, cached);
                    return Ok(Outcome::Unchanged);
                }
                // stale copy stays until the update succeeds
                caches.created.insert(key.clone(), cached);
                if self.options.noop {
                    info!(%uuid, "would update event");
                    return Ok(Outcome::Reported);
                }
                match self.update(&current, address.as_ref()).await {
                    Ok(updated) => {
                        info!(id = %updated.id, uuid = %updated.uuid, "Updated Event");
                        caches.created.insert(key, current);
                        Ok(Outcome::Updated)
                    }
                    Err(e) => self.failed(&current.event, e),
                }
            }
            Presence::Remote(uuid) => {
                info!(%uuid, "event already on the server");
                caches.created.insert(key, PublishedEvent::new(event, uuid));
                Ok(Outcome::FoundRemote)
            }
            Presence::Absent if self.options.noop => {
                info!(location = %event.location, date = %event.begins_on(), "would create event");
                Ok(Outcome::Reported)
            }
            Presence::Absent => match self.publish(&event, address.as_ref(), None).await {
                Ok(created) => {
                    info!(id = %created.id, uuid = %created.uuid, "Created Event");
                    caches.created.insert(key, PublishedEvent::new(event, created.uuid));
                    Ok(Outcome::Created)
                }
                Err(e) => self.failed(&event, e),
            },
        }
    }

    fn failed(&self, event: &SourceEvent, e: BotError) -> Result<Outcome> {
        if e.is_fatal() {
            return Err(e);
        }
        error!(title = %event.title, error = %e, "event not published");
        Ok(Outcome::Failed)
    }

    async fn update(
        &self,
        current: &PublishedEvent,
        address: Option<&CanonicalAddress>,
    ) -> Result<EventRef> {
        let remote = self.graphql.fetch_event(&current.mobilizon_uuid).await?;
        self.publish(&current.event, address, Some(&remote.id)).await
    }

    /// Image, upload, then `createEvent` (or `updateEvent` given a remote id).
    async fn publish(
        &self,
        event: &SourceEvent,
        address: Option<&CanonicalAddress>,
        event_id: Option<&str>,
    ) -> Result<EventRef> {
        let image = self.images.acquire(event).await?;
        let media = self.uploader.upload(&image).await?;
        if address.is_none() {
            warn!(location = %event.location, "publishing without a physical address");
        }
        let vars = EventVariables::new(event, address, &self.options.settings, Some(media));
        match event_id {
            None => self.graphql.create_event(vars.to_value()?).await,
            Some(id) => self.graphql.update_event(vars.for_update(id).to_value()?).await,
        }
    }
}
