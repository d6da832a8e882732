//! Upstream event sources and the external geocoder.
pub mod concertcloud;
pub mod local_file;
pub mod nominatim;

use crate::error::Result;
use crate::types::SourceEvent;
use serde_json::Value;
use tracing::warn;

/// Anything that can hand the reconciliation driver a batch of events.
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    fn source_name(&self) -> &str;

    /// Fetch one batch. Malformed payloads yield an empty batch; errors are
    /// reserved for failures that should stop the run.
    async fn fetch_events(&self) -> Result<Vec<SourceEvent>>;
}

/// Decode records one at a time; records that do not fit are skipped.
pub fn decode_events(records: Vec<Value>) -> Vec<SourceEvent> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<SourceEvent>(record.clone()) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(
                    title = record.get("title").and_then(serde_json::Value::as_str).unwrap_or_default(),
                    url = record.get("url").and_then(serde_json::Value::as_str).unwrap_or_default(),
                    error = %e,
                    "Skipping unusable source record"
                );
                None
            }
        })
        .collect()
}
