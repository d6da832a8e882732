use crate::apis::{decode_events, EventSource};
use crate::error::Result;
use crate::types::SourceEvent;
use std::path::PathBuf;
use tracing::{error, info};

/// Reads a JSON array of events, e.g. the output of a scraper run.
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl EventSource for LocalFileSource {
    fn source_name(&self) -> &str {
        "file"
    }

    async fn fetch_events(&self) -> Result<Vec<SourceEvent>> {
        info!(file = %self.path.display(), "using local file");
        let data = tokio::fs::read(&self.path).await?;
        match serde_json::from_slice::<Vec<serde_json::Value>>(&data) {
            Ok(records) => Ok(decode_events(records)),
            Err(e) => {
                error!(file = %self.path.display(), error = %e, "event file is not a JSON array of events");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_reads_event_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(
            &path,
            r#"[{"title":"Gig","location":"Club X","city":"Bern","url":"https://ex.com/e/1","date":"2025-06-01T20:00:00+02:00","imageUrl":null}]"#,
        )
        .unwrap();

        let events = LocalFileSource::new(&path).fetch_events().await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].image_url, "");
    }

    #[tokio::test]
    async fn test_dateless_record_does_not_drop_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(
            &path,
            r#"[{"title":"Gig","url":"https://ex.com/e/1","date":"2025-06-01T20:00:00+02:00"},
                {"title":"TBA","url":"https://ex.com/e/2"}]"#,
        )
        .unwrap();

        let events = LocalFileSource::new(&path).fetch_events().await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].url, "https://ex.com/e/1");
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error_but_garbage_is_empty() {
        let dir = tempdir().unwrap();
        let missing = LocalFileSource::new(dir.path().join("nope.json"));
        assert!(matches!(missing.fetch_events().await, Err(BotError::Io(_))));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"data\": 1}").unwrap();
        assert!(LocalFileSource::new(&path).fetch_events().await.unwrap().is_empty());
    }
}
