use crate::constants::{
    category_for, COMMENTS_ALLOW_ALL, EVENT_DURATION_HOURS, JOIN_EXTERNAL, PROMO_TAGLINE,
    VISIBILITY_PUBLIC,
};
use crate::error::Result;
use crate::types::{rfc3339, CanonicalAddress, SourceEvent};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Per-run settings that end up in every create/update call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishSettings {
    pub actor_id: String,
    pub group_id: String,
    pub timezone: String,
    pub draft: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOptions {
    pub comment_moderation: String,
    pub show_start_time: bool,
    pub show_end_time: bool,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInput {
    pub media_uuid: Uuid,
}

/// Variables map shared by `createEvent` and `updateEvent`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventVariables {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub organizer_actor_id: String,
    pub attributed_to_id: Option<String>,
    pub title: String,
    pub category: String,
    pub visibility: String,
    pub description: String,
    pub physical_address: Option<CanonicalAddress>,
    pub begins_on: String,
    pub ends_on: String,
    pub draft: bool,
    pub online_address: String,
    pub external_participation_url: String,
    pub tags: Vec<String>,
    pub join_options: String,
    pub options: EventOptions,
    pub picture: Option<MediaInput>,
}

impl EventVariables {
    pub fn new(
        event: &SourceEvent,
        address: Option<&CanonicalAddress>,
        settings: &PublishSettings,
        picture: Option<Uuid>,
    ) -> Self {
        let ends_on = event.date + chrono::Duration::hours(EVENT_DURATION_HOURS);
        Self {
            event_id: None,
            organizer_actor_id: settings.actor_id.clone(),
            attributed_to_id: Some(settings.group_id.clone()).filter(|g| !g.is_empty()),
            title: event.title.clone(),
            category: category_for(&event.event_type).to_string(),
            visibility: VISIBILITY_PUBLIC.to_string(),
            description: format!("{} <p/><p> {}", event.comment, PROMO_TAGLINE),
            physical_address: address.cloned(),
            begins_on: event.begins_on(),
            ends_on: rfc3339(&ends_on),
            draft: settings.draft,
            online_address: event.url.clone(),
            external_participation_url: event.url.clone(),
            tags: vec![event.location.clone(), event.city.clone()],
            join_options: JOIN_EXTERNAL.to_string(),
            options: EventOptions {
                comment_moderation: COMMENTS_ALLOW_ALL.to_string(),
                show_start_time: true,
                show_end_time: false,
                timezone: settings.timezone.clone(),
            },
            picture: picture.map(|media_uuid| MediaInput { media_uuid }),
        }
    }

    /// Same variables addressed at an existing remote event.
    pub fn for_update(mut self, event_id: &str) -> Self {
        self.event_id = Some(event_id.to_string());
        self
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use serde_json::json;

    fn event(event_type: &str) -> SourceEvent {
        SourceEvent {
            title: "Gig".into(),
            location: "Club X".into(),
            city: "Bern".into(),
            country: String::new(),
            url: "https://ex.com/e/1".into(),
            comment: "<p>Live</p>".into(),
            event_type: event_type.into(),
            source_url: String::new(),
            date: DateTime::parse_from_rfc3339("2025-06-01T20:00:00+02:00").unwrap(),
            image_url: String::new(),
        }
    }

    fn settings() -> PublishSettings {
        PublishSettings {
            actor_id: "3".into(),
            group_id: String::new(),
            timezone: "Europe/Zurich".into(),
            draft: false,
        }
    }

    #[test]
    fn test_create_variables_carry_every_key() {
        let media = Uuid::new_v4();
        let address = CanonicalAddress {
            description: "Club X".into(),
            locality: "Bern".into(),
            ..CanonicalAddress::default()
        };
        let vars = EventVariables::new(&event("MUSIC"), Some(&address), &settings(), Some(media))
            .to_value()
            .unwrap();

        assert_eq!(vars["beginsOn"], json!("2025-06-01T20:00:00+02:00"));
        assert_eq!(vars["endsOn"], json!("2025-06-01T22:00:00+02:00"));
        assert_eq!(vars["category"], json!("MUSIC"));
        assert_eq!(vars["tags"], json!(["Club X", "Bern"]));
        assert_eq!(vars["organizerActorId"], json!("3"));
        assert_eq!(vars["attributedToId"], json!(null));
        assert_eq!(vars["visibility"], json!("PUBLIC"));
        assert_eq!(vars["joinOptions"], json!("EXTERNAL"));
        assert_eq!(vars["onlineAddress"], json!("https://ex.com/e/1"));
        assert_eq!(vars["externalParticipationUrl"], json!("https://ex.com/e/1"));
        assert_eq!(vars["physicalAddress"]["locality"], json!("Bern"));
        assert_eq!(vars["picture"], json!({"mediaUuid": media}));
        assert_eq!(
            vars["options"],
            json!({"commentModeration": "ALLOW_ALL", "showStartTime": true, "showEndTime": false, "timezone": "Europe/Zurich"})
        );
        assert_eq!(
            vars["description"],
            json!(format!("<p>Live</p> <p/><p> {PROMO_TAGLINE}"))
        );
        assert!(vars.get("eventId").is_none());
    }

    #[test]
    fn test_unknown_category_and_missing_address() {
        let mut group = settings();
        group.group_id = "12".into();
        group.draft = true;
        let vars = EventVariables::new(&event("concert"), None, &group, None)
            .to_value()
            .unwrap();
        assert_eq!(vars["category"], json!("MUSIC"));
        assert_eq!(vars["physicalAddress"], json!(null));
        assert_eq!(vars["attributedToId"], json!("12"));
        assert_eq!(vars["draft"], json!(true));

        let vars = EventVariables::new(&event("THEATRE"), None, &group, None);
        assert_eq!(vars.category, "THEATRE");
    }

    #[test]
    fn test_update_variables_add_event_id() {
        let vars = EventVariables::new(&event("MUSIC"), None, &settings(), None)
            .for_update("42")
            .to_value()
            .unwrap();
        assert_eq!(vars["eventId"], json!("42"));
        assert_eq!(vars["title"], json!("Gig"));
    }
}
