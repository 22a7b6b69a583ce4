//! Analytics sink: maps loosely structured notebook events onto typed
//! analytics events and transmits them to the collector.

use super::{EventSink, SinkError};
use crate::category::EventCategory;
use crate::types::{EventPayload, Metadata, UNKNOWN};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hwf_caliper::{CaliperError, Entity, Event, HttpOptions, Sensor};
use hwf_config::CaliperSettings;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

const FALLBACK_USER_UNKNOWN: &str = "getenv:__unknown__";

pub struct CaliperSink {
    sensor: Sensor,
    ed_app: Entity,
    actor_namespace: String,
    session_namespace: String,
    fallback_user: String,
}

impl CaliperSink {
    /// Build the sink with the collector session it keeps for its lifetime.
    /// The fallback user is read from `USER` once, here.
    pub fn new(settings: &CaliperSettings) -> Result<Self, SinkError> {
        let mut options = HttpOptions::bearer(&settings.endpoint_url, &settings.api_key);
        if let Some(secs) = settings.timeout_secs {
            options = options.with_timeout(Duration::from_secs(secs));
        }
        let sensor = Sensor::new(&settings.sensor_id, options, settings.debug)?;

        let fallback_user = std::env::var("USER")
            .ok()
            .filter(|user| !user.is_empty())
            .unwrap_or_else(|| FALLBACK_USER_UNKNOWN.to_string());

        Ok(Self {
            sensor,
            ed_app: Entity::software_application(&settings.ed_app_id),
            actor_namespace: settings.actor_namespace.clone(),
            session_namespace: settings.session_namespace.clone(),
            fallback_user,
        })
    }

    pub fn with_fallback_user(mut self, user: impl Into<String>) -> Self {
        self.fallback_user = user.into();
        self
    }

    /// Assemble the analytics event for one payload at the given instant.
    pub fn build_event(
        &self,
        event: &EventPayload,
        metadata: &Metadata,
        now: DateTime<Utc>,
    ) -> Result<Event, CaliperError> {
        let category = EventCategory::classify(event);

        let actor = Entity::person(actor_id(
            &self.actor_namespace,
            event,
            &self.fallback_user,
        ));
        let session = Entity::session(session_id_from_transport_headers(
            &self.session_namespace,
            event,
        ));
        let object = Entity::new(object_id(event), category.object_type());

        Event::builder(category.event_type(), category.action())
            .event_time(now)
            .actor(actor)
            .ed_app(self.ed_app.clone())
            .object(object)
            .session(session)
            .extension("eventData", Value::Object(event.clone()))
            .extension("metadata", Value::Object(metadata.clone()))
            .build()
    }
}

#[async_trait]
impl EventSink for CaliperSink {
    fn name(&self) -> &'static str {
        "caliper"
    }

    async fn handle_event(
        &self,
        event: &EventPayload,
        metadata: &Metadata,
    ) -> Result<(), SinkError> {
        let caliper_event = self.build_event(event, metadata, Utc::now())?;

        let described = [
            caliper_event.actor.id.as_str(),
            caliper_event.ed_app.id.as_str(),
            caliper_event.object.id.as_str(),
            caliper_event.session.id.as_str(),
        ];

        match self.sensor.send(&caliper_event, &described).await {
            Ok(report) => {
                debug!(
                    "Sent {} {} to {} ({})",
                    caliper_event.event_type,
                    report.event_id,
                    self.sensor.host(),
                    report.status
                );
                Ok(())
            }
            Err(e) => {
                error!("Failed to send event {}: {}", caliper_event.id, e);
                Err(e.into())
            }
        }
    }
}

fn string_field<'a>(event: &'a EventPayload, key: &str) -> Option<&'a str> {
    event
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Actor identity: `user_id` when it is a non-empty string, otherwise the
/// fallback user.
pub fn actor_id(namespace: &str, event: &EventPayload, fallback_user: &str) -> String {
    let user = string_field(event, "user_id").unwrap_or(fallback_user);
    format!("{}{}", namespace, user)
}

/// Session identity parsed from the storage gateway's `Via` response header.
///
/// The header looks like `1.1 <session>.cloudfront.net (CloudFront)`: split on
/// whitespace, at least three tokens, second one wins. Anything else yields the
/// unknown session.
pub fn session_id_from_transport_headers(namespace: &str, event: &EventPayload) -> String {
    let token = event
        .get("aws_response")
        .and_then(|response| response.get("headers"))
        .and_then(Value::as_object)
        .and_then(|headers| {
            headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("via"))
                .and_then(|(_, value)| value.as_str())
        })
        .and_then(|via| {
            let tokens: Vec<&str> = via.split_whitespace().collect();
            if tokens.len() >= 3 {
                Some(tokens[1])
            } else {
                None
            }
        })
        .unwrap_or(UNKNOWN);

    format!("{}{}", namespace, token)
}

/// Target object identity: `path`, with `#<notebook_path>` appended when both
/// are present.
pub fn object_id(event: &EventPayload) -> String {
    match (
        string_field(event, "path"),
        string_field(event, "notebook_path"),
    ) {
        (Some(path), Some(notebook_path)) => format!("{}#{}", path, notebook_path),
        (Some(path), None) => path.to_string(),
        _ => UNKNOWN.to_string(),
    }
}
