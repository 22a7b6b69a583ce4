//! Event categories, actions and the event record itself.

use crate::entities::{Entity, EntityType};
use crate::error::CaliperError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const CALIPER_CONTEXT: &str = "http://purl.imsglobal.org/ctx/caliper/v1p2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Used,
    Saved,
    Retrieved,
    NavigatedTo,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Used => "Used",
            Self::Saved => "Saved",
            Self::Retrieved => "Retrieved",
            Self::NavigatedTo => "NavigatedTo",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    ToolUseEvent,
    ResourceManagementEvent,
    NavigationEvent,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolUseEvent => "ToolUseEvent",
            Self::ResourceManagementEvent => "ResourceManagementEvent",
            Self::NavigationEvent => "NavigationEvent",
        }
    }

    /// Whether the category profile permits the action
    pub fn allows(&self, action: Action) -> bool {
        matches!(
            (self, action),
            (Self::ToolUseEvent, Action::Used)
                | (Self::ResourceManagementEvent, Action::Saved)
                | (Self::ResourceManagementEvent, Action::Retrieved)
                | (Self::NavigationEvent, Action::NavigatedTo)
        )
    }

    /// The entity type the category expects as its object
    pub fn object_type(&self) -> EntityType {
        match self {
            Self::ToolUseEvent => EntityType::SoftwareApplication,
            Self::ResourceManagementEvent | Self::NavigationEvent => EntityType::DigitalResource,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Format a timestamp as ISO 8601 with exactly millisecond precision and a
/// literal `Z`, e.g. `2024-01-01T00:00:00.123Z`. Finer resolution is truncated.
pub fn format_event_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// A fully assembled analytics event. Build one with [`Event::builder`].
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    pub event_type: EventType,
    pub action: Action,
    pub event_time: String,
    pub actor: Entity,
    pub ed_app: Entity,
    pub object: Entity,
    pub session: Entity,
    pub extensions: Map<String, Value>,
}

impl Event {
    pub fn builder(event_type: EventType, action: Action) -> EventBuilder {
        EventBuilder::new(event_type, action)
    }

    /// The JSON-LD form sent to the collector. Entities whose id is listed in
    /// `described` are emitted as bare identity strings.
    pub fn to_json(&self, described: &[&str]) -> Value {
        let entity = |entity: &Entity| entity.to_json(described.contains(&entity.id.as_str()));

        json!({
            "@context": CALIPER_CONTEXT,
            "id": self.id,
            "type": self.event_type.as_str(),
            "actor": entity(&self.actor),
            "action": self.action.as_str(),
            "object": entity(&self.object),
            "eventTime": self.event_time,
            "edApp": entity(&self.ed_app),
            "session": entity(&self.session),
            "extensions": self.extensions,
        })
    }
}

pub struct EventBuilder {
    event_type: EventType,
    action: Action,
    event_time: Option<DateTime<Utc>>,
    actor: Option<Entity>,
    ed_app: Option<Entity>,
    object: Option<Entity>,
    session: Option<Entity>,
    extensions: Map<String, Value>,
}

impl EventBuilder {
    pub fn new(event_type: EventType, action: Action) -> Self {
        Self {
            event_type,
            action,
            event_time: None,
            actor: None,
            ed_app: None,
            object: None,
            session: None,
            extensions: Map::new(),
        }
    }

    pub fn event_time(mut self, time: DateTime<Utc>) -> Self {
        self.event_time = Some(time);
        self
    }

    pub fn actor(mut self, actor: Entity) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn ed_app(mut self, ed_app: Entity) -> Self {
        self.ed_app = Some(ed_app);
        self
    }

    pub fn object(mut self, object: Entity) -> Self {
        self.object = Some(object);
        self
    }

    pub fn session(mut self, session: Entity) -> Self {
        self.session = Some(session);
        self
    }

    pub fn extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Validate the category profile and produce the event.
    pub fn build(self) -> Result<Event, CaliperError> {
        if !self.event_type.allows(self.action) {
            return Err(CaliperError::InvalidEvent(format!(
                "{} does not permit action {}",
                self.event_type, self.action
            )));
        }

        let actor = require("actor", self.actor, EntityType::Person)?;
        let ed_app = require("edApp", self.ed_app, EntityType::SoftwareApplication)?;
        let object = require("object", self.object, self.event_type.object_type())?;
        let session = require("session", self.session, EntityType::Session)?;

        Ok(Event {
            id: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
            event_type: self.event_type,
            action: self.action,
            event_time: format_event_time(self.event_time.unwrap_or_else(Utc::now)),
            actor,
            ed_app,
            object,
            session,
            extensions: self.extensions,
        })
    }
}

fn require(
    field: &str,
    entity: Option<Entity>,
    expected: EntityType,
) -> Result<Entity, CaliperError> {
    let entity = entity.ok_or_else(|| CaliperError::InvalidEvent(format!("missing {}", field)))?;

    if entity.entity_type != expected {
        return Err(CaliperError::InvalidEvent(format!(
            "{} must be a {}, got {}",
            field, expected, entity.entity_type
        )));
    }

    Ok(entity)
}
