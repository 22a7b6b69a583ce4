use hwf_caliper::{Action, EntityType, EventType};
use serde_json::Value;

use crate::types::EventPayload;

/// Analytics category of an inbound event, decided by its `event_name`.
///
/// Client event names seen in practice: `open_notebook`, `save_notebook`,
/// `active_cell_changed`, `scroll`, `cell_executed`, `add_cell`,
/// `remove_cell`. The last three, and anything unrecognised, are tool use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    ResourceManagement(Action),
    Navigation,
    ToolUse,
}

impl EventCategory {
    pub fn from_event_name(event_name: Option<&str>) -> Self {
        match event_name {
            Some("open_notebook") => Self::ResourceManagement(Action::Retrieved),
            Some("save_notebook") => Self::ResourceManagement(Action::Saved),
            Some("active_cell_changed") | Some("scroll") => Self::Navigation,
            _ => Self::ToolUse,
        }
    }

    pub fn classify(event: &EventPayload) -> Self {
        Self::from_event_name(event.get("event_name").and_then(Value::as_str))
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Self::ResourceManagement(_) => EventType::ResourceManagementEvent,
            Self::Navigation => EventType::NavigationEvent,
            Self::ToolUse => EventType::ToolUseEvent,
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Self::ResourceManagement(action) => *action,
            Self::Navigation => Action::NavigatedTo,
            Self::ToolUse => Action::Used,
        }
    }

    pub fn object_type(&self) -> EntityType {
        self.event_type().object_type()
    }
}
