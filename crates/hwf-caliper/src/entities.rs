//! Entities referenced by analytics events.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Person,
    SoftwareApplication,
    DigitalResource,
    Session,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "Person",
            Self::SoftwareApplication => "SoftwareApplication",
            Self::DigitalResource => "DigitalResource",
            Self::Session => "Session",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An identified entity. Only the identity and the type are modelled; every
/// entity this service emits is already known to the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

impl Entity {
    pub fn new(id: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id: id.into(),
            entity_type,
        }
    }

    pub fn person(id: impl Into<String>) -> Self {
        Self::new(id, EntityType::Person)
    }

    pub fn software_application(id: impl Into<String>) -> Self {
        Self::new(id, EntityType::SoftwareApplication)
    }

    pub fn digital_resource(id: impl Into<String>) -> Self {
        Self::new(id, EntityType::DigitalResource)
    }

    pub fn session(id: impl Into<String>) -> Self {
        Self::new(id, EntityType::Session)
    }

    /// Either the bare identity string (described by reference) or the inline object.
    pub fn to_json(&self, by_reference: bool) -> Value {
        if by_reference {
            Value::String(self.id.clone())
        } else {
            json!({ "id": self.id, "type": self.entity_type.as_str() })
        }
    }
}
