use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

pub use hwf_config::Metadata;

/// A client-supplied event. No schema is enforced; recognised keys are read
/// best-effort.
pub type EventPayload = Map<String, Value>;

/// Literal used wherever a payload field is missing
pub const UNKNOWN: &str = "__unknown__";

/// Keys the server reads from an event payload. Every key is optional and any
/// other key is forwarded untouched.
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct TelemetryEventSchema {
    /// Event discriminator, e.g. `save_notebook`, `active_cell_changed`
    pub event_name: Option<String>,
    pub user_id: Option<String>,
    /// Location of the resource the event concerns
    pub path: Option<String>,
    pub notebook_path: Option<String>,
    /// Response of the upstream storage gateway, including its headers
    #[schema(value_type = Object)]
    pub aws_response: Option<Value>,
}

/// Acknowledgment returned for every accepted event
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TelemetryAck {
    pub ok: bool,
}

impl TelemetryAck {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}
