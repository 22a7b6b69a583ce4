use super::{EventSink, SinkError};
use crate::types::{EventPayload, Metadata};
use async_trait::async_trait;
use tracing::info;

/// Logs every event to the process log. Used for diagnostics.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventSink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn handle_event(
        &self,
        event: &EventPayload,
        metadata: &Metadata,
    ) -> Result<(), SinkError> {
        let event = serde_json::Value::Object(event.clone());
        let metadata = serde_json::Value::Object(metadata.clone());

        info!("got telemetry event: {} {}", event, metadata);
        Ok(())
    }
}
