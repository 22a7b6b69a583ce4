//! Event sinks: where accepted telemetry events end up.

mod caliper;
mod console;

pub use caliper::{actor_id, object_id, session_id_from_transport_headers, CaliperSink};
pub use console::ConsoleSink;

use crate::types::{EventPayload, Metadata};
use async_trait::async_trait;
use hwf_caliper::CaliperError;
use hwf_config::{ServerConfig, SinkKind};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Analytics transmission failed: {0}")]
    Transmission(#[from] CaliperError),

    #[error("Invalid sink configuration: {0}")]
    Configuration(String),
}

/// A sink receives every event together with the process-wide metadata and
/// performs its side effect before returning.
///
/// Implementations hold only process-lifetime state, so one instance is shared
/// by all concurrent requests.
#[async_trait]
pub trait EventSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle_event(&self, event: &EventPayload, metadata: &Metadata)
        -> Result<(), SinkError>;
}

/// Construct the configured sink. Called once per process.
pub fn build_sink(config: &ServerConfig) -> Result<Arc<dyn EventSink>, SinkError> {
    let sink: Arc<dyn EventSink> = match config.sink {
        SinkKind::Console => Arc::new(ConsoleSink::new()),
        SinkKind::Caliper => Arc::new(CaliperSink::new(&config.caliper)?),
    };

    info!("Telemetry events will be handled by the {} sink", sink.name());
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_sink_follows_configuration() {
        let config = ServerConfig::new("127.0.0.1:0", "/", Some("t".into()));

        let sink = build_sink(&config.clone().with_sink(SinkKind::Console)).unwrap();
        assert_eq!(sink.name(), "console");

        let sink = build_sink(&config.with_sink(SinkKind::Caliper)).unwrap();
        assert_eq!(sink.name(), "caliper");
    }
}
