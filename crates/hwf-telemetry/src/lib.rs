//! # hwf-telemetry
//!
//! Receives notebook interaction events over HTTP and forwards each one to
//! the configured sink.

pub mod auth;
pub mod category;
pub mod handlers;
pub mod plugin;
pub mod sink;
pub mod types;

pub use category::EventCategory;
pub use plugin::TelemetryPlugin;
pub use sink::{build_sink, CaliperSink, ConsoleSink, EventSink, SinkError};
pub use types::{EventPayload, TelemetryAck};
