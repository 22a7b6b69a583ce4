//! # hwf-caliper
//!
//! A small client for learning-analytics collectors speaking the Caliper
//! vocabulary. It provides:
//! - Typed entities, actions and event categories
//! - Category profile checks when events are assembled
//! - JSON-LD serialization with described-by-reference entities
//! - An HTTP sensor that posts envelopes with a bearer credential

mod entities;
mod envelope;
mod error;
mod events;
mod sensor;

pub use entities::{Entity, EntityType};
pub use envelope::{Envelope, DATA_VERSION};
pub use error::CaliperError;
pub use events::{format_event_time, Action, Event, EventBuilder, EventType, CALIPER_CONTEXT};
pub use sensor::{HttpOptions, SendReport, Sensor};
