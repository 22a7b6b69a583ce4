mod metadata;
mod service;

pub use metadata::{load_metadata_file, parse_metadata_pair, Metadata};
pub use service::{CaliperSettings, ConfigError, ServerConfig, SinkKind};
