//! Core utilities and types shared across all HWF crates

pub mod error_builder;
pub mod plugin;
pub mod problemdetails;

pub use error_builder::*;
pub use problemdetails::{Problem, ProblemDetails};
