//! Shared domain types for the speedwatch project.

pub mod config;
pub mod measurement;

mod errors;
mod secret;

pub use errors::{config_error, Result, SpeedwatchError};
pub use measurement::Measurement;
pub use secret::Secret;
