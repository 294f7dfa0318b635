pub mod config;
pub mod error;
pub mod types;

pub use config::{EngineSettings, IntersectionMode};
pub use error::{Result, VantageError};
