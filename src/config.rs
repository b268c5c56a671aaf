//! Configuration types and loading.

pub mod persistence;
pub mod types;

pub use persistence::{load_config, validate_config};
pub use types::AgentConfig;
