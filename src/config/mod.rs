//! Configuration management for the configurator
//!
//! - **settings**: service endpoint, timeouts, window geometry (JSON file + env + CLI)

pub mod settings;

// Re-export commonly used types
pub use settings::Settings;
