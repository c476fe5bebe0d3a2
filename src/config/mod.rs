//! Configuration
//!
//! Typed configuration structs plus a figment-based loader that merges
//! defaults, global and project TOML files, and environment variables.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    CacheConfig, Config, ContentConfig, DispatchConfig, ScoringConfig, SourceSettings,
    SourcesConfig, SynthesisConfig,
};
