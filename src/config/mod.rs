//! Configuration module
//!
//! Typed settings for the service endpoints, loadable from a YAML file
//! with environment-variable overrides. No global instance is kept;
//! callers construct clients from an explicit `Settings` value.

mod settings;

pub use settings::*;
