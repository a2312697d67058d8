//! Core types shared across Shipflow.
//!
//! Currently this is the configuration layer.

mod config;

pub use config::{Config, GatesConfig, PathsConfig, LOCAL_CONFIG_FILE, PROJECT_DIR_ENV};
