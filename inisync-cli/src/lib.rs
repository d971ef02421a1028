//! CLI library for testing purposes

pub mod check;
pub mod config;
pub mod decode;
pub mod diff;
pub mod render;
pub mod validation;
pub mod verify;

pub use config::{Config, Overrides, load_config, resolve_config};
