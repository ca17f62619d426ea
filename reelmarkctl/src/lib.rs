//! Configuration loading and operator tooling for the Reelmark progress
//! engine.
#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod replay;
pub mod validation;

pub use loader::{ConfigLoadError, ConfigLoader, LoadedConfig};
pub use models::{Config, ConfigSource};
