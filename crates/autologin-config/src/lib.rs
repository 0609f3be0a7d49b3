//! # Autologin Config
//!
//! Configuration management for the Autologin application.

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
