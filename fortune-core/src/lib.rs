//! Core shared library for the tea fortune services.
//!
//! This crate exposes the primitives every fortune crate depends on:
//! common errors, configuration loading from the environment and the
//! logging setup used by binaries.

pub mod config;
pub mod errors;
pub mod logging;

pub use config::{CoreConfig, Environment};
pub use errors::{ConfigError, FortuneError, Result as CoreResult};
