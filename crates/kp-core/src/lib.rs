//! Core types for kartpad
//!
//! This crate provides the error taxonomy, configuration and logging
//! bootstrap shared by the input layer and the replay tooling.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, InvalidFramePolicy};
pub use error::{GhostError, InputError, KartpadError, Result};
