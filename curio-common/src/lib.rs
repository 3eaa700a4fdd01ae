//! # Curio Common Library
//!
//! Shared code for the Curio workspace:
//! - Error type and result alias
//! - TOML bootstrap configuration and root folder resolution
//! - SQLite pool and schema initialization
//! - Job lifecycle event bus

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
