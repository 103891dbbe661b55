//! Storage Layer
//!
//! Handles all data persistence: JSON config and the SQLite memory log.

pub mod config;
pub mod memory;

pub use config::*;
pub use memory::*;
