//! Services
//!
//! Business logic of the research agent. The CLI in `main.rs` wires these
//! together; nothing here talks to the terminal.

pub mod research;
