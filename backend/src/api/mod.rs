//! HTTP API module.
//!
//! This module provides the HTTP server, API types and the progress log
//! broadcaster used by the importer.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::start_server;
pub use types::*;
