//! Common test infrastructure
//!
//! Spawns the full job stack (registry, orchestrator, admin server) against
//! an in-memory loyalty store. Tests should only import from this module.

mod constants;
mod server;

pub use constants::*;
pub use server::{RecordingSender, TestServer};
