//! Loyalty background jobs service library
//!
//! Exposes the job orchestration, configuration and admin server modules
//! for the binary and for integration tests.

pub mod background_jobs;
pub mod config;
pub mod loyalty;
pub mod messaging;
pub mod server;

// Re-export commonly used types for convenience
pub use background_jobs::{JobOrchestrator, OrchestratorState, StartupPolicy, StartupReport};
pub use loyalty::{LoyaltyStore, MemoryLoyaltyStore};
pub use messaging::{LogMessageSender, MessageOutbox, MessageSender};
pub use server::{make_app, run_server, ServerState};
