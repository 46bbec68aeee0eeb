pub mod metrics;
#[allow(clippy::module_inception)]
pub mod server;

pub use server::{make_app, run_server, JobsResponse, ServerState};
