//! Background job registration and bring-up.
//!
//! This module provides infrastructure for arming the loyalty system's
//! recurring tasks (RFM scoring, birthday and inactivity messaging,
//! recurring tasks, message delivery) once at process startup and for
//! stopping them again on shutdown.

mod context;
mod handle;
mod job;
pub mod jobs;
mod orchestrator;
mod periodic;
mod registry;

pub use context::JobContext;
pub use handle::{JobHandle, JobInfo, JobScheduleInfo, JobStatus, JobStatusInfo};
pub use job::{BackgroundJob, JobError, JobSchedule, JobStarter, ShutdownBehavior};
pub use orchestrator::{
    JobOrchestrator, JobStartFailure, OrchestratorError, OrchestratorState, StartupPolicy,
    StartupReport,
};
pub use periodic::PeriodicJob;
pub use registry::{JobRegistration, JobRegistry, JobRegistryBuilder, RegistryError};
