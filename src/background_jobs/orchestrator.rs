use super::context::JobContext;
use super::handle::{JobHandle, JobInfo};
use super::job::JobError;
use super::registry::{JobRegistration, JobRegistry};
use crate::server::metrics;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Lifecycle of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    NotStarted,
    Starting,
    /// Every starter returned successfully and the confirmation was emitted.
    Started,
    /// At least one starter failed during bring-up.
    Failed,
    ShuttingDown,
    Stopped,
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrchestratorState::NotStarted => "not started",
            OrchestratorState::Starting => "starting",
            OrchestratorState::Started => "started",
            OrchestratorState::Failed => "failed",
            OrchestratorState::ShuttingDown => "shutting down",
            OrchestratorState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// What to do when a starter fails during bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StartupPolicy {
    /// Log the failure and keep starting the remaining jobs.
    #[default]
    Isolated,
    /// Abort at the first failure; later jobs are never started.
    FailFast,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Background jobs were already started (state: {state})")]
    AlreadyStarted { state: OrchestratorState },

    #[error("Job {job} failed to start: {source}")]
    StarterFailed {
        job: &'static str,
        #[source]
        source: JobError,
    },
}

/// A starter that did not arm its job.
#[derive(Debug)]
pub struct JobStartFailure {
    pub job: &'static str,
    pub error: JobError,
}

/// Aggregate outcome of one `start_jobs` call.
#[derive(Debug, Default)]
pub struct StartupReport {
    pub started: Vec<&'static str>,
    pub failed: Vec<JobStartFailure>,
}

impl StartupReport {
    /// True when every registered starter armed its job.
    pub fn is_confirmed(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_names(&self) -> Vec<&'static str> {
        self.failed.iter().map(|f| f.job).collect()
    }
}

struct Inner {
    state: OrchestratorState,
    handles: Vec<JobHandle>,
    start_errors: HashMap<&'static str, String>,
}

/// Brings up every registered background job exactly once.
pub struct JobOrchestrator {
    registry: JobRegistry,
    context: JobContext,
    policy: StartupPolicy,
    inner: Mutex<Inner>,
}

impl JobOrchestrator {
    pub fn new(registry: JobRegistry, context: JobContext, policy: StartupPolicy) -> Self {
        Self {
            registry,
            context,
            policy,
            inner: Mutex::new(Inner {
                state: OrchestratorState::NotStarted,
                handles: Vec::new(),
                start_errors: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> OrchestratorState {
        self.lock().state
    }

    pub fn policy(&self) -> StartupPolicy {
        self.policy
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Invoke every registered starter once, in registration order.
    ///
    /// Only the first call does anything; later calls are rejected with
    /// [`OrchestratorError::AlreadyStarted`]. Starters run synchronously on
    /// the calling thread and are expected to return as soon as their job
    /// is armed.
    pub fn start_jobs(&self) -> Result<StartupReport, OrchestratorError> {
        {
            let mut inner = self.lock();
            if inner.state != OrchestratorState::NotStarted {
                warn!("Ignoring repeated start of background jobs ({})", inner.state);
                return Err(OrchestratorError::AlreadyStarted { state: inner.state });
            }
            inner.state = OrchestratorState::Starting;
        }

        info!(
            "Starting {} background jobs ({:?} policy)",
            self.registry.len(),
            self.policy
        );

        let mut report = StartupReport::default();
        for registration in self.registry.iter() {
            let starter = Arc::clone(&registration.starter);
            let ctx = self.context.for_job();
            let outcome = catch_unwind(AssertUnwindSafe(move || starter.start(ctx)))
                .unwrap_or_else(|panic| Err(JobError::Panicked(panic_message(panic))));

            match outcome {
                Ok(handle) => {
                    let mut inner = self.lock();
                    if inner.state != OrchestratorState::Starting {
                        // Shutdown began while this starter was running.
                        warn!(
                            "Job {} armed during shutdown, cancelling it",
                            registration.name
                        );
                        handle.cancel();
                        return Ok(report);
                    }
                    inner.handles.push(handle);
                    report.started.push(registration.name);
                }
                Err(e) => {
                    error!("Failed to start job {}: {}", registration.name, e);
                    metrics::record_job_start_failure(registration.name);
                    self.lock()
                        .start_errors
                        .insert(registration.name, e.to_string());

                    if self.policy == StartupPolicy::FailFast {
                        self.finish_startup(OrchestratorState::Failed);
                        return Err(OrchestratorError::StarterFailed {
                            job: registration.name,
                            source: e,
                        });
                    }
                    report.failed.push(JobStartFailure {
                        job: registration.name,
                        error: e,
                    });
                }
            }
        }

        if report.is_confirmed() {
            if self.finish_startup(OrchestratorState::Started) {
                info!("All background jobs armed");
            }
        } else if self.finish_startup(OrchestratorState::Failed) {
            warn!(
                "Background jobs partially armed: started [{}], failed [{}]",
                report.started.join(", "),
                report.failed_names().join(", ")
            );
        }

        Ok(report)
    }

    /// Leave `Starting` for `state`; returns false if shutdown already took over.
    fn finish_startup(&self, state: OrchestratorState) -> bool {
        let mut inner = self.lock();
        if inner.state != OrchestratorState::Starting {
            return false;
        }
        inner.state = state;
        metrics::set_jobs_armed(inner.handles.len());
        true
    }

    fn set_state(&self, state: OrchestratorState) {
        let mut inner = self.lock();
        inner.state = state;
        metrics::set_jobs_armed(inner.handles.len());
    }

    /// Stop every armed job, waiting up to `timeout` for each.
    ///
    /// Calling it again after the jobs were stopped is a no-op.
    pub async fn shutdown(&self, timeout: Duration) {
        let handles = {
            let mut inner = self.lock();
            if matches!(
                inner.state,
                OrchestratorState::ShuttingDown | OrchestratorState::Stopped
            ) {
                return;
            }
            inner.state = OrchestratorState::ShuttingDown;
            std::mem::take(&mut inner.handles)
        };

        info!("Shutting down {} background jobs...", handles.len());

        // Signal every job first so they wind down concurrently.
        for handle in &handles {
            handle.cancel();
        }
        for handle in handles {
            let name = handle.name();
            if !handle.stop(timeout).await {
                warn!("Job {} did not stop cleanly", name);
            }
        }

        self.set_state(OrchestratorState::Stopped);
        info!("Background jobs shutdown complete");
    }

    /// Describe every registered job, in registration order.
    pub fn jobs(&self) -> Vec<JobInfo> {
        let inner = self.lock();
        self.registry
            .iter()
            .map(|registration| job_info(&inner, registration))
            .collect()
    }

    pub fn job(&self, name: &str) -> Option<JobInfo> {
        let registration = self.registry.get(name)?;
        Some(job_info(&self.lock(), registration))
    }

    /// Outbound messages queued but not yet picked up by the worker.
    pub fn pending_messages(&self) -> usize {
        self.context.outbox.pending()
    }
}

fn job_info(inner: &Inner, registration: &JobRegistration) -> JobInfo {
    let handle = inner.handles.iter().find(|h| h.name() == registration.name);
    JobInfo {
        name: registration.name.to_string(),
        description: registration.starter.description().to_string(),
        schedule: registration.starter.schedule().into(),
        armed: handle.is_some_and(|h| !h.is_finished()),
        start_error: inner.start_errors.get(registration.name).cloned(),
        status: handle.map(JobHandle::status),
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
