use super::job::{JobError, JobSchedule, ShutdownBehavior};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Information about a registered job for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub name: String,
    pub description: String,
    pub schedule: JobScheduleInfo,
    pub armed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatusInfo>,
}

/// Serializable schedule information.
#[derive(Debug, Clone, Serialize)]
pub struct JobScheduleInfo {
    #[serde(rename = "type")]
    pub schedule_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<String>,
}

impl From<JobSchedule> for JobScheduleInfo {
    fn from(schedule: JobSchedule) -> Self {
        match schedule {
            JobSchedule::Interval(duration) => JobScheduleInfo {
                schedule_type: "interval".to_string(),
                value_secs: Some(duration.as_secs()),
                at: None,
            },
            JobSchedule::Daily { hour, minute } => JobScheduleInfo {
                schedule_type: "daily".to_string(),
                value_secs: None,
                at: Some(format!("{:02}:{:02}", hour, minute)),
            },
            JobSchedule::Queue => JobScheduleInfo {
                schedule_type: "queue".to_string(),
                value_secs: None,
                at: None,
            },
        }
    }
}

/// Serializable snapshot of a job's runtime status.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct JobStatusInfo {
    pub is_running: bool,
    pub run_count: u64,
    pub failure_count: u64,
    pub last_started_at: Option<String>,
    pub last_finished_at: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct StatusInner {
    is_running: bool,
    run_count: u64,
    failure_count: u64,
    last_started_at: Option<DateTime<Utc>>,
    last_finished_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Live run counters of an armed job, shared between its task and the orchestrator.
#[derive(Debug, Default)]
pub struct JobStatus {
    inner: Mutex<StatusInner>,
}

impl JobStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a run (or a delivered unit of work) has begun.
    pub fn mark_started(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.is_running = true;
        inner.last_started_at = Some(Utc::now());
    }

    /// Record the outcome of the run begun by the last `mark_started`.
    pub fn mark_finished(&self, result: &Result<(), JobError>) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.is_running = false;
        inner.run_count += 1;
        inner.last_finished_at = Some(Utc::now());
        match result {
            Ok(()) => inner.last_error = None,
            Err(e) => {
                inner.failure_count += 1;
                inner.last_error = Some(e.to_string());
            }
        }
    }

    pub fn snapshot(&self) -> JobStatusInfo {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        JobStatusInfo {
            is_running: inner.is_running,
            run_count: inner.run_count,
            failure_count: inner.failure_count,
            last_started_at: inner.last_started_at.map(|dt| dt.to_rfc3339()),
            last_finished_at: inner.last_finished_at.map(|dt| dt.to_rfc3339()),
            last_error: inner.last_error.clone(),
        }
    }
}

/// Lifecycle handle of an armed job.
///
/// Returned by every starter and kept by the orchestrator so the job can
/// be stopped on shutdown.
#[derive(Debug)]
pub struct JobHandle {
    name: &'static str,
    cancellation_token: CancellationToken,
    task: JoinHandle<()>,
    shutdown_behavior: ShutdownBehavior,
    status: Arc<JobStatus>,
}

impl JobHandle {
    pub fn new(
        name: &'static str,
        cancellation_token: CancellationToken,
        task: JoinHandle<()>,
        shutdown_behavior: ShutdownBehavior,
        status: Arc<JobStatus>,
    ) -> Self {
        Self {
            name,
            cancellation_token,
            task,
            shutdown_behavior,
            status,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn shutdown_behavior(&self) -> ShutdownBehavior {
        self.shutdown_behavior
    }

    pub fn status(&self) -> JobStatusInfo {
        self.status.snapshot()
    }

    /// Whether the armed task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the job to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    /// Cancel the job and wait up to `timeout` for its task to exit.
    ///
    /// Returns `true` if the task exited in time. Cancellable jobs that
    /// overrun the timeout are aborted; others are left detached.
    pub async fn stop(mut self, timeout: Duration) -> bool {
        self.cancellation_token.cancel();

        if self.shutdown_behavior == ShutdownBehavior::WaitForCompletion {
            info!("Waiting for job {} to complete...", self.name);
        }

        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Job {} task ended abnormally: {}", self.name, e);
                true
            }
            Err(_) => {
                match self.shutdown_behavior {
                    ShutdownBehavior::Cancellable => {
                        warn!("Job {} did not stop within {:?}, aborting", self.name, timeout);
                        self.task.abort();
                    }
                    ShutdownBehavior::WaitForCompletion => {
                        warn!(
                            "Job {} did not complete within {:?}, detaching",
                            self.name, timeout
                        );
                    }
                }
                false
            }
        }
    }
}
