use super::context::JobContext;
use super::handle::JobHandle;
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Schedule for when a job should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchedule {
    /// Run at fixed intervals, first run one interval after arming
    Interval(Duration),
    /// Run once a day at the given UTC wall-clock time
    Daily { hour: u32, minute: u32 },
    /// Consume a queue; no timer involved
    Queue,
}

impl JobSchedule {
    /// Check that the schedule can be armed.
    pub fn validate(&self) -> Result<(), JobError> {
        match *self {
            JobSchedule::Interval(interval) if interval.is_zero() => Err(
                JobError::InvalidSchedule("interval must be greater than zero".to_string()),
            ),
            JobSchedule::Daily { hour, minute } if hour > 23 || minute > 59 => {
                Err(JobError::InvalidSchedule(format!(
                    "daily time {:02}:{:02} is out of range",
                    hour, minute
                )))
            }
            _ => Ok(()),
        }
    }

    /// Time to wait from `now` until the next scheduled run.
    ///
    /// Returns `None` for queue consumers, which are not timer driven.
    pub fn delay_until_next(&self, now: DateTime<Utc>) -> Option<Duration> {
        match *self {
            JobSchedule::Interval(interval) => Some(interval),
            JobSchedule::Daily { hour, minute } => {
                let at = NaiveTime::from_hms_opt(hour, minute, 0)?;
                let mut next = now.date_naive().and_time(at).and_utc();
                if next <= now {
                    next += ChronoDuration::days(1);
                }
                (next - now).to_std().ok()
            }
            JobSchedule::Queue => None,
        }
    }
}

impl std::fmt::Display for JobSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobSchedule::Interval(d) => write!(f, "every {}s", d.as_secs()),
            JobSchedule::Daily { hour, minute } => {
                write!(f, "daily at {:02}:{:02} UTC", hour, minute)
            }
            JobSchedule::Queue => write!(f, "queue consumer"),
        }
    }
}

/// How a job should be handled during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownBehavior {
    /// Job can be cancelled immediately
    #[default]
    Cancellable,
    /// Wait for job to complete before shutdown
    WaitForCompletion,
}

/// Errors that can occur while starting or running a job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job is already started")]
    AlreadyStarted,

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Failed to start: {0}")]
    StartFailed(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Job panicked: {0}")]
    Panicked(String),

    #[error("Job was cancelled")]
    Cancelled,
}

/// A start-capable unit registered with the orchestrator.
///
/// `start` must not block: it arms a timer or launches a worker on the
/// context's runtime and returns the handle of what it armed.
pub trait JobStarter: Send + Sync {
    /// Unique name of this job, used in logs, metrics and the admin API.
    fn name(&self) -> &'static str;

    /// Description of what this job does.
    fn description(&self) -> &'static str {
        ""
    }

    /// When this job runs once armed.
    fn schedule(&self) -> JobSchedule;

    /// Arm the job.
    fn start(self: Arc<Self>, ctx: JobContext) -> Result<JobHandle, JobError>;
}

/// Trait for timer-driven job bodies.
///
/// Bodies are executed synchronously in a blocking context.
/// Long-running work should check `ctx.is_cancelled()` and bail out early.
pub trait BackgroundJob: Send + Sync {
    /// Unique identifier for this job.
    fn id(&self) -> &'static str;

    /// Description of what this job does.
    fn description(&self) -> &'static str;

    /// When this job should be scheduled to run.
    fn schedule(&self) -> JobSchedule;

    /// How this job should be handled during shutdown.
    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::Cancellable
    }

    /// Execute one run of the job.
    ///
    /// This method is called from a blocking context using `spawn_blocking`.
    fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}
