//! Recurring task runner.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
};
use chrono::Utc;
use tracing::{debug, info};

/// Polls the store for recurring tasks that are due and runs them.
pub struct RecurringTasksJob {
    schedule: JobSchedule,
}

impl RecurringTasksJob {
    pub fn new(schedule: JobSchedule) -> Self {
        Self { schedule }
    }
}

impl BackgroundJob for RecurringTasksJob {
    fn id(&self) -> &'static str {
        "recurring_tasks"
    }

    fn description(&self) -> &'static str {
        "Execute recurring tasks that are due"
    }

    fn schedule(&self) -> JobSchedule {
        self.schedule
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let ran = ctx
            .loyalty_store
            .run_due_recurring_tasks(Utc::now())
            .map_err(|e| JobError::ExecutionFailed(e.to_string()))?;

        if ran > 0 {
            info!("Ran {} recurring tasks", ran);
        } else {
            debug!("No recurring tasks due");
        }
        Ok(())
    }
}
