//! Inactivity messaging background job.
//!
//! Queues a win-back message for customers whose last order is older than
//! the configured inactivity window.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
};
use crate::messaging::{MessageKind, OutboundMessage};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

pub struct InactivityMessagesJob {
    schedule: JobSchedule,
    inactivity_days: u32,
}

impl InactivityMessagesJob {
    pub fn new(schedule: JobSchedule, inactivity_days: u32) -> Self {
        Self {
            schedule,
            inactivity_days,
        }
    }

    pub(crate) fn queue_at(&self, ctx: &JobContext, now: DateTime<Utc>) -> Result<usize, JobError> {
        let cutoff = Duration::try_days(i64::from(self.inactivity_days))
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| {
                JobError::ExecutionFailed(format!(
                    "inactivity window of {} days is out of range",
                    self.inactivity_days
                ))
            })?;
        let customers = ctx
            .loyalty_store
            .inactive_customers(cutoff)
            .map_err(|e| JobError::ExecutionFailed(e.to_string()))?;

        let mut queued = 0;
        for customer in customers {
            if ctx.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            let Some(recipient) = customer.contact() else {
                debug!("Customer {} has no contact, skipping inactivity message", customer.id);
                continue;
            };
            ctx.outbox
                .enqueue_blocking(OutboundMessage::new(
                    customer.id.as_str(),
                    recipient,
                    MessageKind::Inactivity,
                ))
                .map_err(|e| JobError::ExecutionFailed(e.to_string()))?;
            // Only a queued message consumes the customer's reminder.
            ctx.loyalty_store
                .mark_reminded(&customer.id, now)
                .map_err(|e| JobError::ExecutionFailed(e.to_string()))?;
            queued += 1;
        }
        Ok(queued)
    }
}

impl BackgroundJob for InactivityMessagesJob {
    fn id(&self) -> &'static str {
        "inactivity_messages"
    }

    fn description(&self) -> &'static str {
        "Queue win-back messages for inactive customers"
    }

    fn schedule(&self) -> JobSchedule {
        self.schedule
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let queued = self.queue_at(ctx, Utc::now())?;
        info!(
            "Queued {} inactivity messages (inactive for more than {} days)",
            queued, self.inactivity_days
        );
        Ok(())
    }
}
