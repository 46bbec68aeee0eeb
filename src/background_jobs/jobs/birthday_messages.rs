//! Birthday messaging background job.
//!
//! Once a day, queues a birthday message for every customer born on
//! today's date. Customers born on February 29 are greeted on February 28
//! in non-leap years.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
};
use crate::messaging::{MessageKind, OutboundMessage};
use chrono::{Datelike, NaiveDate, Utc};
use tracing::{debug, info};

pub struct BirthdayMessagesJob {
    schedule: JobSchedule,
}

impl BirthdayMessagesJob {
    pub fn new(schedule: JobSchedule) -> Self {
        Self { schedule }
    }

    /// Queue birthday messages for `today`; returns the number queued.
    pub(crate) fn queue_for(&self, ctx: &JobContext, today: NaiveDate) -> Result<usize, JobError> {
        let mut queued = 0;

        for (month, day) in birthday_dates(today) {
            let customers = ctx
                .loyalty_store
                .customers_with_birthday(month, day)
                .map_err(|e| JobError::ExecutionFailed(e.to_string()))?;

            for customer in customers {
                if ctx.is_cancelled() {
                    return Err(JobError::Cancelled);
                }
                let Some(recipient) = customer.contact() else {
                    debug!("Customer {} has no contact, skipping birthday message", customer.id);
                    continue;
                };
                ctx.outbox
                    .enqueue_blocking(OutboundMessage::new(
                        customer.id.as_str(),
                        recipient,
                        MessageKind::Birthday,
                    ))
                    .map_err(|e| JobError::ExecutionFailed(e.to_string()))?;
                queued += 1;
            }
        }

        Ok(queued)
    }
}

/// Month/day pairs whose birthdays are celebrated on `today`.
fn birthday_dates(today: NaiveDate) -> Vec<(u32, u32)> {
    let mut dates = vec![(today.month(), today.day())];
    let is_leap = NaiveDate::from_ymd_opt(today.year(), 2, 29).is_some();
    if today.month() == 2 && today.day() == 28 && !is_leap {
        dates.push((2, 29));
    }
    dates
}

impl BackgroundJob for BirthdayMessagesJob {
    fn id(&self) -> &'static str {
        "birthday_messages"
    }

    fn description(&self) -> &'static str {
        "Queue birthday messages for customers born today"
    }

    fn schedule(&self) -> JobSchedule {
        self.schedule
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let today = Utc::now().date_naive();
        let queued = self.queue_for(ctx, today)?;

        if queued > 0 {
            info!("Queued {} birthday messages for {}", queued, today);
        } else {
            info!("No birthdays on {}", today);
        }
        Ok(())
    }
}
