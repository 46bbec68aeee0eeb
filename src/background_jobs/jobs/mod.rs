//! The loyalty system's background jobs.
//!
//! This module contains the job bodies and the fixed registration order
//! used by the server at startup.

pub mod birthday_messages;
pub mod inactivity_messages;
pub mod message_worker;
pub mod recurring_tasks;
pub mod rfm_scoring;

pub use birthday_messages::BirthdayMessagesJob;
pub use inactivity_messages::InactivityMessagesJob;
pub use message_worker::MessageWorkerJob;
pub use recurring_tasks::RecurringTasksJob;
pub use rfm_scoring::RfmScoringJob;

use super::job::JobSchedule;
use super::periodic::PeriodicJob;
use super::registry::{JobRegistry, RegistryError};
use crate::config::BackgroundJobsSettings;
use crate::messaging::{MessageSender, OutboundMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Build the registration set: scoring, birthday, inactivity, recurring, worker.
pub fn loyalty_job_registry(
    settings: &BackgroundJobsSettings,
    message_receiver: mpsc::Receiver<OutboundMessage>,
    message_sender: Arc<dyn MessageSender>,
) -> Result<JobRegistry, RegistryError> {
    JobRegistry::builder()
        .register(PeriodicJob::new(RfmScoringJob::new(JobSchedule::Daily {
            hour: settings.rfm_scoring_hour,
            minute: 0,
        })))
        .register(PeriodicJob::new(BirthdayMessagesJob::new(JobSchedule::Daily {
            hour: settings.birthday_hour,
            minute: 0,
        })))
        .register(PeriodicJob::new(InactivityMessagesJob::new(
            JobSchedule::Daily {
                hour: settings.inactivity_hour,
                minute: 0,
            },
            settings.inactivity_days,
        )))
        .register(PeriodicJob::new(RecurringTasksJob::new(JobSchedule::Interval(
            Duration::from_secs(settings.recurring_tasks_interval_secs),
        ))))
        .register(MessageWorkerJob::new(message_receiver, message_sender))
        .build()
}
