//! Message delivery worker.
//!
//! Consumes the outbound message queue and hands each message to the
//! configured [`MessageSender`]. On shutdown it stops taking new work and
//! delivers whatever was already queued.

use crate::background_jobs::{
    context::JobContext,
    handle::{JobHandle, JobStatus},
    job::{JobError, JobSchedule, JobStarter, ShutdownBehavior},
};
use crate::messaging::{MessageSender, OutboundMessage};
use crate::server::metrics;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const JOB_NAME: &str = "message_worker";

pub struct MessageWorkerJob {
    receiver: Mutex<Option<mpsc::Receiver<OutboundMessage>>>,
    sender: Arc<dyn MessageSender>,
}

impl MessageWorkerJob {
    pub fn new(receiver: mpsc::Receiver<OutboundMessage>, sender: Arc<dyn MessageSender>) -> Self {
        Self {
            receiver: Mutex::new(Some(receiver)),
            sender,
        }
    }
}

impl JobStarter for MessageWorkerJob {
    fn name(&self) -> &'static str {
        JOB_NAME
    }

    fn description(&self) -> &'static str {
        "Deliver queued customer messages"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Queue
    }

    fn start(self: Arc<Self>, ctx: JobContext) -> Result<JobHandle, JobError> {
        // The queue has a single consumer; a second start has nothing to consume.
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(JobError::AlreadyStarted)?;

        let status = Arc::new(JobStatus::new());
        let token = ctx.cancellation_token.clone();
        let task = ctx.runtime.spawn(deliver_loop(
            receiver,
            Arc::clone(&self.sender),
            token.clone(),
            Arc::clone(&status),
        ));

        info!("Armed job {} ({})", JOB_NAME, JobSchedule::Queue);
        Ok(JobHandle::new(
            JOB_NAME,
            token,
            task,
            ShutdownBehavior::WaitForCompletion,
            status,
        ))
    }
}

async fn deliver_loop(
    mut receiver: mpsc::Receiver<OutboundMessage>,
    sender: Arc<dyn MessageSender>,
    shutdown: CancellationToken,
    status: Arc<JobStatus>,
) {
    info!("Message worker started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            message = receiver.recv() => match message {
                Some(message) => deliver(sender.as_ref(), &message, &status).await,
                None => {
                    info!("Message queue closed");
                    break;
                }
            },
        }
    }

    receiver.close();
    let mut drained = 0;
    while let Some(message) = receiver.recv().await {
        deliver(sender.as_ref(), &message, &status).await;
        drained += 1;
    }

    info!(
        "Message worker stopped ({} queued messages delivered during shutdown)",
        drained
    );
}

async fn deliver(sender: &dyn MessageSender, message: &OutboundMessage, status: &JobStatus) {
    status.mark_started();
    let result = sender
        .send(message)
        .await
        .map_err(|e| JobError::ExecutionFailed(e.to_string()));

    match &result {
        Ok(()) => metrics::record_message_delivery(&message.kind.to_string(), "success"),
        Err(e) => {
            error!(
                "Failed to deliver {} message to customer {}: {}",
                message.kind, message.customer_id, e
            );
            metrics::record_message_delivery(&message.kind.to_string(), "failed");
        }
    }
    status.mark_finished(&result);
}
