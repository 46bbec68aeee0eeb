use crate::loyalty::LoyaltyStore;
use crate::messaging::MessageOutbox;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs when they are armed and on every run.
///
/// Contains references to shared collaborators, the runtime jobs spawn
/// onto, and a cancellation token for graceful shutdown handling.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    /// Runtime the job's timer or worker task is spawned on.
    pub runtime: Handle,

    /// Access to customer and loyalty data.
    pub loyalty_store: Arc<dyn LoyaltyStore>,

    /// Producer side of the outbound message queue.
    pub outbox: MessageOutbox,
}

impl JobContext {
    /// Create a new job context with the given dependencies.
    pub fn new(
        cancellation_token: CancellationToken,
        runtime: Handle,
        loyalty_store: Arc<dyn LoyaltyStore>,
        outbox: MessageOutbox,
    ) -> Self {
        Self {
            cancellation_token,
            runtime,
            loyalty_store,
            outbox,
        }
    }

    /// Derive the context for a single job: same collaborators, child token.
    ///
    /// Cancelling the parent cancels every derived context; cancelling a
    /// derived context leaves its siblings alone.
    pub fn for_job(&self) -> Self {
        Self {
            cancellation_token: self.cancellation_token.child_token(),
            runtime: self.runtime.clone(),
            loyalty_store: Arc::clone(&self.loyalty_store),
            outbox: self.outbox.clone(),
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
