//! RFM scoring background job.
//!
//! Periodically recomputes every customer's recency/frequency/monetary
//! score so segments on the dashboard stay current.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
};
use chrono::Utc;
use tracing::info;

pub struct RfmScoringJob {
    schedule: JobSchedule,
}

impl RfmScoringJob {
    pub fn new(schedule: JobSchedule) -> Self {
        Self { schedule }
    }
}

impl BackgroundJob for RfmScoringJob {
    fn id(&self) -> &'static str {
        "rfm_scoring"
    }

    fn description(&self) -> &'static str {
        "Recalculate customer RFM scores"
    }

    fn schedule(&self) -> JobSchedule {
        self.schedule
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let scored = ctx
            .loyalty_store
            .recalculate_rfm_scores(Utc::now())
            .map_err(|e| JobError::ExecutionFailed(e.to_string()))?;

        info!("Recalculated RFM scores for {} customers", scored);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background_jobs::testing::test_context_with;
    use crate::loyalty::{Customer, MemoryLoyaltyStore};
    use std::sync::Arc;

    fn job() -> Arc<RfmScoringJob> {
        Arc::new(RfmScoringJob::new(JobSchedule::Daily { hour: 2, minute: 0 }))
    }

    #[tokio::test]
    async fn test_scores_customers() {
        let store = Arc::new(MemoryLoyaltyStore::new());
        store.add_customer(Customer {
            id: "c1".to_string(),
            name: "Ada".to_string(),
            email: None,
            phone: None,
            birthday: None,
            last_order_at: Some(Utc::now()),
        });
        let (ctx, _rx) = test_context_with(Arc::clone(&store));

        let job = job();
        tokio::task::spawn_blocking(move || job.execute(&ctx))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(store.rfm_score("c1"), Some(5));
    }

    #[tokio::test]
    async fn test_store_failure_is_execution_failure() {
        let store = Arc::new(MemoryLoyaltyStore::new());
        store.set_unavailable(true);
        let (ctx, _rx) = test_context_with(store);

        let job = job();
        let result = tokio::task::spawn_blocking(move || job.execute(&ctx))
            .await
            .unwrap();

        assert!(matches!(result, Err(JobError::ExecutionFailed(msg)) if msg.contains("unavailable")));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (ctx, _rx) = test_context_with(Arc::new(MemoryLoyaltyStore::new()));
        ctx.cancellation_token.cancel();

        assert!(matches!(job().execute(&ctx), Err(JobError::Cancelled)));
    }
}
