use super::context::JobContext;
use super::handle::{JobHandle, JobStatus};
use super::job::{BackgroundJob, JobError, JobSchedule, JobStarter};
use crate::server::metrics;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Arms a timer loop for a [`BackgroundJob`] body.
///
/// Runs of the same job never overlap: the next delay is computed only
/// after the previous run returned.
pub struct PeriodicJob<J> {
    job: Arc<J>,
}

impl<J: BackgroundJob + 'static> PeriodicJob<J> {
    pub fn new(job: J) -> Self {
        Self { job: Arc::new(job) }
    }
}

impl<J: BackgroundJob + 'static> JobStarter for PeriodicJob<J> {
    fn name(&self) -> &'static str {
        self.job.id()
    }

    fn description(&self) -> &'static str {
        self.job.description()
    }

    fn schedule(&self) -> JobSchedule {
        self.job.schedule()
    }

    fn start(self: Arc<Self>, ctx: JobContext) -> Result<JobHandle, JobError> {
        let schedule = self.job.schedule();
        schedule.validate()?;
        if schedule == JobSchedule::Queue {
            return Err(JobError::InvalidSchedule(
                "periodic jobs need a timer schedule".to_string(),
            ));
        }

        let status = Arc::new(JobStatus::new());
        let token = ctx.cancellation_token.clone();
        let behavior = self.job.shutdown_behavior();
        let task = ctx.runtime.spawn(run_loop(
            Arc::clone(&self.job),
            ctx.clone(),
            Arc::clone(&status),
        ));

        info!("Armed job {} ({})", self.job.id(), schedule);
        Ok(JobHandle::new(self.job.id(), token, task, behavior, status))
    }
}

async fn run_loop<J: BackgroundJob + 'static>(job: Arc<J>, ctx: JobContext, status: Arc<JobStatus>) {
    let job_id = job.id();
    let schedule = job.schedule();

    while let Some(delay) = schedule.delay_until_next(Utc::now()) {
        debug!("Job {} sleeping for {:?}", job_id, delay);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = ctx.cancellation_token.cancelled() => break,
        }

        let _ = run_once(&job, &ctx, &status).await;
    }

    info!("Job {} stopped", job_id);
}

/// Execute a single run on the blocking pool and record its outcome.
pub(crate) async fn run_once<J: BackgroundJob + 'static>(
    job: &Arc<J>,
    ctx: &JobContext,
    status: &JobStatus,
) -> Result<(), JobError> {
    let job_id = job.id();
    status.mark_started();
    metrics::set_background_job_running(job_id, true);

    let start_time = Instant::now();
    let run_job = Arc::clone(job);
    let run_ctx = ctx.clone();
    let joined = ctx
        .runtime
        .spawn_blocking(move || run_job.execute(&run_ctx))
        .await;
    let elapsed = start_time.elapsed();

    let (result, status_label) = match joined {
        Ok(Ok(())) => {
            info!("Job {} completed successfully in {:?}", job_id, elapsed);
            (Ok(()), "success")
        }
        Ok(Err(JobError::Cancelled)) => {
            info!("Job {} was cancelled after {:?}", job_id, elapsed);
            (Err(JobError::Cancelled), "cancelled")
        }
        Ok(Err(e)) => {
            error!("Job {} failed after {:?}: {}", job_id, elapsed, e);
            (Err(e), "failed")
        }
        Err(e) => {
            error!("Job {} panicked after {:?}: {}", job_id, elapsed, e);
            (Err(JobError::Panicked(e.to_string())), "panic")
        }
    };

    metrics::record_background_job_execution(job_id, status_label, elapsed);
    metrics::set_background_job_running(job_id, false);
    status.mark_finished(&result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background_jobs::testing::test_context;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingJob {
        schedule: JobSchedule,
        execution_count: Arc<AtomicUsize>,
        should_fail: Arc<AtomicBool>,
    }

    impl CountingJob {
        fn every(interval: Duration) -> Self {
            Self {
                schedule: JobSchedule::Interval(interval),
                execution_count: Arc::new(AtomicUsize::new(0)),
                should_fail: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl BackgroundJob for CountingJob {
        fn id(&self) -> &'static str {
            "counting_job"
        }

        fn description(&self) -> &'static str {
            "Counts its runs"
        }

        fn schedule(&self) -> JobSchedule {
            self.schedule
        }

        fn execute(&self, _ctx: &JobContext) -> Result<(), JobError> {
            self.execution_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail.load(Ordering::SeqCst) {
                Err(JobError::ExecutionFailed("Test failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    async fn wait_for_runs(count: &AtomicUsize, at_least: usize) {
        for _ in 0..200 {
            if count.load(Ordering::SeqCst) >= at_least {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job did not reach {} runs", at_least);
    }

    #[tokio::test]
    async fn test_armed_job_runs_on_interval_until_stopped() {
        let (ctx, _rx) = test_context();
        let job = CountingJob::every(Duration::from_millis(10));
        let count = Arc::clone(&job.execution_count);

        let handle = Arc::new(PeriodicJob::new(job)).start(ctx.for_job()).unwrap();
        assert_eq!(handle.name(), "counting_job");

        wait_for_runs(&count, 2).await;
        assert!(handle.stop(Duration::from_secs(1)).await);

        let after_stop = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_start_returns_immediately_without_running() {
        let (ctx, _rx) = test_context();
        let job = CountingJob::every(Duration::from_secs(3600));
        let count = Arc::clone(&job.execution_count);

        let handle = Arc::new(PeriodicJob::new(job)).start(ctx.for_job()).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(handle.stop(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_failures_are_recorded_and_loop_continues() {
        let (ctx, _rx) = test_context();
        let job = CountingJob::every(Duration::from_millis(10));
        job.should_fail.store(true, Ordering::SeqCst);
        let count = Arc::clone(&job.execution_count);

        let handle = Arc::new(PeriodicJob::new(job)).start(ctx.for_job()).unwrap();
        wait_for_runs(&count, 2).await;

        let status = handle.status();
        assert!(status.failure_count >= 1);
        assert_eq!(
            status.last_error,
            Some("Execution failed: Test failure".to_string())
        );
        handle.stop(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_run_once_reports_panic() {
        struct PanickingJob;

        impl BackgroundJob for PanickingJob {
            fn id(&self) -> &'static str {
                "panicking_job"
            }
            fn description(&self) -> &'static str {
                "Always panics"
            }
            fn schedule(&self) -> JobSchedule {
                JobSchedule::Interval(Duration::from_secs(60))
            }
            fn execute(&self, _ctx: &JobContext) -> Result<(), JobError> {
                panic!("kaboom");
            }
        }

        let (ctx, _rx) = test_context();
        let status = JobStatus::new();
        let result = run_once(&Arc::new(PanickingJob), &ctx, &status).await;

        assert!(matches!(result, Err(JobError::Panicked(_))));
        assert_eq!(status.snapshot().failure_count, 1);
    }

    #[tokio::test]
    async fn test_queue_schedule_is_rejected() {
        let (ctx, _rx) = test_context();
        let mut job = CountingJob::every(Duration::from_secs(1));
        job.schedule = JobSchedule::Queue;

        let result = Arc::new(PeriodicJob::new(job)).start(ctx.for_job());
        assert!(matches!(result, Err(JobError::InvalidSchedule(_))));
    }

    #[tokio::test]
    async fn test_invalid_daily_schedule_is_rejected() {
        let (ctx, _rx) = test_context();
        let mut job = CountingJob::every(Duration::from_secs(1));
        job.schedule = JobSchedule::Daily { hour: 25, minute: 0 };

        let result = Arc::new(PeriodicJob::new(job)).start(ctx.for_job());
        assert!(matches!(result, Err(JobError::InvalidSchedule(_))));
    }
}
