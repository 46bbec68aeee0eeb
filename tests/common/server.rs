//! Test server management
//!
//! This module manages spawning and shutting down the admin server together
//! with a started job orchestrator.

use super::constants::*;
use async_trait::async_trait;
use loyalty_jobs::background_jobs::jobs::loyalty_job_registry;
use loyalty_jobs::background_jobs::{JobContext, JobOrchestrator, StartupReport};
use loyalty_jobs::config::BackgroundJobsSettings;
use loyalty_jobs::messaging::{MessageOutbox, MessageSender, OutboundMessage};
use loyalty_jobs::server::{make_app, metrics, ServerState};
use loyalty_jobs::MemoryLoyaltyStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Message sender that keeps every delivered message.
#[derive(Default)]
pub struct RecordingSender {
    delivered: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSender {
    pub fn delivered(&self) -> Vec<OutboundMessage> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()> {
        self.delivered.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Running orchestrator plus admin server on a random port
///
/// When dropped, the admin server shuts down and every job is cancelled.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    pub orchestrator: Arc<JobOrchestrator>,
    pub startup_report: StartupReport,
    pub outbox: MessageOutbox,
    pub sender: Arc<RecordingSender>,

    shutdown: CancellationToken,
}

impl TestServer {
    /// Spawns the stack with default job settings
    pub async fn spawn() -> Self {
        Self::spawn_with(BackgroundJobsSettings::default()).await
    }

    /// Spawns the stack with the given settings
    ///
    /// Settings are used as-is, so invalid values reach the job starters
    /// instead of being rejected by config resolution.
    ///
    /// # Panics
    ///
    /// Panics if the registry cannot be built, port binding fails, or the
    /// server doesn't become ready within timeout.
    pub async fn spawn_with(settings: BackgroundJobsSettings) -> Self {
        metrics::init_metrics();

        let sender = Arc::new(RecordingSender::default());
        let (outbox, receiver) = MessageOutbox::channel(settings.message_queue_capacity);

        let registry = loyalty_job_registry(&settings, receiver, sender.clone())
            .expect("Failed to build job registry");

        let shutdown = CancellationToken::new();
        let context = JobContext::new(
            shutdown.child_token(),
            tokio::runtime::Handle::current(),
            Arc::new(MemoryLoyaltyStore::new()),
            outbox.clone(),
        );
        let orchestrator = Arc::new(JobOrchestrator::new(
            registry,
            context,
            settings.startup_policy,
        ));
        let startup_report = orchestrator
            .start_jobs()
            .expect("Isolated startup should always report");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let app = make_app(ServerState {
            orchestrator: orchestrator.clone(),
        });
        let server_token = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_token.cancelled().await })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            orchestrator,
            startup_report,
            outbox,
            sender,
            shutdown,
        };
        server.wait_for_ready().await;
        server
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::get(format!("{}{}", self.base_url, path))
            .await
            .expect("Request failed")
    }

    pub async fn get_json(&self, path: &str) -> serde_json::Value {
        self.get(path)
            .await
            .json()
            .await
            .expect("Response was not JSON")
    }

    /// Waits for the server to become ready by polling /v1/jobs
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/v1/jobs", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
