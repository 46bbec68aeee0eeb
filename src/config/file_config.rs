use crate::background_jobs::StartupPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub admin_port: Option<u16>,
    pub admin_server: Option<bool>,

    // Feature configs
    pub background_jobs: Option<BackgroundJobsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BackgroundJobsConfig {
    pub startup_policy: Option<StartupPolicy>,
    pub rfm_scoring_hour: Option<u32>,
    pub birthday_hour: Option<u32>,
    pub inactivity_hour: Option<u32>,
    pub inactivity_days: Option<u32>,
    pub recurring_tasks_interval_secs: Option<u64>,
    pub message_queue_capacity: Option<usize>,
    pub shutdown_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
