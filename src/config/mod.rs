mod file_config;

pub use file_config::{BackgroundJobsConfig, FileConfig};

use crate::background_jobs::StartupPolicy;
use anyhow::{bail, Result};

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub admin_port: u16,
    pub admin_server: bool,
    pub startup_policy: Option<StartupPolicy>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            admin_port: 9092,
            admin_server: true,
            startup_policy: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub admin_port: u16,
    pub admin_server: bool,
    pub background_jobs: BackgroundJobsSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let admin_port = file.admin_port.unwrap_or(cli.admin_port);
        let admin_server = file.admin_server.unwrap_or(cli.admin_server);

        let defaults = BackgroundJobsSettings::default();
        let jobs_file = file.background_jobs.unwrap_or_default();
        let background_jobs = BackgroundJobsSettings {
            startup_policy: jobs_file
                .startup_policy
                .or(cli.startup_policy)
                .unwrap_or(defaults.startup_policy),
            rfm_scoring_hour: jobs_file
                .rfm_scoring_hour
                .unwrap_or(defaults.rfm_scoring_hour),
            birthday_hour: jobs_file.birthday_hour.unwrap_or(defaults.birthday_hour),
            inactivity_hour: jobs_file
                .inactivity_hour
                .unwrap_or(defaults.inactivity_hour),
            inactivity_days: jobs_file
                .inactivity_days
                .unwrap_or(defaults.inactivity_days),
            recurring_tasks_interval_secs: jobs_file
                .recurring_tasks_interval_secs
                .unwrap_or(defaults.recurring_tasks_interval_secs),
            message_queue_capacity: jobs_file
                .message_queue_capacity
                .unwrap_or(defaults.message_queue_capacity),
            shutdown_timeout_secs: jobs_file
                .shutdown_timeout_secs
                .unwrap_or(defaults.shutdown_timeout_secs),
        };
        background_jobs.validate()?;

        Ok(Self {
            admin_port,
            admin_server,
            background_jobs,
        })
    }
}

/// Longest accepted inactivity window (about a century).
pub const MAX_INACTIVITY_DAYS: u32 = 36_500;

#[derive(Debug, Clone)]
pub struct BackgroundJobsSettings {
    pub startup_policy: StartupPolicy,
    pub rfm_scoring_hour: u32,
    pub birthday_hour: u32,
    pub inactivity_hour: u32,
    pub inactivity_days: u32,
    pub recurring_tasks_interval_secs: u64,
    pub message_queue_capacity: usize,
    pub shutdown_timeout_secs: u64,
}

impl Default for BackgroundJobsSettings {
    fn default() -> Self {
        Self {
            startup_policy: StartupPolicy::Isolated,
            rfm_scoring_hour: 2,
            birthday_hour: 9,
            inactivity_hour: 10,
            inactivity_days: 30,
            recurring_tasks_interval_secs: 60,
            message_queue_capacity: 1024,
            shutdown_timeout_secs: 30,
        }
    }
}

impl BackgroundJobsSettings {
    fn validate(&self) -> Result<()> {
        for (name, hour) in [
            ("rfm_scoring_hour", self.rfm_scoring_hour),
            ("birthday_hour", self.birthday_hour),
            ("inactivity_hour", self.inactivity_hour),
        ] {
            if hour > 23 {
                bail!("{} must be between 0 and 23, got {}", name, hour);
            }
        }
        if self.inactivity_days == 0 {
            bail!("inactivity_days must be greater than zero");
        }
        if self.inactivity_days > MAX_INACTIVITY_DAYS {
            bail!(
                "inactivity_days must be at most {}, got {}",
                MAX_INACTIVITY_DAYS,
                self.inactivity_days
            );
        }
        if self.recurring_tasks_interval_secs == 0 {
            bail!("recurring_tasks_interval_secs must be greater than zero");
        }
        if self.message_queue_capacity == 0 {
            bail!("message_queue_capacity must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_cli_only() {
        let cli = CliConfig {
            admin_port: 9200,
            admin_server: false,
            startup_policy: Some(StartupPolicy::FailFast),
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.admin_port, 9200);
        assert!(!config.admin_server);
        assert_eq!(config.background_jobs.startup_policy, StartupPolicy::FailFast);
        assert_eq!(config.background_jobs.inactivity_days, 30);
        assert_eq!(config.background_jobs.message_queue_capacity, 1024);
    }

    #[test]
    fn test_resolve_defaults() {
        let config = AppConfig::resolve(&CliConfig::default(), None).unwrap();

        assert_eq!(config.admin_port, 9092);
        assert!(config.admin_server);
        assert_eq!(config.background_jobs.startup_policy, StartupPolicy::Isolated);
        assert_eq!(config.background_jobs.rfm_scoring_hour, 2);
        assert_eq!(config.background_jobs.birthday_hour, 9);
        assert_eq!(config.background_jobs.inactivity_hour, 10);
        assert_eq!(config.background_jobs.recurring_tasks_interval_secs, 60);
        assert_eq!(config.background_jobs.shutdown_timeout_secs, 30);
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let cli = CliConfig {
            admin_port: 9200,
            startup_policy: Some(StartupPolicy::FailFast),
            ..Default::default()
        };

        let file_config = FileConfig {
            admin_port: Some(9300),
            background_jobs: Some(BackgroundJobsConfig {
                startup_policy: Some(StartupPolicy::Isolated),
                birthday_hour: Some(7),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        // TOML values should override CLI
        assert_eq!(config.admin_port, 9300);
        assert_eq!(config.background_jobs.startup_policy, StartupPolicy::Isolated);
        assert_eq!(config.background_jobs.birthday_hour, 7);
        // Defaults used when neither specifies
        assert!(config.admin_server);
        assert_eq!(config.background_jobs.inactivity_hour, 10);
    }

    #[test]
    fn test_resolve_rejects_out_of_range_hour() {
        let file_config = FileConfig {
            background_jobs: Some(BackgroundJobsConfig {
                inactivity_hour: Some(24),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = AppConfig::resolve(&CliConfig::default(), Some(file_config));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("inactivity_hour must be between 0 and 23"));
    }

    #[test]
    fn test_resolve_bounds_inactivity_days() {
        let with_days = |days| FileConfig {
            background_jobs: Some(BackgroundJobsConfig {
                inactivity_days: Some(days),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config =
            AppConfig::resolve(&CliConfig::default(), Some(with_days(MAX_INACTIVITY_DAYS))).unwrap();
        assert_eq!(config.background_jobs.inactivity_days, MAX_INACTIVITY_DAYS);

        let err = AppConfig::resolve(&CliConfig::default(), Some(with_days(u32::MAX))).unwrap_err();
        assert!(err.to_string().contains("inactivity_days must be at most 36500"));
    }

    #[test]
    fn test_resolve_rejects_zero_values() {
        for jobs in [
            BackgroundJobsConfig {
                inactivity_days: Some(0),
                ..Default::default()
            },
            BackgroundJobsConfig {
                recurring_tasks_interval_secs: Some(0),
                ..Default::default()
            },
            BackgroundJobsConfig {
                message_queue_capacity: Some(0),
                ..Default::default()
            },
        ] {
            let file_config = FileConfig {
                background_jobs: Some(jobs),
                ..Default::default()
            };
            let result = AppConfig::resolve(&CliConfig::default(), Some(file_config));
            assert!(result
                .unwrap_err()
                .to_string()
                .contains("must be greater than zero"));
        }
    }
}
