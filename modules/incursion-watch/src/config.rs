use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment configuration: secrets and deployment-specific values.
/// Tunables live in the TOML `FileConfig`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres backing the persistent tier. Without it everything is in-memory.
    pub database_url: Option<String>,
    pub slack_webhook_url: Option<String>,
    /// Public URL pinged by the keep-alive job.
    pub hosted_url: Option<String>,
    pub esi_base_url: String,
    pub esi_timeout: Duration,
    /// Bound on every persistent store call.
    pub store_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let esi_timeout_secs = secs_env("ESI_TIMEOUT_SECS", 10)?;
        let store_timeout_secs = secs_env("STORE_TIMEOUT_SECS", 5)?;

        let config = Self {
            database_url: non_empty_env("DATABASE_URL"),
            slack_webhook_url: non_empty_env("SLACK_WEBHOOK_URL"),
            hosted_url: non_empty_env("HOSTED_URL"),
            esi_base_url: non_empty_env("ESI_BASE_URL")
                .unwrap_or_else(|| esi_client::DEFAULT_BASE_URL.to_string()),
            esi_timeout: Duration::from_secs(esi_timeout_secs),
            store_timeout: Duration::from_secs(store_timeout_secs),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) => {
                    let head: String = v.chars().take(12).collect();
                    format!("{head}...({} chars)", v.len())
                }
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", preview_opt(&self.database_url));
        tracing::info!("  SLACK_WEBHOOK_URL: {}", preview_opt(&self.slack_webhook_url));
        tracing::info!("  HOSTED_URL: {}", preview_opt(&self.hosted_url));
        tracing::info!("  ESI_BASE_URL: {}", self.esi_base_url);
        tracing::info!("  ESI_TIMEOUT_SECS: {}", self.esi_timeout.as_secs());
        tracing::info!("  STORE_TIMEOUT_SECS: {}", self.store_timeout.as_secs());
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn secs_env(key: &str, default: u64) -> Result<u64> {
    let Some(v) = non_empty_env(key) else {
        return Ok(default);
    };
    let secs: u64 = v
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a number, got {v:?}"))?;
    if secs == 0 {
        anyhow::bail!("{key} must be greater than zero");
    }
    Ok(secs)
}

/// TOML-backed tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub watch: WatchConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Home staging system; routes and jump counts are measured from here.
    pub default_staging_system_id: i64,
    /// Incursions staged above this security status are never reported.
    pub security_status_threshold: f32,
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default = "default_resolution_secs")]
    pub resolution_secs: u64,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            resolution_secs: default_resolution_secs(),
            check_interval_secs: default_check_interval_secs(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
        }
    }
}

fn default_staleness_secs() -> i64 {
    crate::snapshot::DEFAULT_STALENESS_SECS
}

fn default_resolution_secs() -> u64 {
    60
}

// Just past the staleness window so every check sees a fresh list.
fn default_check_interval_secs() -> u64 {
    5 * 60 + 1
}

fn default_keepalive_interval_secs() -> u64 {
    20 * 60
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let config: FileConfig = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let sched = &self.scheduler;
        for (field, value) in [
            ("scheduler.resolution_secs", sched.resolution_secs),
            ("scheduler.check_interval_secs", sched.check_interval_secs),
            ("scheduler.keepalive_interval_secs", sched.keepalive_interval_secs),
        ] {
            if value == 0 {
                anyhow::bail!("{field} must be greater than zero");
            }
        }
        if self.watch.staleness_secs < 0 {
            anyhow::bail!("watch.staleness_secs must not be negative");
        }
        Ok(())
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    FileConfig::parse(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
