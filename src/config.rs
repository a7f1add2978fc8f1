use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Process configuration from the environment. Planner behavior lives in the
/// separate planner configuration document; this covers only where data
/// lives and how the process runs.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Optional TOML planner configuration; defaults apply when absent.
    pub planner_config_path: Option<PathBuf>,
    pub planner_timeout: Duration,
    pub shutdown_grace: Duration,
    pub sync_interval_minutes: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("HELMSMAN_DATA_DIR")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let planner_config_path = std::env::var("HELMSMAN_PLANNER_CONFIG")
            .ok()
            .map(PathBuf::from);

        let planner_timeout = parse_seconds("HELMSMAN_PLANNER_TIMEOUT_SECONDS", 60)?;
        let shutdown_grace = parse_seconds("HELMSMAN_SHUTDOWN_GRACE_SECONDS", 30)?;

        let sync_interval_minutes = match std::env::var("HELMSMAN_SYNC_INTERVAL_MINUTES") {
            Ok(raw) => raw
                .parse::<u64>()
                .context("HELMSMAN_SYNC_INTERVAL_MINUTES must be an integer")?,
            Err(_) => 5,
        };

        Ok(Self {
            data_dir,
            planner_config_path,
            planner_timeout,
            shutdown_grace,
            sync_interval_minutes,
        })
    }
}

fn parse_seconds(var: &str, default: u64) -> Result<Duration> {
    let seconds = match std::env::var(var) {
        Ok(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{} must be an integer", var))?,
        Err(_) => default,
    };
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        // Env vars are unset in the test environment.
        let config = Config::from_env().unwrap();
        assert_eq!(config.sync_interval_minutes, 5);
        assert_eq!(config.planner_timeout, Duration::from_secs(60));
    }
}
