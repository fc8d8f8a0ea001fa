use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::error::{Result, TrendError};

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const MIN_WINDOW_DAYS: i64 = 7;
pub const MAX_WINDOW_DAYS: i64 = 365;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub window_days: i64,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            window_days: DEFAULT_WINDOW_DAYS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Reads `JOBTRENDS_DB`, `JOBTRENDS_WINDOW_DAYS` and `JOBTRENDS_TIMEOUT_SECS`.
    /// Unparseable or out-of-range values fall back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = env::var("JOBTRENDS_DB") {
            if !path.trim().is_empty() {
                config.database_path = PathBuf::from(path);
            }
        }

        if let Ok(raw) = env::var("JOBTRENDS_WINDOW_DAYS") {
            match raw.trim().parse::<i64>() {
                Ok(days) if validate_window(days).is_ok() => config.window_days = days,
                _ => warn!(value = %raw, "ignoring invalid JOBTRENDS_WINDOW_DAYS"),
            }
        }

        if let Ok(raw) = env::var("JOBTRENDS_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => warn!(value = %raw, "ignoring invalid JOBTRENDS_TIMEOUT_SECS"),
            }
        }

        config
    }

    pub fn with_database_path(mut self, path: PathBuf) -> Self {
        self.database_path = path;
        self
    }

    pub fn with_window_days(mut self, days: i64) -> Result<Self> {
        self.window_days = validate_window(days)?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub fn validate_window(days: i64) -> Result<i64> {
    if (MIN_WINDOW_DAYS..=MAX_WINDOW_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(TrendError::InvalidWindow(days))
    }
}

fn default_database_path() -> PathBuf {
    // XDG data directory, or the working directory as a fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobtrends") {
        proj_dirs.data_dir().join("jobtrends.db")
    } else {
        PathBuf::from("jobtrends.db")
    }
}
