use std::{path::Path, time::Duration};

use anyhow::Context;

use crate::sync::{DEFAULT_FETCH_TIMEOUT, DEFAULT_THROTTLE_WINDOW, SyncSettings};

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub profile_db: String,
    pub throttle_window: Duration,
    pub fetch_timeout: Duration,
}

const DEFAULT_PROFILE_DB: &str = "sqlite://kosync-profile.sqlite?mode=rwc";

impl Config {
    /// Read configuration from the process environment, after loading `.env.local` or `.env`
    /// if present.
    pub fn load() -> anyhow::Result<Self> {
        if Path::new(".env.local").exists() {
            dotenvy::from_filename(".env.local")?;
        } else if Path::new(".env").exists() {
            dotenvy::from_filename(".env")?;
        };
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let base_url = lookup("KOSYNC_BASE_URL").unwrap_or_default();
        let profile_db = lookup("KOSYNC_PROFILE_DB").unwrap_or(DEFAULT_PROFILE_DB.into());
        let throttle_window =
            millis(&lookup, "KOSYNC_THROTTLE_WINDOW_MS")?.unwrap_or(DEFAULT_THROTTLE_WINDOW);
        let fetch_timeout =
            millis(&lookup, "KOSYNC_FETCH_TIMEOUT_MS")?.unwrap_or(DEFAULT_FETCH_TIMEOUT);
        Ok(Config {
            base_url,
            profile_db,
            throttle_window,
            fetch_timeout,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("KOSYNC_BASE_URL is missing".into());
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(format!(
                "KOSYNC_BASE_URL must be an http(s) URL: {}",
                self.base_url
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err("KOSYNC_FETCH_TIMEOUT_MS must be greater than zero".into());
        }
        Ok(())
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            throttle_window: self.throttle_window,
            fetch_timeout: self.fetch_timeout,
        }
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> anyhow::Result<Option<Duration>> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .with_context(|| format!("Invalid {}: {}", key, raw))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = config_from(&[("KOSYNC_BASE_URL", "http://localhost:8081")]).unwrap();
        assert_eq!(config.profile_db, DEFAULT_PROFILE_DB);
        assert_eq!(config.throttle_window, Duration::from_millis(60_000));
        assert_eq!(config.fetch_timeout, DEFAULT_FETCH_TIMEOUT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("KOSYNC_BASE_URL", "https://sync.example.org"),
            ("KOSYNC_PROFILE_DB", "sqlite::memory:"),
            ("KOSYNC_THROTTLE_WINDOW_MS", "1000"),
            ("KOSYNC_FETCH_TIMEOUT_MS", " 250 "),
        ])
        .unwrap();
        assert_eq!(config.profile_db, "sqlite::memory:");
        assert_eq!(
            config.sync_settings().throttle_window,
            Duration::from_secs(1)
        );
        assert_eq!(
            config.sync_settings().fetch_timeout,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = config_from(&[("KOSYNC_THROTTLE_WINDOW_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("KOSYNC_THROTTLE_WINDOW_MS"));
    }

    #[test]
    fn validate_reports_missing_base_url() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.validate(), Err("KOSYNC_BASE_URL is missing".into()));

        let config = config_from(&[("KOSYNC_BASE_URL", "localhost:8081")]).unwrap();
        assert!(config.validate().is_err());
    }
}
