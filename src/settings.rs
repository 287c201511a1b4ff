use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://clinicaltrials.gov/api/v2";

/// Runtime settings: built-in defaults, then `ctgov.toml`, then `CTGOV_*` env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub page_delay_ms: u64,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
    pub reference_path: PathBuf,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("page_delay_ms", 1200)?
            .set_default("retry_delay_ms", 10_000)?
            .set_default("timeout_secs", 30)?
            .set_default("reference_path", "data/reference.toml")?
            .add_source(File::with_name("ctgov").required(false))
            .add_source(Environment::with_prefix("CTGOV"))
            .build()
            .and_then(|c| c.try_deserialize::<Settings>())
            .context("Failed to load settings")
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_registry_rate_limit() {
        let s = Settings::load().unwrap();
        assert_eq!(s.page_delay(), Duration::from_millis(1200));
        assert_eq!(s.retry_delay(), Duration::from_secs(10));
        assert!(s.base_url.starts_with("https://"));
    }
}
