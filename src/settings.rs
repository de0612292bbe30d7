use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment};
use serde::Deserialize;

use crate::cache::CachePolicy;
use crate::urls::DEFAULT_BASE_URL;

const ENV_PREFIX: &str = "TRAILS";

/// Runtime settings: built-in defaults overridden by `TRAILS_*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub cache_dir: PathBuf,
    /// Pause before each listing page after the first.
    pub page_delay_secs: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Unset means cached tables never expire.
    pub max_cache_age_hours: Option<u64>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_builder(defaults()?.add_source(Environment::with_prefix(ENV_PREFIX)))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        builder
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_secs(self.page_delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Fails when the max age does not fit a `chrono::Duration`.
    pub fn cache_policy(&self) -> Result<CachePolicy> {
        let Some(hours) = self.max_cache_age_hours else {
            return Ok(CachePolicy::Trust);
        };
        i64::try_from(hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .map(CachePolicy::MaxAge)
            .with_context(|| format!("max_cache_age_hours out of range: {hours}"))
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        .set_default("base_url", DEFAULT_BASE_URL)?
        .set_default("cache_dir", ".")?
        .set_default("page_delay_secs", 5)?
        .set_default("timeout_secs", 30)?
        .set_default(
            "user_agent",
            concat!("trail_scraper/", env!("CARGO_PKG_VERSION")),
        )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_site_etiquette() {
        let s = Settings::from_builder(defaults().unwrap()).unwrap();
        assert_eq!(s.base_url, DEFAULT_BASE_URL);
        assert_eq!(s.cache_dir, PathBuf::from("."));
        assert_eq!(s.page_delay(), Duration::from_secs(5));
        assert_eq!(s.timeout(), Duration::from_secs(30));
        assert!(s.user_agent.starts_with("trail_scraper/"));
        assert_eq!(s.cache_policy().unwrap(), CachePolicy::Trust);
    }

    #[test]
    fn overrides_apply() {
        let builder = defaults()
            .unwrap()
            .set_override("page_delay_secs", 1)
            .unwrap()
            .set_override("max_cache_age_hours", 24)
            .unwrap();
        let s = Settings::from_builder(builder).unwrap();
        assert_eq!(s.page_delay(), Duration::from_secs(1));
        assert_eq!(s.cache_policy().unwrap(), CachePolicy::MaxAge(chrono::Duration::hours(24)));
    }

    #[test]
    fn huge_max_age_is_rejected() {
        let builder = defaults()
            .unwrap()
            .set_override("max_cache_age_hours", 10_000_000_000_000_000i64)
            .unwrap();
        let s = Settings::from_builder(builder).unwrap();
        let err = s.cache_policy().unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let s = Settings {
            max_cache_age_hours: Some(u64::MAX),
            ..s
        };
        assert!(s.cache_policy().is_err());
    }
}
