//! Process-wide settings, read once at startup.

use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, ScoutError};
use crate::security::{ModelCredentials, SecretString};
use crate::types::session::BackendKind;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Request budget for model and search provider calls.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(60);

/// Search provider keys. Serper is preferred when both are present.
#[derive(Debug, Clone, Default)]
pub struct SearchSettings {
    pub serper_api_key: Option<SecretString>,
    pub tavily_api_key: Option<SecretString>,
}

/// Limits applied to discovery and extraction.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Cap on candidates per subject.
    pub max_candidates: usize,
    pub fetch_concurrency: usize,
    pub fetch_timeout: Duration,
    /// Budget for building a backend, the comparison, and each discovery call.
    /// Expiry counts as a connection failure and triggers fallback.
    pub backend_timeout: Duration,
    /// Retries of transient model errors before falling back. 0 = fall back at once.
    pub max_retries: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_candidates: 5,
            fetch_concurrency: 4,
            fetch_timeout: Duration::from_secs(15),
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
            max_retries: 0,
        }
    }
}

/// Everything the selector and pipeline need.
#[derive(Debug, Clone)]
pub struct ScoutConfig {
    pub priority: Vec<BackendKind>,
    pub force_local: bool,
    pub openai: ModelCredentials,
    pub gemini: ModelCredentials,
    pub search: SearchSettings,
    pub pipeline: PipelineSettings,
    /// Probe remote models with a tiny request when building them.
    pub verify_backends: bool,
    pub database_url: Option<String>,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            priority: BackendKind::DEFAULT_PRIORITY.to_vec(),
            force_local: false,
            openai: ModelCredentials::new(None, DEFAULT_OPENAI_MODEL),
            gemini: ModelCredentials::new(None, DEFAULT_GEMINI_MODEL),
            search: SearchSettings::default(),
            pipeline: PipelineSettings::default(),
            verify_backends: false,
            database_url: None,
        }
    }
}

impl ScoutConfig {
    /// Load configuration from environment variables, reading `.env` first.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = PipelineSettings::default();

        let priority = match get("SCOUT_BACKEND_PRIORITY") {
            Some(list) => parse_priority(&list)?,
            None => BackendKind::DEFAULT_PRIORITY.to_vec(),
        };

        let mut openai = ModelCredentials::new(
            get("OPENAI_API_KEY"),
            get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        );
        if let Some(url) = get("OPENAI_BASE_URL") {
            openai = openai.with_base_url(url);
        }

        let mut gemini = ModelCredentials::new(
            get("GEMINI_API_KEY"),
            get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        );
        if let Some(url) = get("GEMINI_BASE_URL") {
            gemini = gemini.with_base_url(url);
        }

        Ok(Self {
            priority,
            force_local: parse_flag("SCOUT_FORCE_LOCAL", get("SCOUT_FORCE_LOCAL"))?,
            openai,
            gemini,
            search: SearchSettings {
                serper_api_key: get("SERPER_API_KEY").map(SecretString::new),
                tavily_api_key: get("TAVILY_API_KEY").map(SecretString::new),
            },
            pipeline: PipelineSettings {
                max_candidates: parse_or(
                    "SCOUT_MAX_CANDIDATES",
                    get("SCOUT_MAX_CANDIDATES"),
                    defaults.max_candidates,
                )?,
                fetch_concurrency: parse_or(
                    "SCOUT_FETCH_CONCURRENCY",
                    get("SCOUT_FETCH_CONCURRENCY"),
                    defaults.fetch_concurrency,
                )?
                .max(1),
                fetch_timeout: Duration::from_secs(parse_or(
                    "SCOUT_FETCH_TIMEOUT_SECS",
                    get("SCOUT_FETCH_TIMEOUT_SECS"),
                    defaults.fetch_timeout.as_secs(),
                )?),
                backend_timeout: Duration::from_secs(parse_or(
                    "SCOUT_BACKEND_TIMEOUT_SECS",
                    get("SCOUT_BACKEND_TIMEOUT_SECS"),
                    defaults.backend_timeout.as_secs(),
                )?),
                max_retries: parse_or(
                    "SCOUT_MAX_RETRIES",
                    get("SCOUT_MAX_RETRIES"),
                    defaults.max_retries,
                )?,
            },
            verify_backends: parse_flag("SCOUT_VERIFY_BACKENDS", get("SCOUT_VERIFY_BACKENDS"))?,
            database_url: get("DATABASE_URL"),
        })
    }

    pub fn with_force_local(mut self, force: bool) -> Self {
        self.force_local = force;
        self
    }

    pub fn with_priority(mut self, priority: Vec<BackendKind>) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_openai_key(mut self, key: impl Into<String>) -> Self {
        self.openai.api_key = Some(SecretString::new(key));
        self
    }

    pub fn with_gemini_key(mut self, key: impl Into<String>) -> Self {
        self.gemini.api_key = Some(SecretString::new(key));
        self
    }

    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.pipeline.max_candidates = max;
        self
    }

    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.pipeline.fetch_concurrency = concurrency.max(1);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline.fetch_timeout = timeout;
        self
    }

    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline.backend_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.pipeline.max_retries = retries;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Credentials for a remote backend. `None` for the local one.
    pub fn credentials_for(&self, kind: BackendKind) -> Option<&ModelCredentials> {
        match kind {
            BackendKind::PrimaryRemote => Some(&self.openai),
            BackendKind::SecondaryRemote => Some(&self.gemini),
            BackendKind::LocalDeterministic => None,
        }
    }
}

fn parse_priority(list: &str) -> Result<Vec<BackendKind>> {
    let mut kinds = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind = BackendKind::from_str(item)?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(ScoutError::Config(
            "SCOUT_BACKEND_PRIORITY lists no backends".to_string(),
        ));
    }
    Ok(kinds)
}

fn parse_flag(key: &str, value: Option<String>) -> Result<bool> {
    match value.as_deref().map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ScoutError::Config(format!(
                "{key} must be a boolean, got {other:?}"
            ))),
        },
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ScoutError::Config(format!("{key} must be a number, got {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ScoutConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.priority, BackendKind::DEFAULT_PRIORITY.to_vec());
        assert!(!config.force_local);
        assert_eq!(config.gemini.model, "gemini-1.5-flash");
        assert_eq!(config.pipeline.max_candidates, 5);
        assert_eq!(config.pipeline.fetch_timeout, Duration::from_secs(15));
        assert_eq!(config.pipeline.backend_timeout, DEFAULT_BACKEND_TIMEOUT);
        assert!(config.openai.api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ScoutConfig::from_lookup(lookup(&[
            ("SCOUT_BACKEND_PRIORITY", "gemini, local"),
            ("SCOUT_FORCE_LOCAL", "TRUE"),
            ("OPENAI_API_KEY", "sk-abcdefghijklmnopqrstuvwxyz"),
            ("SCOUT_FETCH_CONCURRENCY", "0"),
            ("SCOUT_MAX_RETRIES", "2"),
            ("SCOUT_BACKEND_TIMEOUT_SECS", "20"),
            ("SERPER_API_KEY", ""),
        ]))
        .unwrap();

        assert_eq!(
            config.priority,
            vec![BackendKind::SecondaryRemote, BackendKind::LocalDeterministic]
        );
        assert!(config.force_local);
        assert!(config.openai.api_key.is_some());
        assert_eq!(config.pipeline.fetch_concurrency, 1);
        assert_eq!(config.pipeline.max_retries, 2);
        assert_eq!(config.pipeline.backend_timeout, Duration::from_secs(20));
        assert!(config.search.serper_api_key.is_none());
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(ScoutConfig::from_lookup(lookup(&[("SCOUT_BACKEND_PRIORITY", "claude")])).is_err());
        assert!(ScoutConfig::from_lookup(lookup(&[("SCOUT_FORCE_LOCAL", "maybe")])).is_err());
        assert!(ScoutConfig::from_lookup(lookup(&[("SCOUT_MAX_CANDIDATES", "five")])).is_err());
    }
}
