use std::fmt;
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File};
use serde::Deserialize;

use crate::error::RelayError;
use crate::session::DEFAULT_BASE_URL;

/// Environment variables layered over the config file, as `(var, key)` pairs.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("OPENAI_API_KEY", "upstream.api_key"),
    ("WORKFLOW_ID", "upstream.workflow_id"),
    ("OPENAI_BASE", "upstream.base_url"),
    ("UPSTREAM_TIMEOUT_SECONDS", "upstream.timeout_seconds"),
    ("HOST", "http.host"),
    ("PORT", "http.port"),
];

/// Comma-separated list of browser origins allowed to call the relay.
const ALLOWED_ORIGINS_VAR: &str = "ALLOWED_ORIGINS";

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Service bearer credential. Never supplied by callers.
    #[serde(default)]
    pub api_key: String,
    /// Workflow instantiated for every new session.
    #[serde(default)]
    pub workflow_id: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &"<redacted>")
            .field("workflow_id", &self.workflow_id)
            .field("base_url", &self.base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: Vec::new(),
        }
    }
}

impl RelayConfig {
    /// Load from an optional TOML file with process environment overrides,
    /// then validate.
    pub fn load(path: &str) -> Result<Self, RelayError> {
        Self::load_with_env(path, |var| std::env::var(var).ok())
    }

    /// Same as [`RelayConfig::load`] with an injectable environment lookup.
    pub fn load_with_env<F>(path: &str, env: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let builder = Config::builder().add_source(File::with_name(path).required(false));
        Self::from_builder(builder, env)
    }

    fn from_builder<F>(
        builder: ConfigBuilder<DefaultState>,
        env: F,
    ) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = HttpConfig::default();
        let mut builder = builder
            .set_default("upstream.base_url", DEFAULT_BASE_URL)?
            .set_default("upstream.timeout_seconds", 30_i64)?
            .set_default("http.host", defaults.host)?
            .set_default("http.port", i64::from(defaults.port))?;

        for (var, key) in ENV_OVERRIDES {
            let value = env(*var).filter(|v| !v.is_empty());
            builder = builder.set_override_option(*key, value)?;
        }
        builder = builder.set_override_option(
            "http.allowed_origins",
            env(ALLOWED_ORIGINS_VAR).map(|raw| parse_origin_list(&raw)),
        )?;

        let mut config: RelayConfig = builder.build()?.try_deserialize()?;
        config.upstream.base_url = config.upstream.base_url.trim_end_matches('/').to_string();
        config.validate()?;
        Ok(config)
    }

    /// Startup validation. Anything that would make every request fail is
    /// rejected here, before the listener binds.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.upstream.api_key.trim().is_empty() {
            return Err(RelayError::MissingSetting("OPENAI_API_KEY"));
        }
        if self.upstream.workflow_id.trim().is_empty() {
            return Err(RelayError::MissingSetting("WORKFLOW_ID"));
        }
        if self.upstream.base_url.is_empty() {
            return Err(RelayError::MissingSetting("OPENAI_BASE"));
        }
        if self.upstream.timeout_seconds == 0 {
            return Err(RelayError::InvalidSetting {
                key: "UPSTREAM_TIMEOUT_SECONDS",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
