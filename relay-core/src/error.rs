use thiserror::Error;

/// Startup errors. Any of these stops the relay before it accepts requests.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Missing required setting {0} (set it in the environment or the config file)")]
    MissingSetting(&'static str),

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },
}
