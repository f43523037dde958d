use core_config::server::ServerConfig;
use core_config::{ConfigError, EnvSource, FromEnv, env_or_default, env_required};
use std::path::PathBuf;

/// Newsletter API configuration
///
/// - `HOST`, `PORT`: listen address (default `0.0.0.0:8080`)
/// - `ADMIN_API_TOKEN`: bearer token admins present (required)
/// - `NEWSLETTER_SUBSCRIBERS_FILE`: subscriber list (default `subscribers.json`)
///
/// Provider settings are read separately by the email factory on first send.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub admin_token: String,
    pub subscribers_file: PathBuf,
}

impl FromEnv for AppConfig {
    fn from_source(source: &dyn EnvSource) -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_source(source)?,
            admin_token: env_required(source, "ADMIN_API_TOKEN")?,
            subscribers_file: env_or_default(
                source,
                "NEWSLETTER_SUBSCRIBERS_FILE",
                "subscribers.json",
            )
            .into(),
        })
    }
}
