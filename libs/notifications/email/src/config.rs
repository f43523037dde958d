//! Provider selection and credentials.
//!
//! | Variable | Used by | Default |
//! |---|---|---|
//! | `EMAIL_PROVIDER` | all | `sendgrid` |
//! | `FROM_EMAIL` | all | required |
//! | `SENDGRID_API_KEY` | sendgrid | required |
//! | `BREVO_API_KEY` | brevo | required |
//! | `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` | ses | required |
//! | `AWS_REGION` | ses | `us-east-1` |
//! | `SENDGRID_API_URL`, `BREVO_API_URL`, `SES_ENDPOINT_URL` | endpoint overrides | provider default |
//! | `EMAIL_RETRY_MAX_ATTEMPTS` | all | 3 |
//! | `EMAIL_RETRY_BASE_DELAY_MS` | all | 1000 |
//! | `EMAIL_BULK_CONCURRENCY` | fan-out providers | 10 |
//! | `EMAIL_HTTP_TIMEOUT_SECS` | all | 30 |

use core_config::{
    env_optional, env_or_default, env_parse, env_required, ConfigError, EnvSource, FromEnv,
};
use retry::{Backoff, RetryPolicy};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const SENDGRID_DEFAULT_URL: &str = "https://api.sendgrid.com";
pub const BREVO_DEFAULT_URL: &str = "https://api.brevo.com";
pub const DEFAULT_SES_REGION: &str = "us-east-1";
pub const DEFAULT_BULK_CONCURRENCY: usize = 10;

/// Upper bound for exponential retry delays
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    SendGrid,
    Brevo,
    Ses,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::SendGrid => "sendgrid",
            ProviderKind::Brevo => "brevo",
            ProviderKind::Ses => "ses",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sendgrid" => Ok(ProviderKind::SendGrid),
            "brevo" => Ok(ProviderKind::Brevo),
            "ses" => Ok(ProviderKind::Ses),
            other => Err(format!(
                "unsupported email provider '{}' (expected sendgrid, brevo or ses)",
                other
            )),
        }
    }
}

/// Credentials and endpoint of the selected provider
#[derive(Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    SendGrid {
        api_key: String,
        base_url: String,
    },
    Brevo {
        api_key: String,
        base_url: String,
    },
    Ses {
        region: String,
        access_key_id: String,
        secret_access_key: String,
        endpoint_url: Option<String>,
    },
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::SendGrid { .. } => ProviderKind::SendGrid,
            ProviderConfig::Brevo { .. } => ProviderKind::Brevo,
            ProviderConfig::Ses { .. } => ProviderKind::Ses,
        }
    }

    fn from_source(kind: ProviderKind, source: &dyn EnvSource) -> Result<Self, ConfigError> {
        Ok(match kind {
            ProviderKind::SendGrid => ProviderConfig::SendGrid {
                api_key: env_required(source, "SENDGRID_API_KEY")?,
                base_url: env_or_default(source, "SENDGRID_API_URL", SENDGRID_DEFAULT_URL),
            },
            ProviderKind::Brevo => ProviderConfig::Brevo {
                api_key: env_required(source, "BREVO_API_KEY")?,
                base_url: env_or_default(source, "BREVO_API_URL", BREVO_DEFAULT_URL),
            },
            ProviderKind::Ses => ProviderConfig::Ses {
                region: env_or_default(source, "AWS_REGION", DEFAULT_SES_REGION),
                access_key_id: env_required(source, "AWS_ACCESS_KEY_ID")?,
                secret_access_key: env_required(source, "AWS_SECRET_ACCESS_KEY")?,
                endpoint_url: env_optional(source, "SES_ENDPOINT_URL"),
            },
        })
    }
}

// Secrets stay out of logs
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::SendGrid { base_url, .. } => f
                .debug_struct("SendGrid")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Brevo { base_url, .. } => f
                .debug_struct("Brevo")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Ses {
                region,
                endpoint_url,
                ..
            } => f
                .debug_struct("Ses")
                .field("region", region)
                .field("access_key_id", &"***")
                .field("secret_access_key", &"***")
                .field("endpoint_url", endpoint_url)
                .finish(),
        }
    }
}

/// Everything needed to build the process's email provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub provider: ProviderConfig,
    /// Default sender
    pub from_email: String,
    pub retry: RetryPolicy,
    /// Fan-out width for providers without a native bulk endpoint
    pub bulk_concurrency: usize,
    pub http_timeout: Duration,
}

impl FromEnv for EmailConfig {
    fn from_source(source: &dyn EnvSource) -> Result<Self, ConfigError> {
        let kind: ProviderKind = env_or_default(source, "EMAIL_PROVIDER", "sendgrid")
            .parse()
            .map_err(|details| ConfigError::ParseError {
                key: "EMAIL_PROVIDER".to_string(),
                details,
            })?;

        let provider = ProviderConfig::from_source(kind, source)?;
        let from_email = env_required(source, "FROM_EMAIL")?;

        let max_attempts = env_parse(source, "EMAIL_RETRY_MAX_ATTEMPTS", 3u32)?;
        let base_delay_ms = env_parse(source, "EMAIL_RETRY_BASE_DELAY_MS", 1000u64)?;
        let retry = RetryPolicy::new()
            .with_max_attempts(max_attempts)
            .with_backoff(retry_backoff(base_delay_ms));

        let bulk_concurrency = env_parse(source, "EMAIL_BULK_CONCURRENCY", DEFAULT_BULK_CONCURRENCY)?;
        if bulk_concurrency == 0 {
            return Err(ConfigError::ParseError {
                key: "EMAIL_BULK_CONCURRENCY".to_string(),
                details: "must be at least 1".to_string(),
            });
        }

        let http_timeout = Duration::from_secs(env_parse(source, "EMAIL_HTTP_TIMEOUT_SECS", 30u64)?);

        Ok(Self {
            provider,
            from_email,
            retry,
            bulk_concurrency,
            http_timeout,
        })
    }
}

fn retry_backoff(base_delay_ms: u64) -> Backoff {
    if base_delay_ms == 0 {
        return Backoff::None;
    }
    Backoff::Exponential {
        initial: Duration::from_millis(base_delay_ms),
        multiplier: 2,
        max: MAX_RETRY_DELAY.max(Duration::from_millis(base_delay_ms)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&'static str, &'static str)]) -> HashMap<&'static str, &'static str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_defaults_to_sendgrid() {
        let config = EmailConfig::from_source(&vars(&[
            ("SENDGRID_API_KEY", "SG.key"),
            ("FROM_EMAIL", "news@example.com"),
        ]))
        .unwrap();

        assert_eq!(
            config.provider,
            ProviderConfig::SendGrid {
                api_key: "SG.key".into(),
                base_url: SENDGRID_DEFAULT_URL.into(),
            }
        );
        assert_eq!(config.from_email, "news@example.com");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.bulk_concurrency, DEFAULT_BULK_CONCURRENCY);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_provider_selection_is_case_insensitive() {
        let config = EmailConfig::from_source(&vars(&[
            ("EMAIL_PROVIDER", "Brevo"),
            ("BREVO_API_KEY", "xkeysib"),
            ("FROM_EMAIL", "news@example.com"),
        ]))
        .unwrap();

        assert_eq!(config.provider.kind(), ProviderKind::Brevo);
    }

    #[test]
    fn test_unsupported_provider_is_named() {
        let err = EmailConfig::from_source(&vars(&[
            ("EMAIL_PROVIDER", "mailgun"),
            ("FROM_EMAIL", "news@example.com"),
        ]))
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("EMAIL_PROVIDER"));
        assert!(message.contains("mailgun"));
    }

    #[test]
    fn test_missing_credentials_name_the_variable() {
        let err = EmailConfig::from_source(&vars(&[("FROM_EMAIL", "news@example.com")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingEnvVar("SENDGRID_API_KEY".into()));

        let err = EmailConfig::from_source(&vars(&[
            ("EMAIL_PROVIDER", "ses"),
            ("AWS_ACCESS_KEY_ID", "AKIA"),
            ("FROM_EMAIL", "news@example.com"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingEnvVar("AWS_SECRET_ACCESS_KEY".into()));
    }

    #[test]
    fn test_ses_region_defaults() {
        let config = EmailConfig::from_source(&vars(&[
            ("EMAIL_PROVIDER", "ses"),
            ("AWS_ACCESS_KEY_ID", "AKIA"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("FROM_EMAIL", "news@example.com"),
        ]))
        .unwrap();

        match config.provider {
            ProviderConfig::Ses {
                region,
                endpoint_url,
                ..
            } => {
                assert_eq!(region, DEFAULT_SES_REGION);
                assert_eq!(endpoint_url, None);
            }
            other => panic!("expected SES config, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_from_email() {
        let err = EmailConfig::from_source(&vars(&[("SENDGRID_API_KEY", "SG.key")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingEnvVar("FROM_EMAIL".into()));
    }

    #[test]
    fn test_tuning_overrides() {
        let config = EmailConfig::from_source(&vars(&[
            ("SENDGRID_API_KEY", "SG.key"),
            ("FROM_EMAIL", "news@example.com"),
            ("EMAIL_RETRY_MAX_ATTEMPTS", "5"),
            ("EMAIL_RETRY_BASE_DELAY_MS", "0"),
            ("EMAIL_BULK_CONCURRENCY", "4"),
        ]))
        .unwrap();

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff, Backoff::None);
        assert_eq!(config.bulk_concurrency, 4);
    }

    #[test]
    fn test_zero_bulk_concurrency_is_rejected() {
        let err = EmailConfig::from_source(&vars(&[
            ("SENDGRID_API_KEY", "SG.key"),
            ("FROM_EMAIL", "news@example.com"),
            ("EMAIL_BULK_CONCURRENCY", "0"),
        ]))
        .unwrap_err();

        assert!(err.to_string().contains("EMAIL_BULK_CONCURRENCY"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ProviderConfig::Ses {
            region: "eu-west-1".into(),
            access_key_id: "AKIASECRET".into(),
            secret_access_key: "topsecret".into(),
            endpoint_url: None,
        };

        let debug = format!("{:?}", config);
        assert!(debug.contains("eu-west-1"));
        assert!(!debug.contains("AKIASECRET"));
        assert!(!debug.contains("topsecret"));
    }
}
