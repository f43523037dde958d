//! Construct-once owner of the process's email provider.
//!
//! `Uninitialized -> Ready` on the first successful [`EmailServiceFactory::get`].
//! A configuration error is returned to the caller and not remembered, so a
//! later `get` re-reads configuration. Once ready, the provider never changes.

use crate::config::EmailConfig;
use crate::error::DispatchResult;
use crate::provider::{create_provider, DynEmailProvider};
use core_config::{EnvSource, FromEnv, ProcessEnv};
use once_cell::sync::OnceCell;
use tracing::{error, info};

pub struct EmailServiceFactory {
    source: Box<dyn EnvSource>,
    provider: OnceCell<DynEmailProvider>,
}

impl EmailServiceFactory {
    /// Resolve configuration from `source` on first use
    pub fn new(source: impl EnvSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            provider: OnceCell::new(),
        }
    }

    /// Resolve configuration from the process environment on first use
    pub fn from_process_env() -> Self {
        Self::new(ProcessEnv)
    }

    /// Already ready with `provider`; configuration is never read
    pub fn with_provider(provider: DynEmailProvider) -> Self {
        Self {
            source: Box::new(ProcessEnv),
            provider: OnceCell::with_value(provider),
        }
    }

    /// The provider, built on the first successful call and shared afterwards
    pub fn get(&self) -> DispatchResult<DynEmailProvider> {
        self.provider
            .get_or_try_init(|| {
                let config = EmailConfig::from_source(self.source.as_ref()).map_err(|e| {
                    error!(error = %e, "Email provider configuration is invalid");
                    e
                })?;
                info!(provider = %config.provider.kind(), "Resolving email provider");
                create_provider(&config)
            })
            .cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.provider.get().is_some()
    }
}
