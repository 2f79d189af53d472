use std::fmt;

use secrecy::SecretString;

use crate::core::error::ChatError;
use crate::core::types::ProviderId;
use crate::transform::redact_base_url;

pub const AZURE_ENDPOINT_ENV: &str = "AZURE_ENDPOINT";
pub const AZURE_API_KEY_ENV: &str = "AZURE_API_KEY";
pub const AZURE_API_VERSION_ENV: &str = "AZURE_API_VERSION";
pub const DEBUG_CHAT_COMPLETION_ENV: &str = "DEBUG_AZURE_CHAT_COMPLETION";

pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

/// Construction-time adapter configuration. Blank values count as absent.
pub struct ProviderConfig {
    endpoint: Option<String>,
    api_key: Option<SecretString>,
    api_version: Option<String>,
    debug_stream: bool,
}

/// Configuration after the credential checks passed.
pub(crate) struct ResolvedConfig {
    pub endpoint: String,
    pub api_key: SecretString,
    pub api_version: String,
    pub debug_stream: bool,
}

impl ProviderConfig {
    pub fn new(
        endpoint: Option<String>,
        api_key: Option<String>,
        api_version: Option<String>,
    ) -> Self {
        Self {
            endpoint: sanitize(endpoint),
            api_key: sanitize(api_key).map(SecretString::from),
            api_version: sanitize(api_version),
            debug_stream: false,
        }
    }

    /// Reads `AZURE_ENDPOINT`, `AZURE_API_KEY`, `AZURE_API_VERSION` and
    /// `DEBUG_AZURE_CHAT_COMPLETION` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let debug_stream = lookup(DEBUG_CHAT_COMPLETION_ENV).is_some_and(|value| value.trim() == "1");

        Self::new(
            lookup(AZURE_ENDPOINT_ENV),
            lookup(AZURE_API_KEY_ENV),
            lookup(AZURE_API_VERSION_ENV),
        )
        .with_debug_stream(debug_stream)
    }

    pub fn with_debug_stream(mut self, enabled: bool) -> Self {
        self.debug_stream = enabled;
        self
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn api_version(&self) -> &str {
        self.api_version.as_deref().unwrap_or(DEFAULT_API_VERSION)
    }

    pub fn debug_stream(&self) -> bool {
        self.debug_stream
    }

    pub(crate) fn resolve(self) -> Result<ResolvedConfig, ChatError> {
        let api_version = self.api_version().to_string();

        match (self.endpoint, self.api_key) {
            (Some(endpoint), Some(api_key)) => Ok(ResolvedConfig {
                endpoint,
                api_key,
                api_version,
                debug_stream: self.debug_stream,
            }),
            (endpoint, api_key) => {
                let mut missing = Vec::new();
                if api_key.is_none() {
                    missing.push("apiKey");
                }
                if endpoint.is_none() {
                    missing.push("endpoint");
                }
                Err(ChatError::invalid_credentials(ProviderId::Azure, &missing))
            }
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint.as_deref().map(redact_base_url))
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_version", &self.api_version())
            .field("debug_stream", &self.debug_stream)
            .finish()
    }
}

fn sanitize(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
