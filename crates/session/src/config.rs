//! Backend connection settings read from the environment.

use std::time::Duration;

use thiserror::Error;

pub const BACKEND_URL: &str = "TRANSDOVIC_BACKEND_URL";
pub const BACKEND_ANON_KEY: &str = "TRANSDOVIC_BACKEND_ANON_KEY";
pub const HTTP_TIMEOUT_SECS: &str = "TRANSDOVIC_HTTP_TIMEOUT_SECS";
pub const EMAIL: &str = "TRANSDOVIC_EMAIL";
pub const PASSWORD: &str = "TRANSDOVIC_PASSWORD";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    pub timeout: Duration,
}

impl core::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BackendConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let url = get(BACKEND_URL).ok_or(ConfigError::Missing(BACKEND_URL))?;
        let anon_key = get(BACKEND_ANON_KEY).ok_or(ConfigError::Missing(BACKEND_ANON_KEY))?;

        let timeout = match get(HTTP_TIMEOUT_SECS) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        key: HTTP_TIMEOUT_SECS,
                        value: raw,
                    });
                }
            },
            None => {
                tracing::warn!(
                    "{HTTP_TIMEOUT_SECS} not set; using default of {DEFAULT_TIMEOUT_SECS}s"
                );
                Duration::from_secs(DEFAULT_TIMEOUT_SECS)
            }
        };

        Ok(Self {
            url,
            anon_key,
            timeout,
        })
    }
}

/// Optional sign-in credentials for the command-line client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Both keys or neither; one without the other is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        match (get(EMAIL), get(PASSWORD)) {
            (Some(email), Some(password)) => Ok(Some(Self { email, password })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ConfigError::Missing(PASSWORD)),
            (None, Some(_)) => Err(ConfigError::Missing(EMAIL)),
        }
    }
}
