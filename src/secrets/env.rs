//! Environment variable secret backend

use super::{ConfigError, SecretProvider};
use async_trait::async_trait;

/// Reads `google_api_key` from `GOOGLE_API_KEY` (plus an optional prefix)
#[derive(Debug, Clone, Default)]
pub struct EnvSecretProvider {
    prefix: String,
}

impl EnvSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable consulted for a parameter name
    pub fn var_name(&self, name: &str) -> String {
        let normalized: String = name
            .chars()
            .map(|c| match c {
                '-' | '.' | '/' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        format!("{}{}", self.prefix, normalized)
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    fn name(&self) -> &str {
        "env"
    }

    async fn get_secret(&self, name: &str) -> Result<String, ConfigError> {
        let var = self.var_name(name);
        match std::env::var(&var) {
            Ok(value) => Ok(value),
            Err(std::env::VarError::NotPresent) => Err(ConfigError::Missing(name.to_string())),
            Err(e) => Err(ConfigError::Unavailable {
                name: name.to_string(),
                reason: format!("{}: {}", var, e),
            }),
        }
    }
}
