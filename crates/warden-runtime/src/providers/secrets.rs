//! API credential handling.
//!
//! Credentials are wrapped in `secrecy::SecretString` as soon as they are
//! read, print as `[REDACTED]`, and are only exposed when building a request.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Config,
    Environment,
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// An API key that cannot be printed by accident.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Read a credential from an environment variable.
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        std::env::var(env_var)
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .map_err(|_| {
                ProviderError::NotConfigured(format!(
                    "{} not set: configure '{}' environment variable",
                    name, env_var
                ))
            })
    }

    /// Read `config_key` from a JSON config, falling back to `env_var`.
    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = config.get(config_key).and_then(JsonValue::as_str) {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }

        Self::from_env(env_var, name).map_err(|_| {
            ProviderError::NotConfigured(format!(
                "{} required: set '{}' in config or {} environment variable",
                name, config_key, env_var
            ))
        })
    }

    /// The raw value. Call only where the request is built.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "sk-warden-test-secret-0001";

    #[test]
    fn test_credential_redacted() {
        let cred = ApiCredential::new(SECRET, CredentialSource::Config, "Test API key");

        let debug = format!("{:?}", cred);
        let display = format!("{}", cred);
        assert!(!debug.contains(SECRET));
        assert!(!display.contains(SECRET));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(display, "Test API key from config [REDACTED]");
        assert_eq!(cred.expose(), SECRET);
    }

    #[test]
    fn test_config_takes_precedence() {
        let config = serde_json::json!({ "api_key": "from-config" });
        std::env::set_var("WARDEN_TEST_KEY_PRECEDENCE", "from-env");

        let cred = ApiCredential::from_config_or_env(
            &config,
            "api_key",
            "WARDEN_TEST_KEY_PRECEDENCE",
            "Test key",
        )
        .unwrap();
        assert_eq!(cred.expose(), "from-config");
        assert_eq!(cred.source(), CredentialSource::Config);

        std::env::remove_var("WARDEN_TEST_KEY_PRECEDENCE");
    }

    #[test]
    fn test_env_fallback() {
        std::env::set_var("WARDEN_TEST_KEY_FALLBACK", "from-env");

        let cred = ApiCredential::from_config_or_env(
            &serde_json::json!({}),
            "api_key",
            "WARDEN_TEST_KEY_FALLBACK",
            "Test key",
        )
        .unwrap();
        assert_eq!(cred.source(), CredentialSource::Environment);

        std::env::remove_var("WARDEN_TEST_KEY_FALLBACK");
    }

    #[test]
    fn test_missing_credential_names_both_sources() {
        let err = ApiCredential::from_config_or_env(
            &serde_json::json!({}),
            "api_key",
            "WARDEN_TEST_KEY_MISSING",
            "Test key",
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("api_key"));
        assert!(message.contains("WARDEN_TEST_KEY_MISSING"));
    }
}
