//! Provider configuration

use std::collections::HashMap;

use kowabunga_core::provider::{ProviderError, ProviderResult};
use kowabunga_core::resource::Value;
use serde::{Deserialize, Serialize};

pub const ENV_URI: &str = "KOWABUNGA_URI";
pub const ENV_TOKEN: &str = "KOWABUNGA_TOKEN";

const MISSING_PARAMETERS: &str = "the Kowabunga provider needs proper initialization parameters";

/// Connection settings of the Kowabunga API
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub token: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("uri", &self.uri)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(uri: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            token: token.into(),
        }
    }

    /// Build from a `provider` block (`uri`, `token` attributes)
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> Self {
        let get = |key: &str| {
            attributes
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self::new(get("uri"), get("token"))
    }

    /// Fill empty fields from `KOWABUNGA_URI` / `KOWABUNGA_TOKEN`
    pub fn with_env_fallback(self) -> Self {
        self.with_fallback(|key| std::env::var(key).ok())
    }

    fn with_fallback(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.uri.is_empty() {
            self.uri = lookup(ENV_URI).unwrap_or_default();
        }
        if self.token.is_empty() {
            self.token = lookup(ENV_TOKEN).unwrap_or_default();
        }
        self
    }

    pub fn validate(&self) -> ProviderResult<()> {
        if self.uri.trim().is_empty() || self.token.trim().is_empty() {
            return Err(ProviderError::configuration(MISSING_PARAMETERS));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kowabunga_core::provider::ErrorKind;

    #[test]
    fn test_from_attributes() {
        let attrs = HashMap::from([
            ("uri".to_string(), Value::from("https://kowabunga.example.com")),
            ("token".to_string(), Value::from("abc")),
        ]);
        let config = ProviderConfig::from_attributes(&attrs);
        assert_eq!(config.uri, "https://kowabunga.example.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_values_win_over_fallback() {
        let config = ProviderConfig::new("https://a", "").with_fallback(|key| match key {
            ENV_URI => Some("https://b".to_string()),
            ENV_TOKEN => Some("t".to_string()),
            _ => None,
        });
        assert_eq!(config.uri, "https://a");
        assert_eq!(config.token, "t");
    }

    #[test]
    fn test_missing_parameters() {
        let err = ProviderConfig::default().validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
        assert_eq!(err.message, MISSING_PARAMETERS);
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ProviderConfig::new("https://a", "secret");
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
