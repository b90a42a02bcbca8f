//! Relay settings: the `{endpoint, model, apiKey}` view the chat relay reads
//! from the persisted settings blob.

mod store;

pub use store::ConfigStore;

use reqwest::Url;
use serde_json::Value;

/// Source of the relay settings. Each call returns an owned snapshot, so a
/// request keeps whatever it read even if the settings change afterwards.
pub trait ConfigProvider: Send + Sync {
    fn current(&self) -> RelaySettings;
}

/// Relay settings as stored, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaySettings {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

/// Validated settings for one upstream call.
#[derive(Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub endpoint: Url,
    pub model: String,
    pub api_key: Option<String>,
}

// Keep the key out of logs.
impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RelaySettings {
    /// Extract the relay fields from a settings blob. Fields of the wrong JSON
    /// type count as absent.
    pub fn from_blob(blob: &Value) -> Self {
        let field = |key: &str| {
            blob.get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        };

        Self {
            endpoint: field("endpoint"),
            model: field("model"),
            api_key: field("apiKey"),
        }
    }

    /// Validate into a [`RelayConfig`]. The error is a human-readable reason.
    pub fn resolve(&self) -> Result<RelayConfig, String> {
        let endpoint = self
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| "endpoint is not configured".to_string())?;
        let endpoint = Url::parse(endpoint)
            .map_err(|e| format!("endpoint '{}' is not a valid URL: {}", endpoint, e))?;

        let model = self
            .model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| "model is not configured".to_string())?;

        Ok(RelayConfig {
            endpoint,
            model: model.to_string(),
            api_key: self.api_key.clone().filter(|k| !k.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_blob_reads_relay_fields() {
        let blob = json!({
            "endpoint": "https://x/v1/chat",
            "model": "gpt-x",
            "apiKey": "sk-test",
            "streaming": {"enabled": true, "mode": "smooth", "smoothSpeed": 50}
        });

        let settings = RelaySettings::from_blob(&blob);
        assert_eq!(settings.endpoint.as_deref(), Some("https://x/v1/chat"));
        assert_eq!(settings.model.as_deref(), Some("gpt-x"));
        assert_eq!(settings.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_from_blob_ignores_wrong_types() {
        let blob = json!({"endpoint": 42, "model": null, "apiKey": ["nope"]});
        assert_eq!(RelaySettings::from_blob(&blob), RelaySettings::default());
    }

    #[test]
    fn test_resolve_requires_endpoint_and_model() {
        let missing_endpoint = RelaySettings {
            model: Some("gpt-x".into()),
            ..Default::default()
        };
        assert!(missing_endpoint.resolve().unwrap_err().contains("endpoint"));

        let missing_model = RelaySettings {
            endpoint: Some("https://x/v1/chat".into()),
            ..Default::default()
        };
        assert!(missing_model.resolve().unwrap_err().contains("model"));

        let bad_url = RelaySettings {
            endpoint: Some("not a url".into()),
            model: Some("gpt-x".into()),
            api_key: None,
        };
        assert!(bad_url.resolve().is_err());
    }

    #[test]
    fn test_resolve_drops_empty_api_key() {
        let settings = RelaySettings {
            endpoint: Some("https://x/v1/chat".into()),
            model: Some("gpt-x".into()),
            api_key: Some(String::new()),
        };

        let config = settings.resolve().unwrap();
        assert_eq!(config.endpoint.as_str(), "https://x/v1/chat");
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = RelaySettings {
            endpoint: Some("https://x/v1/chat".into()),
            model: Some("gpt-x".into()),
            api_key: Some("sk-secret".into()),
        }
        .resolve()
        .unwrap();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
