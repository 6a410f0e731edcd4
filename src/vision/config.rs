//! Vision backend configuration.

use crate::{Error, ErrorContext, Result};
use keyring::Entry;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const KEYRING_SERVICE: &str = "ai-vision-tools";
const KEYRING_USER: &str = "openai";

#[derive(Clone)]
pub struct VisionConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl std::fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl VisionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Loads configuration from the keyring and environment.
    ///
    /// The API key comes from the keyring entry `ai-vision-tools`/`openai`
    /// when present, otherwise from `OPENAI_API_KEY`. Other knobs:
    /// - `AI_VISION_BASE_URL` (default `https://api.openai.com/v1`)
    /// - `AI_VISION_MODEL` (default `gpt-4o`)
    /// - `AI_VISION_MAX_TOKENS` (default 1000)
    /// - `AI_HTTP_TIMEOUT_SECS` (default 60)
    pub fn from_env() -> Result<Self> {
        let keyring_key = Entry::new(KEYRING_SERVICE, KEYRING_USER)
            .ok()
            .and_then(|e| e.get_password().ok());
        Self::from_lookup(|name| {
            if name == "OPENAI_API_KEY" {
                if let Some(k) = &keyring_key {
                    return Some(k.clone());
                }
            }
            std::env::var(name).ok()
        })
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::configuration_with_context(
                    "OPENAI_API_KEY environment variable is required",
                    ErrorContext::new()
                        .with_field_path("OPENAI_API_KEY")
                        .with_source("vision_config"),
                )
            })?;

        let mut cfg = Self::new(api_key);
        if let Some(url) = lookup("AI_VISION_BASE_URL") {
            cfg = cfg.with_base_url(url)?;
        }
        if let Some(model) = lookup("AI_VISION_MODEL").filter(|m| !m.trim().is_empty()) {
            cfg.model = model;
        }
        if let Some(n) = lookup("AI_VISION_MAX_TOKENS").and_then(|s| s.parse::<u32>().ok()) {
            cfg.max_tokens = n.max(1);
        }
        if let Some(secs) = lookup("AI_HTTP_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            cfg.timeout = Duration::from_secs(secs.max(1));
        }
        Ok(cfg)
    }

    /// Overrides the API base URL (primarily for testing with mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        url::Url::parse(&base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base URL '{}'", base_url),
                ErrorContext::new()
                    .with_field_path("AI_VISION_BASE_URL")
                    .with_details(e.to_string()),
            )
        })?;
        self.base_url = base_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_key_is_configuration_error() {
        let err = VisionConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn blank_key_is_rejected() {
        assert!(VisionConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).is_err());
    }

    #[test]
    fn defaults_apply() {
        let cfg = VisionConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.model, "gpt-4o");
        assert_eq!(cfg.max_tokens, 1000);
        assert_eq!(cfg.timeout, Duration::from_secs(60));
    }

    #[test]
    fn overrides_apply() {
        let cfg = VisionConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("AI_VISION_BASE_URL", "http://127.0.0.1:9000/v1/"),
            ("AI_VISION_MODEL", "gpt-4o-mini"),
            ("AI_VISION_MAX_TOKENS", "250"),
            ("AI_HTTP_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(cfg.base_url, "http://127.0.0.1:9000/v1");
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert_eq!(cfg.max_tokens, 250);
        assert_eq!(cfg.timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let err = VisionConfig::new("k").with_base_url("not a url").unwrap_err();
        assert!(err.to_string().contains("invalid base URL"));
    }

    #[test]
    fn debug_hides_key() {
        let cfg = VisionConfig::new("sk-secret");
        assert!(!format!("{:?}", cfg).contains("sk-secret"));
    }
}
