use std::time::Duration;

use anyhow::{bail, Context};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";
pub const DEFAULT_SUMMARY_MODEL: &str = "gemini-1.5-pro-002";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.95,
            max_output_tokens: 4024,
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub summary_model: String,
    pub timeout: Duration,
    pub sampling: SamplingConfig,
}

// Keeps the key out of logs.
impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("summary_model", &self.summary_model)
            .field("timeout", &self.timeout)
            .field("sampling", &self.sampling)
            .finish()
    }
}

impl ModelConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup` so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY"));
        let timeout_secs = match non_empty("SITE_PROGRESS_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("SITE_PROGRESS_TIMEOUT_SECS must be an integer, got `{raw}`"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let config = Self {
            api_key,
            base_url: non_empty("SITE_PROGRESS_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: non_empty("SITE_PROGRESS_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            summary_model: non_empty("SITE_PROGRESS_SUMMARY_MODEL")
                .unwrap_or_else(|| DEFAULT_SUMMARY_MODEL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            sampling: SamplingConfig::default(),
        };
        config.validate()?;

        debug!(?config, "from_lookup: resolved");
        Ok(config)
    }

    pub fn with_overrides(mut self, model: Option<String>, timeout_secs: Option<u64>) -> anyhow::Result<Self> {
        if let Some(model) = model {
            self.model = model;
        }
        if let Some(secs) = timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.timeout.is_zero() {
            bail!("model timeout must be greater than zero");
        }
        if self.model.trim().is_empty() {
            bail!("model name must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ModelConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.api_key, None);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.summary_model, DEFAULT_SUMMARY_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.sampling.max_output_tokens, 4024);
    }

    #[test]
    fn google_key_is_a_fallback() {
        let config = ModelConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "  "),
            ("GOOGLE_API_KEY", "g-key"),
        ]))
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = ModelConfig::from_lookup(lookup_from(&[(
            "SITE_PROGRESS_BASE_URL",
            "http://localhost:8080/",
        )]))
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
    }

    #[test]
    fn invalid_timeouts_are_errors() {
        assert!(ModelConfig::from_lookup(lookup_from(&[("SITE_PROGRESS_TIMEOUT_SECS", "soon")])).is_err());
        assert!(ModelConfig::from_lookup(lookup_from(&[("SITE_PROGRESS_TIMEOUT_SECS", "0")])).is_err());
    }

    #[test]
    fn overrides_replace_model_and_timeout() {
        let config = ModelConfig::from_lookup(lookup_from(&[]))
            .unwrap()
            .with_overrides(Some("gemini-2.5-flash".to_string()), Some(5))
            .unwrap();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = ModelConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "secret-value")])).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("<redacted>"));
    }
}
