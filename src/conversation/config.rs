//! Configuration for the chat client.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::conversation::errors::{ChatError, ChatResult};
use crate::conversation::state::Theme;
use crate::llm::persona::{DEFAULT_PERSONA_TEMPLATE, PROMPT_PLACEHOLDER};

/// Primary environment variable holding the Gemini API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Variable name used by the browser build; still honoured as a fallback.
pub const LEGACY_API_KEY_ENV: &str = "VITE_GEMINI_API_KEY";
/// Override for the API base URL.
pub const BASE_URL_ENV: &str = "GEMINI_CHAT_BASE_URL";
/// Override for the text model name.
pub const TEXT_MODEL_ENV: &str = "GEMINI_CHAT_TEXT_MODEL";
/// Override for the vision model name.
pub const VISION_MODEL_ENV: &str = "GEMINI_CHAT_VISION_MODEL";
/// Override for the request timeout, in seconds.
pub const TIMEOUT_ENV: &str = "GEMINI_CHAT_TIMEOUT_SECS";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Model API access.
    pub api: ApiConfig,
    /// Model selection and prompt shaping.
    pub model: ModelConfig,
    /// Durable storage settings.
    pub persistence: PersistenceConfig,
    /// Input limits.
    pub limits: LimitsConfig,
    /// Defaults for a fresh session.
    pub ui: UiConfig,
}

impl ChatConfig {
    /// Defaults overridden by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.api.api_key = lookup(API_KEY_ENV)
            .or_else(|| lookup(LEGACY_API_KEY_ENV))
            .and_then(ApiKey::new);

        if let Some(base_url) = lookup(BASE_URL_ENV) {
            config.api.base_url = base_url;
        }
        if let Some(model) = lookup(TEXT_MODEL_ENV) {
            config.model.text_model = model;
        }
        if let Some(model) = lookup(VISION_MODEL_ENV) {
            config.model.vision_model = model;
        }
        if let Some(secs) = lookup(TIMEOUT_ENV).and_then(|v| v.trim().parse::<u64>().ok()) {
            config.api.request_timeout = Duration::from_secs(secs);
        }

        config
    }

    /// Parse a JSON configuration document. Missing sections take their defaults.
    ///
    /// # Errors
    /// Returns an error if the document is not valid JSON or fails validation.
    pub fn from_json_str(raw: &str) -> ChatResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api.api_key = ApiKey::new(key.into());
        self
    }

    /// Set the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    /// Set the per-exchange timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.api.request_timeout = timeout;
        self
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        if self.api.request_timeout.is_zero() {
            return Err(ChatError::InvalidConfig(
                "api.request_timeout must be > 0".to_string(),
            ));
        }

        if self.api.connect_timeout.is_zero() {
            return Err(ChatError::InvalidConfig(
                "api.connect_timeout must be > 0".to_string(),
            ));
        }

        Url::parse(&self.api.base_url)?;

        if self.model.text_model.trim().is_empty() || self.model.vision_model.trim().is_empty() {
            return Err(ChatError::InvalidConfig(
                "model names must not be empty".to_string(),
            ));
        }

        if !self.model.persona_template.contains(PROMPT_PLACEHOLDER) {
            return Err(ChatError::InvalidConfig(format!(
                "model.persona_template must contain {PROMPT_PLACEHOLDER}"
            )));
        }

        if self.persistence.storage_key.trim().is_empty() {
            return Err(ChatError::InvalidConfig(
                "persistence.storage_key must not be empty".to_string(),
            ));
        }

        if self.persistence.max_messages == 0 {
            return Err(ChatError::InvalidConfig(
                "persistence.max_messages must be > 0".to_string(),
            ));
        }

        if self.limits.max_prompt_chars == 0 {
            return Err(ChatError::InvalidConfig(
                "limits.max_prompt_chars must be > 0".to_string(),
            ));
        }

        if self.limits.max_image_bytes == 0 {
            return Err(ChatError::InvalidConfig(
                "limits.max_image_bytes must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// API credential. `Debug` output is redacted and the value is never serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key; blank input yields `None`.
    #[must_use]
    pub fn new(raw: String) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Expose the secret for the request header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Model API access settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Credential; absent means every exchange fails with a configuration error.
    #[serde(skip)]
    pub api_key: Option<ApiKey>,
    /// Base URL of the generative-language REST API.
    pub base_url: String,
    /// Upper bound for one exchange, including the network call.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// TCP connect timeout.
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Model selection and prompt shaping.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model used for text-only prompts.
    pub text_model: String,
    /// Model used when an image is attached.
    pub vision_model: String,
    /// Persona wrapper applied to text-only prompts; must contain `{prompt}`.
    pub persona_template: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            text_model: "gemini-1.5-flash".to_string(),
            vision_model: "gemini-1.5-flash".to_string(),
            persona_template: DEFAULT_PERSONA_TEMPLATE.to_string(),
        }
    }
}

/// Durable storage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Key under which the whole state blob is stored.
    pub storage_key: String,
    /// Transcript cap; the oldest messages are evicted beyond it.
    pub max_messages: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            storage_key: "gemini-chat-state".to_string(),
            max_messages: 500,
        }
    }
}

/// Input limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum prompt length in characters.
    pub max_prompt_chars: usize,
    /// Maximum attached image size in bytes.
    pub max_image_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: 32_000,
            max_image_bytes: 20 * 1024 * 1024, // 20 MiB
        }
    }
}

/// Defaults for a fresh session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Theme used when nothing was persisted yet.
    pub default_theme: Theme,
}

/// Serde module for `Duration` as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
