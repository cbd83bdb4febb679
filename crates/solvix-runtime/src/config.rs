//! Runtime configuration.
//!
//! Loaded from an optional YAML file and then overridden by environment
//! variables. The loaded value is passed into constructors explicitly; there
//! is no global settings object.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use solvix_core::GatePolicy;
use thiserror::Error;

use crate::client::{BackoffSettings, ClientSettings};
use crate::providers::{ApiCredential, CredentialSource, ProviderKind};

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default attempts per provider, first try included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

pub const ENV_PRIMARY_PROVIDER: &str = "SOLVIX_PRIMARY_PROVIDER";
pub const ENV_FALLBACK_PROVIDER: &str = "SOLVIX_FALLBACK_PROVIDER";
pub const ENV_LLM_TIMEOUT: &str = "SOLVIX_LLM_TIMEOUT";
pub const ENV_LLM_MAX_ATTEMPTS: &str = "SOLVIX_LLM_MAX_ATTEMPTS";
pub const ENV_PROMISE_GRACE_DAYS: &str = "SOLVIX_PROMISE_GRACE_DAYS";

/// Errors while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Parse "30s", "1m 30s" or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(raw).map_err(|e| e.to_string())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Secs(u64),
    Text(String),
}

impl RawDuration {
    fn resolve<E: serde::de::Error>(self) -> Result<Duration, E> {
        match self {
            RawDuration::Secs(secs) => Ok(Duration::from_secs(secs)),
            RawDuration::Text(text) => parse_duration(&text).map_err(E::custom),
        }
    }
}

pub(crate) fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    RawDuration::deserialize(deserializer)?.resolve()
}

fn deserialize_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawDuration>::deserialize(deserializer)?
        .map(RawDuration::resolve)
        .transpose()
}

/// Shared LLM call settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,

    pub max_attempts: u32,

    pub backoff: BackoffSettings,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffSettings::default(),
        }
    }
}

/// Settings for one provider. Unset fields fall back to [`LlmSettings`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub api_key: Option<ApiCredential>,

    pub model: Option<String>,

    pub base_url: Option<String>,

    #[serde(deserialize_with = "deserialize_opt_duration")]
    pub timeout: Option<Duration>,

    pub max_attempts: Option<u32>,

    pub max_tokens: Option<u32>,
}

impl ProviderSettings {
    /// A key that is present and not blank.
    pub fn credential(&self) -> Option<&ApiCredential> {
        self.api_key.as_ref().filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderTable {
    pub gemini: ProviderSettings,
    pub openai: ProviderSettings,
    pub anthropic: ProviderSettings,
}

impl ProviderTable {
    pub fn get(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::Gemini => &self.gemini,
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
        }
    }

    fn get_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::Gemini => &mut self.gemini,
            ProviderKind::OpenAi => &mut self.openai,
            ProviderKind::Anthropic => &mut self.anthropic,
        }
    }
}

/// Everything the engine needs at startup.
///
/// ```yaml
/// primary_provider: gemini
/// fallback_provider: openai
/// llm:
///   timeout: 30s
///   max_attempts: 2
/// providers:
///   openai:
///     model: gpt-5-nano
///     timeout: 45s
/// gates:
///   default_promise_grace_days: 3
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub primary_provider: ProviderKind,

    pub fallback_provider: Option<ProviderKind>,

    pub llm: LlmSettings,

    pub providers: ProviderTable,

    pub gates: GatePolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            primary_provider: ProviderKind::Gemini,
            fallback_provider: Some(ProviderKind::OpenAi),
            llm: LlmSettings::default(),
            providers: ProviderTable::default(),
            gates: GatePolicy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse YAML text. Environment overrides are not applied.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.validated()
    }

    /// Read an optional file, then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_yaml(&text)?
            }
            None => Self::default(),
        };
        config.with_env(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an environment lookup.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        for kind in ProviderKind::ALL {
            let env = kind.api_key_env();
            if let Some(key) = get(env) {
                self.providers.get_mut(kind).api_key = Some(ApiCredential::new(
                    key.trim(),
                    CredentialSource::Environment,
                    env,
                ));
            }
        }

        if let Some(raw) = get(ENV_PRIMARY_PROVIDER) {
            self.primary_provider = raw
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_PRIMARY_PROVIDER, format!("{e}")))?;
        }

        if let Some(raw) = get(ENV_FALLBACK_PROVIDER) {
            self.fallback_provider = match raw.trim().to_ascii_lowercase().as_str() {
                "none" | "off" => None,
                _ => Some(
                    raw.parse()
                        .map_err(|e| ConfigError::invalid(ENV_FALLBACK_PROVIDER, format!("{e}")))?,
                ),
            };
        }

        if let Some(raw) = get(ENV_LLM_TIMEOUT) {
            self.llm.timeout =
                parse_duration(&raw).map_err(|e| ConfigError::invalid(ENV_LLM_TIMEOUT, e))?;
        }

        if let Some(raw) = get(ENV_LLM_MAX_ATTEMPTS) {
            self.llm.max_attempts = raw.trim().parse().map_err(|_| {
                ConfigError::invalid(ENV_LLM_MAX_ATTEMPTS, format!("'{raw}' is not a count"))
            })?;
        }

        if let Some(raw) = get(ENV_PROMISE_GRACE_DAYS) {
            self.gates.default_promise_grace_days = raw.trim().parse().map_err(|_| {
                ConfigError::invalid(ENV_PROMISE_GRACE_DAYS, format!("'{raw}' is not a day count"))
            })?;
        }

        self.validated()
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        if self.llm.max_attempts == 0 {
            return Err(ConfigError::invalid("llm.max_attempts", "must be at least 1"));
        }
        if self.llm.timeout.is_zero() {
            return Err(ConfigError::invalid("llm.timeout", "must be greater than zero"));
        }
        if self.llm.backoff.factor < 1.0 {
            return Err(ConfigError::invalid("llm.backoff.factor", "must be at least 1.0"));
        }
        for kind in ProviderKind::ALL {
            let settings = self.providers.get(kind);
            if settings.max_attempts == Some(0) {
                return Err(ConfigError::invalid(
                    &format!("providers.{kind}.max_attempts"),
                    "must be at least 1",
                ));
            }
            if settings.timeout.is_some_and(|t| t.is_zero()) {
                return Err(ConfigError::invalid(
                    &format!("providers.{kind}.timeout"),
                    "must be greater than zero",
                ));
            }
        }
        if self.fallback_provider == Some(self.primary_provider) {
            tracing::warn!(
                provider = %self.primary_provider,
                "fallback provider equals primary; fallback disabled"
            );
            self.fallback_provider = None;
        }
        Ok(self)
    }

    /// Primary then fallback, whether or not a key is present.
    pub fn provider_order(&self) -> Vec<ProviderKind> {
        let mut order = vec![self.primary_provider];
        order.extend(self.fallback_provider);
        order
    }

    /// Providers in call order that have a usable key.
    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        self.provider_order()
            .into_iter()
            .filter(|kind| self.providers.get(*kind).credential().is_some())
            .collect()
    }

    /// True when no provider in the call order has a key.
    pub fn has_no_credentials(&self) -> bool {
        self.configured_providers().is_empty()
    }

    /// Effective client settings for one provider.
    pub fn client_settings(&self, kind: ProviderKind) -> ClientSettings {
        let provider = self.providers.get(kind);
        let mut settings = ClientSettings::new(
            provider
                .model
                .clone()
                .unwrap_or_else(|| kind.default_model().to_string()),
        )
        .with_timeout(provider.timeout.unwrap_or(self.llm.timeout))
        .with_max_attempts(provider.max_attempts.unwrap_or(self.llm.max_attempts))
        .with_backoff(self.llm.backoff.clone());
        if let Some(max_tokens) = provider.max_tokens {
            settings.max_tokens = max_tokens;
        }
        settings
    }
}
