use secrecy::SecretString;

use crate::config::{helpers, normalize_variant};
use crate::error::ConfigError;
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAiCompatible,
    Anthropic,
}

impl LlmBackend {
    fn parse(value: &str, key: &str) -> Result<Self, ConfigError> {
        match normalize_variant(value).as_str() {
            "openai" | "openai_compatible" | "openai_compat" => Ok(Self::OpenAiCompatible),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected 'openai_compatible' or 'anthropic', got '{value}'"),
            }),
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAiCompatible => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAiCompatible => "openai_compatible",
            Self::Anthropic => "anthropic",
        }
    }
}

/// Chat provider selection. Absent when no backend is configured.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: Option<String>,
}

impl LlmConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Option<Self>, ConfigError> {
        let Some(raw_backend) =
            helpers::optional_env("LLM_BACKEND")?.or_else(|| settings.llm.backend.clone())
        else {
            return Ok(None);
        };
        let backend = LlmBackend::parse(&raw_backend, "LLM_BACKEND")?;

        let base_url = helpers::optional_env("LLM_BASE_URL")?
            .or_else(|| settings.llm.base_url.clone())
            .unwrap_or_else(|| backend.default_base_url().to_string());

        Ok(Some(Self {
            backend,
            base_url,
            api_key: helpers::optional_env("LLM_API_KEY")?.map(SecretString::from),
            model: helpers::optional_env("LLM_MODEL")?.or_else(|| settings.llm.model.clone()),
        }))
    }
}
