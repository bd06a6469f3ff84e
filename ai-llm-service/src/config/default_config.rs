//! Default LLM configs loaded strictly from environment variables.
//!
//! This module provides convenience constructors for [`LlmModelConfig`],
//! one per provider, plus [`config_from_env`] which dispatches on `LLM_KIND`.
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_KIND`         = provider kind (`gemini` | `openai`, default `gemini`)
//! - `LLM_MAX_TOKENS`   = optional max tokens (u32)
//! - `LLM_TEMPERATURE`  = optional temperature (f32, 0.0..=2.0, default 0.2)
//! - `LLM_TIMEOUT_SECS` = optional HTTP timeout (u64, default 120)
//!
//! Gemini-specific:
//! - `GEMINI_API_KEY` or `GOOGLE_AI_API_KEY` = API key (mandatory)
//! - `GEMINI_MODEL`                          = model id (default `gemini-2.0-flash`)
//! - `GEMINI_URL`                            = endpoint (default Google AI Studio)
//!
//! OpenAI-specific:
//! - `OPENAI_API_KEY` = API key (mandatory)
//! - `OPENAI_MODEL`   = model id (default `gpt-4o-mini`)
//! - `OPENAI_URL`     = endpoint (default `https://api.openai.com`)

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, ConfigError, env_opt_f32, env_opt_u32, env_opt_u64, opt_env,
        validate_http_endpoint, validate_range_f32,
    },
};

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Builds the config for the provider selected by `LLM_KIND`.
///
/// # Errors
/// - [`ConfigError::UnsupportedProvider`] for an unknown `LLM_KIND`
/// - any error of [`config_gemini`] / [`config_openai`]
pub fn config_from_env() -> Result<LlmModelConfig, AiLlmError> {
    let provider = match opt_env("LLM_KIND") {
        Some(kind) => kind.parse::<LlmProvider>()?,
        None => LlmProvider::Gemini,
    };
    match provider {
        LlmProvider::Gemini => config_gemini(),
        LlmProvider::OpenAI => config_openai(),
    }
}

/// Constructs a config for Gemini.
///
/// # Env
/// - `GEMINI_API_KEY` or `GOOGLE_AI_API_KEY` (required)
/// - `GEMINI_MODEL`, `GEMINI_URL` (optional)
pub fn config_gemini() -> Result<LlmModelConfig, AiLlmError> {
    let api_key = opt_env("GEMINI_API_KEY")
        .or_else(|| opt_env("GOOGLE_AI_API_KEY"))
        .ok_or(ConfigError::MissingVar("GEMINI_API_KEY or GOOGLE_AI_API_KEY"))?;
    let endpoint = opt_env("GEMINI_URL").unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string());
    validate_http_endpoint("GEMINI_URL", &endpoint)?;
    let model = opt_env("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

    with_common(LlmModelConfig {
        provider: LlmProvider::Gemini,
        model,
        endpoint,
        api_key: Some(api_key),
        max_tokens: None,
        temperature: None,
        timeout_secs: None,
    })
}

/// Constructs a config for OpenAI.
///
/// # Env
/// - `OPENAI_API_KEY` (required)
/// - `OPENAI_MODEL`, `OPENAI_URL` (optional)
pub fn config_openai() -> Result<LlmModelConfig, AiLlmError> {
    let api_key = opt_env("OPENAI_API_KEY").ok_or(ConfigError::MissingVar("OPENAI_API_KEY"))?;
    let endpoint = opt_env("OPENAI_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
    validate_http_endpoint("OPENAI_URL", &endpoint)?;
    let model = opt_env("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());

    with_common(LlmModelConfig {
        provider: LlmProvider::OpenAI,
        model,
        endpoint,
        api_key: Some(api_key),
        max_tokens: None,
        temperature: None,
        timeout_secs: None,
    })
}

/// Fills the provider-independent knobs shared by every profile.
fn with_common(mut cfg: LlmModelConfig) -> Result<LlmModelConfig, AiLlmError> {
    let temperature = env_opt_f32("LLM_TEMPERATURE")?.unwrap_or(DEFAULT_TEMPERATURE);
    validate_range_f32("temperature", temperature, 0.0, 2.0)?;

    cfg.max_tokens = env_opt_u32("LLM_MAX_TOKENS")?;
    cfg.temperature = Some(temperature);
    cfg.timeout_secs = Some(env_opt_u64("LLM_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS));

    if cfg.model.trim().is_empty() {
        return Err(ConfigError::EmptyModel.into());
    }
    Ok(cfg)
}
