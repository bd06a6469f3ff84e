//! Provider-dispatching client used by callers that do not care which
//! backend is configured.
//!
//! Construct once, wrap in `Arc`, and share: the underlying `reqwest::Client`
//! pools connections and every call is `&self`.
//!
//! # Example
//! ```no_run
//! use ai_llm_service::config::default_config::config_from_env;
//! use ai_llm_service::llm_client::LlmClient;
//!
//! # fn main() -> Result<(), ai_llm_service::error_handler::AiLlmError> {
//! let client = LlmClient::from_config(config_from_env()?)?;
//! println!("using {}", client.model());
//! # Ok(()) }
//! ```

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::AiLlmError,
    services::{gemini_service::GeminiService, open_ai_service::OpenAiService},
    structured::StructuredRequest,
};

#[derive(Debug)]
pub enum LlmClient {
    Gemini(GeminiService),
    OpenAI(OpenAiService),
}

impl LlmClient {
    /// Builds the client matching `cfg.provider`.
    pub fn from_config(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        match cfg.provider {
            LlmProvider::Gemini => Ok(Self::Gemini(GeminiService::new(cfg)?)),
            LlmProvider::OpenAI => Ok(Self::OpenAI(OpenAiService::new(cfg)?)),
        }
    }

    pub fn provider(&self) -> LlmProvider {
        match self {
            Self::Gemini(_) => LlmProvider::Gemini,
            Self::OpenAI(_) => LlmProvider::OpenAI,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Gemini(svc) => svc.model(),
            Self::OpenAI(svc) => svc.model(),
        }
    }

    /// Sends one structured request and returns the raw output text.
    ///
    /// # Errors
    /// Returns [`AiLlmError`] from the selected provider.
    pub async fn generate_structured(
        &self,
        req: &StructuredRequest<'_>,
    ) -> Result<String, AiLlmError> {
        match self {
            Self::Gemini(svc) => svc.generate_structured(req).await,
            Self::OpenAI(svc) => svc.generate_structured(req).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_provider() {
        let cfg = LlmModelConfig {
            provider: LlmProvider::OpenAI,
            model: "gpt-4o-mini".into(),
            endpoint: "http://localhost:8080".into(),
            api_key: Some("sk-test".into()),
            max_tokens: None,
            temperature: None,
            timeout_secs: None,
        };
        let client = LlmClient::from_config(cfg).unwrap();
        assert_eq!(client.provider(), LlmProvider::OpenAI);
        assert_eq!(client.model(), "gpt-4o-mini");
    }
}
