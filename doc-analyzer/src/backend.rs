//! Production backend: the provider-dispatching [`LlmClient`].

use ai_llm_service::{AiLlmError, LlmClient};

use crate::invoker::{BackendError, ModelBackend};
use crate::prompt::PromptContext;

impl ModelBackend for LlmClient {
    async fn generate(&self, prompt: &PromptContext<'_>) -> Result<String, BackendError> {
        self.generate_structured(&prompt.as_structured_request())
            .await
            .map_err(BackendError::from)
    }
}

impl From<AiLlmError> for BackendError {
    fn from(err: AiLlmError) -> Self {
        if err.is_empty_response() {
            BackendError::Empty(err.to_string())
        } else if err.is_malformed_response() {
            BackendError::Malformed(err.to_string())
        } else if err.is_transient() {
            BackendError::Transient(err.to_string())
        } else {
            BackendError::Rejected(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_llm_service::error_handler::{
        HttpError, Provider, ProviderError, ProviderErrorKind,
    };
    use std::time::Duration;

    fn status(code: u16) -> AiLlmError {
        AiLlmError::Provider(ProviderError::new(
            Provider::Gemini,
            ProviderErrorKind::HttpStatus(HttpError {
                status: reqwest::StatusCode::from_u16(code).unwrap(),
                url: "http://localhost/v1beta/models/m:generateContent".into(),
                snippet: "{}".into(),
            }),
        ))
    }

    #[test]
    fn classifies_provider_failures() {
        assert!(matches!(BackendError::from(status(503)), BackendError::Transient(_)));
        assert!(matches!(BackendError::from(status(429)), BackendError::Transient(_)));
        assert!(matches!(BackendError::from(status(401)), BackendError::Rejected(_)));
        assert!(matches!(BackendError::from(status(400)), BackendError::Rejected(_)));
        assert!(matches!(
            BackendError::from(AiLlmError::Timeout(Duration::from_secs(1))),
            BackendError::Transient(_)
        ));
        assert!(matches!(
            BackendError::from(AiLlmError::Provider(ProviderError::new(
                Provider::OpenAI,
                ProviderErrorKind::Blocked("refusal".into()),
            ))),
            BackendError::Empty(_)
        ));
    }

    #[test]
    fn undecodable_success_body_is_malformed_not_rejected() {
        let err = AiLlmError::Provider(ProviderError::new(
            Provider::Gemini,
            ProviderErrorKind::Decode("expected `candidates[0].content.parts[].text`".into()),
        ));
        assert!(!err.is_transient());
        assert!(matches!(BackendError::from(err), BackendError::Malformed(_)));
    }
}
