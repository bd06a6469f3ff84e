//! OpenAI (ChatGPT) service for multimodal structured generation.
//!
//! Minimal, synchronous (non-streaming) client around OpenAI REST API.
//! Endpoints are derived from `LlmModelConfig::endpoint`:
//! - POST {endpoint}/v1/chat/completions (chat completion, non-streaming)
//!
//! Documents are sent as a `file` content part (images as `image_url`), and
//! `response_format` is a strict `json_schema`.
//!
//! Constructor validation:
//! - `cfg.provider` must be `LlmProvider::OpenAI`
//! - `cfg.api_key` must be present
//! - `cfg.endpoint` must start with http:// or https://
//!
//! Errors are normalized via unified error types in `error_handler`.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument};

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, HttpError, Provider, ProviderError, ProviderErrorKind, make_snippet,
    },
    structured::StructuredRequest,
};

/// Thin client for the OpenAI API (ChatGPT).
///
/// Constructed from a complete [`LlmModelConfig`]. Internally keeps a
/// preconfigured `reqwest::Client` (with timeout and default headers).
#[derive(Debug)]
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
}

impl OpenAiService {
    /// Creates a new [`OpenAiService`] from the given config.
    ///
    /// Validates the provider, API key, and endpoint scheme. Builds an HTTP
    /// client with default headers and a configurable timeout.
    ///
    /// # Errors
    /// - [`AiLlmError::Provider`] with `InvalidProvider` if `cfg.provider` is not OpenAI
    /// - [`AiLlmError::Provider`] with `MissingApiKey` if `cfg.api_key` is `None`
    /// - [`AiLlmError::Provider`] with `InvalidEndpoint` if `cfg.endpoint` is invalid
    /// - [`AiLlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        // 1) Provider must be OpenAI.
        if cfg.provider != LlmProvider::OpenAI {
            return Err(
                ProviderError::new(Provider::OpenAI, ProviderErrorKind::InvalidProvider).into(),
            );
        }

        // 2) API key must be present.
        let api_key = cfg.api_key.clone().ok_or_else(|| {
            ProviderError::new(Provider::OpenAI, ProviderErrorKind::MissingApiKey)
        })?;

        // 3) Endpoint must use http/https.
        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty()
            || !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(ProviderError::new(
                Provider::OpenAI,
                ProviderErrorKind::InvalidEndpoint(cfg.endpoint.clone()),
            )
            .into());
        }

        // 4) HTTP client: timeout + default headers.
        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(120));

        let mut headers = header::HeaderMap::new();
        let mut auth =
            header::HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e| {
                ProviderError::new(
                    Provider::OpenAI,
                    ProviderErrorKind::Decode(format!("invalid API key header: {e}")),
                )
            })?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        let base = endpoint.trim_end_matches('/').to_string();
        let url_chat = format!("{}/v1/chat/completions", base);

        info!(
            provider = ?cfg.provider,
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            timeout_secs = timeout.as_secs(),
            "OpenAiService initialized"
        );

        Ok(Self {
            client,
            cfg,
            url_chat,
        })
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    /// Performs a **non-streaming** chat completion request constrained by a
    /// strict JSON Schema.
    ///
    /// # Errors
    /// - [`AiLlmError::Provider`] with `HttpStatus` for non-2xx responses
    /// - [`AiLlmError::HttpTransport`] for client/network failures
    /// - [`AiLlmError::Provider`] with `Decode` if the JSON cannot be parsed
    /// - [`AiLlmError::Provider`] with `Blocked` if the model refused
    /// - [`AiLlmError::Provider`] with `EmptyResponse` if no content is returned
    #[instrument(skip_all, fields(model = %self.cfg.model, mime_type = %req.document.mime_type))]
    pub async fn generate_structured(&self, req: &StructuredRequest<'_>) -> Result<String, AiLlmError> {
        let started = Instant::now();
        let data_uri = req.document.data_uri();
        let file_name = req.document.file_name();
        let body = ChatCompletionRequest::build(&self.cfg, req, &data_uri, &file_name);

        debug!(
            document_b64_len = req.document.data_base64.len(),
            text_len = req.text.len(),
            "POST {}", self.url_chat
        );

        let resp = self.client.post(&self.url_chat).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let url = self.url_chat.clone();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);

            error!(
                %status,
                %snippet,
                latency_ms = started.elapsed().as_millis(),
                "OpenAI /v1/chat/completions returned non-success status"
            );

            return Err(ProviderError::new(
                Provider::OpenAI,
                ProviderErrorKind::HttpStatus(HttpError {
                    status,
                    url,
                    snippet,
                }),
            )
            .into());
        }

        let out: ChatCompletionResponse = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                error!(
                    error = %e,
                    latency_ms = started.elapsed().as_millis(),
                    "failed to decode /v1/chat/completions response"
                );
                return Err(ProviderError::new(
                    Provider::OpenAI,
                    ProviderErrorKind::Decode(format!(
                        "serde error: {e}; expected `choices[0].message.content`"
                    )),
                )
                .into());
            }
        };

        let content = out.into_content()?;

        info!(
            latency_ms = started.elapsed().as_millis(),
            output_len = content.len(),
            "chat completion completed"
        );

        Ok(content)
    }
}

/* ===========================================================================
HTTP payloads & options
======================================================================== */

/// Request body for `/v1/chat/completions` (non-streaming).
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> ChatCompletionRequest<'a> {
    /// Builds a two-message chat request: system instruction, then a user
    /// message carrying the document part followed by the text part.
    fn build(
        cfg: &'a LlmModelConfig,
        req: &StructuredRequest<'a>,
        data_uri: &'a str,
        file_name: &'a str,
    ) -> Self {
        let document = if req.document.is_image() {
            ContentPart::ImageUrl {
                image_url: ImageUrl { url: data_uri },
            }
        } else {
            ContentPart::File {
                file: FilePart {
                    filename: file_name,
                    file_data: data_uri,
                },
            }
        };

        Self {
            model: &cfg.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(req.system),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        document,
                        ContentPart::Text { text: req.text },
                    ]),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: req.schema_name,
                    strict: true,
                    schema: req.schema,
                },
            },
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }
}

/// Chat message for the OpenAI API.
#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    /// One of: "system" | "user" | "assistant" | ...
    role: &'a str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    File { file: FilePart<'a> },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct FilePart<'a> {
    filename: &'a str,
    file_data: &'a str,
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    strict: bool,
    schema: &'a Value,
}

/// Minimal response for `/v1/chat/completions`.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl ChatCompletionResponse {
    fn into_content(self) -> Result<String, AiLlmError> {
        let Some(choice) = self.choices.into_iter().next() else {
            return Err(ProviderError::new(Provider::OpenAI, ProviderErrorKind::EmptyResponse).into());
        };
        if let Some(refusal) = choice.message.refusal.filter(|r| !r.trim().is_empty()) {
            return Err(
                ProviderError::new(Provider::OpenAI, ProviderErrorKind::Blocked(refusal)).into(),
            );
        }
        choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ProviderError::new(Provider::OpenAI, ProviderErrorKind::EmptyResponse).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured::InlineDocument;
    use serde_json::json;

    fn cfg() -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::OpenAI,
            model: "gpt-4o-mini".into(),
            endpoint: "https://api.openai.com".into(),
            api_key: Some("sk-test".into()),
            max_tokens: None,
            temperature: Some(0.2),
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn request_carries_file_part_and_strict_schema() {
        let schema = json!({ "type": "object" });
        let req = StructuredRequest {
            system: "sys",
            document: InlineDocument {
                mime_type: "application/pdf",
                data_base64: "JVBERi0xLjQK",
            },
            text: "What is the total on page 2?",
            schema_name: "analysis_response",
            schema: &schema,
        };
        let cfg = cfg();
        let data_uri = req.document.data_uri();
        let file_name = req.document.file_name();
        let body =
            serde_json::to_value(ChatCompletionRequest::build(&cfg, &req, &data_uri, &file_name))
                .unwrap();

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "sys");
        let parts = &body["messages"][1]["content"];
        assert_eq!(parts[0]["type"], "file");
        assert_eq!(parts[0]["file"]["filename"], "document.pdf");
        assert_eq!(
            parts[0]["file"]["file_data"],
            "data:application/pdf;base64,JVBERi0xLjQK"
        );
        assert_eq!(parts[1]["type"], "text");
        assert_eq!(parts[1]["text"], "What is the total on page 2?");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn images_use_image_url_parts() {
        let schema = json!({ "type": "object" });
        let req = StructuredRequest {
            system: "sys",
            document: InlineDocument {
                mime_type: "image/png",
                data_base64: "iVBORw0KGgo=",
            },
            text: "q",
            schema_name: "analysis_response",
            schema: &schema,
        };
        let cfg = cfg();
        let data_uri = req.document.data_uri();
        let file_name = req.document.file_name();
        let body =
            serde_json::to_value(ChatCompletionRequest::build(&cfg, &req, &data_uri, &file_name))
                .unwrap();
        let part = &body["messages"][1]["content"][0];
        assert_eq!(part["type"], "image_url");
        assert_eq!(part["image_url"]["url"], "data:image/png;base64,iVBORw0KGgo=");
    }

    #[test]
    fn refusal_and_missing_content() {
        let refused: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "content": null, "refusal": "I can't help" } }]
        }))
        .unwrap();
        assert!(refused.into_content().unwrap_err().is_empty_response());

        let empty: ChatCompletionResponse =
            serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(empty.into_content().unwrap_err().is_empty_response());

        let ok: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "content": "{\"answer\":\"yes\"}" } }]
        }))
        .unwrap();
        assert_eq!(ok.into_content().unwrap(), "{\"answer\":\"yes\"}");
    }
}
