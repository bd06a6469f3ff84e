//! Shared LLM service: provider configs, unified errors, multimodal
//! structured-output clients (Gemini, OpenAI) and a scoped tracing layer.

pub mod config;
pub mod error_handler;
pub mod llm_client;
pub mod services;
pub mod structured;
pub mod telemetry;

pub use error_handler::{AiLlmError, Result};
pub use llm_client::LlmClient;
pub use structured::{InlineDocument, StructuredRequest};
