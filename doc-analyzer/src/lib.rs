//! Document-grounded question answering.
//!
//! One request carries one document (a `data:<mime>;base64,<body>` envelope)
//! and one free-text question. [`DocumentAnalyzer::analyze`] runs a fixed
//! pipeline and stops at the first failing stage:
//!
//! 1. request validation ([`validate`]),
//! 2. envelope decoding ([`envelope`]),
//! 3. grounded prompt assembly ([`prompt`]),
//! 4. model invocation with bounded retries ([`invoker`]),
//! 5. output validation ([`output`]).
//!
//! Requests are independent; the analyzer holds no per-request state and can
//! be shared across tasks.
//!
//! # Example
//! ```no_run
//! use ai_llm_service::{LlmClient, config::default_config::config_from_env};
//! use doc_analyzer::{AnalysisRequest, AnalyzerConfig, DocumentAnalyzer};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = LlmClient::from_config(config_from_env()?)?;
//! let analyzer = DocumentAnalyzer::new(AnalyzerConfig::from_env()?, client);
//!
//! let req = AnalysisRequest::new("data:application/pdf;base64,JVBERi0xLjQK", "What is the total?");
//! let resp = analyzer.analyze(&req).await?;
//! println!("{}", resp.answer);
//! # Ok(()) }
//! ```

pub mod api_types;
pub mod backend;
pub mod cfg;
pub mod envelope;
pub mod error;
pub mod invoker;
pub mod output;
pub mod prompt;
pub mod validate;

pub use api_types::{AnalysisRequest, AnalysisResponse};
pub use cfg::AnalyzerConfig;
pub use error::{
    AnalysisError, DecodingError, FailureCategory, ModelError, OutputValidationError,
    OutputViolation, ValidationError,
};
pub use invoker::{BackendError, ModelBackend, ModelInvocationResult, RetryPolicy};

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::{envelope::decode_envelope, invoker::invoke, prompt::PromptContext};

/// The analysis flow bound to one configuration and one model backend.
#[derive(Debug)]
pub struct DocumentAnalyzer<B> {
    cfg: AnalyzerConfig,
    retry: RetryPolicy,
    backend: B,
}

impl<B: ModelBackend> DocumentAnalyzer<B> {
    pub fn new(cfg: AnalyzerConfig, backend: B) -> Self {
        let retry = RetryPolicy::from(&cfg);
        Self {
            cfg,
            retry,
            backend,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.cfg
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Answers `req.query` using only the document in `req.document_payload`.
    ///
    /// # Errors
    /// The first failing stage's error, wrapped in [`AnalysisError`]. Input
    /// errors are raised before any model call is made.
    #[instrument(skip_all, fields(query_len = req.query.len(), payload_len = req.document_payload.len()))]
    pub async fn analyze(&self, req: &AnalysisRequest) -> Result<AnalysisResponse, AnalysisError> {
        let result = self.run(req).await;
        match &result {
            Ok(resp) => info!(answer_len = resp.answer.len(), "analysis completed"),
            Err(e) => warn!(code = e.code(), error = %e, "analysis failed"),
        }
        result
    }

    /// Same as [`DocumentAnalyzer::analyze`] for an untyped JSON candidate.
    pub async fn analyze_value(&self, candidate: &Value) -> Result<AnalysisResponse, AnalysisError> {
        match validate::validate_value(candidate) {
            Ok(req) => self.analyze(&req).await,
            Err(e) => {
                warn!(code = AnalysisError::from(e.clone()).code(), error = %e, "analysis failed");
                Err(e.into())
            }
        }
    }

    async fn run(&self, req: &AnalysisRequest) -> Result<AnalysisResponse, AnalysisError> {
        validate::validate_request(req)?;

        let document = decode_envelope(&req.document_payload, &self.cfg)?;
        debug!(
            mime_type = %document.mime_type,
            document_bytes = document.byte_len,
            "document decoded"
        );

        let prompt = PromptContext::assemble(&document, &req.query);
        let raw = invoke(&self.backend, &prompt, &self.retry)
            .await
            .into_result()?;

        Ok(output::validate_output(raw)?)
    }
}
