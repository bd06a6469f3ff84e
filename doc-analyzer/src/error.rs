//! Typed failures of the analysis pipeline.
//!
//! Every stage owns one enum; [`AnalysisError`] wraps them without losing the
//! subkind, so callers can tell "bad input", "backend unavailable" and
//! "model produced unusable output" apart.

use thiserror::Error;

/// Root error returned by [`crate::DocumentAnalyzer::analyze`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Decoding(#[from] DecodingError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Output(#[from] OutputValidationError),
}

/// Coarse grouping used to pick user-facing feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// The caller sent something we refuse to analyze.
    BadInput,
    /// The model backend could not be reached or refused the call.
    BackendUnavailable,
    /// The model answered, but not with a usable answer.
    UnusableOutput,
}

impl AnalysisError {
    /// Stable machine-readable code, one per subkind.
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::Validation(ValidationError::MissingField { .. }) => {
                "validation.missing_field"
            }
            AnalysisError::Validation(ValidationError::InvalidType { .. }) => {
                "validation.invalid_type"
            }
            AnalysisError::Validation(ValidationError::EmptyQuery) => "validation.empty_query",
            AnalysisError::Decoding(DecodingError::MalformedEnvelope { .. }) => {
                "decoding.malformed_envelope"
            }
            AnalysisError::Decoding(DecodingError::UnsupportedMimeType { .. }) => {
                "decoding.unsupported_mime_type"
            }
            AnalysisError::Decoding(DecodingError::InvalidBase64 { .. }) => {
                "decoding.invalid_base64"
            }
            AnalysisError::Decoding(DecodingError::PayloadTooLarge { .. }) => {
                "decoding.payload_too_large"
            }
            AnalysisError::Model(ModelError::ModelUnavailable { .. }) => "model.unavailable",
            AnalysisError::Model(ModelError::SchemaViolation { .. }) => "model.schema_violation",
            AnalysisError::Model(ModelError::EmptyAnswer { .. }) => "model.empty_answer",
            AnalysisError::Model(ModelError::BackendRejected { .. }) => "model.backend_rejected",
            AnalysisError::Output(_) => "output.invalid",
        }
    }

    pub fn category(&self) -> FailureCategory {
        match self {
            AnalysisError::Validation(_) | AnalysisError::Decoding(_) => FailureCategory::BadInput,
            AnalysisError::Model(ModelError::ModelUnavailable { .. })
            | AnalysisError::Model(ModelError::BackendRejected { .. }) => {
                FailureCategory::BackendUnavailable
            }
            AnalysisError::Model(_) | AnalysisError::Output(_) => FailureCategory::UnusableOutput,
        }
    }
}

/// Request shape failures. Raised before the payload is looked at.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("field `{field}` must be a string")]
    InvalidType { field: &'static str },

    #[error("query must not be empty")]
    EmptyQuery,
}

/// Envelope/payload failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodingError {
    #[error("malformed document envelope: {reason}")]
    MalformedEnvelope { reason: &'static str },

    #[error("unsupported document type `{mime_type}`")]
    UnsupportedMimeType { mime_type: String },

    #[error("document body is not valid base64: {reason}")]
    InvalidBase64 { reason: String },

    #[error("document is {size} bytes, limit is {limit}")]
    PayloadTooLarge { size: usize, limit: usize },
}

/// Failures of the model call itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("model backend unavailable after {attempts} attempt(s): {last_error}")]
    ModelUnavailable { attempts: u32, last_error: String },

    #[error("model output violated the answer schema after {attempts} attempt(s): {detail}")]
    SchemaViolation { attempts: u32, detail: String },

    #[error("model produced no answer: {detail}")]
    EmptyAnswer { detail: String },

    #[error("model backend rejected the request: {detail}")]
    BackendRejected { detail: String },
}

/// Why a structurally valid JSON response is still not an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputViolation {
    NotAnObject,
    MissingAnswer,
    AnswerNotString,
    BlankAnswer,
    UnexpectedField { field: String },
}

impl std::fmt::Display for OutputViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputViolation::NotAnObject => f.write_str("response is not a JSON object"),
            OutputViolation::MissingAnswer => f.write_str("response has no `answer` field"),
            OutputViolation::AnswerNotString => f.write_str("`answer` is not a string"),
            OutputViolation::BlankAnswer => f.write_str("`answer` is empty"),
            OutputViolation::UnexpectedField { field } => write!(f, "unexpected field `{field}`"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("model output rejected: {violation}")]
pub struct OutputValidationError {
    pub violation: OutputViolation,
}

impl From<OutputViolation> for OutputValidationError {
    fn from(violation: OutputViolation) -> Self {
        Self { violation }
    }
}
