//! Public API types re-used by external crates (e.g., an HTTP layer).

use serde::{Deserialize, Serialize};

/// One question about one document.
///
/// `document_payload` is a `data:<mime>;base64,<body>` envelope.
///
/// # Example
/// ```
/// use doc_analyzer::AnalysisRequest;
/// let req: AnalysisRequest = serde_json::from_str(
///     r#"{"documentPayload":"data:application/pdf;base64,JVBERi0xLjQK","query":"Total?"}"#,
/// ).unwrap();
/// assert_eq!(req.query, "Total?");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub document_payload: String,
    pub query: String,
}

impl AnalysisRequest {
    pub fn new(document_payload: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            document_payload: document_payload.into(),
            query: query.into(),
        }
    }
}

/// Validated answer; `answer` is never empty or whitespace-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub answer: String,
}
