//! Prompt builder: fixed grounding instruction + inline document + verbatim query.

use ai_llm_service::{InlineDocument, StructuredRequest};
use serde_json::{Value, json};

use crate::envelope::DecodedDocument;

/// System instruction that confines answers to the supplied document.
pub const GROUNDING_SYSTEM: &str = r#"
You answer questions about the single document attached to this message.
Use only information that appears in that document; do not rely on outside knowledge or assumptions.
If the document does not contain the information needed to answer, say explicitly that the document does not provide it.
Respond with a JSON object that has exactly one field, "answer", containing your answer as plain text.
"#;

pub const ANSWER_SCHEMA_NAME: &str = "analysis_response";

/// JSON Schema of the model output: `{ "answer": string }`, nothing else.
pub fn answer_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "answer": {
                "type": "string",
                "description": "Answer to the question, based only on the attached document."
            }
        },
        "required": ["answer"],
        "additionalProperties": false
    })
}

/// Everything the model sees for one request. Built, used once, dropped.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub system: &'static str,
    pub mime_type: &'a str,
    /// Base64 body taken from the envelope without re-encoding.
    pub document_base64: &'a str,
    /// The user's question, verbatim.
    pub query: &'a str,
    pub schema: Value,
}

impl<'a> PromptContext<'a> {
    /// Assembles the prompt. The document is forwarded whole: no trimming,
    /// summarizing or chunking.
    pub fn assemble(document: &'a DecodedDocument<'a>, query: &'a str) -> Self {
        Self {
            system: GROUNDING_SYSTEM.trim(),
            mime_type: &document.mime_type,
            document_base64: document.body,
            query,
            schema: answer_schema(),
        }
    }

    /// Provider-agnostic view handed to `ai-llm-service`.
    pub fn as_structured_request(&self) -> StructuredRequest<'_> {
        StructuredRequest {
            system: self.system,
            document: InlineDocument {
                mime_type: self.mime_type,
                data_base64: self.document_base64,
            },
            text: self.query,
            schema_name: ANSWER_SCHEMA_NAME,
            schema: &self.schema,
        }
    }
}
