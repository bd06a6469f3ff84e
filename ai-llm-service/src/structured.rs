//! Provider-agnostic description of a multimodal, schema-constrained request.
//!
//! Clients translate a [`StructuredRequest`] into their own wire format. The
//! document travels as the caller's base64 text; nothing here decodes or
//! re-encodes it.

use serde_json::Value;

/// A binary document attached inline to a request.
#[derive(Debug, Clone, Copy)]
pub struct InlineDocument<'a> {
    /// Declared media type, e.g. `application/pdf`.
    pub mime_type: &'a str,
    /// Standard-alphabet base64 body, exactly as received.
    pub data_base64: &'a str,
}

impl InlineDocument<'_> {
    /// Rebuilds the `data:` URI form some providers expect.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data_base64)
    }

    /// Synthetic file name for providers that require one.
    pub fn file_name(&self) -> String {
        let ext = match self.mime_type {
            "application/pdf" => "pdf",
            "text/plain" => "txt",
            "text/markdown" => "md",
            "text/html" => "html",
            "text/csv" => "csv",
            "image/png" => "png",
            "image/jpeg" => "jpg",
            _ => "bin",
        };
        format!("document.{ext}")
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// One request: system instruction, one inline document, one user text and
/// the JSON Schema the answer must follow.
#[derive(Debug, Clone, Copy)]
pub struct StructuredRequest<'a> {
    pub system: &'a str,
    pub document: InlineDocument<'a>,
    pub text: &'a str,
    /// Short identifier for the schema (OpenAI requires a name).
    pub schema_name: &'a str,
    /// JSON Schema of the expected object.
    pub schema: &'a Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_round_trips_the_body_verbatim() {
        let doc = InlineDocument {
            mime_type: "application/pdf",
            data_base64: "JVBERi0xLjQK",
        };
        assert_eq!(doc.data_uri(), "data:application/pdf;base64,JVBERi0xLjQK");
        assert_eq!(doc.file_name(), "document.pdf");
        assert!(!doc.is_image());
    }

    #[test]
    fn unknown_types_get_bin_extension() {
        let doc = InlineDocument {
            mime_type: "application/x-foo",
            data_base64: "AA==",
        };
        assert_eq!(doc.file_name(), "document.bin");
    }
}
