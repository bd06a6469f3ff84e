//! Request shape checks. Nothing here looks inside the payload.

use serde_json::Value;

use crate::{api_types::AnalysisRequest, error::ValidationError};

pub const FIELD_DOCUMENT: &str = "documentPayload";
pub const FIELD_QUERY: &str = "query";

/// Checks a typed request: payload non-empty, query non-blank.
///
/// The query is not modified; trimming is only used for the emptiness test.
pub fn validate_request(req: &AnalysisRequest) -> Result<(), ValidationError> {
    if req.query.trim().is_empty() {
        return Err(ValidationError::EmptyQuery);
    }
    if req.document_payload.is_empty() {
        return Err(ValidationError::MissingField {
            field: FIELD_DOCUMENT,
        });
    }
    Ok(())
}

/// Turns an untyped candidate (e.g. a JSON body) into a validated request.
///
/// Absent or `null` fields are `MissingField`; non-string fields are
/// `InvalidType`. Unknown extra fields are ignored.
pub fn validate_value(candidate: &Value) -> Result<AnalysisRequest, ValidationError> {
    let Some(obj) = candidate.as_object() else {
        return Err(ValidationError::MissingField {
            field: FIELD_DOCUMENT,
        });
    };

    let document_payload = string_field(obj, FIELD_DOCUMENT)?;
    let query = string_field(obj, FIELD_QUERY)?;

    let req = AnalysisRequest {
        document_payload: document_payload.to_owned(),
        query: query.to_owned(),
    };
    validate_request(&req)?;
    Ok(req)
}

fn string_field<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField { field }),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ValidationError::InvalidType { field }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PDF: &str = "data:application/pdf;base64,JVBERi0xLjQK";

    #[test]
    fn accepts_well_formed_request() {
        let req = validate_value(&json!({ "documentPayload": PDF, "query": "  Total?  " })).unwrap();
        assert_eq!(req.query, "  Total?  ");
        assert_eq!(req.document_payload, PDF);
    }

    #[test]
    fn blank_queries_are_empty() {
        for q in ["", "   ", "\n\t"] {
            assert_eq!(
                validate_request(&AnalysisRequest::new(PDF, q)),
                Err(ValidationError::EmptyQuery)
            );
        }
    }

    #[test]
    fn blank_query_wins_over_bad_payload() {
        // The payload is never inspected when the query is unusable.
        assert_eq!(
            validate_request(&AnalysisRequest::new("not an envelope", "")),
            Err(ValidationError::EmptyQuery)
        );
    }

    #[test]
    fn missing_and_null_fields() {
        assert_eq!(
            validate_value(&json!({ "query": "q" })),
            Err(ValidationError::MissingField {
                field: FIELD_DOCUMENT
            })
        );
        assert_eq!(
            validate_value(&json!({ "documentPayload": PDF, "query": null })),
            Err(ValidationError::MissingField { field: FIELD_QUERY })
        );
        assert_eq!(
            validate_value(&json!({ "documentPayload": "", "query": "q" })),
            Err(ValidationError::MissingField {
                field: FIELD_DOCUMENT
            })
        );
        assert_eq!(
            validate_value(&json!(["not", "an", "object"])),
            Err(ValidationError::MissingField {
                field: FIELD_DOCUMENT
            })
        );
    }

    #[test]
    fn non_string_fields() {
        assert_eq!(
            validate_value(&json!({ "documentPayload": PDF, "query": 42 })),
            Err(ValidationError::InvalidType { field: FIELD_QUERY })
        );
        assert_eq!(
            validate_value(&json!({ "documentPayload": { "url": PDF }, "query": "q" })),
            Err(ValidationError::InvalidType {
                field: FIELD_DOCUMENT
            })
        );
    }
}
