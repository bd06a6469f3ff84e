//! Final gate on model output: exactly `{ "answer": <non-blank string> }`.

use serde_json::Value;

use crate::{
    api_types::AnalysisResponse,
    error::{OutputValidationError, OutputViolation},
};

const ANSWER: &str = "answer";

/// Structural check against the answer schema: an object whose only field
/// is a string `answer`. Blank text is not a schema violation.
pub fn schema_violation(raw: &Value) -> Option<OutputViolation> {
    let Value::Object(obj) = raw else {
        return Some(OutputViolation::NotAnObject);
    };
    if let Some(extra) = obj.keys().find(|k| k.as_str() != ANSWER) {
        return Some(OutputViolation::UnexpectedField {
            field: extra.clone(),
        });
    }
    match obj.get(ANSWER) {
        None => Some(OutputViolation::MissingAnswer),
        Some(Value::String(_)) => None,
        Some(_) => Some(OutputViolation::AnswerNotString),
    }
}

/// Converts the invoker's JSON into the public response.
///
/// The answer text is returned as produced; whitespace is only trimmed for
/// the blank check.
pub fn validate_output(raw: Value) -> Result<AnalysisResponse, OutputValidationError> {
    if let Some(violation) = schema_violation(&raw) {
        return Err(violation.into());
    }
    let answer = match raw {
        Value::Object(mut obj) => match obj.remove(ANSWER) {
            Some(Value::String(s)) => s,
            _ => return Err(OutputViolation::MissingAnswer.into()),
        },
        _ => return Err(OutputViolation::NotAnObject.into()),
    };
    if answer.trim().is_empty() {
        return Err(OutputViolation::BlankAnswer.into());
    }

    Ok(AnalysisResponse { answer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn violation(raw: Value) -> OutputViolation {
        validate_output(raw).unwrap_err().violation
    }

    #[test]
    fn accepts_exact_shape() {
        let resp = validate_output(json!({ "answer": " The total is $4,250. " })).unwrap();
        assert_eq!(resp.answer, " The total is $4,250. ");
    }

    #[test]
    fn rejects_every_other_shape() {
        assert_eq!(violation(json!("answer")), OutputViolation::NotAnObject);
        assert_eq!(violation(json!([{ "answer": "x" }])), OutputViolation::NotAnObject);
        assert_eq!(violation(json!({})), OutputViolation::MissingAnswer);
        assert_eq!(violation(json!({ "answer": null })), OutputViolation::AnswerNotString);
        assert_eq!(violation(json!({ "answer": 42 })), OutputViolation::AnswerNotString);
        assert_eq!(violation(json!({ "answer": " \n " })), OutputViolation::BlankAnswer);
        assert_eq!(
            violation(json!({ "answer": "x", "confidence": 0.9 })),
            OutputViolation::UnexpectedField {
                field: "confidence".into()
            }
        );
    }
}
