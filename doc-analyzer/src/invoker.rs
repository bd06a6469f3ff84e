//! Model invoker: one logical request, bounded retries, untrusted output.
//!
//! Retry policy:
//! - transient backend failures (timeouts, connection errors, 429, 5xx) are
//!   retried up to `max_attempts` in total with exponential backoff;
//! - output that does not match the answer schema (unparseable text, wrong
//!   fields, non-string answer, undecodable provider body) is retried exactly
//!   once;
//! - empty output and permanent rejections are returned immediately.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::{cfg::AnalyzerConfig, error::ModelError, output, prompt::PromptContext};

/// How a backend call failed, as far as retrying is concerned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Worth trying again (timeouts, connection failures, 429, 5xx).
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// The backend answered with no text (no candidates, filtered, refused).
    #[error("backend returned no content: {0}")]
    Empty(String),

    /// The backend answered but its body could not be decoded.
    #[error("malformed backend response: {0}")]
    Malformed(String),

    /// Permanent failure (bad credentials, bad request, misconfiguration).
    #[error("backend rejected the request: {0}")]
    Rejected(String),
}

/// A generative model that accepts a grounded prompt plus output schema and
/// returns raw output text.
pub trait ModelBackend: Send + Sync {
    fn generate(
        &self,
        prompt: &PromptContext<'_>,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;
}

/// Tagged outcome of the invoker; consumed by the output validator.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelInvocationResult {
    Success(Value),
    Failure(ModelError),
}

impl ModelInvocationResult {
    pub fn into_result(self) -> Result<Value, ModelError> {
        match self {
            ModelInvocationResult::Success(v) => Ok(v),
            ModelInvocationResult::Failure(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
}

impl From<&AnalyzerConfig> for RetryPolicy {
    fn from(cfg: &AnalyzerConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_backoff: cfg.initial_backoff,
            max_backoff: cfg.max_backoff,
            request_timeout: cfg.request_timeout,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): doubles each time, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Calls the backend until it yields an object matching the answer schema or
/// a terminal failure.
#[instrument(skip_all, fields(mime_type = %prompt.mime_type, query_len = prompt.query.len()))]
pub async fn invoke<B: ModelBackend>(
    backend: &B,
    prompt: &PromptContext<'_>,
    policy: &RetryPolicy,
) -> ModelInvocationResult {
    let mut attempts = 0u32;
    let mut transient_failures = 0u32;
    let mut schema_retried = false;

    loop {
        attempts += 1;
        let outcome = match timeout(policy.request_timeout, backend.generate(prompt)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(BackendError::Transient(format!(
                "no response within {:?}",
                policy.request_timeout
            ))),
        };

        let checked = match outcome {
            Ok(raw) if raw.trim().is_empty() => {
                return ModelInvocationResult::Failure(ModelError::EmptyAnswer {
                    detail: "model returned blank output".to_string(),
                });
            }
            Ok(raw) => conforming_output(&raw),
            Err(BackendError::Malformed(detail)) => Err(detail),
            Err(BackendError::Transient(last_error)) => {
                transient_failures += 1;
                if transient_failures >= policy.max_attempts {
                    warn!(attempts, %last_error, "model backend unavailable, giving up");
                    return ModelInvocationResult::Failure(ModelError::ModelUnavailable {
                        attempts,
                        last_error,
                    });
                }
                let delay = policy.backoff(transient_failures);
                warn!(
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "transient model failure, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
            Err(BackendError::Empty(detail)) => {
                return ModelInvocationResult::Failure(ModelError::EmptyAnswer { detail });
            }
            Err(BackendError::Rejected(detail)) => {
                return ModelInvocationResult::Failure(ModelError::BackendRejected { detail });
            }
        };

        match checked {
            Ok(value) => {
                debug!(attempts, "structured output received");
                return ModelInvocationResult::Success(value);
            }
            Err(detail) if !schema_retried => {
                warn!(attempt = attempts, %detail, "non-conforming model output, retrying once");
                schema_retried = true;
            }
            Err(detail) => {
                return ModelInvocationResult::Failure(ModelError::SchemaViolation {
                    attempts,
                    detail,
                });
            }
        }
    }
}

/// Salvages raw text into JSON and checks it against the answer schema.
fn conforming_output(raw: &str) -> Result<Value, String> {
    let value = parse_structured(raw)?;
    match output::schema_violation(&value) {
        Some(violation) => Err(violation.to_string()),
        None => Ok(value),
    }
}

/* ------------------------------------------------------------------------- */
/* Structured output salvage                                                 */
/* ------------------------------------------------------------------------- */

const MAX_DETAIL_LEN: usize = 200;

/// Parses raw model text into a JSON object.
///
/// Tries the text as-is, then without markdown fences, then the first
/// balanced `{...}` block found in it.
pub fn parse_structured(raw: &str) -> Result<Value, String> {
    let mut candidates: Vec<&str> = vec![raw.trim()];
    if let Some(inner) = strip_markdown_fences(raw) {
        candidates.push(inner);
    }
    if let Some(block) = first_balanced_object(raw) {
        candidates.push(block);
    }

    let mut last_err = String::from("no JSON object found");
    for candidate in candidates {
        match serde_json::from_str::<Value>(candidate) {
            Ok(v @ Value::Object(_)) => return Ok(v),
            Ok(_) => last_err = "expected a JSON object".to_string(),
            Err(e) => last_err = e.to_string(),
        }
    }

    let preview: String = raw.trim().chars().take(MAX_DETAIL_LEN).collect();
    Err(format!("{last_err}; output: {preview}"))
}

fn strip_markdown_fences(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    let without_open = trimmed.strip_prefix("```")?;
    // Skip the info string (`json`, `JSON`, ...).
    let after_header = match without_open.find('\n') {
        Some(idx) => &without_open[idx + 1..],
        None => without_open,
    };
    let end = after_header.rfind("```")?;
    Some(after_header[..end].trim())
}

fn first_balanced_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&content[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::DecodedDocument;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Scripted {
        replies: Mutex<VecDeque<Result<String, BackendError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, BackendError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ModelBackend for Scripted {
        async fn generate(&self, _prompt: &PromptContext<'_>) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Transient("script exhausted".into())))
        }
    }

    /// Never answers; used to exercise the per-attempt timeout.
    struct Hanging;

    impl ModelBackend for Hanging {
        async fn generate(&self, _prompt: &PromptContext<'_>) -> Result<String, BackendError> {
            std::future::pending().await
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(1_000),
            request_timeout: Duration::from_secs(5),
        }
    }

    fn doc() -> DecodedDocument<'static> {
        DecodedDocument {
            mime_type: "application/pdf".into(),
            byte_len: 9,
            body: "JVBERi0xLjQK",
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = policy();
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(400));
        assert_eq!(p.backoff(5), Duration::from_millis(1_000));
        assert_eq!(p.backoff(40), Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_once_then_success() {
        let backend = Scripted::new(vec![
            Err(BackendError::Transient("503".into())),
            Ok(r#"{"answer":"42"}"#.into()),
        ]);
        let doc = doc();
        let prompt = PromptContext::assemble(&doc, "q");
        let out = invoke(&backend, &prompt, &policy()).await;
        assert_eq!(out, ModelInvocationResult::Success(json!({ "answer": "42" })));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn always_transient_exhausts_the_bound() {
        let backend = Scripted::new(vec![]);
        let doc = doc();
        let prompt = PromptContext::assemble(&doc, "q");
        let out = invoke(&backend, &prompt, &policy()).await;
        assert!(matches!(
            out,
            ModelInvocationResult::Failure(ModelError::ModelUnavailable { attempts: 3, .. })
        ));
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_count_as_transient() {
        let doc = doc();
        let prompt = PromptContext::assemble(&doc, "q");
        let out = invoke(&Hanging, &prompt, &policy()).await;
        match out {
            ModelInvocationResult::Failure(ModelError::ModelUnavailable { attempts, last_error }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("no response within"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_output_is_retried_exactly_once() {
        let backend = Scripted::new(vec![
            Ok("not json".into()),
            Ok(r#"{"answer":"fixed"}"#.into()),
        ]);
        let doc = doc();
        let prompt = PromptContext::assemble(&doc, "q");
        let out = invoke(&backend, &prompt, &policy()).await;
        assert_eq!(out, ModelInvocationResult::Success(json!({ "answer": "fixed" })));

        let backend = Scripted::new(vec![Ok("nope".into()), Ok("[1,2]".into()), Ok("{}".into())]);
        let out = invoke(&backend, &prompt, &policy()).await;
        assert!(matches!(
            out,
            ModelInvocationResult::Failure(ModelError::SchemaViolation { attempts: 2, .. })
        ));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_shape_takes_the_schema_retry() {
        let doc = doc();
        let prompt = PromptContext::assemble(&doc, "q");

        let backend = Scripted::new(vec![
            Ok(r#"{"response":"The total is 42"}"#.into()),
            Ok(r#"{"answer":"The total is 42"}"#.into()),
        ]);
        assert_eq!(
            invoke(&backend, &prompt, &policy()).await,
            ModelInvocationResult::Success(json!({ "answer": "The total is 42" }))
        );
        assert_eq!(backend.calls(), 2);

        let backend = Scripted::new(vec![
            Ok(r#"{"answer":42}"#.into()),
            Ok("{}".into()),
            Ok(r#"{"answer":"never asked"}"#.into()),
        ]);
        match invoke(&backend, &prompt, &policy()).await {
            ModelInvocationResult::Failure(ModelError::SchemaViolation { attempts, detail }) => {
                assert_eq!(attempts, 2);
                assert!(detail.contains("no `answer` field"), "{detail}");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn undecodable_backend_body_takes_the_schema_retry() {
        let doc = doc();
        let prompt = PromptContext::assemble(&doc, "q");

        let backend = Scripted::new(vec![
            Err(BackendError::Malformed("expected `candidates`".into())),
            Ok(r#"{"answer":"ok"}"#.into()),
        ]);
        assert_eq!(
            invoke(&backend, &prompt, &policy()).await,
            ModelInvocationResult::Success(json!({ "answer": "ok" }))
        );

        let backend = Scripted::new(vec![
            Err(BackendError::Malformed("bad body".into())),
            Err(BackendError::Malformed("bad body".into())),
        ]);
        assert_eq!(
            invoke(&backend, &prompt, &policy()).await,
            ModelInvocationResult::Failure(ModelError::SchemaViolation {
                attempts: 2,
                detail: "bad body".into()
            })
        );
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_and_rejected_are_not_retried() {
        let doc = doc();
        let prompt = PromptContext::assemble(&doc, "q");

        let backend = Scripted::new(vec![Ok("   ".into())]);
        assert!(matches!(
            invoke(&backend, &prompt, &policy()).await,
            ModelInvocationResult::Failure(ModelError::EmptyAnswer { .. })
        ));
        assert_eq!(backend.calls(), 1);

        let backend = Scripted::new(vec![Err(BackendError::Empty("SAFETY".into()))]);
        assert!(matches!(
            invoke(&backend, &prompt, &policy()).await,
            ModelInvocationResult::Failure(ModelError::EmptyAnswer { .. })
        ));
        assert_eq!(backend.calls(), 1);

        let backend = Scripted::new(vec![Err(BackendError::Rejected("401".into()))]);
        assert_eq!(
            invoke(&backend, &prompt, &policy()).await,
            ModelInvocationResult::Failure(ModelError::BackendRejected {
                detail: "401".into()
            })
        );
        assert_eq!(backend.calls(), 1);
    }

    #[test]
    fn salvages_fenced_and_wrapped_json() {
        assert_eq!(
            parse_structured("```json\n{\"answer\": \"a\"}\n```").unwrap(),
            json!({ "answer": "a" })
        );
        assert_eq!(
            parse_structured("Sure! {\"answer\": \"b {x}\"} hope that helps").unwrap(),
            json!({ "answer": "b {x}" })
        );
        assert_eq!(
            parse_structured(r#"{"answer": "quote \" and } brace"}"#).unwrap(),
            json!({ "answer": "quote \" and } brace" })
        );
    }

    #[test]
    fn rejects_non_objects() {
        assert!(parse_structured("\"just a string\"").is_err());
        assert!(parse_structured("[{\"answer\": 1}").is_err());
        let err = parse_structured("plain prose").unwrap_err();
        assert!(err.contains("plain prose"));
    }
}
