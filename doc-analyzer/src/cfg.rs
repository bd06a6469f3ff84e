//! Runtime configuration loaded from environment variables.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 20 * 1024 * 1024;

/// Knobs for one [`crate::DocumentAnalyzer`]. All fields have defaults via
/// [`AnalyzerConfig::default`]; [`AnalyzerConfig::from_env`] overrides them.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyzerConfig {
    /// Lowercased MIME types accepted in the envelope.
    pub allowed_mime_types: Vec<String>,
    /// Upper bound on the decoded document size.
    pub max_document_bytes: usize,
    /// Total attempts for transient backend failures (>= 1).
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Applied to every single backend call.
    pub request_timeout: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            allowed_mime_types: vec!["application/pdf".to_string()],
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(8_000),
            request_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid number in {var}: {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be at least 1")]
    ZeroNotAllowed { var: &'static str },

    #[error("ANALYZER_ALLOWED_MIME_TYPES must list at least one type")]
    EmptyAllowlist,

    #[error("ANALYZER_MAX_BACKOFF_MS ({max_ms}) is below ANALYZER_INITIAL_BACKOFF_MS ({initial_ms})")]
    BackoffCapBelowInitial { initial_ms: u64, max_ms: u64 },
}

impl AnalyzerConfig {
    /// Build from process environment variables.
    ///
    /// - `ANALYZER_ALLOWED_MIME_TYPES` (comma-separated, default `application/pdf`)
    /// - `ANALYZER_MAX_DOCUMENT_BYTES` (default 20 MiB)
    /// - `ANALYZER_MAX_ATTEMPTS` (default 3)
    /// - `ANALYZER_INITIAL_BACKOFF_MS` (default 500)
    /// - `ANALYZER_MAX_BACKOFF_MS` (default 8000)
    /// - `ANALYZER_REQUEST_TIMEOUT_SECS` (default 120)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as [`AnalyzerConfig::from_env`] with an injectable lookup.
    ///
    /// # Example
    /// ```
    /// # use doc_analyzer::AnalyzerConfig;
    /// let cfg = AnalyzerConfig::from_lookup(|k| {
    ///     (k == "ANALYZER_MAX_ATTEMPTS").then(|| "5".to_string())
    /// })
    /// .unwrap();
    /// assert_eq!(cfg.max_attempts, 5);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let dflt = Self::default();
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        let allowed_mime_types = match get("ANALYZER_ALLOWED_MIME_TYPES") {
            Some(raw) => {
                let list: Vec<String> = raw
                    .split(',')
                    .map(|s| s.trim().to_ascii_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect();
                if list.is_empty() {
                    return Err(ConfigError::EmptyAllowlist);
                }
                list
            }
            None => dflt.allowed_mime_types,
        };

        let max_attempts = parse(&get, "ANALYZER_MAX_ATTEMPTS", dflt.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::ZeroNotAllowed {
                var: "ANALYZER_MAX_ATTEMPTS",
            });
        }
        let request_timeout_secs = parse(
            &get,
            "ANALYZER_REQUEST_TIMEOUT_SECS",
            dflt.request_timeout.as_secs(),
        )?;
        if request_timeout_secs == 0 {
            return Err(ConfigError::ZeroNotAllowed {
                var: "ANALYZER_REQUEST_TIMEOUT_SECS",
            });
        }

        let initial_backoff_ms = parse(
            &get,
            "ANALYZER_INITIAL_BACKOFF_MS",
            dflt.initial_backoff.as_millis() as u64,
        )?;
        let max_backoff_ms = parse(
            &get,
            "ANALYZER_MAX_BACKOFF_MS",
            dflt.max_backoff.as_millis() as u64,
        )?;
        if max_backoff_ms < initial_backoff_ms {
            return Err(ConfigError::BackoffCapBelowInitial {
                initial_ms: initial_backoff_ms,
                max_ms: max_backoff_ms,
            });
        }

        Ok(Self {
            allowed_mime_types,
            max_document_bytes: parse(
                &get,
                "ANALYZER_MAX_DOCUMENT_BYTES",
                dflt.max_document_bytes,
            )?,
            max_attempts,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }

    pub fn is_mime_allowed(&self, mime_type: &str) -> bool {
        let wanted = mime_type.to_ascii_lowercase();
        self.allowed_mime_types.iter().any(|m| *m == wanted)
    }
}

fn parse<T, G>(get: &G, var: &'static str, dflt: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value: v }),
        None => Ok(dflt),
    }
}
