//! Payload decoder for `data:<mime>;base64,<body>` envelopes.
//!
//! The grammar is fixed and case-sensitive on the scheme keyword. The body is
//! decoded once to prove it is valid and to measure it; what travels on to
//! the prompt is the original base64 text, never a re-encoding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

use crate::{cfg::AnalyzerConfig, error::DecodingError};

const SCHEME: &str = "data";
const MARKER: &str = ";base64,";

/// A validated document, borrowing the base64 body from the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDocument<'a> {
    /// Lowercased media type, guaranteed to be on the allowlist.
    pub mime_type: String,
    /// Size of the decoded bytes.
    pub byte_len: usize,
    /// Base64 body exactly as received.
    pub body: &'a str,
}

/// Parses and checks an envelope against the configured allowlist and limit.
///
/// Order of checks: grammar, MIME allowlist, size estimate, base64 decode,
/// exact size.
pub fn decode_envelope<'a>(
    envelope: &'a str,
    cfg: &AnalyzerConfig,
) -> Result<DecodedDocument<'a>, DecodingError> {
    let (scheme, rest) = envelope
        .split_once(':')
        .ok_or(DecodingError::MalformedEnvelope {
            reason: "missing scheme separator `:`",
        })?;
    if scheme != SCHEME {
        return Err(DecodingError::MalformedEnvelope {
            reason: "unknown scheme, expected `data`",
        });
    }

    let (mime_type, body) = rest
        .split_once(MARKER)
        .ok_or(DecodingError::MalformedEnvelope {
            reason: "missing `;base64,` marker",
        })?;
    if !is_mime_shaped(mime_type) {
        return Err(DecodingError::MalformedEnvelope {
            reason: "invalid MIME type",
        });
    }
    let mime_type = mime_type.to_ascii_lowercase();
    if !cfg.is_mime_allowed(&mime_type) {
        return Err(DecodingError::UnsupportedMimeType { mime_type });
    }
    if body.is_empty() {
        return Err(DecodingError::MalformedEnvelope {
            reason: "empty document body",
        });
    }

    // Reject before allocating when the body alone proves it is too big.
    let estimate = estimated_decoded_len(body);
    if estimate > cfg.max_document_bytes {
        return Err(DecodingError::PayloadTooLarge {
            size: estimate,
            limit: cfg.max_document_bytes,
        });
    }

    let bytes = BASE64_STANDARD
        .decode(body)
        .map_err(|e| DecodingError::InvalidBase64 {
            reason: e.to_string(),
        })?;
    if bytes.is_empty() {
        return Err(DecodingError::MalformedEnvelope {
            reason: "empty document body",
        });
    }
    if bytes.len() > cfg.max_document_bytes {
        return Err(DecodingError::PayloadTooLarge {
            size: bytes.len(),
            limit: cfg.max_document_bytes,
        });
    }

    Ok(DecodedDocument {
        mime_type,
        byte_len: bytes.len(),
        body,
    })
}

/// `type/subtype` made of token characters, no parameters.
fn is_mime_shaped(s: &str) -> bool {
    let token = |t: &str| {
        !t.is_empty()
            && t.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"!#$&-^_.+".contains(&b))
    };
    match s.split_once('/') {
        Some((ty, sub)) => token(ty) && token(sub),
        None => false,
    }
}

/// Decoded length implied by a padded base64 body of this size.
fn estimated_decoded_len(body: &str) -> usize {
    let padding = body.bytes().rev().take(2).filter(|&b| b == b'=').count();
    (body.len().div_ceil(4) * 3).saturating_sub(padding)
}

#[cfg(test)]
mod tests {
    use super::*;

    // "%PDF-1.4\n"
    const PDF_BODY: &str = "JVBERi0xLjQK";

    fn cfg() -> AnalyzerConfig {
        AnalyzerConfig::default()
    }

    #[test]
    fn decodes_minimal_pdf() {
        let envelope = format!("data:application/pdf;base64,{PDF_BODY}");
        let doc = decode_envelope(&envelope, &cfg()).unwrap();
        assert_eq!(doc.mime_type, "application/pdf");
        assert_eq!(doc.byte_len, 9);
        assert_eq!(doc.body, PDF_BODY);
    }

    #[test]
    fn mime_comparison_is_case_insensitive_but_scheme_is_not() {
        let doc = decode_envelope("data:Application/PDF;base64,JVBERi0xLjQK", &cfg()).unwrap();
        assert_eq!(doc.mime_type, "application/pdf");

        assert!(matches!(
            decode_envelope("DATA:application/pdf;base64,JVBERi0xLjQK", &cfg()),
            Err(DecodingError::MalformedEnvelope { .. })
        ));
    }

    #[test]
    fn grammar_violations_are_malformed() {
        for bad in [
            "application/pdf;base64,JVBERi0xLjQK",
            "blob:application/pdf;base64,JVBERi0xLjQK",
            "data:application/pdf,JVBERi0xLjQK",
            "data:application/pdf;utf8,JVBERi0xLjQK",
            "data:;base64,JVBERi0xLjQK",
            "data:pdf;base64,JVBERi0xLjQK",
            "data:application/pdf;base64,",
        ] {
            assert!(
                matches!(
                    decode_envelope(bad, &cfg()),
                    Err(DecodingError::MalformedEnvelope { .. })
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn unlisted_mime_types_are_rejected() {
        assert_eq!(
            decode_envelope("data:image/png;base64,iVBORw0KGgo=", &cfg()),
            Err(DecodingError::UnsupportedMimeType {
                mime_type: "image/png".into()
            })
        );
        assert!(matches!(
            decode_envelope("data:text/plain;charset=utf-8;base64,aGk=", &cfg()),
            Err(DecodingError::MalformedEnvelope { .. })
        ));
    }

    #[test]
    fn broken_base64_is_invalid() {
        for bad in [
            "data:application/pdf;base64,JVBERi0xLjQ",
            "data:application/pdf;base64,JVBE Ri0xLjQK",
            "data:application/pdf;base64,JVBERi0x*jQK",
            "data:application/pdf;base64,JVBERi0xLjQK=",
        ] {
            assert!(
                matches!(
                    decode_envelope(bad, &cfg()),
                    Err(DecodingError::InvalidBase64 { .. })
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let small = AnalyzerConfig {
            max_document_bytes: 8,
            ..AnalyzerConfig::default()
        };
        assert_eq!(
            decode_envelope("data:application/pdf;base64,JVBERi0xLjQK", &small),
            Err(DecodingError::PayloadTooLarge { size: 9, limit: 8 })
        );

        let exact = AnalyzerConfig {
            max_document_bytes: 9,
            ..AnalyzerConfig::default()
        };
        assert!(decode_envelope("data:application/pdf;base64,JVBERi0xLjQK", &exact).is_ok());
    }

    #[test]
    fn size_estimate_accounts_for_padding() {
        assert_eq!(estimated_decoded_len("JVBERi0xLjQK"), 9);
        assert_eq!(estimated_decoded_len("aGk="), 2);
        assert_eq!(estimated_decoded_len("aA=="), 1);
    }

    #[test]
    fn additional_allowed_types() {
        let cfg = AnalyzerConfig {
            allowed_mime_types: vec!["application/pdf".into(), "text/plain".into()],
            ..AnalyzerConfig::default()
        };
        let doc = decode_envelope("data:text/plain;base64,aGVsbG8=", &cfg).unwrap();
        assert_eq!(doc.byte_len, 5);
    }
}
