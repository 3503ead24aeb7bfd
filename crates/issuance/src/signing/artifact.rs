//! Shape checks for signed artifacts
//!
//! The engine never verifies signatures cryptographically; it only rejects
//! artifacts that cannot possibly be a credential in the declared format.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde_json::Value;

use crate::core::SignatureFormat;

/// Check that `artifact` is structurally a `format` signature
pub fn check_shape(format: SignatureFormat, artifact: &str) -> Result<(), String> {
    if artifact.trim().is_empty() {
        return Err("signed artifact is empty".to_string());
    }
    match format {
        SignatureFormat::Jades => check_compact_jws(artifact),
        SignatureFormat::Cose => check_cose(artifact),
    }
}

fn check_compact_jws(artifact: &str) -> Result<(), String> {
    let segments: Vec<&str> = artifact.split('.').collect();
    let [header, payload, signature] = segments.as_slice() else {
        return Err(format!(
            "compact JWS must have 3 segments, found {}",
            segments.len()
        ));
    };

    if payload.is_empty() || signature.is_empty() {
        return Err("compact JWS has an empty payload or signature segment".to_string());
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|e| format!("JWS header is not base64url: {e}"))?;
    let header: Value = serde_json::from_slice(&header_bytes)
        .map_err(|e| format!("JWS header is not JSON: {e}"))?;

    if header.get("alg").and_then(Value::as_str).is_none() {
        return Err("JWS header has no 'alg'".to_string());
    }
    Ok(())
}

fn check_cose(artifact: &str) -> Result<(), String> {
    let bytes = STANDARD
        .decode(artifact)
        .or_else(|_| URL_SAFE_NO_PAD.decode(artifact))
        .map_err(|e| format!("COSE artifact is not base64: {e}"))?;
    if bytes.is_empty() {
        return Err("COSE artifact decodes to nothing".to_string());
    }
    Ok(())
}
