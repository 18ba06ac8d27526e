use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pdfchunk_core::{InvocationEvent, StorageEvent, UploadRequest, WebRequestEvent};
use serde_json::Value;

use crate::error::ProcessError;

/// Decodes a base64 document payload.
///
/// Embedded whitespace and a `data:...;base64,` prefix are tolerated.
pub fn decode_document(encoded: &str) -> Result<Vec<u8>, ProcessError> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    let compact = payload
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect::<String>();

    STANDARD
        .decode(compact.as_bytes())
        .map_err(|err| ProcessError::validation(format!("Invalid base64 encoded PDF data: {err}")))
}

/// Unwraps a proxied web request into the upload it carries.
pub fn parse_web_body(event: &WebRequestEvent) -> Result<UploadRequest, ProcessError> {
    let raw = event.body.as_deref().unwrap_or("{}");

    let body = if event.is_base64_encoded {
        let bytes = STANDARD.decode(raw.trim().as_bytes()).map_err(|err| {
            ProcessError::validation(format!("Invalid base64 encoded body: {err}"))
        })?;
        String::from_utf8(bytes).map_err(|err| {
            ProcessError::validation(format!("Invalid base64 encoded body: {err}"))
        })?
    } else {
        raw.to_string()
    };

    parse_upload(&body)
}

/// Routes a function-style payload on the presence of `Records`.
///
/// A malformed notification is rejected as such rather than retried as a web request.
pub fn parse_invocation(body: &[u8]) -> Result<InvocationEvent, ProcessError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| ProcessError::validation("Invalid JSON body"))?;

    if value.get("Records").is_some() {
        let event: StorageEvent = serde_json::from_value(value)
            .map_err(|_| ProcessError::validation("Invalid storage event"))?;
        return Ok(InvocationEvent::Storage(event));
    }

    let event: WebRequestEvent =
        serde_json::from_value(value).map_err(|_| ProcessError::validation("Invalid JSON body"))?;
    Ok(InvocationEvent::Web(event))
}

pub fn parse_upload(body: &str) -> Result<UploadRequest, ProcessError> {
    serde_json::from_str(body).map_err(|_| ProcessError::validation("Invalid JSON body"))
}
