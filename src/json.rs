//! JSON decoding for the request envelope (C3), including JWS payload
//! extraction for signed OpenID4VP requests (§4.2).

use serde::Deserialize;
use serde_json::Value;

use crate::error::JsonError;

/// Top-level request envelope (§3.2).
#[derive(Debug, Deserialize)]
pub struct RequestEnvelope {
    pub requests: Vec<RequestEntry>,
}

/// One entry in the envelope's `requests` array.
#[derive(Debug, Deserialize)]
pub struct RequestEntry {
    pub protocol: String,
    pub data: Value,
}

/// Parse the request envelope.
pub fn parse_envelope(bytes: &[u8]) -> Result<RequestEnvelope, JsonError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Resolve the effective request payload for one entry: if `data` carries a
/// `request` field (a signed JWS compact serialization), decode its
/// payload; otherwise `data` already *is* the payload.
///
/// Returns `None` when a `request` field is present but isn't a
/// well-formed three-segment JWS — the caller drops this request entry and
/// continues (§4.2, not fatal).
pub fn resolve_payload(data: &Value) -> Option<Value> {
    match data.get("request").and_then(Value::as_str) {
        Some(jws) => decode_jws_payload(jws),
        None => Some(data.clone()),
    }
}

/// Split a compact JWS on its two `.` separators and base64url-decode the
/// middle (payload) segment, padding it to a length congruent to 0 mod 4
/// if padding characters were stripped.
fn decode_jws_payload(jws: &str) -> Option<Value> {
    let mut parts = jws.split('.');
    let _header = parts.next()?;
    let payload = parts.next()?;
    let _signature = parts.next()?;
    if parts.next().is_some() {
        // More than two dots: not a three-segment compact JWS.
        return None;
    }

    let padded = pad_base64url(payload);
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE, &padded).ok()?;
    serde_json::from_slice(&decoded).ok()
}

fn pad_base64url(segment: &str) -> String {
    let remainder = segment.len() % 4;
    if remainder == 0 {
        segment.to_string()
    } else {
        let mut padded = segment.to_string();
        padded.push_str(&"=".repeat(4 - remainder));
        padded
    }
}
