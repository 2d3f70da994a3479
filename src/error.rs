//! Error types for each fallible boundary in the matcher pipeline.

use thiserror::Error;

/// Errors produced while decoding the credential database from CBOR.
#[derive(Debug, Error)]
pub enum CborError {
    #[error("expected {expected}, found a different CBOR type")]
    UnexpectedType { expected: &'static str },

    #[error("missing required key `{0}`")]
    MissingKey(&'static str),

    #[error("truncated or malformed CBOR input")]
    Truncated,

    #[error("CBOR decode error: {0}")]
    Io(#[from] ciborium::de::Error<std::io::Error>),
}

/// Errors produced while decoding the JSON request envelope.
///
/// A malformed signed-request JWS (§4.2) is not modeled as an error here:
/// it is a per-entry condition the caller drops and continues past, so
/// [`crate::json::resolve_payload`] reports it as `None` rather than `Err`.
#[derive(Debug, Error)]
pub enum JsonError {
    #[error("malformed request envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors produced while normalizing a single request entry into DCQL.
#[derive(Debug, Error)]
pub enum RequestParseError {
    #[error("unsupported protocol `{0}`")]
    UnsupportedProtocol(String),

    #[error("missing field `{0}` in request payload")]
    MissingField(&'static str),

    #[error("invalid device request: {0}")]
    InvalidDeviceRequest(String),

    #[error("malformed request payload: {0}")]
    Malformed(String),

    #[error(transparent)]
    Cbor(#[from] CborError),
}

/// Top-level error surfaced from the entry point. Only the two fatal paths
/// (database and envelope decoding) reach this type; everything else is
/// handled by dropping the offending request entry and continuing.
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("failed to decode credential database: {0}")]
    Database(#[from] CborError),

    #[error("failed to decode request envelope: {0}")]
    Envelope(#[from] JsonError),
}
