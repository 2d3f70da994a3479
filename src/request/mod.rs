//! Request parsers (C5): §4.3.
//!
//! Each parser normalizes one protocol's request payload into a DCQL
//! query so [`crate::dcql`] is always the evaluator (§2's dataflow note).

mod mdoc_api;
mod openid4vp;
mod preview;

use crate::dcql::DcqlQuery;
use crate::error::RequestParseError;

/// Dispatch a single request entry's payload to its protocol parser.
pub fn parse(protocol: &str, data: &serde_json::Value) -> Result<DcqlQuery, RequestParseError> {
    match protocol {
        "preview" => preview::parse(data),
        "org.iso.mdoc" | "org-iso-mdoc" | "austroads-request-forwarding-v2" => {
            mdoc_api::parse(data)
        }
        "openid4vp" | "openid4vp-v1-unsigned" | "openid4vp-v1-signed" => openid4vp::parse(data),
        other => Err(RequestParseError::UnsupportedProtocol(other.to_string())),
    }
}

/// Build the degenerate single-query DCQL equivalent shared by the
/// `preview` and mdoc-api parsers: one `mso_mdoc` `CredentialQuery` with no
/// claim-sets and no `CredentialSetQuery`.
fn single_mdoc_query(
    doc_type: String,
    fields: Vec<(String, String, bool)>,
) -> DcqlQuery {
    use crate::dcql::{CredentialQuery, Format, RequestedClaim};

    let requested_claims = fields
        .into_iter()
        .map(|(namespace, name, intent_to_retain)| {
            let id = format!("{namespace}.{name}");
            RequestedClaim {
                id,
                values: vec![],
                path: vec![namespace, name],
                intent_to_retain,
            }
        })
        .collect();

    DcqlQuery {
        credentials: vec![CredentialQuery {
            id: "0".to_string(),
            format: Format::MsoMdoc,
            mdoc_doc_type: Some(doc_type),
            vct_values: vec![],
            requested_claims,
            claim_sets: vec![],
        }],
        credential_sets: vec![],
    }
}
