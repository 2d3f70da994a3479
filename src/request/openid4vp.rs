//! `openid4vp` / `openid4vp-v1-unsigned` / `openid4vp-v1-signed`: parse
//! `dcql_query` directly (§4.4).

use serde::Deserialize;
use serde_json::Value;

use crate::dcql::{
    ClaimSet, CredentialQuery, CredentialSetOptionQuery, CredentialSetQuery, DcqlQuery, Format,
    RequestedClaim,
};
use crate::error::RequestParseError;

#[derive(Deserialize)]
struct DcqlQueryJson {
    credentials: Vec<CredentialQueryJson>,
    #[serde(default)]
    credential_sets: Vec<CredentialSetQueryJson>,
}

#[derive(Deserialize)]
struct CredentialQueryJson {
    id: String,
    format: String,
    #[serde(default)]
    meta: Value,
    #[serde(default)]
    claims: Vec<ClaimQueryJson>,
    #[serde(default)]
    claim_sets: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct ClaimQueryJson {
    id: Option<String>,
    #[serde(default)]
    path: Vec<Value>,
    #[serde(default)]
    values: Vec<Value>,
    #[serde(default)]
    intent_to_retain: bool,
}

#[derive(Deserialize)]
struct CredentialSetQueryJson {
    #[serde(default = "default_required")]
    required: bool,
    options: Vec<Vec<String>>,
}

fn default_required() -> bool {
    true
}

pub fn parse(data: &Value) -> Result<DcqlQuery, RequestParseError> {
    let dcql_query = data
        .get("dcql_query")
        .ok_or(RequestParseError::MissingField("dcql_query"))?;
    let parsed: DcqlQueryJson = serde_json::from_value(dcql_query.clone())
        .map_err(|e| RequestParseError::Malformed(format!("invalid dcql_query: {e}")))?;

    let credentials = parsed
        .credentials
        .into_iter()
        .filter_map(|c| match convert_credential_query(c) {
            Ok(q) => Some(q),
            Err(unsupported_format) => {
                log::warn!("dropping credential query with unsupported format `{unsupported_format}`");
                None
            }
        })
        .collect();

    let credential_sets = parsed
        .credential_sets
        .into_iter()
        .map(|csq| CredentialSetQuery {
            required: csq.required,
            options: csq
                .options
                .into_iter()
                .map(|credential_ids| CredentialSetOptionQuery { credential_ids })
                .collect(),
        })
        .collect();

    Ok(DcqlQuery {
        credentials,
        credential_sets,
    })
}

/// Converts one JSON credential query. Returns the unsupported format
/// string as an `Err` so the caller can log-and-drop rather than fail the
/// whole query.
fn convert_credential_query(c: CredentialQueryJson) -> Result<CredentialQuery, String> {
    let format = match c.format.as_str() {
        "mso_mdoc" => Format::MsoMdoc,
        "mso_mdoc_zk" => Format::MsoMdocZk,
        "dc+sd-jwt" => Format::DcSdJwt,
        other => return Err(other.to_string()),
    };

    let mdoc_doc_type = c
        .meta
        .get("doctype_value")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let vct_values = c
        .meta
        .get("vct_values")
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default();

    let requested_claims = c.claims.into_iter().map(convert_claim).collect();
    let claim_sets = c
        .claim_sets
        .into_iter()
        .map(|claim_identifiers| ClaimSet { claim_identifiers })
        .collect();

    Ok(CredentialQuery {
        id: c.id,
        format,
        mdoc_doc_type,
        vct_values,
        requested_claims,
        claim_sets,
    })
}

fn convert_claim(claim: ClaimQueryJson) -> RequestedClaim {
    let path = claim
        .path
        .iter()
        .filter_map(|p| match p {
            Value::String(s) => Some(s.clone()),
            // §9's noted limitation: numeric path segments and values are
            // stringified with integer rendering even when not integral.
            Value::Number(n) => Some(stringify_number(n)),
            _ => None,
        })
        .collect();

    let values = claim
        .values
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(stringify_number(n)),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .collect();

    RequestedClaim {
        id: claim.id.unwrap_or_default(),
        values,
        path,
        intent_to_retain: claim.intent_to_retain,
    }
}

fn stringify_number(n: &serde_json::Number) -> String {
    n.as_i64()
        .or_else(|| n.as_f64().map(|f| f as i64))
        .unwrap_or(0)
        .to_string()
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_mdoc_credential_query_with_value_filter() {
        let data = json!({
            "dcql_query": {
                "credentials": [{
                    "id": "mdl",
                    "format": "mso_mdoc",
                    "meta": {"doctype_value": "org.iso.18013.5.1.mDL"},
                    "claims": [{
                        "id": "age",
                        "path": ["org.iso.18013.5.1", "age_over_21"],
                        "values": ["true"]
                    }]
                }]
            }
        });
        let query = parse(&data).unwrap();
        assert_eq!(query.credentials.len(), 1);
        let q = &query.credentials[0];
        assert_eq!(q.format, Format::MsoMdoc);
        assert_eq!(q.requested_claims[0].values, vec!["true".to_string()]);
    }

    #[test]
    fn intent_to_retain_and_required_are_independent_booleans() {
        let data = json!({
            "dcql_query": {
                "credentials": [{
                    "id": "mdl",
                    "format": "mso_mdoc",
                    "meta": {"doctype_value": "x"},
                    "claims": [{
                        "id": "a",
                        "path": ["ns", "elem"],
                        "intent_to_retain": true
                    }]
                }],
                "credential_sets": [{"required": false, "options": [["mdl"]]}]
            }
        });
        let query = parse(&data).unwrap();
        assert!(query.credentials[0].requested_claims[0].intent_to_retain);
        assert!(!query.credential_sets[0].required);
    }

    #[test]
    fn unsupported_format_is_dropped_not_fatal() {
        let data = json!({
            "dcql_query": {
                "credentials": [
                    {"id": "a", "format": "unknown_format", "meta": {}},
                    {"id": "b", "format": "dc+sd-jwt", "meta": {"vct_values": ["urn:eudi:pid:1"]}},
                ]
            }
        });
        let query = parse(&data).unwrap();
        assert_eq!(query.credentials.len(), 1);
        assert_eq!(query.credentials[0].id, "b");
    }

    #[test]
    fn numeric_values_stringify_as_integers() {
        let data = json!({
            "dcql_query": {
                "credentials": [{
                    "id": "a",
                    "format": "mso_mdoc",
                    "meta": {"doctype_value": "x"},
                    "claims": [{"id": "n", "path": ["ns", "count"], "values": [3.9]}]
                }]
            }
        });
        let query = parse(&data).unwrap();
        assert_eq!(query.credentials[0].requested_claims[0].values, vec!["3".to_string()]);
    }
}
