//! `org.iso.mdoc` / `org-iso-mdoc` / `austroads-request-forwarding-v2`
//! (ISO 18013-7 Annex C mdoc-API, ARFv2) parsing.
//!
//! Only the first `docRequests` entry is considered (§4.3, §9's noted
//! ambiguity: multi-doc mdoc requests are silently truncated).

use base64::Engine;
use ciborium::Value as Cbor;
use serde_json::Value;

use crate::cbor;
use crate::dcql::DcqlQuery;
use crate::error::RequestParseError;

pub fn parse(data: &Value) -> Result<DcqlQuery, RequestParseError> {
    let device_request_b64 = data
        .get("deviceRequest")
        .and_then(Value::as_str)
        .ok_or(RequestParseError::MissingField("deviceRequest"))?;

    let device_request_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(device_request_b64)
        .map_err(|_| {
            RequestParseError::InvalidDeviceRequest("deviceRequest is not valid base64url".into())
        })?;

    let device_request = cbor::decode(&device_request_bytes)?;

    let doc_requests = cbor::array_or_default(&device_request, "docRequests");
    let first = doc_requests
        .first()
        .ok_or_else(|| RequestParseError::InvalidDeviceRequest("no docRequests".into()))?;

    let items_request_tagged = cbor::map_get(first, "itemsRequest")
        .ok_or(RequestParseError::MissingField("itemsRequest"))?;
    let items_request = read_tagged_items_request(items_request_tagged)?;

    let doc_type = cbor::require_text(&items_request, "docType")?;

    let mut fields = Vec::new();
    if let Some(namespaces) = cbor::map_or_none(&items_request, "nameSpaces") {
        for (namespace_key, elements) in namespaces {
            let namespace = namespace_key
                .as_text()
                .ok_or(crate::error::CborError::UnexpectedType { expected: "text" })?
                .to_owned();
            if let Some(entries) = elements.as_map() {
                for (name_key, intent_to_retain) in entries {
                    let name = name_key
                        .as_text()
                        .ok_or(crate::error::CborError::UnexpectedType { expected: "text" })?
                        .to_owned();
                    let retain = intent_to_retain.as_bool().unwrap_or(false);
                    fields.push((namespace.clone(), name, retain));
                }
            }
        }
    }

    Ok(super::single_mdoc_query(doc_type, fields))
}

/// `itemsRequest` is CBOR tag 24 ("encoded CBOR data item") wrapping a byte
/// string that must itself be decoded as CBOR.
fn read_tagged_items_request(value: &Cbor) -> Result<Cbor, RequestParseError> {
    match cbor::untag(value) {
        Cbor::Bytes(inner) => Ok(cbor::decode(inner)?),
        map @ Cbor::Map(_) => Ok(map.clone()),
        _ => Err(RequestParseError::InvalidDeviceRequest(
            "itemsRequest is neither tagged bytes nor a map".into(),
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn sample_device_request_bytes() -> Vec<u8> {
        let items_request = Cbor::Map(vec![
            (
                Cbor::Text("docType".into()),
                Cbor::Text("org.iso.18013.5.1.mDL".into()),
            ),
            (
                Cbor::Text("nameSpaces".into()),
                Cbor::Map(vec![(
                    Cbor::Text("org.iso.18013.5.1".into()),
                    Cbor::Map(vec![(Cbor::Text("age_over_21".into()), Cbor::Bool(false))]),
                )]),
            ),
        ]);
        let mut items_request_bytes = Vec::new();
        ciborium::ser::into_writer(&items_request, &mut items_request_bytes).unwrap();

        let doc_request = Cbor::Map(vec![(
            Cbor::Text("itemsRequest".into()),
            Cbor::Tag(24, Box::new(Cbor::Bytes(items_request_bytes))),
        )]);
        let device_request = Cbor::Map(vec![(
            Cbor::Text("docRequests".into()),
            Cbor::Array(vec![doc_request]),
        )]);
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&device_request, &mut bytes).unwrap();
        bytes
    }

    #[test]
    fn decodes_first_doc_request_into_degenerate_query() {
        let device_request_bytes = sample_device_request_bytes();
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(device_request_bytes);
        let data = json!({"deviceRequest": encoded});
        let query = parse(&data).unwrap();
        assert_eq!(query.credentials.len(), 1);
        let q = &query.credentials[0];
        assert_eq!(q.mdoc_doc_type.as_deref(), Some("org.iso.18013.5.1.mDL"));
        assert_eq!(q.requested_claims.len(), 1);
        assert_eq!(q.requested_claims[0].path, vec!["org.iso.18013.5.1", "age_over_21"]);
    }

    #[test]
    fn truncates_to_first_doc_request() {
        let items_request = Cbor::Map(vec![
            (Cbor::Text("docType".into()), Cbor::Text("a".into())),
            (Cbor::Text("nameSpaces".into()), Cbor::Map(vec![])),
        ]);
        let mut items_request_bytes = Vec::new();
        ciborium::ser::into_writer(&items_request, &mut items_request_bytes).unwrap();
        let doc_request_a = Cbor::Map(vec![(
            Cbor::Text("itemsRequest".into()),
            Cbor::Tag(24, Box::new(Cbor::Bytes(items_request_bytes.clone()))),
        )]);

        let items_request_b = Cbor::Map(vec![
            (Cbor::Text("docType".into()), Cbor::Text("b".into())),
            (Cbor::Text("nameSpaces".into()), Cbor::Map(vec![])),
        ]);
        let mut items_request_b_bytes = Vec::new();
        ciborium::ser::into_writer(&items_request_b, &mut items_request_b_bytes).unwrap();
        let doc_request_b = Cbor::Map(vec![(
            Cbor::Text("itemsRequest".into()),
            Cbor::Tag(24, Box::new(Cbor::Bytes(items_request_b_bytes))),
        )]);

        let device_request = Cbor::Map(vec![(
            Cbor::Text("docRequests".into()),
            Cbor::Array(vec![doc_request_a, doc_request_b]),
        )]);
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&device_request, &mut bytes).unwrap();
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
        let data = json!({"deviceRequest": encoded});
        let query = parse(&data).unwrap();
        assert_eq!(query.credentials[0].mdoc_doc_type.as_deref(), Some("a"));
    }
}
