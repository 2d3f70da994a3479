//! In-memory credential database (C4).
//!
//! Built once from the CBOR bytes the host hands the matcher at load, and
//! read-only for the rest of the invocation (§3.1 invariant iv).

use std::collections::BTreeMap;

use ciborium::Value;

use crate::cbor;
use crate::error::CborError;

/// A single disclosable value: the human-renderable form and the canonical
/// form DCQL value-matching compares against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub display_name: String,
    pub value: String,
    pub match_value: String,
}

/// The ISO mdoc form of a credential, if present.
#[derive(Debug, Clone)]
pub struct MdocForm {
    pub document_id: String,
    pub doc_type: String,
    /// namespace -> data element name -> claim
    pub namespaces: BTreeMap<String, BTreeMap<String, Claim>>,
}

/// The SD-JWT-VC form of a credential, if present.
#[derive(Debug, Clone)]
pub struct SdJwtForm {
    pub document_id: String,
    pub vct: String,
    /// dot-joined claim path -> claim
    pub claims: BTreeMap<String, Claim>,
}

/// One wallet-held credential, display metadata plus zero-or-more wire forms.
///
/// Invariant: at least one of `mdoc` / `sdjwt` is `Some` (§3.1 invariant i).
/// When both are present they share `document_id` and their claim
/// dictionaries are merged into `claims`, keyed by qualified claim name
/// (`namespace.element` for mdoc, dot-path for SD-JWT).
#[derive(Debug, Clone)]
pub struct Credential {
    pub title: String,
    pub subtitle: String,
    pub bitmap: Vec<u8>,
    pub mdoc: Option<MdocForm>,
    pub sdjwt: Option<SdJwtForm>,
    pub claims: BTreeMap<String, Claim>,
}

impl Credential {
    /// The document identifier shared by both wire forms; the binding key
    /// for deduplication (§4.7).
    pub fn document_id(&self) -> &str {
        self.mdoc
            .as_ref()
            .map(|m| m.document_id.as_str())
            .or_else(|| self.sdjwt.as_ref().map(|s| s.document_id.as_str()))
            .expect("credential has neither mdoc nor sdjwt form")
    }

    pub fn mdoc_doc_type(&self) -> Option<&str> {
        self.mdoc.as_ref().map(|m| m.doc_type.as_str())
    }

    pub fn vc_vct(&self) -> Option<&str> {
        self.sdjwt.as_ref().map(|s| s.vct.as_str())
    }
}

/// Protocols the wallet has opted in to, plus the credentials available to
/// satisfy requests against them (§3.1).
#[derive(Debug, Clone)]
pub struct Database {
    pub protocols: Vec<String>,
    pub credentials: Vec<Credential>,
}

impl Database {
    pub fn supports_protocol(&self, protocol: &str) -> bool {
        self.protocols.iter().any(|p| p == protocol)
    }
}

/// Decode the top-level credential database from its CBOR bytes.
pub fn load(bytes: &[u8]) -> Result<Database, CborError> {
    let root = cbor::decode(bytes)?;
    build_database(&root)
}

fn build_database(root: &Value) -> Result<Database, CborError> {
    let protocols = cbor::array_or_default(root, "protocols")
        .iter()
        .filter_map(Value::as_text)
        .map(str::to_owned)
        .collect();

    let credentials = cbor::array_or_default(root, "credentials")
        .iter()
        .map(build_credential)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Database {
        protocols,
        credentials,
    })
}

fn build_credential(value: &Value) -> Result<Credential, CborError> {
    let title = cbor::text_or_default(value, "title");
    let subtitle = cbor::text_or_default(value, "subtitle");
    let bitmap = cbor::bytes_or_default(value, "bitmap");

    let mdoc = cbor::map_get(value, "mdoc").map(build_mdoc_form).transpose()?;
    let sdjwt = cbor::map_get(value, "sdjwt").map(build_sdjwt_form).transpose()?;

    let mut claims = BTreeMap::new();
    if let Some(form) = &mdoc {
        for (namespace, elements) in &form.namespaces {
            for (name, claim) in elements {
                claims.insert(format!("{namespace}.{name}"), claim.clone());
            }
        }
    }
    if let Some(form) = &sdjwt {
        for (path, claim) in &form.claims {
            claims.insert(path.clone(), claim.clone());
        }
    }

    Ok(Credential {
        title,
        subtitle,
        bitmap,
        mdoc,
        sdjwt,
        claims,
    })
}

fn build_mdoc_form(value: &Value) -> Result<MdocForm, CborError> {
    let document_id = cbor::require_text(value, "documentId")?;
    let doc_type = cbor::require_text(value, "docType")?;

    let mut namespaces = BTreeMap::new();
    if let Some(entries) = cbor::map_or_none(value, "namespaces") {
        for (namespace_key, namespace_value) in entries {
            let namespace = namespace_key
                .as_text()
                .ok_or(CborError::UnexpectedType { expected: "text" })?
                .to_owned();
            let mut elements = BTreeMap::new();
            if let Some(element_entries) = namespace_value.as_map() {
                for (name_key, triple) in element_entries {
                    let name = name_key
                        .as_text()
                        .ok_or(CborError::UnexpectedType { expected: "text" })?
                        .to_owned();
                    let (display_name, claim_value, match_value) = cbor::display_triple(triple)?;
                    elements.insert(
                        name,
                        Claim {
                            display_name,
                            value: claim_value,
                            match_value,
                        },
                    );
                }
            }
            namespaces.insert(namespace, elements);
        }
    }

    Ok(MdocForm {
        document_id,
        doc_type,
        namespaces,
    })
}

fn build_sdjwt_form(value: &Value) -> Result<SdJwtForm, CborError> {
    let document_id = cbor::require_text(value, "documentId")?;
    let vct = cbor::require_text(value, "vct")?;

    let mut claims = BTreeMap::new();
    if let Some(entries) = cbor::map_or_none(value, "claims") {
        for (name_key, triple) in entries {
            let name = name_key
                .as_text()
                .ok_or(CborError::UnexpectedType { expected: "text" })?
                .to_owned();
            let (display_name, claim_value, match_value) = cbor::display_triple(triple)?;
            claims.insert(
                name,
                Claim {
                    display_name,
                    value: claim_value,
                    match_value,
                },
            );
        }
    }

    Ok(SdJwtForm {
        document_id,
        vct,
        claims,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build a credential with a single mdoc namespace/element claim,
    /// convenient for scenario tests that only need one field.
    pub fn mdoc_credential(
        document_id: &str,
        doc_type: &str,
        namespace: &str,
        claims: &[(&str, &str, &str, &str)],
    ) -> Credential {
        let mut elements = BTreeMap::new();
        for (name, display_name, value, match_value) in claims {
            elements.insert(
                name.to_string(),
                Claim {
                    display_name: display_name.to_string(),
                    value: value.to_string(),
                    match_value: match_value.to_string(),
                },
            );
        }
        let mut namespaces = BTreeMap::new();
        namespaces.insert(namespace.to_string(), elements.clone());
        let mut flat = BTreeMap::new();
        for (name, claim) in &elements {
            flat.insert(format!("{namespace}.{name}"), claim.clone());
        }
        Credential {
            title: "Mobile Driver's License".into(),
            subtitle: "Issued by Example DMV".into(),
            bitmap: vec![],
            mdoc: Some(MdocForm {
                document_id: document_id.to_string(),
                doc_type: doc_type.to_string(),
                namespaces,
            }),
            sdjwt: None,
            claims: flat,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_db_bytes() -> Vec<u8> {
        let root = Value::Map(vec![
            (
                Value::Text("protocols".into()),
                Value::Array(vec![Value::Text("preview".into())]),
            ),
            (
                Value::Text("credentials".into()),
                Value::Array(vec![Value::Map(vec![
                    (Value::Text("title".into()), Value::Text("mDL".into())),
                    (Value::Text("subtitle".into()), Value::Text("DMV".into())),
                    (Value::Text("bitmap".into()), Value::Bytes(vec![])),
                    (
                        Value::Text("mdoc".into()),
                        Value::Map(vec![
                            (
                                Value::Text("documentId".into()),
                                Value::Text("doc-1".into()),
                            ),
                            (
                                Value::Text("docType".into()),
                                Value::Text("org.iso.18013.5.1.mDL".into()),
                            ),
                            (
                                Value::Text("namespaces".into()),
                                Value::Map(vec![(
                                    Value::Text("org.iso.18013.5.1".into()),
                                    Value::Map(vec![(
                                        Value::Text("age_over_21".into()),
                                        Value::Array(vec![
                                            Value::Text("Age 21+".into()),
                                            Value::Text("true".into()),
                                            Value::Text("true".into()),
                                        ]),
                                    )]),
                                )]),
                            ),
                        ]),
                    ),
                ])]),
            ),
        ]);
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&root, &mut bytes).unwrap();
        bytes
    }

    #[test]
    fn loads_database_with_mdoc_form() {
        let db = load(&sample_db_bytes()).unwrap();
        assert_eq!(db.protocols, vec!["preview".to_string()]);
        assert_eq!(db.credentials.len(), 1);
        let cred = &db.credentials[0];
        assert_eq!(cred.document_id(), "doc-1");
        assert_eq!(cred.mdoc_doc_type(), Some("org.iso.18013.5.1.mDL"));
        assert_eq!(
            cred.claims.get("org.iso.18013.5.1.age_over_21").unwrap().match_value,
            "true"
        );
    }

    #[test]
    fn empty_credentials_yields_empty_database() {
        let root = Value::Map(vec![
            (
                Value::Text("protocols".into()),
                Value::Array(vec![Value::Text("preview".into())]),
            ),
            (Value::Text("credentials".into()), Value::Array(vec![])),
        ]);
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&root, &mut bytes).unwrap();
        let db = load(&bytes).unwrap();
        assert!(db.credentials.is_empty());
    }
}
