//! The DCQL engine (C6): §4.4 of the spec.
//!
//! `evaluate` takes a normalized [`DcqlQuery`] and the credential
//! [`Database`] and produces a [`Response`] tree, or `None` if the query
//! cannot be satisfied at all. The response tree holds indices into the
//! database and claim keys rather than owned/shared handles — it is a
//! strictly-nested view over the database's lifetime, never outliving it.

mod combination;

pub use combination::{explode, Combination, CombinationElement};

use std::collections::HashMap;

use crate::credential::{Credential, Database};

/// The credential formats the engine understands (§3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    MsoMdoc,
    MsoMdocZk,
    DcSdJwt,
}

/// One claim a `CredentialQuery` asks to see.
#[derive(Debug, Clone)]
pub struct RequestedClaim {
    pub id: String,
    pub values: Vec<String>,
    pub path: Vec<String>,
    pub intent_to_retain: bool,
}

impl RequestedClaim {
    /// The dot-joined form of `path`, used as the key into a credential's
    /// claim dictionary.
    pub fn key(&self) -> String {
        self.path.join(".")
    }
}

/// An ordered set of claim identifiers; the first set that fully resolves
/// against a candidate credential wins (§4.4.2, tie-break rule).
#[derive(Debug, Clone)]
pub struct ClaimSet {
    pub claim_identifiers: Vec<String>,
}

/// A single credential query: what format, what identity, what claims.
#[derive(Debug, Clone)]
pub struct CredentialQuery {
    pub id: String,
    pub format: Format,
    pub mdoc_doc_type: Option<String>,
    pub vct_values: Vec<String>,
    pub requested_claims: Vec<RequestedClaim>,
    pub claim_sets: Vec<ClaimSet>,
}

/// One alternative in a `CredentialSetQuery`: a set of credential query ids
/// that together would satisfy this requirement.
#[derive(Debug, Clone)]
pub struct CredentialSetOptionQuery {
    pub credential_ids: Vec<String>,
}

/// A requirement over one or more `CredentialQuery`s, with required/optional
/// semantics (§3.3, §4.4.3).
#[derive(Debug, Clone)]
pub struct CredentialSetQuery {
    pub required: bool,
    pub options: Vec<CredentialSetOptionQuery>,
}

/// A normalized DCQL query: the subset described in §4.4.
#[derive(Debug, Clone, Default)]
pub struct DcqlQuery {
    pub credentials: Vec<CredentialQuery>,
    pub credential_sets: Vec<CredentialSetQuery>,
}

/// A credential that satisfied one `CredentialQuery`, identified by its
/// index into `Database::credentials`, carrying the keys of the claims it
/// resolved (in query order).
#[derive(Debug, Clone)]
pub struct Match {
    pub credential_index: usize,
    pub claim_keys: Vec<String>,
}

/// One slot in a `CredentialSetOption`, corresponding to one `CredentialQuery`.
#[derive(Debug, Clone)]
pub struct Member {
    pub matches: Vec<Match>,
}

/// One viable way of satisfying a `CredentialSet`.
#[derive(Debug, Clone)]
pub struct CredentialSetOption {
    pub members: Vec<Member>,
}

/// The resolution of one `CredentialSetQuery` (or, in implicit mode, one
/// bare `CredentialQuery`).
#[derive(Debug, Clone)]
pub struct CredentialSet {
    pub optional: bool,
    pub options: Vec<CredentialSetOption>,
}

/// The full result of evaluating a DCQL query against the database.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub credential_sets: Vec<CredentialSet>,
}

/// Evaluate `query` against `db`, returning `None` if the query cannot be
/// satisfied at all (§4.4.3: an unmatched mandatory `CredentialQuery`, or a
/// required `CredentialSetQuery` with no satisfied option, fails the whole
/// request).
pub fn evaluate(query: &DcqlQuery, db: &Database) -> Option<Response> {
    let mut responses: HashMap<&str, Vec<Match>> = HashMap::new();
    for q in &query.credentials {
        let matches = resolve_credential_query(q, db);
        responses.insert(q.id.as_str(), matches);
    }

    let credential_sets = if query.credential_sets.is_empty() {
        resolve_implicit(query, &responses)?
    } else {
        resolve_explicit(query, &responses)?
    };

    let credential_sets = credential_sets.into_iter().map(consolidate).collect();

    Some(Response { credential_sets })
}

/// §4.4.1 meta-filter + §4.4.2 per-credential claim resolution for one
/// `CredentialQuery`.
fn resolve_credential_query(q: &CredentialQuery, db: &Database) -> Vec<Match> {
    db.credentials
        .iter()
        .enumerate()
        .filter(|(_, cred)| meta_filter(q, cred))
        .filter_map(|(index, cred)| {
            resolve_claims(q, cred).map(|claim_keys| Match {
                credential_index: index,
                claim_keys,
            })
        })
        .collect()
}

fn meta_filter(q: &CredentialQuery, cred: &Credential) -> bool {
    match q.format {
        Format::MsoMdoc | Format::MsoMdocZk => {
            q.mdoc_doc_type.as_deref().is_some_and(|wanted| cred.mdoc_doc_type() == Some(wanted))
        }
        Format::DcSdJwt => cred
            .vc_vct()
            .is_some_and(|vct| q.vct_values.iter().any(|v| v == vct)),
    }
}

/// Resolve one requested claim against a credential's claim dictionary,
/// applying the value filter when present (§4.4.2, I4).
fn resolve_one(claim: &RequestedClaim, cred: &Credential) -> Option<String> {
    let key = claim.key();
    let value = cred.claims.get(&key)?;
    if !claim.values.is_empty() && !claim.values.iter().any(|v| v == &value.match_value) {
        return None;
    }
    Some(key)
}

fn resolve_claims(q: &CredentialQuery, cred: &Credential) -> Option<Vec<String>> {
    if q.claim_sets.is_empty() {
        q.requested_claims
            .iter()
            .map(|claim| resolve_one(claim, cred))
            .collect()
    } else {
        q.claim_sets.iter().find_map(|set| {
            set.claim_identifiers
                .iter()
                .map(|id| {
                    let claim = q.requested_claims.iter().find(|c| &c.id == id)?;
                    resolve_one(claim, cred)
                })
                .collect()
        })
    }
}

/// §4.4.3, implicit case: no `credentialSets` declared. Every
/// `CredentialQuery` must have at least one match.
fn resolve_implicit(
    query: &DcqlQuery,
    responses: &HashMap<&str, Vec<Match>>,
) -> Option<Vec<CredentialSet>> {
    let mut sets = Vec::with_capacity(query.credentials.len());
    for q in &query.credentials {
        let matches = responses.get(q.id.as_str())?;
        if matches.is_empty() {
            return None;
        }
        sets.push(CredentialSet {
            optional: false,
            options: vec![CredentialSetOption {
                members: vec![Member {
                    matches: matches.clone(),
                }],
            }],
        });
    }
    Some(sets)
}

/// §4.4.3, explicit case: one or more `CredentialSetQuery`s declared.
fn resolve_explicit(
    query: &DcqlQuery,
    responses: &HashMap<&str, Vec<Match>>,
) -> Option<Vec<CredentialSet>> {
    let mut sets = Vec::with_capacity(query.credential_sets.len());
    for csq in &query.credential_sets {
        let satisfied_options: Vec<CredentialSetOption> = csq
            .options
            .iter()
            .filter(|option| {
                option.credential_ids.iter().all(|id| {
                    responses
                        .get(id.as_str())
                        .is_some_and(|matches| !matches.is_empty())
                })
            })
            .map(|option| CredentialSetOption {
                members: option
                    .credential_ids
                    .iter()
                    .map(|id| Member {
                        matches: responses.get(id.as_str()).cloned().unwrap_or_default(),
                    })
                    .collect(),
            })
            .collect();

        if csq.required && satisfied_options.is_empty() {
            return None;
        }

        sets.push(CredentialSet {
            optional: !csq.required,
            options: satisfied_options,
        });
    }
    Some(sets)
}

/// §4.4.4 consolidation: single-member options are flattened into one
/// synthetic option at the head of the list; a no-op below two such options.
fn consolidate(set: CredentialSet) -> CredentialSet {
    let (single, multi): (Vec<_>, Vec<_>) = set
        .options
        .into_iter()
        .partition(|option| option.members.len() == 1);

    if single.len() < 2 {
        let mut options = single;
        options.extend(multi);
        return CredentialSet {
            optional: set.optional,
            options,
        };
    }

    let merged_matches: Vec<Match> = single
        .into_iter()
        .flat_map(|option| option.members.into_iter().flat_map(|m| m.matches))
        .collect();

    let mut options = vec![CredentialSetOption {
        members: vec![Member {
            matches: merged_matches,
        }],
    }];
    options.extend(multi);

    CredentialSet {
        optional: set.optional,
        options,
    }
}
