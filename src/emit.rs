//! Emission pass (C7): §4.5, §4.7.
//!
//! Applies host-capability negotiation (flat v1 vs. set-and-field v2),
//! and enforces first-requested/first-served document-id deduplication
//! scoped to the whole invocation.

use std::collections::HashSet;

use crate::abi::PickerHost;
use crate::credential::Database;
use crate::dcql::Combination;

/// The v1/v2 emission-dialect policy, made explicit per §9's note rather
/// than left as an implicit branch on the capability version. Currently
/// fully determined by the version, but expressed as a value so a future
/// capability version could vary independently of the version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmissionPolicy {
    /// v1: only the first element's first match is surfaced per combination.
    pub first_match_only: bool,
}

impl EmissionPolicy {
    pub fn for_version(version: u32) -> Self {
        Self {
            first_match_only: version < 2,
        }
    }
}

/// Emit every combination produced for one request, gated by `policy` and
/// `used_document_ids` (the invocation-scoped dedup set, §4.7).
pub fn emit<H: PickerHost>(
    host: &mut H,
    policy: EmissionPolicy,
    protocol: &str,
    db: &Database,
    combinations: &[Combination],
    used_document_ids: &mut HashSet<String>,
) {
    if policy.first_match_only {
        emit_flat(host, protocol, db, combinations, used_document_ids);
    } else {
        emit_sets(host, protocol, db, combinations, used_document_ids);
    }
}

fn icon_of(db_bitmap: &[u8]) -> Option<&[u8]> {
    if db_bitmap.is_empty() {
        None
    } else {
        Some(db_bitmap)
    }
}

fn emit_flat<H: PickerHost>(
    host: &mut H,
    protocol: &str,
    db: &Database,
    combinations: &[Combination],
    used_document_ids: &mut HashSet<String>,
) {
    for combination in combinations {
        let Some(first_element) = combination.elements.first() else {
            continue;
        };
        let Some(first_match) = first_element.matches.first() else {
            continue;
        };
        let credential = &db.credentials[first_match.credential_index];
        let document_id = credential.document_id().to_string();
        if used_document_ids.contains(&document_id) {
            continue;
        }

        let entry_id = format!("{} {} {}", combination.combination_number, protocol, document_id);
        host.add_string_id_entry(
            &entry_id,
            icon_of(&credential.bitmap),
            &credential.title,
            &credential.subtitle,
            None,
            None,
        );
        for key in &first_match.claim_keys {
            if let Some(claim) = credential.claims.get(key) {
                host.add_field_for_string_id_entry(&entry_id, &claim.display_name, &claim.value);
            }
        }

        used_document_ids.insert(document_id);
    }
}

fn emit_sets<H: PickerHost>(
    host: &mut H,
    protocol: &str,
    db: &Database,
    combinations: &[Combination],
    used_document_ids: &mut HashSet<String>,
) {
    for combination in combinations {
        let set_id = format!("{} {}", combination.combination_number, protocol);

        let entries: Vec<_> = combination
            .elements
            .iter()
            .flat_map(|element| element.matches.iter())
            .filter_map(|m| {
                let credential = &db.credentials[m.credential_index];
                let document_id = credential.document_id().to_string();
                if used_document_ids.contains(&document_id) {
                    return None;
                }
                used_document_ids.insert(document_id.clone());
                Some((credential, document_id, m))
            })
            .collect();

        if entries.is_empty() {
            continue;
        }

        host.add_entry_set(&set_id, entries.len() as u32);

        for (set_index, (credential, document_id, m)) in entries.into_iter().enumerate() {
            let entry_id = format!("{} {} {}", combination.combination_number, protocol, document_id);
            host.add_entry_to_set(
                &entry_id,
                icon_of(&credential.bitmap),
                &credential.title,
                &credential.subtitle,
                None,
                None,
                None,
                &set_id,
                set_index as u32,
            );
            for key in &m.claim_keys {
                if let Some(claim) = credential.claims.get(key) {
                    host.add_field_to_entry_set(&entry_id, &claim.display_name, &claim.value, &set_id, set_index as u32);
                }
            }
        }
    }
}
