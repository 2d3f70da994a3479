//! Sandboxed Wasm credential matcher (C8 entry point): §4.6.
//!
//! Orchestrates C1 (host ABI) → C2/C3 (CBOR/JSON decode) → C4/C5
//! (credential model, request parsers) → C6 (DCQL engine) → C7 (emission).

pub mod abi;
pub mod cbor;
pub mod credential;
pub mod dcql;
pub mod emit;
pub mod error;
pub mod json;
pub mod request;

use std::collections::HashSet;

use abi::PickerHost;
use credential::Database;
use emit::EmissionPolicy;
use error::MatcherError;

/// Run the full matcher pipeline against already-read request/credential
/// bytes and a known capability version, driving `host` for emission.
///
/// This is the pure, host-agnostic core: [`run_wasm`] is the only caller in
/// a real Wasm build, and tests call this directly with a mock
/// [`PickerHost`].
pub fn run<H: PickerHost>(
    credentials_bytes: &[u8],
    request_bytes: &[u8],
    wasm_version: u32,
    host: &mut H,
) -> Result<(), MatcherError> {
    let database = credential::load(credentials_bytes)?;
    let envelope = json::parse_envelope(request_bytes)?;

    let policy = EmissionPolicy::for_version(wasm_version);
    let mut used_document_ids: HashSet<String> = HashSet::new();

    for entry in &envelope.requests {
        process_entry(entry, &database, policy, host, &mut used_document_ids);
    }

    Ok(())
}

/// Process one request-envelope entry. Every failure here is logged and the
/// entry dropped; only the two fatal paths handled in [`run`] abort the
/// whole invocation (§4.8).
fn process_entry<H: PickerHost>(
    entry: &json::RequestEntry,
    database: &Database,
    policy: EmissionPolicy,
    host: &mut H,
    used_document_ids: &mut HashSet<String>,
) {
    let Some(payload) = json::resolve_payload(&entry.data) else {
        log::warn!("dropping request with unresolvable payload for protocol `{}`", entry.protocol);
        return;
    };

    let query = match request::parse(&entry.protocol, &payload) {
        Ok(query) => query,
        Err(e) => {
            log::warn!("dropping request for protocol `{}`: {e}", entry.protocol);
            return;
        }
    };

    if !database.supports_protocol(&entry.protocol) {
        log::debug!("dropping request for protocol `{}` not opted into by the database", entry.protocol);
        return;
    }

    let Some(response) = dcql::evaluate(&query, database) else {
        log::debug!("request for protocol `{}` has no satisfying response", entry.protocol);
        return;
    };

    let combinations = dcql::explode(&response);
    emit::emit(host, policy, &entry.protocol, database, &combinations, used_document_ids);
}

#[cfg(target_arch = "wasm32")]
mod wasm_entry {
    use super::*;
    use abi::WasmPickerHost;

    /// The Wasm entry point the host invokes once per matcher run (§6.1).
    #[no_mangle]
    pub extern "C" fn matcher_run() {
        let _calling_app = abi::calling_app_info();
        let credentials_bytes = abi::read_credentials_bytes();
        let request_bytes = abi::read_request_bytes();
        let wasm_version = abi::wasm_version();

        let mut host = WasmPickerHost::new();
        if let Err(e) = run(&credentials_bytes, &request_bytes, wasm_version, &mut host) {
            log::error!("matcher run failed: {e}");
        }
    }
}
