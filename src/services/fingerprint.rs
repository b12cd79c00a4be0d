//! Draft-key fingerprinting.
//!
//! A draft key is the sha256 of a canonical JSON record of the request:
//! document identity and version, sorted suggestion ids, and the edit set
//! sorted by id with each edit reduced to content hashes. Raw edit text is
//! never part of the key material, but any single-character change to an
//! edit's text changes the key.

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::domain::models::Edit;

/// Hex sha256 of a string.
pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Compute the cache key for a draft request.
///
/// Identical inputs yield identical keys regardless of array ordering in
/// the request.
pub fn draft_key(
    contract_id: &str,
    version_token: &str,
    suggestion_ids: &[String],
    edits: &[Edit],
) -> String {
    let mut sorted_suggestions = suggestion_ids.to_vec();
    sorted_suggestions.sort();
    sorted_suggestions.dedup();

    let mut entries: Vec<serde_json::Value> = edits
        .iter()
        .map(|edit| {
            json!({
                "id": edit.id,
                "clauseReference": edit.clause_reference,
                "changeType": edit.change_type.as_str(),
                "suggestedHash": sha256_hex(&edit.suggested_text),
                "originalHash": edit.original_text.as_deref().map(sha256_hex),
            })
        })
        .collect();
    entries.sort_by(|a, b| {
        let key = |v: &serde_json::Value| {
            (
                v["id"].as_str().unwrap_or_default().to_string(),
                v["suggestedHash"].as_str().unwrap_or_default().to_string(),
            )
        };
        key(a).cmp(&key(b))
    });

    let canonical = json!({
        "contractId": contract_id,
        "version": version_token,
        "suggestionIds": sorted_suggestions,
        "edits": entries,
    });

    sha256_hex(&canonical.to_string())
}
