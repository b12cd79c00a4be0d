//! Contract document read model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The target artifact of a draft computation.
///
/// Documents are read-only inputs: patching always produces a new plain
/// text / html pair, never a partial mutation of this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDocument {
    pub contract_id: String,
    pub plain_text: String,
    /// Structured markup, when extraction produced one.
    pub html: Option<String>,
    /// Reference to the downloadable structured package holding the
    /// authoritative HTML template.
    pub package_ref: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ContractDocument {
    /// Version token used as fingerprint material: a later upload of the
    /// same contract must produce different draft keys.
    pub fn version_token(&self) -> String {
        self.updated_at.to_rfc3339()
    }
}
