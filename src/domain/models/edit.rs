//! Canonical edit model and boundary normalization.
//!
//! Incoming payloads are loosely shaped: agent edits and suggestion-embedded
//! edits use several field-name variants for the "original" and "updated"
//! text. All of them are normalized into the single [`Edit`] discriminated
//! union at the boundary; nothing downstream ever inspects raw payloads.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The kind of change an edit proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Modify,
    Insert,
    Remove,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Modify => "modify",
            ChangeType::Insert => "insert",
            ChangeType::Remove => "remove",
        }
    }
}

/// A single proposed change to a contract.
///
/// Edits are immutable once constructed: they are pure input data and are
/// never mutated during patching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub id: String,
    pub clause_reference: Option<String>,
    pub change_type: ChangeType,
    /// Required for modify/remove; absent for pure insertions.
    pub original_text: Option<String>,
    /// Required for modify/insert; empty for removals.
    pub suggested_text: String,
    pub rationale: Option<String>,
    pub severity: Option<String>,
}

/// Raw edit payload as received from the API or the generative backend.
///
/// Accepts every field-name variant observed in the wild via serde aliases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEdit {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default, alias = "clauseRef", alias = "reference")]
    pub clause_reference: Option<String>,

    #[serde(default, alias = "type", alias = "action")]
    pub change_type: Option<String>,

    #[serde(default, alias = "previousText", alias = "anchorText")]
    pub original_text: Option<String>,

    #[serde(default, alias = "updatedText", alias = "proposedText")]
    pub suggested_text: Option<String>,

    #[serde(default, alias = "reason")]
    pub rationale: Option<String>,

    #[serde(default)]
    pub severity: Option<String>,
}

/// Raw suggestion payload: a higher-level recommendation that may carry an
/// embedded proposed edit, or the edit fields inline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSuggestion {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default, alias = "edit", alias = "suggestedEdit")]
    pub proposed_edit: Option<RawEdit>,

    #[serde(flatten)]
    pub inline: RawEdit,
}

impl RawSuggestion {
    /// The raw edit this suggestion contributes, if any.
    fn effective_edit(&self) -> Option<RawEdit> {
        if let Some(embedded) = &self.proposed_edit {
            if embedded.suggested_text.is_some() || embedded.original_text.is_some() {
                let mut edit = embedded.clone();
                if non_empty(edit.id.as_ref()).is_none() {
                    edit.id = self.id.clone();
                }
                return Some(edit);
            }
        }
        if self.inline.suggested_text.is_some() || self.inline.original_text.is_some() {
            let mut edit = self.inline.clone();
            if non_empty(edit.id.as_ref()).is_none() {
                edit.id = self.id.clone();
            }
            return Some(edit);
        }
        None
    }
}

fn parse_change_type(raw: &str) -> Option<ChangeType> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "modify" | "replace" | "update" | "change" => Some(ChangeType::Modify),
        "insert" | "add" | "append" => Some(ChangeType::Insert),
        "remove" | "delete" | "strike" => Some(ChangeType::Remove),
        _ => None,
    }
}

fn non_empty(text: Option<&String>) -> Option<String> {
    text.map(|t| t.trim()).filter(|t| !t.is_empty()).map(str::to_string)
}

/// Stable id for edits that arrive without one, derived from content so
/// identical requests keep identical fingerprints.
fn derived_id(original: Option<&str>, suggested: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(original.unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    hasher.update(suggested.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
    format!("edit-{hex}")
}

/// Normalize a single raw edit into a canonical [`Edit`].
///
/// Returns `None` for entries with no usable content: a non-removal without
/// suggested text is discarded, a removal without original text is discarded.
pub fn normalize_edit(raw: &RawEdit) -> Option<Edit> {
    let original = non_empty(raw.original_text.as_ref());
    let suggested = non_empty(raw.suggested_text.as_ref());

    let declared = raw.change_type.as_deref().and_then(parse_change_type);
    let change_type = match declared {
        Some(ct) => ct,
        None => match (&original, &suggested) {
            (Some(_), Some(_)) => ChangeType::Modify,
            (None, Some(_)) => ChangeType::Insert,
            (Some(_), None) => ChangeType::Remove,
            (None, None) => return None,
        },
    };

    let (change_type, original, suggested) = match change_type {
        ChangeType::Modify => match (original, suggested) {
            (Some(o), Some(s)) => (ChangeType::Modify, Some(o), s),
            // A modify with no locatable original can still land as an insert.
            (None, Some(s)) => (ChangeType::Insert, None, s),
            _ => return None,
        },
        ChangeType::Insert => match suggested {
            Some(s) => (ChangeType::Insert, original, s),
            None => return None,
        },
        ChangeType::Remove => match original {
            Some(o) => (ChangeType::Remove, Some(o), suggested.unwrap_or_default()),
            None => return None,
        },
    };

    let id = non_empty(raw.id.as_ref())
        .unwrap_or_else(|| derived_id(original.as_deref(), &suggested));

    Some(Edit {
        id,
        clause_reference: non_empty(raw.clause_reference.as_ref()),
        change_type,
        original_text: original,
        suggested_text: suggested,
        rationale: non_empty(raw.rationale.as_ref()),
        severity: non_empty(raw.severity.as_ref()),
    })
}

/// Normalize suggestion and agent-edit payloads into a deduplicated edit set.
///
/// Explicit agent edits win over suggestion-derived edits that target the
/// same id.
pub fn normalize_edit_set(suggestions: &[RawSuggestion], agent_edits: &[RawEdit]) -> Vec<Edit> {
    let mut edits: Vec<Edit> = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    for raw in agent_edits {
        if let Some(edit) = normalize_edit(raw) {
            if seen.insert(edit.id.clone()) {
                edits.push(edit);
            }
        }
    }

    for suggestion in suggestions {
        if let Some(raw) = suggestion.effective_edit() {
            if let Some(edit) = normalize_edit(&raw) {
                if seen.insert(edit.id.clone()) {
                    edits.push(edit);
                }
            }
        }
    }

    edits
}

/// Suggestion ids that survive normalization, used as fingerprint material.
pub fn suggestion_ids(suggestions: &[RawSuggestion]) -> Vec<String> {
    suggestions
        .iter()
        .filter_map(|s| non_empty(s.id.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, original: Option<&str>, suggested: Option<&str>) -> RawEdit {
        RawEdit {
            id: Some(id.to_string()),
            original_text: original.map(str::to_string),
            suggested_text: suggested.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_field_name_variants_parse() {
        let json = r#"{"id":"e1","previousText":"old words","proposedText":"new words"}"#;
        let raw: RawEdit = serde_json::from_str(json).unwrap();
        assert_eq!(raw.original_text.as_deref(), Some("old words"));
        assert_eq!(raw.suggested_text.as_deref(), Some("new words"));

        let json = r#"{"anchorText":"anchor","updatedText":"updated"}"#;
        let raw: RawEdit = serde_json::from_str(json).unwrap();
        assert_eq!(raw.original_text.as_deref(), Some("anchor"));
        assert_eq!(raw.suggested_text.as_deref(), Some("updated"));
    }

    #[test]
    fn test_change_type_inferred_from_texts() {
        let edit = normalize_edit(&raw("e1", Some("a"), Some("b"))).unwrap();
        assert_eq!(edit.change_type, ChangeType::Modify);

        let edit = normalize_edit(&raw("e2", None, Some("b"))).unwrap();
        assert_eq!(edit.change_type, ChangeType::Insert);

        let edit = normalize_edit(&raw("e3", Some("a"), None)).unwrap();
        assert_eq!(edit.change_type, ChangeType::Remove);
    }

    #[test]
    fn test_modify_without_original_becomes_insert() {
        let mut entry = raw("e1", None, Some("new clause"));
        entry.change_type = Some("modify".to_string());
        let edit = normalize_edit(&entry).unwrap();
        assert_eq!(edit.change_type, ChangeType::Insert);
    }

    #[test]
    fn test_empty_entries_discarded() {
        assert!(normalize_edit(&raw("e1", None, None)).is_none());
        assert!(normalize_edit(&raw("e2", None, Some("   "))).is_none());

        let mut removal = raw("e3", None, None);
        removal.change_type = Some("remove".to_string());
        assert!(normalize_edit(&removal).is_none());
    }

    #[test]
    fn test_explicit_edit_wins_over_suggestion() {
        let agent = vec![raw("shared", Some("orig"), Some("from agent"))];
        let suggestion = RawSuggestion {
            id: Some("shared".to_string()),
            inline: raw("shared", Some("orig"), Some("from suggestion")),
            proposed_edit: None,
        };

        let edits = normalize_edit_set(&[suggestion], &agent);
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].suggested_text, "from agent");
    }

    #[test]
    fn test_suggestion_embedded_edit() {
        let suggestion = RawSuggestion {
            id: Some("s1".to_string()),
            proposed_edit: Some(raw("", Some("keep"), Some("better"))),
            inline: RawEdit::default(),
        };
        let edits = normalize_edit_set(&[suggestion], &[]);
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].id, "s1");
        assert_eq!(edits[0].suggested_text, "better");
    }

    #[test]
    fn test_missing_id_is_content_derived_and_stable() {
        let a = normalize_edit(&RawEdit {
            original_text: Some("x".to_string()),
            suggested_text: Some("y".to_string()),
            ..Default::default()
        })
        .unwrap();
        let b = normalize_edit(&RawEdit {
            original_text: Some("x".to_string()),
            suggested_text: Some("y".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(a.id, b.id);
        assert!(a.id.starts_with("edit-"));
    }
}
