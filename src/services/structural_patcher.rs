//! Structure-preserving edit application.
//!
//! Applies a normalized edit set to a structured document. Modify and
//! remove need a matched node; insert walks an anchor chain (matched node,
//! then the most recently touched node, then the end of the body).
//! Unmatched edits are recorded as gaps and never abort the patch.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::domain::models::{ChangeType, Edit, PatchGap};
use crate::services::clause_matcher::ClauseMatcher;
use crate::services::markup::{format_rich_text, normalize_text, BlockNode, StructuredDoc};

/// Result of a structural patch pass.
#[derive(Debug, Clone, Default)]
pub struct PatchOutcome {
    /// Ids of edits that landed.
    pub matched: Vec<String>,
    /// Edits that could not be placed.
    pub unmatched: Vec<PatchGap>,
    /// Human-readable descriptions of the changes that were applied.
    pub applied_changes: Vec<String>,
}

impl PatchOutcome {
    pub fn matched_count(&self) -> u32 {
        self.matched.len() as u32
    }

    pub fn unmatched_count(&self) -> u32 {
        self.unmatched.len() as u32
    }
}

/// Applies edits to structural documents.
#[derive(Debug, Clone)]
pub struct StructuralPatcher {
    matcher: ClauseMatcher,
}

impl StructuralPatcher {
    pub fn new(matcher: ClauseMatcher) -> Self {
        Self { matcher }
    }

    /// Apply the edit set in order, mutating `doc`.
    ///
    /// Node consumption is scoped to this call: each node can satisfy at
    /// most one edit, so two edits never collide on the same location.
    pub fn apply(&self, doc: &mut StructuredDoc, edits: &[Edit]) -> PatchOutcome {
        let mut outcome = PatchOutcome::default();
        let mut consumed: HashSet<u64> = HashSet::new();
        let mut last_target: Option<u64> = None;

        for edit in edits {
            match edit.change_type {
                ChangeType::Modify => {
                    match self.matcher.find_match(edit, doc, &consumed) {
                        Some(m) => {
                            let inner = format_rich_text(&carry_numbering_prefix(edit));
                            doc.replace_inner(m.node_id, inner);
                            consumed.insert(m.node_id);
                            last_target = Some(m.node_id);
                            outcome.matched.push(edit.id.clone());
                            outcome.applied_changes.push(format!(
                                "Replaced \"{}\"",
                                preview(edit.original_text.as_deref().unwrap_or_default())
                            ));
                        }
                        None => outcome.unmatched.push(gap(edit, "no matching clause found")),
                    }
                }
                ChangeType::Remove => {
                    match self.matcher.find_match(edit, doc, &consumed) {
                        Some(m) => {
                            // Keep an anchor for later insertions: the block
                            // preceding the one about to disappear.
                            last_target = preceding_block(doc, m.node_id).or(last_target);
                            doc.remove(m.node_id);
                            consumed.insert(m.node_id);
                            outcome.matched.push(edit.id.clone());
                            outcome.applied_changes.push(format!(
                                "Removed \"{}\"",
                                preview(edit.original_text.as_deref().unwrap_or_default())
                            ));
                        }
                        None => outcome.unmatched.push(gap(edit, "no matching clause found")),
                    }
                }
                ChangeType::Insert => {
                    let node = BlockNode::paragraph(format_rich_text(&edit.suggested_text));
                    let anchor = self
                        .matcher
                        .find_match(edit, doc, &consumed)
                        .map(|m| m.node_id)
                        .or(last_target);

                    let new_id = match anchor.and_then(|a| doc.insert_after(a, node.clone())) {
                        Some(id) => id,
                        None => doc.append_end(node),
                    };
                    consumed.insert(new_id);
                    last_target = Some(new_id);
                    outcome.matched.push(edit.id.clone());
                    outcome.applied_changes.push(match &edit.clause_reference {
                        Some(reference) => format!("Inserted new clause near {reference}"),
                        None => "Inserted new clause".to_string(),
                    });
                }
            }
        }

        debug!(
            matched = outcome.matched.len(),
            unmatched = outcome.unmatched.len(),
            "structural patch finished"
        );
        outcome
    }
}

fn gap(edit: &Edit, reason: &str) -> PatchGap {
    PatchGap {
        edit_id: edit.id.clone(),
        reason: reason.to_string(),
    }
}

/// Block id immediately before `node_id`, if any.
fn preceding_block(doc: &StructuredDoc, node_id: u64) -> Option<u64> {
    let ids = doc.block_ids();
    let at = ids.iter().position(|id| *id == node_id)?;
    at.checked_sub(1).map(|prev| ids[prev])
}

fn numbering_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*((?:section|clause)\s+\d+(?:\.\d+)*|\d+(?:\.\d+)+\.?|\d+\.)")
            .expect("numbering prefix pattern is valid")
    })
}

/// Re-prepend the original clause's numbering prefix when the suggested
/// text dropped it, so numbering continuity survives the rewrite.
fn carry_numbering_prefix(edit: &Edit) -> String {
    let suggested = edit.suggested_text.trim();
    let Some(original) = edit.original_text.as_deref() else {
        return suggested.to_string();
    };
    let Some(captures) = numbering_prefix_re().captures(original) else {
        return suggested.to_string();
    };
    let prefix = captures.get(1).map_or("", |m| m.as_str()).trim();

    let suggested_norm = normalize_text(suggested);
    let prefix_norm = normalize_text(prefix);
    if prefix_norm.is_empty() || suggested_norm.starts_with(&prefix_norm) {
        return suggested.to_string();
    }
    format!("{prefix} {suggested}")
}

fn preview(text: &str) -> String {
    const MAX: usize = 60;
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX).collect();
        format!("{cut}...")
    }
}
