//! Fuzzy clause-to-node matching.
//!
//! Locates the structural node an edit targets when exact offsets are
//! unknown. Containment beats token overlap; ties go to document order;
//! a node already claimed by one edit is invisible to the next.

use std::collections::HashSet;

use crate::domain::models::{Edit, MatcherConfig};
use crate::services::markup::{normalize_text, tokenize, StructuredDoc};

/// How a match was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchVia {
    /// Fuzzy score against the edit's original text.
    OriginalText,
    /// Literal clause-reference substring in the node text.
    ClauseReference,
}

/// A successful clause match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOutcome {
    pub node_id: u64,
    pub score: f64,
    pub via: MatchVia,
}

/// Matches edits to structural nodes.
#[derive(Debug, Clone)]
pub struct ClauseMatcher {
    threshold: f64,
}

impl ClauseMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &MatcherConfig) -> Self {
        Self::new(config.score_threshold)
    }

    /// Find the best node for an edit, excluding already-consumed nodes.
    ///
    /// Tries the original-text score first; when nothing clears the
    /// threshold, falls back to a literal clause-reference lookup.
    pub fn find_match(
        &self,
        edit: &Edit,
        doc: &StructuredDoc,
        consumed: &HashSet<u64>,
    ) -> Option<MatchOutcome> {
        let candidates: Vec<(u64, String)> = doc
            .block_ids()
            .into_iter()
            .filter(|id| !consumed.contains(id))
            .filter_map(|id| {
                let text = normalize_text(&doc.block(id)?.text());
                if text.is_empty() {
                    None
                } else {
                    Some((id, text))
                }
            })
            .collect();

        if let Some(original) = edit.original_text.as_deref() {
            let needle = normalize_text(original);
            if !needle.is_empty() {
                let mut best: Option<MatchOutcome> = None;
                for (id, node_text) in &candidates {
                    let score = score_texts(&needle, node_text);
                    if score >= self.threshold
                        && best.is_none_or(|current| score > current.score)
                    {
                        best = Some(MatchOutcome {
                            node_id: *id,
                            score,
                            via: MatchVia::OriginalText,
                        });
                    }
                }
                if best.is_some() {
                    return best;
                }
            }
        }

        // Clause-reference fallback: first node containing the reference
        // literally.
        let reference = normalize_text(edit.clause_reference.as_deref()?);
        if reference.is_empty() {
            return None;
        }
        candidates
            .iter()
            .find(|(_, node_text)| node_text.contains(&reference))
            .map(|(id, _)| MatchOutcome {
                node_id: *id,
                score: 0.0,
                via: MatchVia::ClauseReference,
            })
    }
}

/// Score two normalized texts.
///
/// Containment in either direction scores by length ratio; otherwise the
/// token overlap is measured asymmetrically against the edit's tokens.
fn score_texts(edit_text: &str, node_text: &str) -> f64 {
    if node_text.contains(edit_text) || edit_text.contains(node_text) {
        let shorter = edit_text.len().min(node_text.len()) as f64;
        let longer = edit_text.len().max(node_text.len()) as f64;
        if longer == 0.0 {
            return 0.0;
        }
        return shorter / longer;
    }

    let edit_tokens: HashSet<String> = tokenize(edit_text).into_iter().collect();
    if edit_tokens.is_empty() {
        return 0.0;
    }
    let node_tokens: HashSet<String> = tokenize(node_text).into_iter().collect();
    let overlap = edit_tokens.intersection(&node_tokens).count() as f64;
    overlap / edit_tokens.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ChangeType;

    fn modify_edit(original: &str, reference: Option<&str>) -> Edit {
        Edit {
            id: "e1".to_string(),
            clause_reference: reference.map(str::to_string),
            change_type: ChangeType::Modify,
            original_text: Some(original.to_string()),
            suggested_text: "replacement".to_string(),
            rationale: None,
            severity: None,
        }
    }

    fn doc() -> StructuredDoc {
        StructuredDoc::parse(
            "<body>\
             <h2>1. Definitions</h2>\
             <p>The Receiving Party shall keep confidential all Confidential Information.</p>\
             <p>Section 5.2 Payment is due within thirty days.</p>\
             <p>Either party may terminate this agreement with notice.</p>\
             </body>",
        )
    }

    #[test]
    fn test_exact_text_scores_one() {
        let doc = doc();
        let matcher = ClauseMatcher::new(0.55);
        let edit = modify_edit(
            "The Receiving Party shall keep confidential all Confidential Information.",
            None,
        );

        let outcome = matcher.find_match(&edit, &doc, &HashSet::new()).unwrap();
        assert!((outcome.score - 1.0).abs() < f64::EPSILON);
        assert_eq!(outcome.via, MatchVia::OriginalText);
        assert_eq!(outcome.node_id, doc.block_ids()[1]);
    }

    #[test]
    fn test_low_overlap_does_not_match() {
        let doc = doc();
        let matcher = ClauseMatcher::new(0.55);
        let edit = modify_edit(
            "Arbitration venue procedures govern all disputes exclusively in Delaware courts",
            None,
        );
        assert!(matcher.find_match(&edit, &doc, &HashSet::new()).is_none());
    }

    #[test]
    fn test_substring_containment_matches() {
        let doc = doc();
        let matcher = ClauseMatcher::new(0.55);
        let edit = modify_edit("keep confidential all Confidential Information", None);

        let outcome = matcher.find_match(&edit, &doc, &HashSet::new()).unwrap();
        assert_eq!(outcome.node_id, doc.block_ids()[1]);
        assert!(outcome.score >= 0.55 && outcome.score < 1.0);
    }

    #[test]
    fn test_normalization_ignores_case_and_nbsp() {
        let doc = doc();
        let matcher = ClauseMatcher::new(0.55);
        let edit = modify_edit(
            "THE\u{a0}RECEIVING  PARTY shall keep confidential all confidential information.",
            None,
        );
        let outcome = matcher.find_match(&edit, &doc, &HashSet::new()).unwrap();
        assert!((outcome.score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_consumed_nodes_are_excluded() {
        let doc = doc();
        let matcher = ClauseMatcher::new(0.55);
        let edit = modify_edit(
            "The Receiving Party shall keep confidential all Confidential Information.",
            None,
        );

        let mut consumed = HashSet::new();
        consumed.insert(doc.block_ids()[1]);
        assert!(matcher.find_match(&edit, &doc, &consumed).is_none());
    }

    #[test]
    fn test_clause_reference_fallback() {
        let doc = doc();
        let matcher = ClauseMatcher::new(0.55);
        let edit = modify_edit(
            "wording that appears nowhere in the document at all",
            Some("Section 5.2"),
        );

        let outcome = matcher.find_match(&edit, &doc, &HashSet::new()).unwrap();
        assert_eq!(outcome.via, MatchVia::ClauseReference);
        assert_eq!(outcome.node_id, doc.block_ids()[2]);
    }

    #[test]
    fn test_tie_breaks_by_document_order() {
        let doc = StructuredDoc::parse("<body><p>notice period</p><p>notice period</p></body>");
        let matcher = ClauseMatcher::new(0.55);
        let edit = modify_edit("notice period", None);

        let outcome = matcher.find_match(&edit, &doc, &HashSet::new()).unwrap();
        assert_eq!(outcome.node_id, doc.block_ids()[0]);
    }
}
