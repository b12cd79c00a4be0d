//! Block-level diff fallback.
//!
//! When clause matching places zero edits but a complete rewritten
//! plain-text version exists, this module aligns the document's blocks
//! against the rewrite with a classic LCS and replays the alignment as
//! structural operations. The result is a minimal patch: blocks carried
//! through an equal run keep their tag and styling.

use tracing::debug;

use crate::services::markup::{format_rich_text, normalize_text, BlockNode, StructuredDoc};

/// One run of identical diff operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffChunk {
    /// Pairs of (old index, new index) with normalized-equal text.
    Equal(Vec<(usize, usize)>),
    /// Old indices to delete.
    Removed(Vec<usize>),
    /// New indices to insert.
    Added(Vec<usize>),
}

/// Compute run-merged diff chunks between two block sequences, using
/// normalized text equality. O(m·n) dynamic-programming LCS.
pub fn diff_blocks(old: &[String], new: &[String]) -> Vec<DiffChunk> {
    let old_norm: Vec<String> = old.iter().map(|s| normalize_text(s)).collect();
    let new_norm: Vec<String> = new.iter().map(|s| normalize_text(s)).collect();

    let m = old_norm.len();
    let n = new_norm.len();
    let mut table = vec![vec![0u32; n + 1]; m + 1];
    for i in (0..m).rev() {
        for j in (0..n).rev() {
            table[i][j] = if old_norm[i] == new_norm[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    #[derive(PartialEq)]
    enum Op {
        Equal(usize, usize),
        Removed(usize),
        Added(usize),
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < m && j < n {
        if old_norm[i] == new_norm[j] {
            ops.push(Op::Equal(i, j));
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            ops.push(Op::Removed(i));
            i += 1;
        } else {
            ops.push(Op::Added(j));
            j += 1;
        }
    }
    while i < m {
        ops.push(Op::Removed(i));
        i += 1;
    }
    while j < n {
        ops.push(Op::Added(j));
        j += 1;
    }

    // Merge consecutive same-kind operations into run-length chunks.
    let mut chunks: Vec<DiffChunk> = Vec::new();
    for op in ops {
        match (op, chunks.last_mut()) {
            (Op::Equal(a, b), Some(DiffChunk::Equal(run))) => run.push((a, b)),
            (Op::Removed(a), Some(DiffChunk::Removed(run))) => run.push(a),
            (Op::Added(b), Some(DiffChunk::Added(run))) => run.push(b),
            (Op::Equal(a, b), _) => chunks.push(DiffChunk::Equal(vec![(a, b)])),
            (Op::Removed(a), _) => chunks.push(DiffChunk::Removed(vec![a])),
            (Op::Added(b), _) => chunks.push(DiffChunk::Added(vec![b])),
        }
    }
    chunks
}

/// Result of replaying a block diff against a structural document.
#[derive(Debug, Clone, Default)]
pub struct BlockDiffOutcome {
    pub updated: u32,
    pub removed: u32,
    pub added: u32,
    pub applied_changes: Vec<String>,
}

impl BlockDiffOutcome {
    /// True when the replay touched the document at all.
    pub fn changed(&self) -> bool {
        self.updated + self.removed + self.added > 0
    }
}

/// Patch `doc` so its blocks read as `rewritten_text`, preserving the
/// tags of every block the rewrite kept.
pub fn apply_rewrite(doc: &mut StructuredDoc, rewritten_text: &str) -> BlockDiffOutcome {
    let block_ids: Vec<u64> = doc
        .block_ids()
        .into_iter()
        .filter(|id| {
            doc.block(*id)
                .is_some_and(|b| !normalize_text(&b.text()).is_empty())
        })
        .collect();
    let old_texts: Vec<String> = block_ids
        .iter()
        .map(|id| doc.block(*id).map(|b| b.text()).unwrap_or_default())
        .collect();
    let new_texts = crate::services::markup::split_paragraphs(rewritten_text);

    let chunks = diff_blocks(&old_texts, &new_texts);
    let mut outcome = BlockDiffOutcome::default();
    let mut anchor: Option<u64> = None;

    for chunk in &chunks {
        match chunk {
            DiffChunk::Equal(pairs) => {
                for (old_idx, new_idx) in pairs {
                    let id = block_ids[*old_idx];
                    let new_text = &new_texts[*new_idx];
                    // Normalized-equal, but the rewrite may still have
                    // changed case or punctuation spacing. Whitespace-only
                    // differences keep the node's inline markup intact.
                    if collapse_whitespace(&old_texts[*old_idx]) != collapse_whitespace(new_text) {
                        doc.replace_inner(id, format_rich_text(new_text));
                        outcome.updated += 1;
                        outcome
                            .applied_changes
                            .push(format!("Updated \"{}\"", preview(new_text)));
                    }
                    anchor = Some(id);
                }
            }
            DiffChunk::Removed(indices) => {
                for old_idx in indices {
                    let id = block_ids[*old_idx];
                    doc.remove(id);
                    outcome.removed += 1;
                    outcome
                        .applied_changes
                        .push(format!("Removed \"{}\"", preview(&old_texts[*old_idx])));
                }
            }
            DiffChunk::Added(indices) => {
                for new_idx in indices {
                    let node = BlockNode::paragraph(format_rich_text(&new_texts[*new_idx]));
                    let new_id = match anchor {
                        Some(a) => doc
                            .insert_after(a, node.clone())
                            .unwrap_or_else(|| doc.append_end(node)),
                        // No surviving block precedes this run (a removed
                        // head, or an addition at the very start), so the
                        // new block goes before whatever block is first in
                        // the document right now.
                        None => match doc
                            .block_ids()
                            .first()
                            .and_then(|first| doc.insert_before(*first, node.clone()))
                        {
                            Some(id) => id,
                            None => doc.append_end(node),
                        },
                    };
                    anchor = Some(new_id);
                    outcome.added += 1;
                    outcome
                        .applied_changes
                        .push(format!("Added \"{}\"", preview(&new_texts[*new_idx])));
                }
            }
        }
    }

    debug!(
        updated = outcome.updated,
        removed = outcome.removed,
        added = outcome.added,
        "block diff replay finished"
    );
    outcome
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
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

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_lcs_minimality() {
        let chunks = diff_blocks(&blocks(&["A", "B", "C"]), &blocks(&["A", "B", "D"]));
        assert_eq!(
            chunks,
            vec![
                DiffChunk::Equal(vec![(0, 0), (1, 1)]),
                DiffChunk::Removed(vec![2]),
                DiffChunk::Added(vec![2]),
            ]
        );
    }

    #[test]
    fn test_identical_sequences_are_one_equal_chunk() {
        let chunks = diff_blocks(&blocks(&["A", "B"]), &blocks(&["A", "B"]));
        assert_eq!(chunks, vec![DiffChunk::Equal(vec![(0, 0), (1, 1)])]);
    }

    #[test]
    fn test_normalized_equality() {
        let chunks = diff_blocks(
            &blocks(&["The  Receiving Party"]),
            &blocks(&["the receiving\u{a0}party"]),
        );
        assert_eq!(chunks, vec![DiffChunk::Equal(vec![(0, 0)])]);
    }

    #[test]
    fn test_insertion_in_middle() {
        let chunks = diff_blocks(&blocks(&["A", "C"]), &blocks(&["A", "B", "C"]));
        assert_eq!(
            chunks,
            vec![
                DiffChunk::Equal(vec![(0, 0)]),
                DiffChunk::Added(vec![1]),
                DiffChunk::Equal(vec![(1, 2)]),
            ]
        );
    }

    #[test]
    fn test_replay_preserves_tags_on_equal_blocks() {
        let mut doc = StructuredDoc::parse(
            "<body><h1>Title</h1><p>Kept clause.</p><p>Dropped clause.</p></body>",
        );
        let outcome = apply_rewrite(&mut doc, "Title\n\nKept clause.\n\nBrand new clause.");

        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.added, 1);
        let serialized = doc.serialize();
        assert!(serialized.contains("<h1>Title</h1>"));
        assert!(serialized.contains("<p>Kept clause.</p>"));
        assert!(!serialized.contains("Dropped clause."));
        assert!(serialized.contains("<p>Brand new clause.</p>"));
    }

    #[test]
    fn test_replay_insertion_follows_surviving_anchor() {
        let mut doc =
            StructuredDoc::parse("<body><p>First.</p><p>Second.</p><p>Third.</p></body>");
        apply_rewrite(&mut doc, "First.\n\nInserted.\n\nThird.");

        let serialized = doc.serialize();
        let first = serialized.find("First.").unwrap();
        let inserted = serialized.find("Inserted.").unwrap();
        let third = serialized.find("Third.").unwrap();
        assert!(first < inserted && inserted < third);
        assert!(!serialized.contains("Second."));
    }

    #[test]
    fn test_replay_addition_at_document_start() {
        let mut doc = StructuredDoc::parse("<body><p>Existing.</p></body>");
        apply_rewrite(&mut doc, "Preamble.\n\nExisting.");

        let serialized = doc.serialize();
        let preamble = serialized.find("Preamble.").unwrap();
        let existing = serialized.find("Existing.").unwrap();
        assert!(preamble < existing);
    }

    #[test]
    fn test_replay_rewritten_head_block_stays_at_head() {
        // A rewritten leading block diffs as a removal followed by an
        // addition; the addition must land where the removed block was,
        // not at the end of the document.
        let mut doc = StructuredDoc::parse("<body><p>Preamble old.</p><p>Terms stay.</p></body>");
        let outcome = apply_rewrite(&mut doc, "Brand new preamble.\n\nTerms stay.");

        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.added, 1);
        let serialized = doc.serialize();
        let preamble = serialized.find("Brand new preamble.").unwrap();
        let terms = serialized.find("Terms stay.").unwrap();
        assert!(preamble < terms);
        assert!(!serialized.contains("Preamble old."));
        assert_eq!(doc.to_plain_text(), "Brand new preamble.\n\nTerms stay.");
    }

    #[test]
    fn test_replay_whitespace_only_difference_keeps_inline_markup() {
        let mut doc = StructuredDoc::parse("<body><p>The <b>Receiving</b>  Party</p></body>");
        let outcome = apply_rewrite(&mut doc, "The Receiving Party");

        assert_eq!(outcome.updated, 0);
        assert!(doc.serialize().contains("<b>Receiving</b>"));
    }

    #[test]
    fn test_replay_case_change_updates_content() {
        let mut doc = StructuredDoc::parse("<body><p>the receiving party</p></body>");
        let outcome = apply_rewrite(&mut doc, "The Receiving Party");

        assert_eq!(outcome.updated, 1);
        assert!(doc.serialize().contains("The Receiving Party"));
    }
}
