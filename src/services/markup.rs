//! Block-level structural document model.
//!
//! A `StructuredDoc` segments a markup string into raw wrapper spans
//! (`<ul>`, `<table>`, `</body>`, ...) and text-bearing block nodes
//! (paragraphs, headings, list items, cells). Mutation happens through a
//! small surface (replace content, insert-after, remove, append) and the
//! document serializes back to a string with untouched spans preserved
//! byte for byte.
//!
//! Nodes are addressed by stable ids, so removing one node never shifts
//! the handle of another.

/// Tags treated as text-bearing structural blocks.
const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "td", "th", "blockquote",
];

/// A text-bearing structural node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNode {
    pub tag: String,
    /// Raw attribute string exactly as parsed, including its leading space.
    pub attrs: String,
    pub inner_html: String,
}

impl BlockNode {
    /// A plain paragraph node with pre-escaped inner HTML.
    pub fn paragraph(inner_html: impl Into<String>) -> Self {
        Self {
            tag: "p".to_string(),
            attrs: String::new(),
            inner_html: inner_html.into(),
        }
    }

    /// Rendered text: tags stripped, basic entities decoded.
    pub fn text(&self) -> String {
        strip_tags(&self.inner_html)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SegmentKind {
    Raw(String),
    Block(BlockNode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    id: u64,
    kind: SegmentKind,
}

/// An ordered, mutable view of a formatted document.
#[derive(Debug, Clone, Default)]
pub struct StructuredDoc {
    segments: Vec<Segment>,
    next_id: u64,
}

impl StructuredDoc {
    /// Parse a markup string into raw spans and block nodes.
    pub fn parse(html: &str) -> Self {
        let mut doc = StructuredDoc::default();
        let bytes = html.as_bytes();
        let mut raw_start = 0;
        let mut pos = 0;

        while pos < bytes.len() {
            let Some((open_at, tag, attrs, body_start)) = find_block_open(html, pos) else {
                break;
            };
            let Some((inner_end, close_end)) = find_matching_close(html, &tag, body_start) else {
                // Unterminated block: leave the rest as raw markup.
                pos = body_start;
                continue;
            };

            if open_at > raw_start {
                doc.push_raw(&html[raw_start..open_at]);
            }
            doc.push_block(BlockNode {
                tag,
                attrs,
                inner_html: html[body_start..inner_end].to_string(),
            });
            raw_start = close_end;
            pos = close_end;
        }

        if raw_start < html.len() {
            doc.push_raw(&html[raw_start..]);
        }
        doc
    }

    /// Synthesize a structured document from plain text: one paragraph per
    /// blank-line-separated chunk, HTML-escaped.
    pub fn from_plain_text(text: &str) -> Self {
        let mut doc = StructuredDoc::default();
        doc.push_raw("<html><body>");
        for chunk in split_paragraphs(text) {
            doc.push_block(BlockNode::paragraph(escape_html(&chunk)));
        }
        doc.push_raw("</body></html>");
        doc
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn push_raw(&mut self, raw: &str) {
        let id = self.alloc_id();
        self.segments.push(Segment {
            id,
            kind: SegmentKind::Raw(raw.to_string()),
        });
    }

    fn push_block(&mut self, node: BlockNode) {
        let id = self.alloc_id();
        self.segments.push(Segment {
            id,
            kind: SegmentKind::Block(node),
        });
    }

    /// Ids of all block nodes, in document order.
    pub fn block_ids(&self) -> Vec<u64> {
        self.segments
            .iter()
            .filter_map(|s| match &s.kind {
                SegmentKind::Block(_) => Some(s.id),
                SegmentKind::Raw(_) => None,
            })
            .collect()
    }

    /// Look up a block node by id.
    pub fn block(&self, id: u64) -> Option<&BlockNode> {
        self.segments.iter().find_map(|s| match &s.kind {
            SegmentKind::Block(node) if s.id == id => Some(node),
            _ => None,
        })
    }

    /// Replace a block's inner HTML, preserving its tag and attributes.
    pub fn replace_inner(&mut self, id: u64, inner_html: impl Into<String>) -> bool {
        for segment in &mut self.segments {
            if segment.id == id {
                if let SegmentKind::Block(node) = &mut segment.kind {
                    node.inner_html = inner_html.into();
                    return true;
                }
            }
        }
        false
    }

    /// Delete a block node entirely.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.segments.len();
        self.segments
            .retain(|s| !(s.id == id && matches!(s.kind, SegmentKind::Block(_))));
        self.segments.len() != before
    }

    /// Insert a new block immediately after the given node. Returns the new
    /// node's id, or `None` when the anchor no longer exists.
    pub fn insert_after(&mut self, anchor_id: u64, node: BlockNode) -> Option<u64> {
        let at = self.segments.iter().position(|s| s.id == anchor_id)?;
        let id = self.alloc_id();
        self.segments.insert(
            at + 1,
            Segment {
                id,
                kind: SegmentKind::Block(node),
            },
        );
        Some(id)
    }

    /// Insert a new block immediately before the given node. Returns the
    /// new node's id, or `None` when the anchor no longer exists.
    pub fn insert_before(&mut self, anchor_id: u64, node: BlockNode) -> Option<u64> {
        let at = self.segments.iter().position(|s| s.id == anchor_id)?;
        let id = self.alloc_id();
        self.segments.insert(
            at,
            Segment {
                id,
                kind: SegmentKind::Block(node),
            },
        );
        Some(id)
    }

    /// Append a block at the end of the document body: before the trailing
    /// `</body>` wrapper when present, otherwise at the very end.
    pub fn append_end(&mut self, node: BlockNode) -> u64 {
        let id = self.alloc_id();
        let segment = Segment {
            id,
            kind: SegmentKind::Block(node),
        };
        let close_at = self.segments.iter().rposition(|s| match &s.kind {
            SegmentKind::Raw(raw) => raw.to_ascii_lowercase().contains("</body>"),
            SegmentKind::Block(_) => false,
        });
        match close_at {
            Some(at) => self.segments.insert(at, segment),
            None => self.segments.push(segment),
        }
        id
    }

    /// Serialize back to a markup string.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match &segment.kind {
                SegmentKind::Raw(raw) => out.push_str(raw),
                SegmentKind::Block(node) => {
                    out.push('<');
                    out.push_str(&node.tag);
                    out.push_str(&node.attrs);
                    out.push('>');
                    out.push_str(&node.inner_html);
                    out.push_str("</");
                    out.push_str(&node.tag);
                    out.push('>');
                }
            }
        }
        out
    }

    /// Plain-text rendering: block texts joined by blank lines.
    pub fn to_plain_text(&self) -> String {
        let parts: Vec<String> = self
            .segments
            .iter()
            .filter_map(|s| match &s.kind {
                SegmentKind::Block(node) => {
                    let text = node.text();
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        Some(trimmed.to_string())
                    }
                }
                SegmentKind::Raw(_) => None,
            })
            .collect();
        parts.join("\n\n")
    }
}

/// Locate the next block-level open tag at or after `from`.
/// Returns (tag start, lowercased tag name, raw attrs, inner start).
fn find_block_open(html: &str, from: usize) -> Option<(usize, String, String, usize)> {
    let bytes = html.as_bytes();
    let mut pos = from;

    while pos < bytes.len() {
        let open_at = html[pos..].find('<')? + pos;
        let name_start = open_at + 1;
        let mut name_end = name_start;
        while name_end < bytes.len() && bytes[name_end].is_ascii_alphanumeric() {
            name_end += 1;
        }
        let tag = html[name_start..name_end].to_ascii_lowercase();

        let delimited = bytes
            .get(name_end)
            .is_some_and(|b| matches!(b, b'>' | b' ' | b'\t' | b'\n' | b'\r' | b'/'));

        if !tag.is_empty() && delimited && BLOCK_TAGS.contains(&tag.as_str()) {
            let Some(gt) = html[name_end..].find('>') else {
                return None;
            };
            let open_end = name_end + gt + 1;
            let attrs = html[name_end..open_end - 1].trim_end_matches('/').to_string();
            return Some((open_at, tag, attrs, open_end));
        }

        pos = open_at + 1;
    }
    None
}

/// Find the close tag matching an open block, counting same-tag nesting.
/// Returns (inner end, index just past the close tag).
fn find_matching_close(html: &str, tag: &str, from: usize) -> Option<(usize, usize)> {
    let lower = html.to_ascii_lowercase();
    let open_pat = format!("<{tag}");
    let close_pat = format!("</{tag}");
    let mut depth = 1usize;
    let mut pos = from;

    while pos < lower.len() {
        let next_open = find_tag_token(&lower, &open_pat, pos);
        let next_close = find_tag_token(&lower, &close_pat, pos);

        match (next_open, next_close) {
            (_, None) => return None,
            (Some(open_at), Some(close_at)) if open_at < close_at => {
                depth += 1;
                pos = open_at + open_pat.len();
            }
            (_, Some(close_at)) => {
                depth -= 1;
                let gt = lower[close_at..].find('>')? + close_at + 1;
                if depth == 0 {
                    return Some((close_at, gt));
                }
                pos = gt;
            }
        }
    }
    None
}

/// Find `pat` as a proper tag token (followed by a delimiter, not a longer
/// tag name like `<li>` inside `<link>`).
fn find_tag_token(lower: &str, pat: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(found) = lower[pos..].find(pat) {
        let at = pos + found;
        let after = lower.as_bytes().get(at + pat.len());
        if after.is_none_or(|b| matches!(b, b'>' | b' ' | b'\t' | b'\n' | b'\r' | b'/')) {
            return Some(at);
        }
        pos = at + 1;
    }
    None
}

/// Strip tags and decode basic entities.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    decode_entities(&out)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Escape text for inclusion in markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Reformat free text into block-safe inner HTML: blank lines become
/// paragraph breaks, single newlines become line breaks, everything
/// escaped.
pub fn format_rich_text(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let paragraphs = split_paragraphs(&normalized);
    paragraphs
        .iter()
        .map(|p| escape_html(p).replace('\n', "<br>"))
        .collect::<Vec<_>>()
        .join("<br><br>")
}

/// Split text on blank lines into trimmed, non-empty chunks.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for line in normalized.split('\n') {
        if line.trim().is_empty() {
            if !current.trim().is_empty() {
                paragraphs.push(current.trim().to_string());
            }
            current.clear();
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }
    if !current.trim().is_empty() {
        paragraphs.push(current.trim().to_string());
    }
    paragraphs
}

/// Normalize text for fuzzy comparison: collapse whitespace (including
/// non-breaking spaces), case-fold.
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() || c == '\u{a0}' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Word tokens of normalized text.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize_text(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "<html><body><h1>NDA</h1><p class=\"intro\">First clause.</p><ul><li>Item one</li><li>Item two</li></ul></body></html>";

    #[test]
    fn test_parse_finds_blocks_in_order() {
        let doc = StructuredDoc::parse(SAMPLE);
        let texts: Vec<String> = doc
            .block_ids()
            .iter()
            .map(|id| doc.block(*id).unwrap().text())
            .collect();
        assert_eq!(texts, vec!["NDA", "First clause.", "Item one", "Item two"]);
    }

    #[test]
    fn test_serialize_round_trips() {
        let doc = StructuredDoc::parse(SAMPLE);
        assert_eq!(doc.serialize(), SAMPLE);
    }

    #[test]
    fn test_attributes_preserved() {
        let doc = StructuredDoc::parse(SAMPLE);
        let ids = doc.block_ids();
        let clause = doc.block(ids[1]).unwrap();
        assert_eq!(clause.tag, "p");
        assert_eq!(clause.attrs, " class=\"intro\"");
    }

    #[test]
    fn test_replace_inner_keeps_tag() {
        let mut doc = StructuredDoc::parse(SAMPLE);
        let ids = doc.block_ids();
        assert!(doc.replace_inner(ids[1], "Rewritten clause."));
        assert!(doc.serialize().contains("<p class=\"intro\">Rewritten clause.</p>"));
    }

    #[test]
    fn test_remove_block() {
        let mut doc = StructuredDoc::parse(SAMPLE);
        let ids = doc.block_ids();
        assert!(doc.remove(ids[2]));
        let serialized = doc.serialize();
        assert!(!serialized.contains("Item one"));
        assert!(serialized.contains("Item two"));
    }

    #[test]
    fn test_insert_after() {
        let mut doc = StructuredDoc::parse(SAMPLE);
        let ids = doc.block_ids();
        let new_id = doc
            .insert_after(ids[1], BlockNode::paragraph("Inserted clause."))
            .unwrap();
        assert!(doc.block(new_id).is_some());
        let serialized = doc.serialize();
        let first = serialized.find("First clause.").unwrap();
        let inserted = serialized.find("Inserted clause.").unwrap();
        let item = serialized.find("Item one").unwrap();
        assert!(first < inserted && inserted < item);
    }

    #[test]
    fn test_append_end_lands_before_body_close() {
        let mut doc = StructuredDoc::parse(SAMPLE);
        doc.append_end(BlockNode::paragraph("Tail clause."));
        let serialized = doc.serialize();
        let tail = serialized.find("Tail clause.").unwrap();
        let body_close = serialized.find("</body>").unwrap();
        assert!(tail < body_close);
    }

    #[test]
    fn test_nested_same_tag_blocks() {
        let html = "<ul><li>Outer<ul><li>Inner</li></ul></li></ul>";
        let doc = StructuredDoc::parse(html);
        let ids = doc.block_ids();
        assert_eq!(ids.len(), 1);
        let outer = doc.block(ids[0]).unwrap();
        assert_eq!(outer.text(), "OuterInner");
        assert_eq!(doc.serialize(), html);
    }

    #[test]
    fn test_li_not_confused_with_link() {
        let html = "<head><link rel=\"x\"></head><body><li>Real item</li></body>";
        let doc = StructuredDoc::parse(html);
        assert_eq!(doc.block_ids().len(), 1);
        assert_eq!(doc.serialize(), html);
    }

    #[test]
    fn test_from_plain_text() {
        let doc = StructuredDoc::from_plain_text("First paragraph.\n\nSecond & third.");
        let serialized = doc.serialize();
        assert!(serialized.contains("<p>First paragraph.</p>"));
        assert!(serialized.contains("<p>Second &amp; third.</p>"));
        assert!(serialized.ends_with("</body></html>"));
    }

    #[test]
    fn test_strip_tags_decodes_entities() {
        assert_eq!(strip_tags("<p>A&nbsp;&amp;&nbsp;B</p>"), "A & B");
        assert_eq!(strip_tags("<b>bold</b> text"), "bold text");
    }

    #[test]
    fn test_format_rich_text() {
        let formatted = format_rich_text("Line one\nLine two\n\nNew paragraph <x>");
        assert_eq!(
            formatted,
            "Line one<br>Line two<br><br>New paragraph &lt;x&gt;"
        );
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(
            normalize_text("  The\u{a0}Receiving   PARTY\n shall "),
            "the receiving party shall"
        );
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Section 5.2: Confidentiality!"),
            vec!["section", "5", "2", "confidentiality"]
        );
    }

    #[test]
    fn test_to_plain_text() {
        let doc = StructuredDoc::parse(SAMPLE);
        assert_eq!(
            doc.to_plain_text(),
            "NDA\n\nFirst clause.\n\nItem one\n\nItem two"
        );
    }
}
