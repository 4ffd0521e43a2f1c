//! Zero-width cursor anchors.
//!
//! Two editor affordances have no model counterpart: a collapsed cursor
//! placed immediately after a trailing inline element ("cursor exit") and a
//! cursor inside an otherwise-empty inline element ("prospective
//! formatting"). Both are realized by inserting a zero-width character into
//! the *rendered* text and parking the caret behind it. The character is
//! invisible, occupies no rendered width, and must be stripped before any
//! text is read back into the document model. All offset arithmetic in the
//! codec counts rendered characters, i.e. characters with anchors excluded.

/// U+FEFF: invisible and caret-stable in every major text layout engine.
pub const CURSOR_ANCHOR: char = '\u{FEFF}';

pub fn strip(text: &str) -> String {
    if !text.contains(CURSOR_ANCHOR) {
        return text.to_string();
    }
    text.chars().filter(|&c| c != CURSOR_ANCHOR).collect()
}

/// True when the run consists of nothing but anchor characters. Such runs
/// are pure editor furniture: they hold no model text and occupy no model
/// child slot.
pub fn is_anchor_only(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c == CURSOR_ANCHOR)
}

/// Rendered (visible-character) length: anchors excluded.
pub fn rendered_len(text: &str) -> usize {
    text.chars().filter(|&c| c != CURSOR_ANCHOR).count()
}

/// Rendered length of the first `raw_chars` characters of `text`.
///
/// This is the codec's offset rule: a caret offset read out of the rendered
/// view is a raw character offset into the run, and the model offset is the
/// rendered length of the prefix before it.
pub fn rendered_prefix_len(text: &str, raw_chars: usize) -> usize {
    text.chars()
        .take(raw_chars)
        .filter(|&c| c != CURSOR_ANCHOR)
        .count()
}

/// Inverse of [`rendered_prefix_len`]: the raw character offset addressing
/// the point `rendered` visible characters into `text`. Anchors at the
/// boundary are consumed, so a caret restored from a model offset always
/// lands *after* any anchor sitting at that position.
pub fn raw_offset_for_rendered(text: &str, rendered: usize) -> usize {
    let mut seen = 0;
    let mut raw = 0;
    for c in text.chars() {
        if seen >= rendered && c != CURSOR_ANCHOR {
            break;
        }
        raw += 1;
        if c != CURSOR_ANCHOR {
            seen += 1;
        }
    }
    raw
}

/// Whitespace test used by the un-bound artifact fallback: anchors do not
/// count as content, and an empty run is treated as whitespace.
pub fn is_whitespace_artifact_text(text: &str) -> bool {
    text.chars()
        .filter(|&c| c != CURSOR_ANCHOR)
        .all(char::is_whitespace)
}
