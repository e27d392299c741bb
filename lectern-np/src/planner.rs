//! Chunk planner
//!
//! Splits lesson text into the ordered sequence of speakable units submitted
//! to the synthesis client. The first paragraph is further split at its first
//! sentence terminator so the opening chunk is short, which bounds the time
//! to first audible output by one short synthesis round-trip instead of the
//! whole document.

/// An ordered, immutable unit of source text submitted as one synthesis
/// request. Created once per session by the planner; consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of this chunk in document order
    pub index: usize,
    /// Text submitted to synthesis
    pub text: String,
}

/// Split source text into speakable chunks.
///
/// Rules:
/// - Paragraphs are separated by blank lines and kept in document order.
/// - The first paragraph's leading sentence (up to the first `.`, `!` or `?`)
///   becomes chunk 0; the paragraph remainder, if any, becomes chunk 1.
/// - Empty and whitespace-only segments are dropped.
///
/// Empty input yields an empty plan. Callers treat that as a no-op, not an
/// error.
pub fn plan_chunks(text: &str) -> Vec<TextChunk> {
    let paragraphs = split_paragraphs(text);

    let mut pieces: Vec<String> = Vec::with_capacity(paragraphs.len() + 1);
    for (i, paragraph) in paragraphs.into_iter().enumerate() {
        if i == 0 {
            let (first_sentence, remainder) = split_leading_sentence(&paragraph);
            pieces.push(first_sentence);
            if let Some(rest) = remainder {
                pieces.push(rest);
            }
        } else {
            pieces.push(paragraph);
        }
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, text)| TextChunk { index, text })
        .collect()
}

/// Split text into paragraphs on blank-line boundaries, dropping segments
/// that contain no visible characters.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.trim().is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }

    if !current.trim().is_empty() {
        paragraphs.push(current);
    }

    paragraphs
}

/// Split a paragraph at its first sentence terminator.
///
/// Returns the leading sentence (terminator included) and the remainder when
/// the remainder still has visible characters. A paragraph without a
/// terminator, or with nothing after it, is returned whole.
fn split_leading_sentence(paragraph: &str) -> (String, Option<String>) {
    match paragraph.find(|c| matches!(c, '.' | '!' | '?')) {
        Some(idx) => {
            // Terminators are single-byte, so idx + 1 stays on a char boundary
            let (first, rest) = paragraph.split_at(idx + 1);
            if rest.trim().is_empty() {
                (paragraph.to_string(), None)
            } else {
                (first.to_string(), Some(rest.to_string()))
            }
        }
        None => (paragraph.to_string(), None),
    }
}
