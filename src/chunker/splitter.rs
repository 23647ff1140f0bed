use std::ops::Range;

use crate::scanner::Block;
use crate::tokens::estimate_tokens;

use super::{Chunk, HeadingContext};

/// Split points tried in order, coarsest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    BlankLine,
    LineBreak,
    Sentence,
}

impl Boundary {
    fn finer(self) -> Option<Self> {
        match self {
            Boundary::BlankLine => Some(Boundary::LineBreak),
            Boundary::LineBreak => Some(Boundary::Sentence),
            Boundary::Sentence => None,
        }
    }

    /// Non-empty, whitespace-trimmed segments of `text` at this boundary.
    ///
    /// `text` starts at `base` within the paragraph. Split points that fall
    /// inside a `math` span are dropped.
    fn segments(self, text: &str, base: usize, math: &[Range<usize>]) -> Vec<Range<usize>> {
        let segments = match self {
            Boundary::BlankLine => blank_line_segments(text),
            Boundary::LineBreak => line_segments(text),
            Boundary::Sentence => sentence_segments(text),
        };
        join_across_math(segments, base, math)
    }
}

/// Split an oversized paragraph block into pieces of at most `max_tokens`.
///
/// Each piece is an exact slice of the paragraph, so the original spacing
/// inside a piece survives. A piece with no split point left is kept whole.
pub(super) fn split_paragraph(
    block: &Block,
    block_idx: usize,
    context: &HeadingContext,
    max_tokens: usize,
) -> Vec<Chunk> {
    let math = math_spans(&block.text);
    let mut pieces = Vec::new();
    pack(&block.text, 0, Boundary::BlankLine, max_tokens, &math, &mut pieces);
    debug_assert!(!pieces.is_empty(), "paragraph produced no pieces");

    pieces
        .into_iter()
        .map(|range| {
            Chunk::new(
                block.text[range.clone()].to_string(),
                block.start_offset + range.start..block.start_offset + range.end,
                block_idx..block_idx + 1,
                vec![block.kind],
                context,
                max_tokens,
            )
        })
        .collect()
}

/// Greedily pack segments of `text` into ranges (relative to the block) that fit
fn pack(
    text: &str,
    base: usize,
    boundary: Boundary,
    max_tokens: usize,
    math: &[Range<usize>],
    out: &mut Vec<Range<usize>>,
) {
    let segments = boundary.segments(text, base, math);

    if segments.len() <= 1 {
        let whole = segments.into_iter().next().unwrap_or(0..text.len());
        match boundary.finer() {
            Some(finer) => pack(
                &text[whole.clone()],
                base + whole.start,
                finer,
                max_tokens,
                math,
                out,
            ),
            None => out.push(base + whole.start..base + whole.end),
        }
        return;
    }

    let mut current: Option<Range<usize>> = None;

    for segment in segments {
        // A single segment that is too big goes down a level
        if estimate_tokens(&text[segment.clone()]) > max_tokens {
            if let Some(range) = current.take() {
                out.push(base + range.start..base + range.end);
            }
            match boundary.finer() {
                Some(finer) => pack(
                    &text[segment.clone()],
                    base + segment.start,
                    finer,
                    max_tokens,
                    math,
                    out,
                ),
                None => out.push(base + segment.start..base + segment.end),
            }
            continue;
        }

        current = match current {
            Some(range) if estimate_tokens(&text[range.start..segment.end]) <= max_tokens => {
                Some(range.start..segment.end)
            }
            Some(range) => {
                out.push(base + range.start..base + range.end);
                Some(segment)
            }
            None => Some(segment),
        };
    }

    if let Some(range) = current {
        out.push(base + range.start..base + range.end);
    }
}

/// Runs of non-blank lines
fn blank_line_segments(text: &str) -> Vec<Range<usize>> {
    let mut segments = Vec::new();
    let mut current: Option<Range<usize>> = None;
    let mut offset = 0;

    for raw in text.split_inclusive('\n') {
        let content = raw.trim_end();
        if content.trim().is_empty() {
            segments.extend(current.take());
        } else {
            let start = offset + (content.len() - content.trim_start().len());
            let end = offset + content.len();
            current = Some(match current {
                Some(range) => range.start..end,
                None => start..end,
            });
        }
        offset += raw.len();
    }

    segments.extend(current);
    segments
}

/// Individual non-blank lines
fn line_segments(text: &str) -> Vec<Range<usize>> {
    let mut segments = Vec::new();
    let mut offset = 0;

    for raw in text.split_inclusive('\n') {
        if let Some(range) = trimmed(raw, offset) {
            segments.push(range);
        }
        offset += raw.len();
    }

    segments
}

/// Sentences ending in `.`, `!` or `?` followed by whitespace
fn sentence_segments(text: &str) -> Vec<Range<usize>> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next_idx, next)) = chars.peek() {
            if next.is_whitespace() {
                segments.extend(trimmed(&text[start..next_idx], start));
                start = next_idx;
            }
        }
    }

    segments.extend(trimmed(&text[start..], start));
    segments
}

/// Byte ranges of `$$...$$`, `\[...\]` and inline `$...$` in a paragraph.
///
/// Unclosed display math runs to the end of the text. An unclosed `$` is a
/// literal dollar, and inline math never crosses a blank line.
fn math_spans(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let display = match (bytes[i], bytes.get(i + 1).copied()) {
            (b'$', Some(b'$')) => Some("$$"),
            (b'\\', Some(b'[')) => Some("\\]"),
            (b'\\', _) => {
                i += 2;
                continue;
            }
            (b'$', _) => {
                match inline_math_end(text, i + 1) {
                    Some(end) => {
                        spans.push(i..end);
                        i = end;
                    }
                    None => i += 1,
                }
                continue;
            }
            _ => None,
        };

        match display {
            Some(close) => {
                let end = text[i + 2..]
                    .find(close)
                    .map_or(text.len(), |pos| i + 2 + pos + close.len());
                spans.push(i..end);
                i = end;
            }
            None => i += 1,
        }
    }

    spans
}

/// End (past the closing `$`) of inline math whose body starts at `from`
fn inline_math_end(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut j = from;

    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'$' => return Some(j + 1),
            b'\n' if text[j + 1..]
                .trim_start_matches([' ', '\t', '\r'])
                .starts_with('\n') =>
            {
                return None;
            }
            _ => j += 1,
        }
    }

    None
}

/// Merge neighbouring segments whose split point lies inside a math span.
///
/// Segments are relative to a slice starting at `base`; spans are relative
/// to the whole paragraph.
fn join_across_math(
    segments: Vec<Range<usize>>,
    base: usize,
    math: &[Range<usize>],
) -> Vec<Range<usize>> {
    let mut joined: Vec<Range<usize>> = Vec::with_capacity(segments.len());

    for segment in segments {
        match joined.last_mut() {
            Some(prev)
                if math
                    .iter()
                    .any(|m| m.start < base + prev.end && base + segment.start < m.end) =>
            {
                prev.end = segment.end;
            }
            _ => joined.push(segment),
        }
    }

    joined
}

/// Range of `piece` without surrounding whitespace, offset by `base`
fn trimmed(piece: &str, base: usize) -> Option<Range<usize>> {
    let lead = piece.len() - piece.trim_start().len();
    let body = piece.trim();
    if body.is_empty() {
        None
    } else {
        Some(base + lead..base + lead + body.len())
    }
}
