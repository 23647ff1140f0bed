use crate::tokens::tokens_for_chars;

use super::{Chunk, SEPARATOR};

/// Coalesce adjacent chunks of the same chapter while the result fits.
///
/// Single first-fit pass: each chunk absorbs its successors until one does
/// not fit or belongs to another chapter. Oversized chunks never merge.
/// The output is a fixed point of this function.
pub fn merge_chunks(chunks: Vec<Chunk>, max_tokens: usize) -> Vec<Chunk> {
    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        match merged.last_mut() {
            Some(prev) if can_merge(prev, &chunk, max_tokens) => absorb(prev, chunk),
            _ => merged.push(chunk),
        }
    }

    merged
}

fn can_merge(prev: &Chunk, next: &Chunk, max_tokens: usize) -> bool {
    !prev.is_oversized()
        && !next.is_oversized()
        && prev.metadata.chapter == next.metadata.chapter
        && tokens_for_chars(prev.metadata.char_count + SEPARATOR.len() + next.metadata.char_count)
            <= max_tokens
}

fn absorb(prev: &mut Chunk, next: Chunk) {
    prev.text.push_str(SEPARATOR);
    prev.text.push_str(&next.text);

    let meta = &mut prev.metadata;
    meta.char_count += SEPARATOR.len() + next.metadata.char_count;
    meta.token_count = tokens_for_chars(meta.char_count);
    meta.end_offset = next.metadata.end_offset;
    meta.blocks.end = meta.blocks.end.max(next.metadata.blocks.end);
    for kind in next.metadata.kinds {
        if !meta.kinds.contains(&kind) {
            meta.kinds.push(kind);
        }
    }
}
