mod assembler;
mod merger;
mod splitter;


pub use assembler::assemble_blocks;
pub use merger::merge_chunks;

use std::ops::Range;

use crate::scanner::BlockKind;
use crate::tokens::tokens_for_chars;

/// Default token budget per chunk
pub const DEFAULT_MAX_TOKENS: usize = 1536;

/// Joins constituent blocks inside a chunk
pub const SEPARATOR: &str = "\n\n";

/// A chunk of text ready for tagging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The text content of this chunk
    pub text: String,
    /// Metadata about the chunk
    pub metadata: ChunkMetadata,
}

/// Positional metadata for a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// Estimated token count of `text`
    pub token_count: usize,
    /// Character count of `text`
    pub char_count: usize,
    /// Byte offset in original document (start)
    pub start_offset: usize,
    /// Byte offset in original document (end)
    pub end_offset: usize,
    /// Indices of the blocks this chunk draws from
    pub blocks: Range<usize>,
    /// Block kinds included in this chunk, in first-seen order
    pub kinds: Vec<BlockKind>,
    /// Chapter heading in effect at the first block
    pub chapter: String,
    /// Section heading in effect at the first block
    pub section: String,
    /// Exceeds the budget because it could not be divided further
    pub oversized: bool,
}

impl Chunk {
    pub(crate) fn new(
        text: String,
        offsets: Range<usize>,
        blocks: Range<usize>,
        kinds: Vec<BlockKind>,
        context: &HeadingContext,
        max_tokens: usize,
    ) -> Self {
        let char_count = text.chars().count();
        let token_count = tokens_for_chars(char_count);
        Self {
            text,
            metadata: ChunkMetadata {
                token_count,
                char_count,
                start_offset: offsets.start,
                end_offset: offsets.end,
                blocks,
                kinds,
                chapter: context.chapter.clone(),
                section: context.section.clone(),
                oversized: token_count > max_tokens,
            },
        }
    }

    pub fn token_count(&self) -> usize {
        self.metadata.token_count
    }

    pub fn is_oversized(&self) -> bool {
        self.metadata.oversized
    }
}

/// Nearest enclosing headings while walking a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadingContext {
    pub chapter: String,
    pub section: String,
}
