use crate::error::Warning;

/// Result of scanning one document
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Blocks in source order, gap-free up to whitespace
    pub blocks: Vec<Block>,
    /// Structural warnings found while scanning
    pub warnings: Vec<Warning>,
}

/// An atomic structural unit of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Exact source text, delimiters included
    pub text: String,
    /// Byte offset in the scanned text (start)
    pub start_offset: usize,
    /// Byte offset in the scanned text (end, exclusive)
    pub end_offset: usize,
    /// Structural type of this block
    pub kind: BlockKind,
}

/// Classification of blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// `## Title` or `### Title` line
    Heading(HeadingLevel),
    /// Theorem, definition, proof, ... marker plus its body
    Environment,
    /// Display math from opening to closing delimiter
    MathBlock,
    /// Ordinary prose, possibly with inline math
    Paragraph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadingLevel {
    /// Depth-2 heading
    Chapter,
    /// Depth-3 heading
    Section,
}

impl HeadingLevel {
    pub fn from_depth(depth: usize) -> Option<Self> {
        match depth {
            2 => Some(HeadingLevel::Chapter),
            3 => Some(HeadingLevel::Section),
            _ => None,
        }
    }
}

impl Block {
    /// Only paragraphs may be divided across chunks
    pub fn splittable(&self) -> bool {
        matches!(self.kind, BlockKind::Paragraph)
    }

    /// Heading title with the marker stripped, `None` for other kinds
    pub fn heading_title(&self) -> Option<&str> {
        match self.kind {
            BlockKind::Heading(_) => Some(self.text.trim_start_matches('#').trim()),
            _ => None,
        }
    }

    pub fn is_chapter_heading(&self) -> bool {
        self.kind == BlockKind::Heading(HeadingLevel::Chapter)
    }
}
