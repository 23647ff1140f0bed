use crate::scanner::{Block, BlockKind, HeadingLevel};
use crate::tokens::{estimate_tokens, tokens_for_chars};

use super::splitter::split_paragraph;
use super::{Chunk, HeadingContext, SEPARATOR};

/// Pack blocks into chunks under `max_tokens`:
/// - Greedily batch consecutive blocks while the joined text fits
/// - Start a new batch at every chapter heading
/// - Split oversized paragraphs at blank lines, then lines, then sentences
/// - Emit oversized headings, environments and math blocks whole
pub fn assemble_blocks(blocks: &[Block], max_tokens: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut context = HeadingContext::default();
    let mut batch = Batch::default();

    for (idx, block) in blocks.iter().enumerate() {
        if block.is_chapter_heading() {
            batch.flush(&mut chunks, max_tokens);
        }
        update_context(&mut context, block);

        let block_tokens = estimate_tokens(&block.text);

        if block_tokens > max_tokens {
            batch.flush(&mut chunks, max_tokens);

            if block.splittable() {
                chunks.extend(split_paragraph(block, idx, &context, max_tokens));
            } else {
                chunks.push(Chunk::new(
                    block.text.clone(),
                    block.start_offset..block.end_offset,
                    idx..idx + 1,
                    vec![block.kind],
                    &context,
                    max_tokens,
                ));
            }
            continue;
        }

        if batch.would_exceed(block, max_tokens) {
            batch.flush(&mut chunks, max_tokens);
        }

        batch.push(idx, block, &context);
    }

    batch.flush(&mut chunks, max_tokens);
    chunks
}

fn update_context(context: &mut HeadingContext, block: &Block) {
    let Some(title) = block.heading_title() else {
        return;
    };
    match block.kind {
        BlockKind::Heading(HeadingLevel::Chapter) => {
            context.chapter = title.to_string();
            context.section.clear();
        }
        BlockKind::Heading(HeadingLevel::Section) => {
            context.section = title.to_string();
        }
        _ => {}
    }
}

/// Blocks waiting to be joined into one chunk
#[derive(Default)]
struct Batch<'a> {
    blocks: Vec<(usize, &'a Block)>,
    chars: usize,
    context: HeadingContext,
}

impl<'a> Batch<'a> {
    fn would_exceed(&self, block: &Block, max_tokens: usize) -> bool {
        if self.blocks.is_empty() {
            return false;
        }
        let chars = self.chars + SEPARATOR.len() + block.text.chars().count();
        tokens_for_chars(chars) > max_tokens
    }

    fn push(&mut self, idx: usize, block: &'a Block, context: &HeadingContext) {
        if self.blocks.is_empty() {
            self.context = context.clone();
        } else {
            self.chars += SEPARATOR.len();
        }
        self.chars += block.text.chars().count();
        self.blocks.push((idx, block));
    }

    fn flush(&mut self, chunks: &mut Vec<Chunk>, max_tokens: usize) {
        let (Some(&(first_idx, first)), Some(&(last_idx, last))) =
            (self.blocks.first(), self.blocks.last())
        else {
            return;
        };

        let mut kinds = Vec::new();
        for (_, block) in &self.blocks {
            if !kinds.contains(&block.kind) {
                kinds.push(block.kind);
            }
        }

        let text = self
            .blocks
            .iter()
            .map(|(_, b)| b.text.as_str())
            .collect::<Vec<_>>()
            .join(SEPARATOR);

        chunks.push(Chunk::new(
            text,
            first.start_offset..last.end_offset,
            first_idx..last_idx + 1,
            kinds,
            &self.context,
            max_tokens,
        ));

        self.blocks.clear();
        self.chars = 0;
    }
}
