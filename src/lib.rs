// Public API exports
pub mod chunker;
pub mod clean;
pub mod config;
pub mod emitter;
pub mod error;
pub mod pipeline;
pub mod scanner;
pub mod source;
pub mod tagger;
pub mod telemetry;
pub mod tokens;

// Re-export main types for convenience
pub use chunker::{
    assemble_blocks, merge_chunks, Chunk, ChunkMetadata, HeadingContext, DEFAULT_MAX_TOKENS,
};
pub use config::{BookConfig, ChunkingConfig, Config, PartMapping};
pub use emitter::{write_jsonl, write_outputs, BookReport, BookStats, Manifest};
pub use error::{ChunkError, Warning};
pub use pipeline::{Document, DocumentFailure, DocumentOutput, Pipeline};
pub use scanner::{Block, BlockKind, HeadingLevel, ScanResult, Scanner, ScannerConfig};
pub use source::{collect_book, SourceFile};
pub use tagger::{ChunkRecord, Tagger};
pub use tokens::estimate_tokens;
