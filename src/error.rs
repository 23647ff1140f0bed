use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Unknown book: {0}")]
    UnknownBook(String),
}

/// Non-fatal structural problems found while chunking a document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    #[error("unterminated display math opened at line {line}; extended to end of document")]
    UnterminatedMath { line: usize },

    #[error("no part mapping for chapter {chapter:?}")]
    UnmappedPart { chapter: String },

    #[error("content before the first chapter heading has no chapter context")]
    MissingHeadingContext,
}
