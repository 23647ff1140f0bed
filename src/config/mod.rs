//! Run configuration and the per-book catalog.
//!
//! Loaded from TOML. Every section has defaults, so an empty file is a
//! valid configuration (with no books).


use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::chunker::DEFAULT_MAX_TOKENS;
use crate::error::ChunkError;
use crate::scanner::ScannerConfig;

const BUILTIN_CATALOG: &str = include_str!("books.toml");

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Chunking parameters
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Block scanner parameters
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Book catalog keyed by book_key
    #[serde(default)]
    pub books: BTreeMap<String, BookConfig>,
}

/// Chunk size settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Token budget per chunk
    pub max_tokens: usize,

    /// Drop finished chunks estimated below this many tokens (0 keeps all)
    pub drop_below: usize,

    /// Strip cross-reference artifacts before scanning
    pub preclean: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            drop_below: 0,
            preclean: false,
        }
    }
}

/// Static metadata for one source book
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookConfig {
    /// Display title
    pub book: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub parts: PartMapping,
}

/// Where each chapter sits in the book's part structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartMapping {
    /// Source file name -> part
    #[serde(default)]
    pub by_file: BTreeMap<String, String>,

    /// Chapter title -> part
    #[serde(default)]
    pub by_chapter: BTreeMap<String, String>,

    /// Part for anything not mapped above
    #[serde(default)]
    pub default: Option<String>,
}

impl PartMapping {
    /// Look up the part for a chunk.
    ///
    /// Tries the file name, then the file stem without its numeric ordering
    /// prefix (`05_grp-intro.md` -> `grp-intro`), then the chapter title,
    /// then the default.
    pub fn lookup(&self, source_file: &str, chapter: &str) -> Option<&str> {
        self.by_file
            .get(source_file)
            .or_else(|| self.by_file.get(file_stem(source_file)))
            .or_else(|| self.by_chapter.get(chapter))
            .map(String::as_str)
            .or(self.default.as_deref())
    }

    /// Whether this book declares any part structure at all
    pub fn is_declared(&self) -> bool {
        !self.by_file.is_empty() || !self.by_chapter.is_empty() || self.default.is_some()
    }
}

/// `05_grp-intro.md` -> `grp-intro`
fn file_stem(source_file: &str) -> &str {
    let name = source_file.rsplit('/').next().unwrap_or(source_file);
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    match stem.split_once('_') {
        Some((prefix, rest)) if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) => {
            rest
        }
        _ => stem,
    }
}

impl Config {
    /// Catalog of the known source books with default chunking settings
    pub fn builtin() -> Result<Self, ChunkError> {
        Self::from_toml(BUILTIN_CATALOG)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(text: &str) -> Result<Self, ChunkError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML config file
    pub fn load(path: &Path) -> Result<Self, ChunkError> {
        let text = fs::read_to_string(path).map_err(|source| ChunkError::Io {
            path: PathBuf::from(path),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.chunking.max_tokens == 0 {
            return Err(ChunkError::InvalidConfig(
                "max_tokens must be at least 1".to_string(),
            ));
        }

        for (key, book) in &self.books {
            if key.trim().is_empty() {
                return Err(ChunkError::InvalidConfig("empty book_key".to_string()));
            }
            if book.book.trim().is_empty() {
                return Err(ChunkError::InvalidConfig(format!(
                    "book {:?} has no title",
                    key
                )));
            }
        }

        Ok(())
    }

    /// Metadata for `book_key`
    pub fn book(&self, book_key: &str) -> Result<&BookConfig, ChunkError> {
        self.books
            .get(book_key)
            .ok_or_else(|| ChunkError::UnknownBook(book_key.to_string()))
    }

    /// All book keys in catalog order
    pub fn book_keys(&self) -> impl Iterator<Item = &str> {
        self.books.keys().map(String::as_str)
    }
}
