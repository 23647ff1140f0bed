use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ChunkError;

/// A markdown file belonging to one book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub book_key: String,
    /// File name within the book directory
    pub source_file: String,
    pub path: PathBuf,
}

impl SourceFile {
    pub fn read(&self) -> Result<String, ChunkError> {
        fs::read_to_string(&self.path).map_err(|source| ChunkError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Check if a directory entry should be skipped
pub fn should_ignore(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    if name.starts_with('.') {
        return true;
    }
    !path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

/// Collect `<input>/<book_key>/*.md`, sorted by file name.
///
/// A missing book directory yields no files.
pub fn collect_book(input: &Path, book_key: &str) -> Result<Vec<SourceFile>, ChunkError> {
    let dir = input.join(book_key);
    if !dir.is_dir() {
        tracing::warn!(book = book_key, dir = %dir.display(), "book directory not found, skipping");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().map_or_else(|| dir.clone(), Path::to_path_buf);
            ChunkError::Io {
                path,
                source: io::Error::from(e),
            }
        })?;

        let path = entry.path();
        if !entry.file_type().is_file() || should_ignore(path) {
            continue;
        }

        files.push(SourceFile {
            book_key: book_key.to_string(),
            source_file: entry.file_name().to_string_lossy().into_owned(),
            path: path.to_path_buf(),
        });
    }

    tracing::debug!(book = book_key, files = files.len(), "collected sources");
    Ok(files)
}

/// SHA-256 of `bytes`, hex encoded
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
