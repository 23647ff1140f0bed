use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::ChunkError;
use crate::pipeline::{DocumentFailure, DocumentOutput};
use crate::tagger::ChunkRecord;

/// Everything produced for one book, documents in source order
#[derive(Debug, Default)]
pub struct BookReport {
    pub book_key: String,
    pub outputs: Vec<DocumentOutput>,
    pub failures: Vec<DocumentFailure>,
}

impl BookReport {
    pub fn records(&self) -> impl Iterator<Item = &ChunkRecord> {
        self.outputs.iter().flat_map(|o| o.records.iter())
    }

    pub fn warning_count(&self) -> usize {
        self.outputs.iter().map(|o| o.warnings.len()).sum()
    }
}

/// Chunk and token statistics for one book
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookStats {
    pub book_key: String,
    pub documents: usize,
    pub failed: usize,
    pub chunks: usize,
    pub min_tokens: usize,
    pub median_tokens: usize,
    pub max_tokens: usize,
    pub total_tokens: usize,
    pub oversized: usize,
    pub dropped: usize,
    pub warnings: usize,
}

impl BookStats {
    pub fn from_report(report: &BookReport) -> Self {
        let mut tokens: Vec<usize> = report.records().map(|r| r.tokens_est).collect();
        tokens.sort_unstable();

        Self {
            book_key: report.book_key.clone(),
            documents: report.outputs.len() + report.failures.len(),
            failed: report.failures.len(),
            chunks: tokens.len(),
            min_tokens: tokens.first().copied().unwrap_or(0),
            median_tokens: tokens.get(tokens.len() / 2).copied().unwrap_or(0),
            max_tokens: tokens.last().copied().unwrap_or(0),
            total_tokens: tokens.iter().sum(),
            oversized: report.outputs.iter().map(|o| o.oversized).sum(),
            dropped: report.outputs.iter().map(|o| o.dropped).sum(),
            warnings: report.warning_count(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub generator: String,
    pub created_at: String,
    pub max_tokens: usize,
    pub books: Vec<BookStats>,
    pub sources: Vec<SourceEntry>,
}

/// Provenance of one processed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub book_key: String,
    pub source_file: String,
    pub sha256: String,
    pub chunks: usize,
}

impl Manifest {
    pub fn new(reports: &[BookReport], max_tokens: usize) -> Self {
        Self {
            generator: format!("mathchunk v{}", env!("CARGO_PKG_VERSION")),
            created_at: Utc::now().to_rfc3339(),
            max_tokens,
            books: reports.iter().map(BookStats::from_report).collect(),
            sources: reports
                .iter()
                .flat_map(|r| r.outputs.iter())
                .map(|o| SourceEntry {
                    book_key: o.book_key.clone(),
                    source_file: o.source_file.clone(),
                    sha256: o.sha256.clone(),
                    chunks: o.records.len(),
                })
                .collect(),
        }
    }
}

/// Write records as JSON Lines, returning how many were written
pub fn write_jsonl<'a, W, I>(mut writer: W, records: I) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a ChunkRecord>,
{
    let mut count = 0;
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

fn write_file<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a ChunkRecord>,
) -> Result<usize, ChunkError> {
    let io_err = |source| ChunkError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    write_jsonl(BufWriter::new(file), records).map_err(io_err)
}

/// Output files written for a run
#[derive(Debug)]
pub struct Written {
    pub books: Vec<PathBuf>,
    pub combined: Option<PathBuf>,
    pub manifest: PathBuf,
}

/// Write `<book_key>.jsonl` per book, `all.jsonl` when `combined`, and
/// `manifest.json` into `out_dir`.
pub fn write_outputs(
    out_dir: &Path,
    reports: &[BookReport],
    max_tokens: usize,
    combined: bool,
) -> Result<Written, ChunkError> {
    fs::create_dir_all(out_dir).map_err(|source| ChunkError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut books = Vec::with_capacity(reports.len());
    for report in reports {
        let path = out_dir.join(format!("{}.jsonl", report.book_key));
        let count = write_file(&path, report.records())?;
        tracing::debug!(book = %report.book_key, chunks = count, path = %path.display(), "wrote book");
        books.push(path);
    }

    let combined = if combined {
        let path = out_dir.join("all.jsonl");
        let count = write_file(&path, reports.iter().flat_map(|r| r.records()))?;
        tracing::info!(chunks = count, path = %path.display(), "wrote combined output");
        Some(path)
    } else {
        None
    };

    let manifest_path = out_dir.join("manifest.json");
    let manifest = Manifest::new(reports, max_tokens);
    let json = serde_json::to_string_pretty(&manifest).map_err(|e| ChunkError::Io {
        path: manifest_path.clone(),
        source: e.into(),
    })?;
    fs::write(&manifest_path, json).map_err(|source| ChunkError::Io {
        path: manifest_path.clone(),
        source,
    })?;

    Ok(Written {
        books,
        combined,
        manifest: manifest_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(
        book_key: &str,
        chapter: &str,
        chunk_id: usize,
        text: &str,
        tokens: usize,
    ) -> ChunkRecord {
        ChunkRecord {
            text: text.to_string(),
            book: format!("Book {book_key}"),
            book_key: book_key.to_string(),
            subject: "s".to_string(),
            level: "l".to_string(),
            part: String::new(),
            chapter: chapter.to_string(),
            section: String::new(),
            source_file: "01_a.md".to_string(),
            chunk_id,
            tokens_est: tokens,
        }
    }

    fn output(book_key: &str, records: Vec<ChunkRecord>) -> DocumentOutput {
        DocumentOutput {
            book_key: book_key.to_string(),
            source_file: "01_a.md".to_string(),
            records,
            warnings: Vec::new(),
            oversized: 0,
            dropped: 0,
            sha256: "00".to_string(),
        }
    }

    fn report(book_key: &str, tokens: &[usize]) -> BookReport {
        let records = tokens
            .iter()
            .enumerate()
            .map(|(i, &t)| record(book_key, "Ch", i, "x", t))
            .collect();
        BookReport {
            book_key: book_key.to_string(),
            outputs: vec![output(book_key, records)],
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_write_jsonl_unescaped() {
        let records = vec![record("a", "Gröbner", 0, "∀x ∈ G, $x^2$\nnext", 5)];
        let mut buf = Vec::new();
        let count = write_jsonl(&mut buf, &records).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(count, 1);
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("∀x ∈ G"));
        assert!(text.contains("Gröbner"));

        let back: ChunkRecord = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(back, records[0]);
    }

    #[test]
    fn test_stats() {
        let stats = BookStats::from_report(&report("a", &[30, 10, 50, 20]));

        assert_eq!(stats.chunks, 4);
        assert_eq!(stats.min_tokens, 10);
        assert_eq!(stats.median_tokens, 30);
        assert_eq!(stats.max_tokens, 50);
        assert_eq!(stats.total_tokens, 110);
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn test_stats_empty_book() {
        let stats = BookStats::from_report(&BookReport {
            book_key: "a".to_string(),
            ..BookReport::default()
        });
        assert_eq!(stats.chunks, 0);
        assert_eq!(stats.median_tokens, 0);
    }

    #[test]
    fn test_write_outputs() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        let reports = vec![report("b", &[1, 2]), report("a", &[3])];

        let written = write_outputs(&out, &reports, 512, true).unwrap();

        let b = fs::read_to_string(out.join("b.jsonl")).unwrap();
        let a = fs::read_to_string(out.join("a.jsonl")).unwrap();
        let all = fs::read_to_string(out.join("all.jsonl")).unwrap();
        assert_eq!(b.lines().count(), 2);
        assert_eq!(a.lines().count(), 1);
        assert_eq!(all, format!("{b}{a}"));
        assert_eq!(written.books.len(), 2);
        assert_eq!(written.combined, Some(out.join("all.jsonl")));

        let manifest: Manifest =
            serde_json::from_str(&fs::read_to_string(&written.manifest).unwrap()).unwrap();
        assert_eq!(manifest.max_tokens, 512);
        assert_eq!(manifest.books.len(), 2);
        assert_eq!(manifest.books[0].book_key, "b");
        assert_eq!(manifest.sources.len(), 2);
        assert_eq!(manifest.sources[0].chunks, 2);
        assert!(manifest.generator.starts_with("mathchunk v"));
        assert!(chrono::DateTime::parse_from_rfc3339(&manifest.created_at).is_ok());
    }

    #[test]
    fn test_write_outputs_without_combined() {
        let tmp = TempDir::new().unwrap();
        let written = write_outputs(tmp.path(), &[report("a", &[3])], 512, false).unwrap();

        assert!(written.combined.is_none());
        assert!(!tmp.path().join("all.jsonl").exists());
        assert!(tmp.path().join("a.jsonl").exists());
    }
}
