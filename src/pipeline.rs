//! Per-document chunking and the parallel run over a corpus.
//!
//! A document flows: preclean (optional) -> scan -> assemble -> merge ->
//! small-chunk filter -> tag. Every step is a pure function of the text and
//! the read-only [`Config`].

use rayon::prelude::*;

use crate::chunker::{assemble_blocks, merge_chunks};
use crate::clean::Precleaner;
use crate::config::Config;
use crate::error::{ChunkError, Warning};
use crate::scanner::Scanner;
use crate::source::{hash_bytes, SourceFile};
use crate::tagger::{ChunkRecord, Tagger};

/// One markdown document of a book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub book_key: String,
    pub source_file: String,
    pub text: String,
}

/// Tagged chunks of one document plus what went wrong along the way
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOutput {
    pub book_key: String,
    pub source_file: String,
    pub records: Vec<ChunkRecord>,
    pub warnings: Vec<Warning>,
    /// Chunks over budget because they could not be split further
    pub oversized: usize,
    /// Chunks removed by the small-chunk filter
    pub dropped: usize,
    /// SHA-256 of the document text
    pub sha256: String,
}

/// A document that could not be processed
#[derive(Debug)]
pub struct DocumentFailure {
    pub book_key: String,
    pub source_file: String,
    pub error: ChunkError,
}

pub type DocumentResult = Result<DocumentOutput, DocumentFailure>;

pub struct Pipeline {
    config: Config,
    scanner: Scanner,
    precleaner: Option<Precleaner>,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self, ChunkError> {
        config.validate()?;
        let scanner = Scanner::new(&config.scanner)?;
        let precleaner = if config.chunking.preclean {
            Some(Precleaner::new()?)
        } else {
            None
        };

        Ok(Self {
            config,
            scanner,
            precleaner,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Chunk and tag one document
    pub fn process(&self, doc: &Document) -> Result<DocumentOutput, ChunkError> {
        let book = self.config.book(&doc.book_key)?;
        let max_tokens = self.config.chunking.max_tokens;

        let cleaned;
        let text = match &self.precleaner {
            Some(precleaner) => {
                cleaned = precleaner.clean(&doc.text);
                cleaned.as_str()
            }
            None => doc.text.as_str(),
        };

        let scan = self.scanner.scan(text);
        let mut warnings = scan.warnings;

        let chunks = merge_chunks(assemble_blocks(&scan.blocks, max_tokens), max_tokens);

        let drop_below = self.config.chunking.drop_below;
        let before = chunks.len();
        let chunks: Vec<_> = chunks
            .into_iter()
            .filter(|c| c.token_count() >= drop_below)
            .collect();
        let dropped = before - chunks.len();
        let oversized = chunks.iter().filter(|c| c.is_oversized()).count();

        let records = Tagger::new(&doc.book_key, book).tag(&doc.source_file, chunks, &mut warnings);

        for warning in &warnings {
            tracing::warn!(book = %doc.book_key, file = %doc.source_file, "{}", warning);
        }
        tracing::debug!(
            book = %doc.book_key,
            file = %doc.source_file,
            blocks = scan.blocks.len(),
            chunks = records.len(),
            oversized,
            dropped,
            "chunked document"
        );

        Ok(DocumentOutput {
            book_key: doc.book_key.clone(),
            source_file: doc.source_file.clone(),
            records,
            warnings,
            oversized,
            dropped,
            sha256: hash_bytes(doc.text.as_bytes()),
        })
    }

    /// Read and process source files in parallel.
    ///
    /// Results come back in input order. A failure affects only its own
    /// document.
    pub fn process_sources(&self, sources: &[SourceFile]) -> Vec<DocumentResult> {
        sources
            .par_iter()
            .map(|source| {
                let failed = |error: ChunkError| {
                    tracing::error!(book = %source.book_key, file = %source.source_file, "{}", error);
                    DocumentFailure {
                        book_key: source.book_key.clone(),
                        source_file: source.source_file.clone(),
                        error,
                    }
                };

                let text = source.read().map_err(failed)?;
                let doc = Document {
                    book_key: source.book_key.clone(),
                    source_file: source.source_file.clone(),
                    text,
                };
                self.process(&doc).map_err(failed)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BookConfig, PartMapping};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config(max_tokens: usize) -> Config {
        let mut parts = PartMapping::default();
        parts
            .by_chapter
            .insert("Groups".to_string(), "Algebra".to_string());
        let mut config = Config::default();
        config.chunking.max_tokens = max_tokens;
        config.books.insert(
            "demo".to_string(),
            BookConfig {
                book: "Demo".to_string(),
                subject: "algebra".to_string(),
                level: "intro".to_string(),
                parts,
            },
        );
        config
    }

    fn doc(text: &str) -> Document {
        Document {
            book_key: "demo".to_string(),
            source_file: "01_groups.md".to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_process_two_chapters() {
        let para = "a".repeat(2000);
        let text = format!("## Groups\n\n{para}\n\n## Rings\n\n{para}\n");
        let pipeline = Pipeline::new(config(1024)).unwrap();
        let out = pipeline.process(&doc(&text)).unwrap();

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[0].chapter, "Groups");
        assert_eq!(out.records[0].part, "Algebra");
        assert_eq!(out.records[1].chapter, "Rings");
        assert_eq!(out.records[0].chunk_id, 0);
        assert_eq!(out.records[1].chunk_id, 0);
        assert_eq!(
            out.warnings,
            vec![Warning::UnmappedPart {
                chapter: "Rings".to_string()
            }]
        );
        assert_eq!(out.oversized, 0);
        assert_eq!(out.sha256, hash_bytes(text.as_bytes()));
    }

    #[test]
    fn test_process_oversized_math() {
        let text = format!("$${}$$", "x".repeat(4996));
        let pipeline = Pipeline::new(config(100)).unwrap();
        let out = pipeline.process(&doc(&text)).unwrap();

        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].tokens_est, 1429);
        assert_eq!(out.oversized, 1);
        assert!(out.warnings.contains(&Warning::MissingHeadingContext));
    }

    #[test]
    fn test_empty_document() {
        let pipeline = Pipeline::new(config(1536)).unwrap();
        let out = pipeline.process(&doc("")).unwrap();

        assert!(out.records.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_drop_below_keeps_ids_dense() {
        let mut cfg = config(20);
        cfg.chunking.drop_below = 10;
        let long = "b".repeat(60);
        let text = format!("## Groups\n\nshort\n\n{long}\n\n{long}\n");
        let pipeline = Pipeline::new(cfg).unwrap();
        let out = pipeline.process(&doc(&text)).unwrap();

        assert!(out.dropped > 0);
        assert!(out.records.iter().all(|r| r.tokens_est >= 10));
        let ids: Vec<usize> = out.records.iter().map(|r| r.chunk_id).collect();
        let expected: Vec<usize> = (0..ids.len()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_preclean_applied() {
        let mut cfg = config(1536);
        cfg.chunking.preclean = true;
        let pipeline = Pipeline::new(cfg).unwrap();
        let out = pipeline
            .process(&doc("# Groups\n\n## Groups\n\nSee [thm:lagrange]  here."))
            .unwrap();

        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].text, "## Groups\n\nSee here.");
    }

    #[test]
    fn test_unknown_book() {
        let pipeline = Pipeline::new(config(1536)).unwrap();
        let mut d = doc("text");
        d.book_key = "other".to_string();

        assert!(matches!(
            pipeline.process(&d),
            Err(ChunkError::UnknownBook(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Pipeline::new(config(0)).is_err());
    }

    #[test]
    fn test_process_sources_isolates_failures() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("01_groups.md");
        fs::write(&good, "## Groups\n\nBody text.\n").unwrap();

        let sources = vec![
            SourceFile {
                book_key: "demo".to_string(),
                source_file: "00_missing.md".to_string(),
                path: PathBuf::from("/definitely/not/here.md"),
            },
            SourceFile {
                book_key: "demo".to_string(),
                source_file: "01_groups.md".to_string(),
                path: good,
            },
        ];

        let pipeline = Pipeline::new(config(1536)).unwrap();
        let results = pipeline.process_sources(&sources);

        assert_eq!(results.len(), 2);
        let failure = results[0].as_ref().unwrap_err();
        assert_eq!(failure.source_file, "00_missing.md");
        assert!(matches!(failure.error, ChunkError::Io { .. }));

        let out = results[1].as_ref().unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].text, "## Groups\n\nBody text.");
    }
}
