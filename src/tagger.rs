use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::chunker::Chunk;
use crate::config::BookConfig;
use crate::error::Warning;

/// One output record, in the published dataset schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub text: String,
    pub book: String,
    pub book_key: String,
    pub subject: String,
    pub level: String,
    pub part: String,
    pub chapter: String,
    pub section: String,
    pub source_file: String,
    pub chunk_id: usize,
    pub tokens_est: usize,
}

/// Attaches book and position metadata to a document's finished chunks
pub struct Tagger<'a> {
    book_key: &'a str,
    book: &'a BookConfig,
}

impl<'a> Tagger<'a> {
    pub fn new(book_key: &'a str, book: &'a BookConfig) -> Self {
        Self { book_key, book }
    }

    /// Tag chunks of one document, in order.
    ///
    /// `chunk_id` restarts at 0 whenever the chapter differs from the
    /// previous chunk's.
    pub fn tag(
        &self,
        source_file: &str,
        chunks: Vec<Chunk>,
        warnings: &mut Vec<Warning>,
    ) -> Vec<ChunkRecord> {
        let mut records: Vec<ChunkRecord> = Vec::with_capacity(chunks.len());
        let mut unmapped = HashSet::new();

        if chunks
            .first()
            .is_some_and(|c| c.metadata.chapter.is_empty())
        {
            warnings.push(Warning::MissingHeadingContext);
        }

        for chunk in chunks {
            let chapter = chunk.metadata.chapter;

            let chunk_id = match records.last() {
                Some(prev) if prev.chapter == chapter => prev.chunk_id + 1,
                _ => 0,
            };

            let part = match self.book.parts.lookup(source_file, &chapter) {
                Some(part) => part.to_string(),
                None => {
                    if self.book.parts.is_declared() && unmapped.insert(chapter.clone()) {
                        warnings.push(Warning::UnmappedPart {
                            chapter: chapter.clone(),
                        });
                    }
                    String::new()
                }
            };

            records.push(ChunkRecord {
                text: chunk.text,
                book: self.book.book.clone(),
                book_key: self.book_key.to_string(),
                subject: self.book.subject.clone(),
                level: self.book.level.clone(),
                part,
                chapter,
                section: chunk.metadata.section,
                source_file: source_file.to_string(),
                chunk_id,
                tokens_est: chunk.metadata.token_count,
            });
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::HeadingContext;
    use crate::config::PartMapping;
    use crate::scanner::BlockKind;

    fn chunk(text: &str, chapter: &str, section: &str) -> Chunk {
        Chunk::new(
            text.to_string(),
            0..text.len(),
            0..1,
            vec![BlockKind::Paragraph],
            &HeadingContext {
                chapter: chapter.to_string(),
                section: section.to_string(),
            },
            1000,
        )
    }

    fn book() -> BookConfig {
        let mut parts = PartMapping::default();
        parts
            .by_chapter
            .insert("Groups".to_string(), "Group Theory".to_string());
        BookConfig {
            book: "Abstract Algebra".to_string(),
            subject: "abstract-algebra".to_string(),
            level: "intro".to_string(),
            parts,
        }
    }

    #[test]
    fn test_book_metadata_copied() {
        let book = book();
        let mut warnings = Vec::new();
        let records = Tagger::new("aata", &book).tag(
            "03_groups.md",
            vec![chunk("## Groups\n\nbody", "Groups", "")],
            &mut warnings,
        );

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.text, "## Groups\n\nbody");
        assert_eq!(r.book, "Abstract Algebra");
        assert_eq!(r.book_key, "aata");
        assert_eq!(r.subject, "abstract-algebra");
        assert_eq!(r.level, "intro");
        assert_eq!(r.part, "Group Theory");
        assert_eq!(r.chapter, "Groups");
        assert_eq!(r.source_file, "03_groups.md");
        assert_eq!(r.chunk_id, 0);
        assert_eq!(r.tokens_est, crate::tokens::estimate_tokens(&r.text));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_chunk_ids_reset_per_chapter() {
        let book = book();
        let chunks = vec![
            chunk("a", "Groups", ""),
            chunk("b", "Groups", "Cosets"),
            chunk("c", "Groups", "Cosets"),
            chunk("d", "Rings", ""),
            chunk("e", "Rings", ""),
        ];
        let records = Tagger::new("aata", &book).tag("x.md", chunks, &mut Vec::new());

        let ids: Vec<usize> = records.iter().map(|r| r.chunk_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 0, 1]);
        assert_eq!(records[1].section, "Cosets");
    }

    #[test]
    fn test_unmapped_part_warns_once_per_chapter() {
        let book = book();
        let mut warnings = Vec::new();
        let records = Tagger::new("aata", &book).tag(
            "x.md",
            vec![chunk("a", "Rings", ""), chunk("b", "Rings", "")],
            &mut warnings,
        );

        assert!(records.iter().all(|r| r.part.is_empty()));
        assert_eq!(
            warnings,
            vec![Warning::UnmappedPart {
                chapter: "Rings".to_string()
            }]
        );
    }

    #[test]
    fn test_no_part_mapping_is_silent() {
        let book = BookConfig {
            book: "Plain".to_string(),
            ..BookConfig::default()
        };
        let mut warnings = Vec::new();
        let records =
            Tagger::new("plain", &book).tag("x.md", vec![chunk("a", "Ch", "")], &mut warnings);

        assert_eq!(records[0].part, "");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_missing_heading_context() {
        let book = BookConfig {
            book: "Plain".to_string(),
            ..BookConfig::default()
        };
        let mut warnings = Vec::new();
        let records = Tagger::new("plain", &book).tag(
            "x.md",
            vec![chunk("preamble", "", ""), chunk("body", "One", "")],
            &mut warnings,
        );

        assert_eq!(records[0].chapter, "");
        assert_eq!(records[0].chunk_id, 0);
        assert_eq!(records[1].chunk_id, 0);
        assert_eq!(warnings, vec![Warning::MissingHeadingContext]);
    }

    #[test]
    fn test_empty_input() {
        let book = book();
        let mut warnings = Vec::new();
        let records = Tagger::new("aata", &book).tag("x.md", vec![], &mut warnings);
        assert!(records.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_record_serializes_with_schema_fields() {
        let book = book();
        let records = Tagger::new("aata", &book).tag(
            "x.md",
            vec![chunk("t", "Groups", "")],
            &mut Vec::new(),
        );
        let value = serde_json::to_value(&records[0]).unwrap();
        let obj = value.as_object().unwrap();

        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "book",
                "book_key",
                "chapter",
                "chunk_id",
                "level",
                "part",
                "section",
                "source_file",
                "subject",
                "text",
                "tokens_est"
            ]
        );
        assert!(obj["chunk_id"].is_u64());
        assert!(obj["tokens_est"].is_u64());
    }
}
