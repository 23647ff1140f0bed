//! Block scanner: splits one normalized document into typed structural blocks.
//!
//! The scanner is a small state machine over classified lines. Headings,
//! environment markers and display-math openers are boundaries; everything
//! between boundaries is paragraph text.

mod block;
mod line;


pub use block::{Block, BlockKind, HeadingLevel, ScanResult};

use serde::{Deserialize, Serialize};

use crate::error::{ChunkError, Warning};
use line::{Line, LineClassifier, LineKind};

/// Environment keywords recognized at the start of a line
pub const DEFAULT_ENVIRONMENTS: &[&str] = &[
    "Theorem",
    "Lemma",
    "Proposition",
    "Corollary",
    "Definition",
    "Example",
    "Remark",
    "Conjecture",
    "Axiom",
    "Principle",
    "Convention",
    "Observation",
    "Fact",
    "Note",
    "Exercise",
    "Problem",
    "Investigation",
    "Activity",
    "Exploration",
    "Objectives",
    "Worksheet",
    "Assemblage",
    "Proof",
];

/// Scanner settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Keywords that open an environment block
    pub environments: Vec<String>,
    /// Display math (open, close) delimiter pairs
    pub math_delimiters: Vec<(String, String)>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            environments: DEFAULT_ENVIRONMENTS.iter().map(|s| s.to_string()).collect(),
            math_delimiters: vec![
                ("$$".to_string(), "$$".to_string()),
                ("\\[".to_string(), "\\]".to_string()),
            ],
        }
    }
}

/// Compiled scanner, cheap to share between threads
#[derive(Debug, Clone)]
pub struct Scanner {
    classifier: LineClassifier,
}

/// Block currently being accumulated
#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    Paragraph {
        start: usize,
        end: usize,
        /// Display math left open by a prose line: (delimiter, line)
        math: Option<(usize, usize)>,
    },
    Environment {
        start: usize,
        end: usize,
        has_body: bool,
        /// Open display math inside the environment: (delimiter, line)
        math: Option<(usize, usize)>,
    },
    Math {
        start: usize,
        end: usize,
        delimiter: usize,
        opened_at: usize,
    },
}

impl Scanner {
    pub fn new(config: &ScannerConfig) -> Result<Self, ChunkError> {
        if config
            .math_delimiters
            .iter()
            .any(|(open, close)| open.is_empty() || close.is_empty())
        {
            return Err(ChunkError::InvalidConfig(
                "math delimiters must not be empty".to_string(),
            ));
        }

        let classifier = LineClassifier::new(&config.environments, &config.math_delimiters)
            .map_err(|e| ChunkError::InvalidConfig(format!("environment pattern: {}", e)))?;

        Ok(Self { classifier })
    }

    /// Scan a document into blocks
    pub fn scan(&self, text: &str) -> ScanResult {
        let mut out = ScanResult::default();
        let mut state = State::Idle;

        for line in line::lines(text) {
            state = self.step(state, &line, text, &mut out);
        }

        match state {
            State::Idle => {}
            State::Paragraph { start, end, math } => {
                if let Some((_, opened_at)) = math {
                    out.warnings.push(Warning::UnterminatedMath { line: opened_at });
                }
                push(&mut out, text, start, end, BlockKind::Paragraph);
            }
            State::Environment {
                start, end, math, ..
            } => {
                if let Some((_, opened_at)) = math {
                    out.warnings.push(Warning::UnterminatedMath { line: opened_at });
                }
                push(&mut out, text, start, end, BlockKind::Environment);
            }
            State::Math {
                start,
                end,
                opened_at,
                ..
            } => {
                out.warnings.push(Warning::UnterminatedMath { line: opened_at });
                push(&mut out, text, start, end, BlockKind::MathBlock);
            }
        }

        out
    }

    fn step(&self, state: State, line: &Line<'_>, text: &str, out: &mut ScanResult) -> State {
        match state {
            // Math is opaque: only the closing delimiter matters
            State::Math {
                start,
                end,
                delimiter,
                opened_at,
            } => {
                let end = if line.is_blank() { end } else { line.end() };
                if self.classifier.closes_math(line, delimiter) {
                    push(out, text, start, end, BlockKind::MathBlock);
                    State::Idle
                } else {
                    State::Math {
                        start,
                        end,
                        delimiter,
                        opened_at,
                    }
                }
            }

            State::Environment {
                start,
                end,
                has_body,
                math: math @ Some(_),
            } => State::Environment {
                start,
                end: if line.is_blank() { end } else { line.end() },
                has_body,
                math: self.carry(line, math),
            },

            State::Environment {
                start,
                end,
                has_body,
                math: None,
            } => match self.classifier.classify(line) {
                LineKind::Blank if has_body => {
                    push(out, text, start, end, BlockKind::Environment);
                    State::Idle
                }
                LineKind::Blank => state,
                LineKind::Heading(_) | LineKind::EnvironmentOpen { .. } => {
                    push(out, text, start, end, BlockKind::Environment);
                    self.open(line, text, out)
                }
                LineKind::MathOpen { .. } | LineKind::Text => State::Environment {
                    start,
                    end: line.end(),
                    has_body: true,
                    math: self.carry(line, None),
                },
            },

            // Inside display math opened mid-line, every line is paragraph text
            State::Paragraph {
                start,
                end,
                math: math @ Some(_),
            } => State::Paragraph {
                start,
                end: if line.is_blank() { end } else { line.end() },
                math: self.carry(line, math),
            },

            State::Paragraph {
                start,
                end,
                math: None,
            } => match self.classifier.classify(line) {
                LineKind::Blank => state,
                LineKind::Text => State::Paragraph {
                    start,
                    end: line.end(),
                    math: self.carry(line, None),
                },
                _ => {
                    push(out, text, start, end, BlockKind::Paragraph);
                    self.open(line, text, out)
                }
            },

            State::Idle => self.open(line, text, out),
        }
    }

    /// Start whatever block `line` begins, from a clean boundary
    fn open(&self, line: &Line<'_>, text: &str, out: &mut ScanResult) -> State {
        match self.classifier.classify(line) {
            LineKind::Blank => State::Idle,
            LineKind::Heading(level) => {
                push(out, text, line.start, line.end(), BlockKind::Heading(level));
                State::Idle
            }
            LineKind::EnvironmentOpen { has_body } => State::Environment {
                start: line.start,
                end: line.end(),
                has_body,
                math: self.carry(line, None),
            },
            LineKind::MathOpen {
                closed: true, ..
            } => {
                push(out, text, line.start, line.end(), BlockKind::MathBlock);
                State::Idle
            }
            LineKind::MathOpen {
                delimiter,
                closed: false,
            } => State::Math {
                start: line.start,
                end: line.end(),
                delimiter,
                opened_at: line.number,
            },
            LineKind::Text => State::Paragraph {
                start: line.start,
                end: line.end(),
                math: self.carry(line, None),
            },
        }
    }

    /// Display math still open after `line`, keeping the line it was opened on
    fn carry(&self, line: &Line<'_>, math: Option<(usize, usize)>) -> Option<(usize, usize)> {
        let delimiter = self
            .classifier
            .open_after(line.content, math.map(|(delimiter, _)| delimiter))?;
        match math {
            Some((open, opened_at)) if open == delimiter => Some((open, opened_at)),
            _ => Some((delimiter, line.number)),
        }
    }
}

fn push(out: &mut ScanResult, text: &str, start: usize, end: usize, kind: BlockKind) {
    out.blocks.push(Block {
        text: text[start..end].to_string(),
        start_offset: start,
        end_offset: end,
        kind,
    });
}
