use regex::Regex;

use super::block::HeadingLevel;

/// One physical line of the input with its byte span
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line<'a> {
    /// 1-based line number
    pub number: usize,
    /// Byte offset of the first character
    pub start: usize,
    /// Line content without the trailing newline
    pub content: &'a str,
}

impl Line<'_> {
    /// Byte offset just past the content (before the newline)
    pub fn end(&self) -> usize {
        self.start + self.content.len()
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Split text into lines, keeping byte offsets
pub(crate) fn lines(text: &str) -> impl Iterator<Item = Line<'_>> {
    let mut offset = 0;
    text.split_inclusive('\n')
        .enumerate()
        .map(move |(idx, raw)| {
            let start = offset;
            offset += raw.len();
            Line {
                number: idx + 1,
                start,
                content: raw.trim_end_matches(['\n', '\r']),
            }
        })
}

/// What a line means to the scanner state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineKind {
    Blank,
    Heading(HeadingLevel),
    /// Environment marker; `has_body` when text follows the marker on the same line
    EnvironmentOpen { has_body: bool },
    /// Display math opener; `delimiter` indexes the configured pairs
    MathOpen { delimiter: usize, closed: bool },
    Text,
}

/// Compiled line patterns for one scanner configuration
#[derive(Debug, Clone)]
pub(crate) struct LineClassifier {
    heading: Regex,
    environment: Option<Regex>,
    math: Vec<(String, String)>,
}

impl LineClassifier {
    pub fn new(environments: &[String], math: &[(String, String)]) -> Result<Self, regex::Error> {
        let heading = Regex::new(r"^(#{2,3})[ \t]+\S")?;

        let environment = if environments.is_empty() {
            None
        } else {
            let alternatives = environments
                .iter()
                .map(|kw| regex::escape(kw.trim()))
                .collect::<Vec<_>>()
                .join("|");
            // **Theorem.**  **Theorem 2.1 (Lagrange).**  *Proof.*
            Some(Regex::new(&format!(
                r"^\*{{1,2}}(?:{})\b[^*\n]*\*{{1,2}}",
                alternatives
            ))?)
        };

        Ok(Self {
            heading,
            environment,
            math: math.to_vec(),
        })
    }

    pub fn classify(&self, line: &Line<'_>) -> LineKind {
        let content = line.content;
        if line.is_blank() {
            return LineKind::Blank;
        }

        if let Some(caps) = self.heading.captures(content) {
            if let Some(level) = HeadingLevel::from_depth(caps[1].len()) {
                return LineKind::Heading(level);
            }
        }

        if let Some(m) = self.environment.as_ref().and_then(|re| re.find(content)) {
            return LineKind::EnvironmentOpen {
                has_body: !content[m.end()..].trim().is_empty(),
            };
        }

        let trimmed = content.trim_start();
        for (idx, (open, _)) in self.math.iter().enumerate() {
            if trimmed.starts_with(open.as_str()) {
                return LineKind::MathOpen {
                    delimiter: idx,
                    closed: self.open_after(trimmed, None).is_none(),
                };
            }
        }

        LineKind::Text
    }

    /// Display delimiter pair still open at the end of `content`, given the
    /// pair open at its start. Delimiters anywhere in the line count.
    pub fn open_after(&self, content: &str, mut open: Option<usize>) -> Option<usize> {
        let mut rest = content;
        loop {
            match open {
                Some(delimiter) => {
                    let (_, close) = self.math.get(delimiter)?;
                    let Some(pos) = rest.find(close.as_str()) else {
                        return open;
                    };
                    rest = &rest[pos + close.len()..];
                    open = None;
                }
                None => {
                    let (pos, delimiter, len) = self
                        .math
                        .iter()
                        .enumerate()
                        .filter_map(|(idx, (opener, _))| {
                            rest.find(opener.as_str()).map(|pos| (pos, idx, opener.len()))
                        })
                        .min()?;
                    rest = &rest[pos + len..];
                    open = Some(delimiter);
                }
            }
        }
    }

    /// Whether `line` contains the closing delimiter of pair `delimiter`
    pub fn closes_math(&self, line: &Line<'_>, delimiter: usize) -> bool {
        self.math
            .get(delimiter)
            .is_some_and(|(_, close)| line.content.contains(close.as_str()))
    }
}
