use regex::Regex;

use crate::error::ChunkError;

/// Removes converter noise that should never reach a chunk:
/// pandoc cross-reference links and attributes, bare label references,
/// empty heading markers, runs of spaces, and the leading `# Title` line.
#[derive(Debug, Clone)]
pub struct Precleaner {
    removals: Vec<Regex>,
    empty_heading: Regex,
    spaces: Regex,
    title: Regex,
}

impl Precleaner {
    pub fn new() -> Result<Self, ChunkError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| ChunkError::InvalidConfig(format!("preclean pattern: {}", e)))
        };

        let removals = [
            // [[1.2]](#thm:foo){reference-type="ref" reference="thm:foo"}
            r"\[\\?\[.+?\\?\]\]\(#[^)]*\)(?:\{[^}]*\})?",
            // [text](#sec:foo){reference-type="ref" reference="sec:foo"}
            r#"\[[^\]]*?\]\(#[^)]*\)\{reference-type="[^"]*"\s+reference="[^"]*"\}"#,
            r#"\{reference-type="[^"]*"\s+reference="[^"]*"\}"#,
            // [thm:lagrange]
            r"\[(?:ch|thm|prob|exer|def|sec|ex|lem|cor|rem|prop|fig|tab|eq):[\w-]+\\?\]",
            r"\[@ref:[^\]]+\]",
        ]
        .into_iter()
        .map(compile)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            removals,
            empty_heading: compile(r"(?m)^#{2,4}[ \t]*$")?,
            spaces: compile(r" {2,}")?,
            title: compile(r"\A#[ \t]+[^\n]*\n*")?,
        })
    }

    pub fn clean(&self, text: &str) -> String {
        let mut out = text.to_string();
        for re in &self.removals {
            out = re.replace_all(&out, "").into_owned();
        }
        out = self.empty_heading.replace_all(&out, "").into_owned();
        out = self.spaces.replace_all(&out, " ").into_owned();
        self.title.replace(&out, "").into_owned()
    }
}
