// src/lint/rules.rs

//! Individual style-source rules.

use regex::Regex;

use crate::lint::{LintViolation, Source};

pub trait LintRule: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn check(&self, source: &Source<'_>, out: &mut Vec<LintViolation>);
}

#[derive(Debug)]
pub struct MaxLineLength(pub usize);

impl LintRule for MaxLineLength {
    fn name(&self) -> &'static str {
        "max-line-length"
    }

    fn check(&self, source: &Source<'_>, out: &mut Vec<LintViolation>) {
        for (index, line) in source.lines() {
            let len = line.chars().count();
            if len > self.0 {
                out.push(source.violation(
                    self.name(),
                    index + 1,
                    self.0 + 1,
                    format!("line is {len} characters long; limit is {}", self.0),
                ));
            }
        }
    }
}

#[derive(Debug)]
pub struct Indentation(pub usize);

impl LintRule for Indentation {
    fn name(&self) -> &'static str {
        "indentation"
    }

    fn check(&self, source: &Source<'_>, out: &mut Vec<LintViolation>) {
        for (index, line) in source.lines() {
            let indent: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
            if indent.len() == line.len() {
                // Blank lines are the trailing-whitespace rule's business.
                continue;
            }
            if let Some(pos) = indent.find('\t') {
                out.push(source.violation(
                    self.name(),
                    index + 1,
                    pos + 1,
                    "tab used for indentation".to_string(),
                ));
            } else if indent.len() % self.0 != 0 {
                out.push(source.violation(
                    self.name(),
                    index + 1,
                    1,
                    format!(
                        "indented by {} spaces; expected a multiple of {}",
                        indent.len(),
                        self.0
                    ),
                ));
            }
        }
    }
}

#[derive(Debug)]
pub struct NoTrailingWhitespace;

impl LintRule for NoTrailingWhitespace {
    fn name(&self) -> &'static str {
        "no-trailing-whitespace"
    }

    fn check(&self, source: &Source<'_>, out: &mut Vec<LintViolation>) {
        for (index, line) in source.lines() {
            let trimmed = line.trim_end_matches([' ', '\t']);
            if trimmed.len() != line.len() {
                out.push(source.violation(
                    self.name(),
                    index + 1,
                    trimmed.chars().count() + 1,
                    "trailing whitespace".to_string(),
                ));
            }
        }
    }
}

#[derive(Debug)]
pub struct NoImportant {
    pattern: Regex,
}

impl NoImportant {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(r"!\s*important")?,
        })
    }
}

impl LintRule for NoImportant {
    fn name(&self) -> &'static str {
        "no-important"
    }

    fn check(&self, source: &Source<'_>, out: &mut Vec<LintViolation>) {
        for (index, line) in source.lines() {
            for m in self.pattern.find_iter(line) {
                out.push(source.violation(
                    self.name(),
                    index + 1,
                    line[..m.start()].chars().count() + 1,
                    "!important is not allowed".to_string(),
                ));
            }
        }
    }
}

#[derive(Debug)]
pub struct NoEmptyRulesets {
    pattern: Regex,
}

impl NoEmptyRulesets {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(r"\{\s*\}")?,
        })
    }
}

impl LintRule for NoEmptyRulesets {
    fn name(&self) -> &'static str {
        "no-empty-rulesets"
    }

    fn check(&self, source: &Source<'_>, out: &mut Vec<LintViolation>) {
        // May span lines, so match on the whole text.
        for m in self.pattern.find_iter(source.text) {
            let (line, column) = source.position(m.start());
            out.push(source.violation(self.name(), line, column, "empty ruleset".to_string()));
        }
    }
}

#[derive(Debug)]
pub struct FinalNewline;

impl LintRule for FinalNewline {
    fn name(&self) -> &'static str {
        "final-newline"
    }

    fn check(&self, source: &Source<'_>, out: &mut Vec<LintViolation>) {
        if source.text.is_empty() || source.text.ends_with('\n') {
            return;
        }
        let (line, column) = source.position(source.text.len());
        out.push(source.violation(
            self.name(),
            line,
            column,
            "file does not end with a newline".to_string(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn run(rule: &dyn LintRule, text: &str) -> Vec<(usize, usize)> {
        let source = Source::new(Path::new("a.scss"), text);
        let mut out = Vec::new();
        rule.check(&source, &mut out);
        out.iter().map(|v| (v.line, v.column)).collect()
    }

    #[test]
    fn long_lines_are_reported_at_the_limit() {
        let text = format!("a {{\n  b: {};\n}}\n", "x".repeat(20));
        assert_eq!(run(&MaxLineLength(10), &text), vec![(2, 11)]);
    }

    #[test]
    fn tabs_and_odd_indentation() {
        let text = "a {\n\tb: c;\n   d: e;\n    f: g;\n}\n";
        assert_eq!(run(&Indentation(2), text), vec![(2, 1), (3, 1)]);
    }

    #[test]
    fn trailing_whitespace_column() {
        assert_eq!(run(&NoTrailingWhitespace, "a {  \n}\n"), vec![(1, 4)]);
    }

    #[test]
    fn important_anywhere_on_a_line() {
        let rule = NoImportant::new().unwrap();
        assert_eq!(run(&rule, "a { b: c ! important; }\n"), vec![(1, 10)]);
    }

    #[test]
    fn empty_ruleset_spanning_lines() {
        let rule = NoEmptyRulesets::new().unwrap();
        assert_eq!(run(&rule, "a {\n  b: c;\n}\n.x {\n\n}\n"), vec![(4, 4)]);
    }

    #[test]
    fn missing_final_newline() {
        assert_eq!(run(&FinalNewline, "a {\n}"), vec![(2, 2)]);
        assert!(run(&FinalNewline, "a {\n}\n").is_empty());
        assert!(run(&FinalNewline, "").is_empty());
    }
}
