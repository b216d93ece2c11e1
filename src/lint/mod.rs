// src/lint/mod.rs

//! Style-source linting (`sitedag lint`).
//!
//! Rules come from `[lint]`; each violation is reported as
//! `path:line:column rule message`.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::model::LintSection;
use crate::errors::{Result, SitedagError};
use crate::fileset::FileSetBinding;
use crate::fs::FileSystem;

pub mod rules;

use rules::{
    FinalNewline, Indentation, LintRule, MaxLineLength, NoEmptyRulesets, NoImportant,
    NoTrailingWhitespace,
};

/// One rule violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintViolation {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
    pub rule: &'static str,
    pub message: String,
}

impl fmt::Display for LintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{} {} {}",
            self.path.display(),
            self.line,
            self.column,
            self.rule,
            self.message
        )
    }
}

/// A file being linted.
#[derive(Debug)]
pub struct Source<'a> {
    pub path: &'a Path,
    pub text: &'a str,
}

impl<'a> Source<'a> {
    pub fn new(path: &'a Path, text: &'a str) -> Self {
        Self { path, text }
    }

    /// Zero-based line index and line text, without line terminators.
    pub fn lines(&self) -> impl Iterator<Item = (usize, &'a str)> {
        self.text
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .enumerate()
    }

    /// One-based line and column of a byte offset.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let before = &self.text[..offset.min(self.text.len())];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        (line, before[line_start..].chars().count() + 1)
    }

    pub fn violation(
        &self,
        rule: &'static str,
        line: usize,
        column: usize,
        message: String,
    ) -> LintViolation {
        LintViolation {
            path: self.path.to_path_buf(),
            line,
            column,
            rule,
            message,
        }
    }
}

/// The enabled rules of a `[lint]` section.
#[derive(Debug)]
pub struct Linter {
    rules: Vec<Box<dyn LintRule>>,
}

impl Linter {
    pub fn from_section(section: &LintSection) -> Result<Self> {
        let regex_err = |e: regex::Error| SitedagError::ConfigError(format!("[lint]: {e}"));

        let mut rules: Vec<Box<dyn LintRule>> = Vec::new();
        if section.max_line_length > 0 {
            rules.push(Box::new(MaxLineLength(section.max_line_length)));
        }
        if section.indentation > 0 {
            rules.push(Box::new(Indentation(section.indentation)));
        }
        if section.no_trailing_whitespace {
            rules.push(Box::new(NoTrailingWhitespace));
        }
        if section.no_important {
            rules.push(Box::new(NoImportant::new().map_err(regex_err)?));
        }
        if section.no_empty_rulesets {
            rules.push(Box::new(NoEmptyRulesets::new().map_err(regex_err)?));
        }
        if section.final_newline {
            rules.push(Box::new(FinalNewline));
        }
        Ok(Self { rules })
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Violations in one file, ordered by position.
    pub fn lint_source(&self, path: &Path, text: &str) -> Vec<LintViolation> {
        let source = Source::new(path, text);
        let mut out = Vec::new();
        for rule in &self.rules {
            rule.check(&source, &mut out);
        }
        out.sort_by(|a, b| (a.line, a.column, a.rule).cmp(&(b.line, b.column, b.rule)));
        out
    }
}

/// Result of linting a project.
#[derive(Debug, Clone, Default)]
pub struct LintReport {
    pub files_checked: usize,
    pub violations: Vec<LintViolation>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Lint every file matched by `section` under `root`.
pub fn lint_project(
    fs: &dyn FileSystem,
    root: &Path,
    output_root: &Path,
    section: &LintSection,
) -> Result<LintReport> {
    let linter = Linter::from_section(section)?;
    let binding = FileSetBinding::new(&section.input, &section.exclude, None, ".", false)
        .map_err(|e| SitedagError::ConfigError(format!("[lint]: {e:#}")))?;

    let mut report = LintReport::default();
    for file in binding.collect(fs, root, Some(output_root))? {
        let text = fs.read_to_string(&file.path)?;
        report
            .violations
            .extend(linter.lint_source(Path::new(&file.rel), &text));
        report.files_checked += 1;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn violation_display_format() {
        let v = LintViolation {
            path: PathBuf::from("src/sass/main.scss"),
            line: 3,
            column: 7,
            rule: "no-important",
            message: "!important is not allowed".into(),
        };
        assert_eq!(
            v.to_string(),
            "src/sass/main.scss:3:7 no-important !important is not allowed"
        );
    }

    #[test]
    fn disabled_rules_are_not_run() {
        let mut section = LintSection::with_input(vec!["**/*.scss".into()]);
        section.max_line_length = 0;
        section.no_important = false;
        let linter = Linter::from_section(&section).unwrap();

        assert!(!linter.rule_names().contains(&"max-line-length"));
        assert!(!linter.rule_names().contains(&"no-important"));
        assert!(linter.rule_names().contains(&"final-newline"));
    }

    #[test]
    fn project_lint_skips_excluded_and_unmatched_files() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/sass/main.scss", "a {\n  b: c !important;\n}\n");
        fs.add_file("/p/src/sass/_vendor.scss", "a{}");
        fs.add_file("/p/src/js/main.js", "x  \n");

        let mut section = LintSection::with_input(vec!["src/sass/**/*.scss".into()]);
        section.exclude = vec!["src/sass/_vendor.scss".into()];

        let report = lint_project(&fs, Path::new("/p"), Path::new("/p/dist"), &section).unwrap();

        assert_eq!(report.files_checked, 1);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].rule, "no-important");
        assert_eq!(report.violations[0].path, PathBuf::from("src/sass/main.scss"));
    }
}
