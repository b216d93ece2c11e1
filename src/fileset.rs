// src/fileset.rs

//! File-set bindings: glob patterns plus an output location.
//!
//! Patterns are relative to the project root and use `/` separators. `*`
//! and `?` never cross a `/`, `**` does, `{a,b}` alternation is supported.
//! An include pattern starting with `!` is treated as an exclude.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::fs::FileSystem;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// One include pattern, compiled, with the directory it is anchored at.
#[derive(Clone)]
struct IncludePattern {
    raw: String,
    matcher: GlobMatcher,
    /// Leading literal directory of the pattern (gulp's "glob parent").
    base: PathBuf,
}

/// A file matched by a [`FileSetBinding`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedFile {
    /// Full path (`root` joined with `rel`).
    pub path: PathBuf,
    /// Path relative to the project root, `/`-separated.
    pub rel: String,
    /// Path relative to the pattern base; this is where the file lands
    /// under the output directory.
    pub relative_to_base: PathBuf,
}

/// Input patterns, exclusions and output directory for one unit.
#[derive(Clone)]
pub struct FileSetBinding {
    include: Vec<IncludePattern>,
    exclude: Option<GlobSet>,
    exclude_raw: Vec<String>,
    explicit_base: Option<PathBuf>,
    output: PathBuf,
    dot: bool,
}

impl fmt::Debug for FileSetBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSetBinding")
            .field("include", &self.include_patterns().collect::<Vec<_>>())
            .field("exclude", &self.exclude_raw)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl FileSetBinding {
    /// Compile a binding. Fails on malformed patterns.
    pub fn new(
        patterns: &[String],
        exclude: &[String],
        base: Option<&str>,
        output: impl Into<PathBuf>,
        dot: bool,
    ) -> Result<Self> {
        let mut include = Vec::new();
        let mut exclude_raw: Vec<String> = exclude.iter().map(|p| normalize_pattern(p)).collect();

        for pat in patterns {
            if let Some(negated) = pat.strip_prefix('!') {
                exclude_raw.push(normalize_pattern(negated));
                continue;
            }
            let raw = normalize_pattern(pat);
            let matcher = compile_glob(&raw)?.compile_matcher();
            include.push(IncludePattern {
                base: glob_base(&raw),
                raw,
                matcher,
            });
        }

        let exclude_set = if exclude_raw.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pat in &exclude_raw {
                builder.add(compile_glob(pat)?);
            }
            Some(builder.build().context("building exclude globset")?)
        };

        Ok(Self {
            include,
            exclude: exclude_set,
            exclude_raw,
            explicit_base: base.map(|b| PathBuf::from(normalize_pattern(b))),
            output: output.into(),
            dot,
        })
    }

    /// Output directory, relative to the output root.
    pub fn output_dir(&self) -> &Path {
        &self.output
    }

    pub fn include_patterns(&self) -> impl Iterator<Item = &str> {
        self.include.iter().map(|p| p.raw.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
    }

    /// Returns true if `rel_path` (relative to the project root) belongs to
    /// this file-set.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.matching_pattern(rel_path).is_some()
    }

    fn matching_pattern(&self, rel_path: &str) -> Option<&IncludePattern> {
        if !self.dot && has_hidden_component(rel_path) {
            return None;
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return None;
            }
        }
        self.include.iter().find(|p| p.matcher.is_match(rel_path))
    }

    /// Collect matching files under `root`.
    ///
    /// Files are returned in pattern order; within one pattern they are
    /// sorted by path. A file matched by several patterns appears once.
    /// Directories equal to `skip` (typically the output root) are not
    /// descended into.
    pub fn collect(
        &self,
        fs: &dyn FileSystem,
        root: &Path,
        skip: Option<&Path>,
    ) -> Result<Vec<MatchedFile>> {
        let mut out: Vec<MatchedFile> = Vec::new();

        for pattern in &self.include {
            let start = root.join(&pattern.base);
            let mut found = Vec::new();

            if fs.is_file(&start) {
                found.push(start);
            } else if fs.is_dir(&start) {
                let mut stack = vec![start];
                while let Some(dir) = stack.pop() {
                    for path in fs.read_dir(&dir)? {
                        if skip.is_some_and(|s| path == s) {
                            continue;
                        }
                        if fs.is_dir(&path) {
                            stack.push(path);
                        } else if fs.is_file(&path) {
                            found.push(path);
                        }
                    }
                }
            }

            found.sort();
            for path in found {
                let Some(rel) = relative_to(root, &path) else {
                    continue;
                };
                if out.iter().any(|m| m.rel == rel) {
                    continue;
                }
                // The file must match *this* pattern and survive excludes.
                if !pattern.matcher.is_match(&rel) || !self.matches(&rel) {
                    continue;
                }
                let relative_to_base = self.relative_to_base(pattern, &rel);
                out.push(MatchedFile {
                    path,
                    rel,
                    relative_to_base,
                });
            }
        }

        Ok(out)
    }

    fn relative_to_base(&self, pattern: &IncludePattern, rel: &str) -> PathBuf {
        let rel_path = Path::new(rel);
        let base = self.explicit_base.as_ref().unwrap_or(&pattern.base);
        match rel_path.strip_prefix(base) {
            Ok(stripped) if !stripped.as_os_str().is_empty() => stripped.to_path_buf(),
            _ => rel_path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| rel_path.to_path_buf()),
        }
    }
}

fn compile_glob(pattern: &str) -> Result<globset::Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))
}

fn normalize_pattern(pattern: &str) -> String {
    let trimmed = pattern.trim();
    trimmed
        .strip_prefix("./")
        .unwrap_or(trimmed)
        .replace('\\', "/")
}

fn has_hidden_component(rel_path: &str) -> bool {
    rel_path
        .split('/')
        .any(|c| c.starts_with('.') && c != "." && c != "..")
}

/// Leading directory of a pattern that contains no glob syntax.
///
/// `src/img/**/*` → `src/img`, `src/*.xml` → `src`, and a literal file
/// `src/js/main.js` → `src/js`.
pub fn glob_base(pattern: &str) -> PathBuf {
    let components: Vec<&str> = pattern.split('/').filter(|c| !c.is_empty()).collect();
    let literal_prefix = components
        .iter()
        .take_while(|c| !c.contains(GLOB_META))
        .count();

    let take = if literal_prefix == components.len() {
        literal_prefix.saturating_sub(1)
    } else {
        literal_prefix
    };

    components[..take].iter().collect()
}

/// Path relative to `root` with forward slashes, if `path` lies under it.
pub fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn binding(include: &[&str], exclude: &[&str]) -> FileSetBinding {
        let include: Vec<String> = include.iter().map(|s| s.to_string()).collect();
        let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        FileSetBinding::new(&include, &exclude, None, "out", false).unwrap()
    }

    #[test]
    fn glob_base_stops_at_first_wildcard() {
        assert_eq!(glob_base("src/img/**/*"), PathBuf::from("src/img"));
        assert_eq!(glob_base("src/*.xml"), PathBuf::from("src"));
        assert_eq!(glob_base("src/js/main.js"), PathBuf::from("src/js"));
        assert_eq!(glob_base("**/*.scss"), PathBuf::new());
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let b = binding(&["src/*.xml"], &[]);
        assert!(b.matches("src/sitemap.xml"));
        assert!(!b.matches("src/nested/feed.xml"));
    }

    #[test]
    fn negated_include_acts_as_exclude() {
        let b = binding(
            &[
                "src/templates/**/*.{twig,html}",
                "!src/templates/layouts/**/*.{twig,html}",
            ],
            &[],
        );
        assert!(b.matches("src/templates/index.twig"));
        assert!(b.matches("src/templates/blog/post.html"));
        assert!(!b.matches("src/templates/layouts/base.twig"));
    }

    #[test]
    fn hidden_files_require_dot() {
        let b = binding(&["src/img/**/*"], &[]);
        assert!(!b.matches("src/img/.htaccess"));

        let with_dot = FileSetBinding::new(&["src/img/**/*".to_string()], &[], None, "img", true)
            .unwrap();
        assert!(with_dot.matches("src/img/.htaccess"));
    }

    #[test]
    fn malformed_pattern_is_rejected() {
        let err = FileSetBinding::new(&["src/[".to_string()], &[], None, "out", false);
        assert!(err.is_err());
    }

    #[test]
    fn collect_keeps_pattern_order_and_skips_output() {
        let fs = MockFileSystem::new();
        fs.add_file("/site/src/js/main.js", "main");
        fs.add_file("/site/src/js/components/b.js", "b");
        fs.add_file("/site/src/js/components/a.js", "a");
        fs.add_file("/site/dist/js/main.js", "built");

        let b = binding(&["src/js/main.js", "src/js/components/**/*.js"], &[]);
        let files = b
            .collect(&fs, Path::new("/site"), Some(Path::new("/site/dist")))
            .unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.rel.as_str()).collect();
        assert_eq!(
            rels,
            vec![
                "src/js/main.js",
                "src/js/components/a.js",
                "src/js/components/b.js"
            ]
        );
        assert_eq!(files[1].relative_to_base, PathBuf::from("a.js"));
    }

    #[test]
    fn relative_to_base_honours_explicit_base() {
        let fs = MockFileSystem::new();
        fs.add_file("/site/src/templates/blog/post.twig", "x");

        let b = FileSetBinding::new(
            &["src/templates/blog/*.twig".to_string()],
            &[],
            Some("src/templates"),
            ".",
            false,
        )
        .unwrap();
        let files = b.collect(&fs, Path::new("/site"), None).unwrap();
        assert_eq!(files[0].relative_to_base, PathBuf::from("blog/post.twig"));
    }
}
