use std::path::Path;
use std::sync::Arc;

use sitedag::commands::{lint, lint_section, Project};
use sitedag::config::LintSection;
use sitedag::fs::RealFileSystem;
use sitedag::lint::lint_project;
use sitedag::types::UnitKind;
use sitedag_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use sitedag_test_utils::{init_tracing, write_files};

const CLEAN_SCSS: &str = "body {\n  color: red;\n}\n";

fn style_project(root: &Path, lint: Option<LintSection>) -> Project {
    let mut builder = ConfigFileBuilder::new().with_task(
        "css",
        TaskConfigBuilder::new(UnitKind::Style)
            .input("src/sass/main.scss")
            .watch("src/sass/**/*.scss")
            .build(),
    );
    if let Some(section) = lint {
        builder = builder.with_lint(section);
    }
    Project::new(root.to_path_buf(), builder.build(), Arc::new(RealFileSystem)).unwrap()
}

#[test]
fn clean_sources_exit_zero() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_files(
        dir.path(),
        &[
            ("src/sass/main.scss", CLEAN_SCSS),
            ("src/sass/_vars.scss", "$c: red;\n"),
        ],
    );
    let project = style_project(dir.path(), None);

    assert_eq!(lint(&project).unwrap(), 0);
}

#[test]
fn violations_exit_one_and_are_located() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_files(
        root,
        &[
            ("src/sass/main.scss", CLEAN_SCSS),
            (
                "src/sass/_buttons.scss",
                ".btn {\n   color: blue !important; \n}\n.empty { }",
            ),
        ],
    );
    let project = style_project(root, None);
    assert_eq!(lint(&project).unwrap(), 1);

    let section = lint_section(&project.cfg).unwrap();
    let report = lint_project(&RealFileSystem, root, &project.output_root, &section).unwrap();
    assert_eq!(report.files_checked, 2);

    let rules: Vec<(&str, usize)> = report
        .violations
        .iter()
        .map(|v| (v.rule, v.line))
        .collect();
    assert!(rules.contains(&("indentation", 2)));
    assert!(rules.contains(&("no-important", 2)));
    assert!(rules.contains(&("no-trailing-whitespace", 2)));
    assert!(rules.contains(&("no-empty-rulesets", 4)));
    assert!(rules.contains(&("final-newline", 4)));
    assert!(report
        .violations
        .iter()
        .all(|v| v.path == Path::new("src/sass/_buttons.scss")));
}

#[test]
fn lint_section_overrides_style_watch_patterns() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_files(
        root,
        &[
            ("src/sass/main.scss", "body { color: red !important; }\n"),
            ("src/sass/vendor/reset.scss", "a{}\n"),
        ],
    );

    let mut section = LintSection::with_input(vec!["src/sass/**/*.scss".into()]);
    section.exclude = vec!["src/sass/vendor/**".into()];
    section.no_important = false;
    let project = style_project(root, Some(section));

    assert_eq!(lint(&project).unwrap(), 0);
}

#[test]
fn nothing_to_lint_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ConfigFileBuilder::new()
        .with_task("stamp", TaskConfigBuilder::command("true").build())
        .build();
    let project = Project::new(dir.path().to_path_buf(), cfg, Arc::new(RealFileSystem)).unwrap();

    let err = lint(&project).unwrap_err();
    assert!(err.is_configuration());
}
