use std::error::Error;
use std::path::Path;

use sitedag::commands::{build, run_plan, Project};
use sitedag::engine::TaskStatus;
use sitedag::events::{BuildEvent, EventBus};
use sitedag_test_utils::{init_tracing, with_timeout, write_files};

type TestResult = Result<(), Box<dyn Error>>;

const SITE_TOML: &str = r#"
[config]
output = "dist"

[pipeline]
build = ["clean", ["css", "images", "pages"], "stamp"]

[task.clean]
kind = "clean"

[task.css]
kind = "style"
input = ["src/sass/*.scss"]
output = "css"
source_map = true

[task.images]
kind = "copy"
input = ["src/img/**/*"]
output = "img"

[task.pages]
kind = "template"
input = ["src/templates/**/*.twig"]
exclude = ["src/templates/layouts/**"]
context = { site = "Demo" }

[task.stamp]
kind = "command"
cmd = "echo built > \"$SITEDAG_OUTPUT/stamp.txt\""
"#;

fn site(root: &Path, extra: &[(&str, &str)]) -> Project {
    let mut files = vec![
        ("Sitedag.toml", SITE_TOML),
        ("src/sass/main.scss", "@import 'colors';\nbody { color: $text; }\n"),
        ("src/sass/_colors.scss", "$text: red;\n"),
        ("src/img/logo.svg", "<svg/>"),
        ("src/img/icons/star.svg", "<svg id=\"star\"/>"),
        (
            "src/templates/layouts/base.twig",
            "<title>{{ site }}</title>{% block body %}{% endblock %}",
        ),
        (
            "src/templates/index.twig",
            "{% extends \"layouts/base.twig\" %}{% block body %}<h1>{{ page.name }}</h1>{% endblock %}",
        ),
    ];
    files.extend_from_slice(extra);
    write_files(root, &files);
    Project::load(&root.join("Sitedag.toml")).unwrap()
}

fn read(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).unwrap_or_else(|e| panic!("{rel}: {e}"))
}

fn position(events: &[BuildEvent], wanted: impl Fn(&BuildEvent) -> bool) -> usize {
    events.iter().position(wanted).unwrap()
}

fn started(task: &'static str) -> impl Fn(&BuildEvent) -> bool {
    move |e| matches!(e, BuildEvent::TaskStarted { task: t, .. } if t == task)
}

fn finished(task: &'static str) -> impl Fn(&BuildEvent) -> bool {
    move |e| matches!(e, BuildEvent::TaskFinished { task: t, .. } if t == task)
}

#[tokio::test]
async fn full_build_writes_every_artifact() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    let project = site(root, &[]);

    let code = with_timeout(build(&project, "build")).await?;
    assert_eq!(code, 0);

    let css = read(root, "dist/css/main.css");
    assert!(css.starts_with("body{color:red}"));
    assert!(!css.contains("sourceMappingURL"));
    let mut styles: Vec<String> = std::fs::read_dir(root.join("dist/css"))?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    styles.sort();
    assert_eq!(styles, vec!["main.css", "main.css.map"]);

    assert_eq!(read(root, "dist/img/logo.svg"), "<svg/>");
    assert!(root.join("dist/img/icons/star.svg").is_file());

    assert_eq!(read(root, "dist/index.html"), "<title>Demo</title><h1>index</h1>");
    assert!(!root.join("dist/layouts").exists());

    assert_eq!(read(root, "dist/stamp.txt").trim(), "built");
    Ok(())
}

#[tokio::test]
async fn stages_start_only_after_the_previous_stage_finished() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let project = site(dir.path(), &[]);

    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let plan = project.plan("build")?;
    let run = with_timeout(run_plan(&project, &plan, &bus)).await?;
    assert!(run.succeeded(), "{}", run.summary());

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    let clean_done = position(&events, finished("clean"));
    for task in ["css", "images", "pages"] {
        assert!(clean_done < position(&events, started(task)), "{task} started before clean finished");
        assert!(position(&events, finished(task)) < position(&events, started("stamp")));
    }
    Ok(())
}

#[tokio::test]
async fn clean_twice_succeeds_and_removes_stale_output() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    let project = site(root, &[("dist/stale.html", "old")]);

    assert_eq!(with_timeout(build(&project, "clean")).await?, 0);
    assert!(!root.join("dist").exists());
    assert_eq!(with_timeout(build(&project, "clean")).await?, 0);
    assert!(root.join("src/sass/main.scss").is_file());
    Ok(())
}

#[tokio::test]
async fn broken_page_is_reported_but_others_are_written() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    let project = site(root, &[("src/templates/broken.twig", "{% if %}")]);

    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let plan = project.plan("pages")?;
    let run = with_timeout(run_plan(&project, &plan, &bus)).await?;

    assert!(!run.succeeded());
    assert!(matches!(
        run.status_of("pages"),
        Some(TaskStatus::Succeeded { file_errors: 1, .. })
    ));
    assert!(root.join("dist/index.html").is_file());
    assert!(!root.join("dist/broken.html").exists());

    let mut file_errors = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let BuildEvent::FileError { file, .. } = event {
            file_errors.push(file);
        }
    }
    assert_eq!(file_errors, vec![Path::new("src/templates/broken.twig").to_path_buf()]);

    assert_eq!(with_timeout(build(&project, "pages")).await?, 1);
    Ok(())
}

#[tokio::test]
async fn style_syntax_error_fails_the_task_but_siblings_complete() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    let project = site(root, &[("src/sass/main.scss", "body { color: red;\n")]);

    let bus = EventBus::default();
    let plan = project.plan("build")?;
    let run = with_timeout(run_plan(&project, &plan, &bus)).await?;

    assert!(matches!(run.status_of("css"), Some(TaskStatus::Failed(msg)) if msg.contains("src/sass/main.scss")));
    assert_eq!(run.status_of("stamp"), Some(&TaskStatus::Skipped));
    assert!(!root.join("dist/css/main.css").exists());
    assert!(root.join("dist/img/logo.svg").is_file());
    assert!(root.join("dist/index.html").is_file());

    assert_eq!(with_timeout(build(&project, "build")).await?, 1);
    Ok(())
}

#[tokio::test]
async fn unknown_pipeline_is_an_error_before_anything_runs() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    let project = site(root, &[]);

    assert!(build(&project, "publish").await.is_err());
    assert!(!root.join("dist").exists());
    Ok(())
}
