use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use sitedag::dag::{Scheduler, StagePlan};
use sitedag::engine::{
    BuildRun, CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TaskStatus,
};
use sitedag::events::{BuildEvent, EventBus};
use sitedag::types::UnitKind;
use sitedag_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use sitedag_test_utils::fake_executor::FakeExecutor;
use sitedag_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

/// clean -> [css, images] -> sitemap, plus `vendor` reached only via
/// css's `after`.
fn site_plan() -> StagePlan {
    let cfg = ConfigFileBuilder::new()
        .with_task("clean", TaskConfigBuilder::new(UnitKind::Clean).build())
        .with_task(
            "css",
            TaskConfigBuilder::new(UnitKind::Style)
                .input("src/sass/*.scss")
                .after("vendor")
                .build(),
        )
        .with_task(
            "vendor",
            TaskConfigBuilder::new(UnitKind::Concat)
                .input("src/js/vendor/*.js")
                .file("vendor.js")
                .build(),
        )
        .with_task(
            "images",
            TaskConfigBuilder::new(UnitKind::Copy).input("src/img/**/*").build(),
        )
        .with_task("sitemap", TaskConfigBuilder::command("true").build())
        .with_pipeline("site", &[&["clean"], &["css", "images"], &["sitemap"]])
        .build();

    let tasks = cfg.tasks();
    StagePlan::resolve("site", &cfg.pipelines()["site"], |name| {
        tasks.get(name).map(|t| t.after.as_slice())
    })
    .unwrap()
}

async fn run_with(executor_failing: &[&str]) -> (Vec<String>, BuildRun, Vec<BuildEvent>) {
    let plan = site_plan();
    let core = CoreRuntime::new(
        Scheduler::from_plan(&plan),
        RuntimeOptions {
            exit_when_idle: true,
        },
    );

    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let mut executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed));
    for task in executor_failing {
        executor = executor.failing(task);
    }

    let bus = EventBus::default();
    let mut events_rx = bus.subscribe();

    tx.send(RuntimeEvent::RunRequested {
        tasks: plan.task_names().map(str::to_string).collect(),
    })
    .await
    .unwrap();

    let runs = with_timeout(Runtime::new(core, rx, executor, bus).run())
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = events_rx.try_recv() {
        events.push(event);
    }

    let executed = executed.lock().unwrap().clone();
    (executed, runs.into_iter().last().unwrap(), events)
}

fn position(executed: &[String], task: &str) -> usize {
    executed.iter().position(|t| t == task).unwrap()
}

#[tokio::test]
async fn stages_and_after_edges_are_respected() -> TestResult {
    init_tracing();

    let (executed, run, _) = run_with(&[]).await;

    assert_eq!(executed.len(), 5);
    assert_eq!(executed[0], "clean");
    assert!(position(&executed, "vendor") < position(&executed, "css"));
    assert!(position(&executed, "css") < position(&executed, "sitemap"));
    assert!(position(&executed, "images") < position(&executed, "sitemap"));
    assert!(run.succeeded());
    Ok(())
}

#[tokio::test]
async fn failure_skips_later_stages_but_siblings_finish() -> TestResult {
    init_tracing();

    let (executed, run, events) = run_with(&["css"]).await;

    assert!(executed.contains(&"images".to_string()));
    assert!(!executed.contains(&"sitemap".to_string()));
    assert!(!run.succeeded());
    assert!(matches!(run.status_of("css"), Some(TaskStatus::Failed(_))));
    assert_eq!(run.status_of("sitemap"), Some(&TaskStatus::Skipped));
    assert_eq!(run.failed_tasks(), vec!["css"]);

    assert!(events.contains(&BuildEvent::TaskSkipped {
        task: "sitemap".into()
    }));
    assert!(matches!(
        events.last(),
        Some(BuildEvent::RunFinished {
            succeeded: false,
            ..
        })
    ));
    Ok(())
}

#[tokio::test]
async fn clean_failure_stops_the_build() -> TestResult {
    init_tracing();

    let (executed, run, _) = run_with(&["clean"]).await;

    assert_eq!(executed, vec!["clean".to_string(), "vendor".to_string()]);
    for task in ["css", "images", "sitemap"] {
        assert_eq!(run.status_of(task), Some(&TaskStatus::Skipped), "{task}");
    }
    Ok(())
}
