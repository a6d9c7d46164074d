//! # Runner Tests
//!
//! Plans executed end to end through the coordinator:
//! - exec steps (stdout capture, failures, timeouts)
//! - contained steps
//! - event log contents and order

use std::time::Duration;

use serde_json::{json, Value};
use stepwise::{Event, EventKind, Plan, Runner, RunnerConfig, StepwiseError};

// ============================================================================
// TEST HELPERS
// ============================================================================

fn make_plan(steps: &str) -> Plan {
    Plan::parse(&format!("schema: stepwise/plan@0.1\nsteps:\n{}", steps)).unwrap()
}

fn runner() -> Runner {
    Runner::new(RunnerConfig::testing())
}

fn step_events(runner: &Runner, step_id: &str) -> Vec<Event> {
    runner
        .event_log()
        .events()
        .into_iter()
        .filter(|e| e.kind.step_id() == Some(step_id))
        .collect()
}

fn event_types(runner: &Runner) -> Vec<&'static str> {
    runner
        .event_log()
        .events()
        .into_iter()
        .map(|e| match e.kind {
            EventKind::RunStarted { .. } => "run_started",
            EventKind::RunCompleted { .. } => "run_completed",
            EventKind::RunFailed { .. } => "run_failed",
            EventKind::StepStarted { .. } => "step_started",
            EventKind::StepCompleted { .. } => "step_completed",
            EventKind::StepFailed { .. } => "step_failed",
            EventKind::StepContained { .. } => "step_contained",
        })
        .collect()
}

// ============================================================================
// SUCCESS
// ============================================================================

#[tokio::test]
async fn exec_output_is_trimmed_stdout() {
    let plan = make_plan(
        r#"
  - id: greet
    exec:
      command: "echo '  hello  '"
  - id: sum
    exec:
      command: "expr 2 + 3"
"#,
    );

    let outcome = runner().run(&plan).await.unwrap();
    assert_eq!(outcome.get("greet"), Some(&json!("hello")));
    assert_eq!(outcome.get("sum"), Some(&json!("5")));
}

#[tokio::test]
async fn outputs_follow_plan_order() {
    let plan = make_plan(
        r#"
  - id: first
    value: 1
  - id: slow
    exec:
      command: "sleep 0.05; echo slow"
  - id: wait
    delay_ms: 1
  - id: last
    value: { done: true }
"#,
    );

    let outcome = runner().run(&plan).await.unwrap();
    let ids: Vec<&str> = outcome.outputs.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["first", "slow", "wait", "last"]);
    assert_eq!(
        outcome.values(),
        vec![&json!(1), &json!("slow"), &Value::Null, &json!({"done": true})]
    );
}

// ============================================================================
// FAILURE
// ============================================================================

#[tokio::test]
async fn failing_exec_stops_the_plan() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");
    let plan = make_plan(&format!(
        r#"
  - id: ok
    value: 1
  - id: broken
    exec:
      command: "echo nope >&2; exit 3"
  - id: never
    exec:
      command: "touch {}"
"#,
        marker.display()
    ));

    let runner = runner();
    let err = runner.run(&plan).await.unwrap_err();

    match &err {
        StepwiseError::ExecFailed { step_id, reason } => {
            assert_eq!(step_id, "broken");
            assert!(reason.contains("nope"), "reason: {}", reason);
        }
        other => panic!("expected ExecFailed, got {:?}", other),
    }
    assert!(!marker.exists(), "later step must not run");
    assert!(step_events(&runner, "never").is_empty());
    assert_eq!(
        event_types(&runner),
        vec![
            "run_started",
            "step_started",
            "step_completed",
            "step_started",
            "step_failed",
            "run_failed",
        ]
    );
}

#[tokio::test]
async fn exec_timeout_is_reported() {
    let plan = make_plan(
        r#"
  - id: sleepy
    exec:
      command: "sleep 5"
"#,
    );

    let runner = Runner::new(RunnerConfig::testing().with_exec_timeout(Duration::from_secs(1)));
    let err = runner.run(&plan).await.unwrap_err();
    assert!(matches!(
        err,
        StepwiseError::ExecTimeout { ref step_id, timeout_ms: 1000 } if step_id == "sleepy"
    ));
}

#[tokio::test]
async fn sub_second_timeout_is_reported_in_millis() {
    let plan = make_plan(
        r#"
  - id: s
    exec:
      command: "sleep 2"
"#,
    );

    let runner =
        Runner::new(RunnerConfig::testing().with_exec_timeout(Duration::from_millis(300)));
    let err = runner.run(&plan).await.unwrap_err();
    assert!(matches!(err, StepwiseError::ExecTimeout { timeout_ms: 300, .. }));
    assert!(err.to_string().contains("timed out after 300ms"), "{}", err);
}

#[tokio::test]
async fn missing_shell_is_exec_failure() {
    let plan = make_plan(
        r#"
  - id: anything
    exec:
      command: "true"
"#,
    );

    let runner = Runner::new(RunnerConfig::testing().with_shell("/definitely/not/a/shell"));
    let err = runner.run(&plan).await.unwrap_err();
    assert!(err.to_string().contains("Failed to execute command"));
}

// ============================================================================
// CONTAINMENT
// ============================================================================

#[tokio::test]
async fn contained_failure_becomes_null_and_run_continues() {
    let plan = make_plan(
        r#"
  - id: check
    exec:
      command: "exit 1"
    contain: true
  - id: after
    exec:
      command: "echo still here"
"#,
    );

    let runner = runner();
    let outcome = runner.run(&plan).await.unwrap();

    assert_eq!(outcome.get("check"), Some(&Value::Null));
    assert_eq!(outcome.get("after"), Some(&json!("still here")));

    let check_events = step_events(&runner, "check");
    assert!(check_events.iter().any(|e| matches!(
        &e.kind,
        EventKind::StepContained { error: Some(msg), .. } if msg.contains("STEP-010")
    )));
    assert!(!event_types(&runner).contains(&"step_failed"));
}

#[tokio::test]
async fn successful_contained_step_keeps_output() {
    let plan = make_plan(
        r#"
  - id: fine
    exec:
      command: "echo ok"
    contain: true
"#,
    );

    let runner = runner();
    let outcome = runner.run(&plan).await.unwrap();
    assert_eq!(outcome.get("fine"), Some(&json!("ok")));
    assert!(!event_types(&runner).contains(&"step_contained"));
}

// ============================================================================
// EVENT LOG
// ============================================================================

#[tokio::test]
async fn reused_runner_keeps_only_the_latest_run() {
    let runner = runner();
    runner
        .run(&make_plan("  - id: first\n    value: 1\n"))
        .await
        .unwrap();
    runner
        .run(&make_plan("  - id: second\n    value: 2\n"))
        .await
        .unwrap();

    assert!(step_events(&runner, "first").is_empty());
    assert_eq!(step_events(&runner, "second").len(), 2);
    let events = runner.event_log().events();
    assert_eq!(events[0].id, 0);
    assert_eq!(events[0].kind, EventKind::RunStarted { step_count: 1 });
}

// ============================================================================
// VALIDATION
// ============================================================================

#[tokio::test]
async fn invalid_plan_is_rejected_before_running() {
    let mut plan = make_plan("  - id: a\n    value: 1\n");
    plan.schema = "nope".to_string();

    let runner = runner();
    let err = runner.run(&plan).await.unwrap_err();
    assert!(matches!(err, StepwiseError::InvalidSchema { .. }));
    assert!(runner.event_log().is_empty());
}
