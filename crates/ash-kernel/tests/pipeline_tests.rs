//! Tests for OS-pipe pipelines through the engine.
//!
//! Every stage here is a real process found on PATH.

use std::sync::Arc;

use ash_kernel::{Engine, EngineConfig, ExitOutcome, Flow, MemorySink, PipelineRunner};

fn runner() -> (PipelineRunner, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    (PipelineRunner::new(sink.clone(), false), sink)
}

// ============================================================================
// Data flow
// ============================================================================

#[tokio::test]
async fn two_stage_pipeline_transforms_output() {
    let (runner, sink) = runner();
    let report = runner.run("echo hello | tr a-z A-Z").await.unwrap();
    assert_eq!(report.output(), "HELLO\n");
    assert_eq!(sink.stdout(), "HELLO\n");
    assert!(sink.stderr().is_empty());
}

#[tokio::test]
async fn three_stage_pipeline() {
    let (runner, sink) = runner();
    runner.run("printf a\\nb\\nc\\n | grep -v b | wc -l").await.unwrap();
    assert_eq!(sink.stdout().trim(), "2");
}

#[tokio::test]
async fn large_output_streams_without_stalling() {
    let (runner, sink) = runner();
    runner.run("seq 1 200000 | tail -n 1").await.unwrap();
    assert_eq!(sink.stdout(), "200000\n");
}

#[tokio::test]
async fn only_the_last_stage_is_printed() {
    let (runner, sink) = runner();
    let report = runner.run("echo upstream | cat").await.unwrap();
    assert_eq!(report.stages[0].stdout, "");
    assert_eq!(sink.stdout(), "upstream\n");
}

#[tokio::test]
async fn intermediate_stderr_is_not_printed() {
    let (runner, sink) = runner();
    runner
        .run("ls /nonexistent_dir_12345 | cat")
        .await
        .unwrap();
    assert!(!sink.stderr().contains("No such file"));
    assert!(sink.stderr().contains("Command ls /nonexistent_dir_12345 exited with status 2"));
}

#[tokio::test]
async fn last_stage_stderr_is_printed() {
    let (runner, sink) = runner();
    runner.run("echo x | ls /nonexistent_dir_12345").await.unwrap();
    assert!(sink.stderr().contains("/nonexistent_dir_12345"));
}

// ============================================================================
// Exit classification
// ============================================================================

#[tokio::test]
async fn no_match_is_reported_and_pipeline_continues() {
    let (runner, sink) = runner();
    let report = runner.run("grep nomatch_zz_42 /etc/hosts | wc -l").await.unwrap();

    assert_eq!(report.stages[0].outcome, Some(ExitOutcome::ExpectedEmptyResult));
    assert_eq!(report.stages[1].outcome, Some(ExitOutcome::Success));
    assert_eq!(sink.stdout().trim(), "0");
    assert!(sink.stderr().contains("No matches found for command: grep nomatch_zz_42 /etc/hosts"));
}

#[tokio::test]
async fn failing_middle_stage_does_not_stop_the_rest() {
    let (runner, sink) = runner();
    let report = runner
        .run("echo data | ls /nonexistent_dir_12345 | wc -c")
        .await
        .unwrap();

    assert_eq!(report.stages.len(), 3);
    assert_eq!(report.stages[1].outcome, Some(ExitOutcome::Failed(2)));
    assert_eq!(report.stages[2].outcome, Some(ExitOutcome::Success));
    assert_eq!(sink.stdout().trim(), "0");
}

#[tokio::test]
async fn unstartable_middle_stage_gives_successor_eof() {
    let (runner, sink) = runner();
    let report = runner
        .run("echo data | definitely_not_a_real_command_12345 | wc -l")
        .await
        .unwrap();

    assert_eq!(report.stages[1].outcome, None);
    assert_eq!(sink.stdout().trim(), "0");
    assert!(sink.stderr().contains("error starting command definitely_not_a_real_command_12345"));
}

// ============================================================================
// Through the engine
// ============================================================================

#[tokio::test]
async fn engine_runs_pipelines_and_continues() {
    let sink = Arc::new(MemorySink::new());
    let engine = Engine::with_sink(EngineConfig::default(), sink.clone());
    let flow = engine.execute("echo hi | tr a-z A-Z").await.unwrap();
    assert_eq!(flow, Flow::Continue);
    assert_eq!(sink.stdout(), "HI\n");
}
