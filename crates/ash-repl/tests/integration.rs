//! Integration tests for the ash REPL.
//!
//! These run lines through `Repl::process_line` against real processes.

use std::sync::Arc;
use std::time::Duration;

use ash_kernel::{Engine, EngineConfig, EngineError, Flow, MemorySink};
use ash_repl::Repl;

fn repl() -> (Repl, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let config = EngineConfig::default()
        .with_task_timeout(Duration::from_secs(5))
        .with_status_interval(Duration::from_millis(50));
    let engine = Engine::with_sink(config, sink.clone());
    (Repl::with_engine(engine).expect("Failed to create REPL"), sink)
}

#[test]
fn exit_stops_the_loop() {
    let (repl, _sink) = repl();
    assert_eq!(repl.process_line("exit").unwrap(), Flow::Exit);
}

#[test]
fn blank_line_continues() {
    let (repl, sink) = repl();
    assert_eq!(repl.process_line("   ").unwrap(), Flow::Continue);
    assert!(sink.stdout().is_empty());
}

#[test]
fn pipeline_output_reaches_the_sink() {
    let (repl, sink) = repl();
    assert_eq!(repl.process_line("echo hello | tr a-z A-Z").unwrap(), Flow::Continue);
    assert_eq!(sink.stdout(), "HELLO\n");
}

#[test]
fn runparallel_prints_a_report() {
    let (repl, sink) = repl();
    repl.process_line("runparallel echo A;echo B").unwrap();

    let out = sink.stdout();
    assert!(out.contains("--- Parallel Task Results ---"));
    assert!(out.contains("Command: echo A\nStatus: success\nOutput: A\n"));
    assert!(out.contains("Command: echo B\nStatus: success\nOutput: B\n"));
}

#[test]
fn invalid_lines_are_errors() {
    let (repl, _sink) = repl();
    assert!(matches!(repl.process_line("cd"), Err(EngineError::NoPath)));
    assert!(matches!(repl.process_line("runparallel ;"), Err(EngineError::EmptyBatch)));
}

#[test]
fn failing_command_is_not_a_line_error() {
    let (repl, sink) = repl();
    assert_eq!(repl.process_line("ls /nonexistent_dir_12345").unwrap(), Flow::Continue);
    assert!(sink.stderr().contains("exited with status 2"));
}
