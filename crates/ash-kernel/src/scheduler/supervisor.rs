//! Parallel supervisor: runs a `runparallel` batch.
//!
//! ```text
//!   ┌───────────── Supervisor::run ──────────────┐
//!   │  register all ─▶ spawn workers ─▶ join all  │
//!   │                     │   │   │               │
//!   │   TaskTable ◀───────┘   │   └──▶ completion │
//!   │   (one mutex)  ◀── reporter      channel    │
//!   └─────────────────────────────────────────────┘
//! ```
//!
//! Each task gets its own worker and its own deadline. Workers push their
//! final record into a channel as they finish; the channel is drained after
//! the join, so the report comes out in completion order.

use std::sync::Arc;
use std::time::Duration;

use ash_types::{Stage, TaskId, TaskRecord, TaskStatus};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::EngineError;
use crate::process::{self, Wiring};
use crate::sink::OutputSink;

use super::table::TaskTable;

/// Final records of a batch, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub results: Vec<TaskRecord>,
}

impl BatchReport {
    /// True when every record is in a terminal state.
    pub fn all_terminal(&self) -> bool {
        self.results.iter().all(|r| r.status.is_terminal())
    }

    /// Number of tasks that failed or timed out.
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_failure()).count()
    }

    /// The record for a submitted command, if present.
    pub fn find(&self, command: &str) -> Option<&TaskRecord> {
        self.results.iter().find(|r| r.command == command)
    }

    /// Human-readable report: command, status, then error or output.
    pub fn render(&self) -> String {
        let mut text = String::from("\n--- Parallel Task Results ---\n");
        for result in &self.results {
            text.push_str(&format!("Command: {}\nStatus: {}\n", result.command, result.status));
            match &result.error {
                Some(err) => text.push_str(&format!("Error: {err}\n")),
                None => text.push_str(&format!("Output: {}\n", result.output.trim_end())),
            }
            text.push('\n');
        }
        text
    }
}

/// Render one status snapshot.
pub fn render_status(snapshot: &[TaskRecord]) -> String {
    let mut text = String::from("\n--- Task Status ---\n");
    for task in snapshot {
        text.push_str(&format!("Task {} ({}): {}\n", task.id, task.command, task.status));
    }
    text
}

/// Runs independent commands concurrently, each under its own timeout.
pub struct Supervisor {
    sink: Arc<dyn OutputSink>,
    task_timeout: Duration,
    status_interval: Duration,
}

impl Supervisor {
    /// Create a supervisor.
    pub fn new(
        sink: Arc<dyn OutputSink>,
        task_timeout: Duration,
        status_interval: Duration,
    ) -> Self {
        Self {
            sink,
            task_timeout,
            status_interval,
        }
    }

    /// Run a batch to completion and print the final report.
    ///
    /// Returns once every task is terminal and the report has been written.
    #[tracing::instrument(level = "info", skip(self, commands), fields(tasks = commands.len()))]
    pub async fn run(&self, commands: &[String]) -> BatchReport {
        self.run_on(Arc::new(TaskTable::new()), commands).await
    }

    async fn run_on(&self, table: Arc<TaskTable>, commands: &[String]) -> BatchReport {
        if commands.is_empty() {
            return BatchReport::default();
        }

        for (i, command) in commands.iter().enumerate() {
            table.register(TaskId(i), command.clone());
        }

        // Sized to the batch so no worker ever waits on a full queue.
        let (done_tx, mut done_rx) = mpsc::channel(commands.len());

        let (settled_tx, settled_rx) = oneshot::channel();
        let reporter = tokio::spawn(report_status(
            table.clone(),
            self.sink.clone(),
            self.status_interval,
            settled_rx,
        ));

        let mut workers: Vec<(TaskId, JoinHandle<()>)> = Vec::with_capacity(commands.len());
        for (i, command) in commands.iter().enumerate() {
            let id = TaskId(i);
            table.advance(id, TaskStatus::Running);

            let table = table.clone();
            let done_tx = done_tx.clone();
            let command = command.clone();
            let limit = self.task_timeout;

            let handle = tokio::spawn(async move {
                let record = run_task(id, command, limit).await;
                table.finish(&record);
                if done_tx.send(record).await.is_err() {
                    tracing::warn!(task = %id, "completion queue closed before result was sent");
                }
            });
            workers.push((id, handle));
        }
        drop(done_tx);

        // Join barrier. A worker that died without reporting is failed here so
        // the table still ends fully terminal.
        let mut lost = Vec::new();
        for (id, handle) in workers {
            if let Err(e) = handle.await {
                let command = commands[id.0].clone();
                let err = EngineError::Worker {
                    command: command.clone(),
                    reason: e.to_string(),
                };
                tracing::error!(task = %id, "{}", err);
                let record = TaskRecord {
                    status: TaskStatus::Failed,
                    error: Some(err.to_string()),
                    ..TaskRecord::pending(id, command)
                };
                table.finish(&record);
                lost.push(record);
            }
        }

        // The reporter may already have stopped on its own.
        let _ = settled_tx.send(());
        if let Err(e) = reporter.await {
            tracing::warn!("status reporter did not finish cleanly: {}", e);
        }

        let mut results = Vec::with_capacity(commands.len());
        while let Some(record) = done_rx.recv().await {
            results.push(record);
        }
        results.extend(lost);

        let report = BatchReport { results };
        tracing::info!(failed = report.failed(), "batch finished");
        self.sink.out(&report.render());
        report
    }
}

/// Execute one task and describe how it ended.
async fn run_task(id: TaskId, command: String, limit: Duration) -> TaskRecord {
    let mut record = TaskRecord::pending(id, command);

    let Some(stage) = Stage::parse(&record.command) else {
        record.status = TaskStatus::Failed;
        record.error = Some("empty command".to_string());
        return record;
    };

    let process = match process::spawn(&stage, Wiring::combined()) {
        Ok(process) => process,
        Err(e) => {
            record.status = TaskStatus::Failed;
            record.error = Some(e.to_string());
            return record;
        }
    };

    match process.wait_with_deadline(limit).await {
        Ok(done) => {
            record.output = done.stdout;
            if done.outcome.is_success() {
                record.status = TaskStatus::Succeeded;
            } else {
                record.status = TaskStatus::Failed;
                record.error = Some(format!("exit status {}", done.outcome.code()));
            }
        }
        Err(e @ EngineError::TimedOut { .. }) => {
            record.status = TaskStatus::TimedOut;
            record.error = Some(e.to_string());
        }
        Err(e) => {
            record.status = TaskStatus::Failed;
            record.error = Some(e.to_string());
        }
    }

    tracing::debug!(task = %id, status = %record.status, "task finished");
    record
}

/// Print a snapshot every `every` until one shows all tasks terminal.
///
/// `settled` fires once every worker has joined; the final snapshot is then
/// printed at once instead of on the next tick.
async fn report_status(
    table: Arc<TaskTable>,
    sink: Arc<dyn OutputSink>,
    every: Duration,
    mut settled: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut settled => {
                sink.out(&render_status(&table.snapshot()));
                return;
            }
        }
        let snapshot = table.snapshot();
        sink.out(&render_status(&snapshot));
        if snapshot.iter().all(|t| t.status.is_terminal()) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn supervisor(timeout: Duration) -> (Supervisor, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let supervisor = Supervisor::new(sink.clone(), timeout, Duration::from_millis(50));
        (supervisor, sink)
    }

    fn batch(commands: &[&str]) -> Vec<String> {
        commands.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn table_is_fully_terminal_after_run() {
        let (supervisor, _sink) = supervisor(Duration::from_secs(5));
        let table = Arc::new(TaskTable::new());
        let commands = batch(&["echo A", "false", "definitely_not_a_real_command_12345"]);

        supervisor.run_on(table.clone(), &commands).await;

        assert_eq!(table.len(), 3);
        assert!(table.all_terminal());
        assert_eq!(table.get(TaskId(0)).unwrap().status, TaskStatus::Succeeded);
        assert_eq!(table.get(TaskId(1)).unwrap().status, TaskStatus::Failed);
        assert_eq!(table.get(TaskId(2)).unwrap().status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn exit_one_fails_a_task() {
        let (supervisor, _sink) = supervisor(Duration::from_secs(5));
        let report = supervisor.run(&batch(&["false"])).await;
        let record = report.find("false").unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("exit status 1"));
    }

    #[tokio::test]
    async fn empty_command_fails_without_spawning() {
        let (supervisor, _sink) = supervisor(Duration::from_secs(5));
        let report = supervisor.run(&batch(&["   "])).await;
        assert_eq!(report.results[0].status, TaskStatus::Failed);
        assert_eq!(report.results[0].error.as_deref(), Some("empty command"));
    }

    #[tokio::test]
    async fn empty_batch_prints_nothing() {
        let (supervisor, sink) = supervisor(Duration::from_secs(5));
        let report = supervisor.run(&[]).await;
        assert!(report.results.is_empty());
        assert!(sink.stdout().is_empty());
    }

    #[tokio::test]
    async fn last_status_snapshot_precedes_report() {
        let (supervisor, sink) = supervisor(Duration::from_secs(5));
        supervisor.run(&batch(&["echo A"])).await;

        let out = sink.stdout();
        let snapshot = out.rfind("--- Task Status ---").unwrap();
        let report = out.find("--- Parallel Task Results ---").unwrap();
        assert!(snapshot < report);
        assert!(out.contains("Task 0 (echo A): success"));
    }

    #[tokio::test]
    async fn final_snapshot_does_not_wait_for_the_next_tick() {
        let sink = Arc::new(MemorySink::new());
        let supervisor =
            Supervisor::new(sink.clone(), Duration::from_secs(5), Duration::from_secs(30));

        let started = Instant::now();
        let report = supervisor.run(&batch(&["echo A", "true"])).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(report.all_terminal());
        let out = sink.stdout();
        assert_eq!(out.matches("--- Task Status ---").count(), 1);
        assert!(out.contains("Task 0 (echo A): success"));
        assert!(out.contains("Task 1 (true): success"));
    }

    #[tokio::test]
    async fn failed_counts_timeouts_and_failures() {
        let (supervisor, _sink) = supervisor(Duration::from_millis(300));
        let report = supervisor.run(&batch(&["echo A", "false", "sleep 5"])).await;
        assert_eq!(report.failed(), 2);
    }

    #[test]
    fn render_shows_error_instead_of_output() {
        let report = BatchReport {
            results: vec![
                TaskRecord {
                    status: TaskStatus::Succeeded,
                    output: "A\n".into(),
                    ..TaskRecord::pending(TaskId(0), "echo A")
                },
                TaskRecord {
                    status: TaskStatus::Failed,
                    output: "ignored".into(),
                    error: Some("exit status 2".into()),
                    ..TaskRecord::pending(TaskId(1), "ls /nope")
                },
            ],
        };
        let text = report.render();
        assert!(text.contains("Command: echo A\nStatus: success\nOutput: A\n"));
        assert!(text.contains("Command: ls /nope\nStatus: failed\nError: exit status 2\n"));
        assert!(!text.contains("ignored"));
    }

    #[test]
    fn status_lines_list_every_task() {
        let snapshot = vec![
            TaskRecord::pending(TaskId(0), "sleep 1"),
            TaskRecord {
                status: TaskStatus::Running,
                ..TaskRecord::pending(TaskId(1), "echo B")
            },
        ];
        let text = render_status(&snapshot);
        assert!(text.contains("Task 0 (sleep 1): pending"));
        assert!(text.contains("Task 1 (echo B): running"));
    }
}
