//! Pipeline execution for ash.
//!
//! Every stage is a real process. Stage *i*'s stdout is an OS pipe moved
//! straight into stage *i+1*'s stdin, so all stages run at once and
//! back-pressure is the kernel's business, not ours.
//!
//! ```text
//!   terminal stdin ─▶ stage 0 ──pipe──▶ stage 1 ──pipe──▶ stage 2 ─▶ captured
//!                       │                 │                 │         stdout
//!                    stderr            stderr            stderr ───▶ printed
//!                   (discarded)       (discarded)
//! ```
//!
//! Each started stage is watched by its own tokio task. The runner joins all
//! of them before printing anything, and a failing stage never cancels its
//! siblings: downstream stages simply see whatever partial input they got.

use std::process::Stdio;
use std::sync::Arc;

use ash_types::{ExitOutcome, Stage, parse_pipeline};
use tokio::task::JoinHandle;

use crate::error::{EngineError, EngineResult};
use crate::process::{self, Completion, Input, Process, Wiring};
use crate::sink::OutputSink;

/// What happened to one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    /// The stage as parsed.
    pub stage: Stage,
    /// Exit outcome, or `None` if the stage never started or its wait failed.
    pub outcome: Option<ExitOutcome>,
    /// Captured stdout. Always empty for stages that fed a successor.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl StageReport {
    fn abandoned(stage: Stage) -> Self {
        Self {
            stage,
            outcome: None,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    fn completed(stage: Stage, done: Completion) -> Self {
        Self {
            stage,
            outcome: Some(done.outcome),
            stdout: done.stdout,
            stderr: done.stderr,
        }
    }
}

/// Per-stage results of one pipeline run, in stage order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    /// The final stage, whose output is the pipeline's output.
    pub fn last(&self) -> Option<&StageReport> {
        self.stages.last()
    }

    /// Stdout of the final stage.
    pub fn output(&self) -> &str {
        self.last().map(|s| s.stdout.as_str()).unwrap_or("")
    }
}

enum Worker {
    Watching { stage: Stage, handle: JoinHandle<StageReport> },
    Abandoned(StageReport),
}

impl Worker {
    fn abort(&self) {
        if let Worker::Watching { handle, .. } = self {
            handle.abort();
        }
    }
}

/// Runs `|`-separated lines as chains of OS processes.
pub struct PipelineRunner {
    sink: Arc<dyn OutputSink>,
    interactive: bool,
}

impl PipelineRunner {
    /// Create a runner writing to `sink`. With `interactive`, a single-stage
    /// line runs attached to the terminal instead of being captured.
    pub fn new(sink: Arc<dyn OutputSink>, interactive: bool) -> Self {
        Self { sink, interactive }
    }

    /// Execute one line.
    ///
    /// Returns `Err` only for infrastructure failures (a stage's stdout could
    /// not be turned into the next stage's stdin). Stage failures are written
    /// to the sink and recorded in the report.
    #[tracing::instrument(level = "debug", skip(self, line), fields(line_len = line.len()))]
    pub async fn run(&self, line: &str) -> EngineResult<PipelineReport> {
        self.run_linked(line, Process::take_downstream).await
    }

    /// [`PipelineRunner::run`] with the hand-off between stages supplied by
    /// the caller.
    async fn run_linked<L>(&self, line: &str, link: L) -> EngineResult<PipelineReport>
    where
        L: FnMut(&mut Process) -> EngineResult<Stdio>,
    {
        let stages = parse_pipeline(line);
        if stages.is_empty() {
            return Ok(PipelineReport::default());
        }

        tracing::debug!(stage_count = stages.len(), "starting pipeline");

        if stages.len() == 1 && self.interactive {
            let report = self.run_attached(&stages[0]).await;
            return Ok(PipelineReport { stages: vec![report] });
        }

        let workers = self.start(&stages, link)?;

        // Join barrier: every stage has terminated before anything is printed.
        let mut reports = Vec::with_capacity(workers.len());
        for worker in workers {
            let report = match worker {
                Worker::Abandoned(report) => report,
                Worker::Watching { stage, handle } => match handle.await {
                    Ok(report) => report,
                    Err(e) => {
                        let err = EngineError::Worker {
                            command: stage.to_string(),
                            reason: e.to_string(),
                        };
                        self.sink.err(&format!("{err}\n"));
                        StageReport::abandoned(stage)
                    }
                },
            };
            reports.push(report);
        }

        let (last, upstream) = match reports.split_last() {
            Some(split) => split,
            None => return Ok(PipelineReport::default()),
        };
        for report in upstream.iter().filter(|r| !r.stderr.is_empty()) {
            tracing::debug!(
                command = %report.stage,
                stderr = %report.stderr,
                "discarding intermediate stderr"
            );
        }
        if !last.stdout.is_empty() {
            self.sink.out(&last.stdout);
        }
        if !last.stderr.is_empty() {
            self.sink.err(&last.stderr);
        }

        Ok(PipelineReport { stages: reports })
    }

    /// Start every stage, linking each to its predecessor with `link`, and
    /// hand each started process to a watcher task.
    fn start<L>(&self, stages: &[Stage], mut link: L) -> EngineResult<Vec<Worker>>
    where
        L: FnMut(&mut Process) -> EngineResult<Stdio>,
    {
        let mut workers: Vec<Worker> = Vec::with_capacity(stages.len());
        let mut upstream: Option<Stdio> = None;

        for (i, stage) in stages.iter().enumerate() {
            let feeds_next = i + 1 < stages.len();
            let stdin = match upstream.take() {
                Some(pipe) => Input::Upstream(pipe),
                None if i == 0 => Input::Terminal,
                // Predecessor never started: read EOF.
                None => Input::Closed,
            };

            let mut process = match process::spawn(stage, Wiring::stage(stdin, feeds_next)) {
                Ok(process) => process,
                Err(e) => {
                    self.sink.err(&format!("{e}\n"));
                    workers.push(Worker::Abandoned(StageReport::abandoned(stage.clone())));
                    continue;
                }
            };

            if feeds_next {
                match link(&mut process) {
                    Ok(pipe) => {
                        tracing::debug!(command = %stage, pid = ?process.id(), "linked");
                        upstream = Some(pipe);
                    }
                    Err(e) => {
                        tracing::error!(command = %stage, "pipeline setup failed: {}", e);
                        // Aborting a watcher drops its process, which kills it.
                        for worker in &workers {
                            worker.abort();
                        }
                        return Err(e);
                    }
                }
            }

            workers.push(Worker::Watching {
                stage: stage.clone(),
                handle: self.watch(process),
            });
        }

        Ok(workers)
    }

    fn watch(&self, process: Process) -> JoinHandle<StageReport> {
        let sink = self.sink.clone();
        tokio::spawn(async move {
            let stage = process.stage().clone();
            match process.wait().await {
                Ok(done) => {
                    report_outcome(sink.as_ref(), &stage, done.outcome);
                    StageReport::completed(stage, done)
                }
                Err(e) => {
                    sink.err(&format!("{e}\n"));
                    StageReport::abandoned(stage)
                }
            }
        })
    }

    /// Run a lone stage on the terminal's own streams.
    async fn run_attached(&self, stage: &Stage) -> StageReport {
        let process = match process::spawn(stage, Wiring::inherit()) {
            Ok(process) => process,
            Err(e) => {
                self.sink.err(&format!("{e}\n"));
                return StageReport::abandoned(stage.clone());
            }
        };

        match process.wait().await {
            Ok(done) => {
                report_outcome(self.sink.as_ref(), stage, done.outcome);
                StageReport::completed(stage.clone(), done)
            }
            Err(e) => {
                self.sink.err(&format!("{e}\n"));
                StageReport::abandoned(stage.clone())
            }
        }
    }
}

/// Write the diagnostic, if any, for a stage's exit.
fn report_outcome(sink: &dyn OutputSink, stage: &Stage, outcome: ExitOutcome) {
    match outcome {
        ExitOutcome::Success => {}
        ExitOutcome::ExpectedEmptyResult => {
            sink.err(&format!("No matches found for command: {stage}\n"));
        }
        ExitOutcome::Failed(code) => {
            sink.err(&format!("Command {stage} exited with status {code}\n"));
        }
    }
}
