//! Line dispatch: decide what one input line asks for and run it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::scheduler::{PipelineRunner, Supervisor};
use crate::sink::{OutputSink, Terminal};

/// Keyword that turns a line into a parallel batch.
pub const RUNPARALLEL: &str = "runparallel";

/// What the caller should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// The user asked to leave.
    Exit,
}

/// The parsed intent of one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch<'a> {
    /// Nothing to do.
    Empty,
    /// `exit`.
    Exit,
    /// `cd [path]`.
    ChangeDir(Option<&'a str>),
    /// `runparallel a;b;c`, with empty commands already dropped.
    Parallel(Vec<String>),
    /// Anything else: a plain command or a pipeline.
    Pipeline(&'a str),
}

impl<'a> Dispatch<'a> {
    /// Classify a line. Built-ins only match when the line is not a pipeline.
    pub fn classify(line: &'a str) -> Self {
        let line = line.trim();
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else {
            return Dispatch::Empty;
        };

        if first == RUNPARALLEL {
            let rest = &line[RUNPARALLEL.len()..];
            return Dispatch::Parallel(split_batch(rest));
        }

        if !line.contains('|') {
            match first {
                "exit" => return Dispatch::Exit,
                "cd" => return Dispatch::ChangeDir(tokens.next()),
                _ => {}
            }
        }

        Dispatch::Pipeline(line)
    }
}

/// Split a `runparallel` body on `;`, trimming and dropping empty commands.
pub fn split_batch(body: &str) -> Vec<String> {
    body.split(';')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Expand a leading `~` against `home`.
pub fn expand_tilde(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        home.to_path_buf()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// The execution engine: one entry point for every input line.
///
/// Holds no state between lines beyond its configuration and output sink.
pub struct Engine {
    config: EngineConfig,
    sink: Arc<dyn OutputSink>,
}

impl Engine {
    /// An engine writing to the process's terminal.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_sink(config, Arc::new(Terminal))
    }

    /// An engine writing to a custom sink.
    pub fn with_sink(config: EngineConfig, sink: Arc<dyn OutputSink>) -> Self {
        Self { config, sink }
    }

    /// A pipeline runner sharing this engine's sink.
    pub fn pipeline(&self) -> PipelineRunner {
        PipelineRunner::new(self.sink.clone(), self.config.interactive)
    }

    /// A batch supervisor sharing this engine's sink.
    pub fn supervisor(&self) -> Supervisor {
        Supervisor::new(
            self.sink.clone(),
            self.config.task_timeout,
            self.config.status_interval,
        )
    }

    /// Handle one input line.
    ///
    /// Unit failures (a stage or task that fails) are reported through the
    /// sink and still return `Ok`. `Err` means the line itself was unusable or
    /// the engine's plumbing failed.
    #[tracing::instrument(level = "info", skip(self, line), fields(line_len = line.len()))]
    pub async fn execute(&self, line: &str) -> EngineResult<Flow> {
        match Dispatch::classify(line) {
            Dispatch::Empty => {}
            Dispatch::Exit => return Ok(Flow::Exit),
            Dispatch::ChangeDir(path) => self.change_dir(path)?,
            Dispatch::Parallel(commands) => {
                if commands.is_empty() {
                    return Err(EngineError::EmptyBatch);
                }
                self.supervisor().run(&commands).await;
            }
            Dispatch::Pipeline(line) => {
                self.pipeline().run(line).await?;
            }
        }
        Ok(Flow::Continue)
    }

    /// Resolve the target of `cd` without changing anything.
    pub fn resolve_dir(&self, path: Option<&str>) -> EngineResult<PathBuf> {
        let path = path.ok_or(EngineError::NoPath)?;
        Ok(expand_tilde(path, &self.config.home))
    }

    fn change_dir(&self, path: Option<&str>) -> EngineResult<()> {
        let target = self.resolve_dir(path)?;
        std::env::set_current_dir(&target).map_err(|source| EngineError::ChangeDir {
            path: target.clone(),
            source,
        })?;
        tracing::debug!(cwd = %target.display(), "changed directory");
        Ok(())
    }
}
