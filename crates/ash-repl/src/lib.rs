//! ash REPL: the interactive front end of the ash shell.
//!
//! Reads lines with rustyline, hands each one to the [`Engine`], and keeps a
//! plain-text history in `~/.ash_history.txt`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use tokio::runtime::Runtime;

use ash_kernel::{Engine, EngineConfig, EngineResult, Flow, paths};

const HOSTNAME_FILE: &str = "/proc/sys/kernel/hostname";

/// Inputs to the prompt and the history location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplConfig {
    pub user: String,
    pub hostname: String,
    pub history_path: PathBuf,
}

impl ReplConfig {
    /// Read user and hostname from the environment.
    pub fn from_env() -> Self {
        Self {
            user: current_user(),
            hostname: read_hostname(),
            history_path: paths::history_file(),
        }
    }

    /// The prompt for a given working directory.
    pub fn prompt(&self, cwd: &Path) -> String {
        format!("{}@{} {} > ", self.user, self.hostname, cwd.display())
    }
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn read_hostname() -> String {
    std::fs::read_to_string(HOSTNAME_FILE)
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// REPL state: the engine plus the runtime that drives it.
pub struct Repl {
    engine: Engine,
    runtime: Runtime,
}

impl Repl {
    /// A REPL whose single-stage commands run attached to the terminal.
    pub fn new() -> Result<Self> {
        Self::with_config(EngineConfig::repl())
    }

    /// A REPL with a custom engine configuration.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        Self::with_engine(Engine::new(config))
    }

    /// A REPL around an existing engine.
    pub fn with_engine(engine: Engine) -> Result<Self> {
        let runtime = Runtime::new().context("Failed to create tokio runtime")?;
        Ok(Self { engine, runtime })
    }

    /// Process a single line of input.
    pub fn process_line(&self, line: &str) -> EngineResult<Flow> {
        self.runtime.block_on(self.engine.execute(line))
    }
}

/// Load history, ignoring a missing file.
fn load_history(rl: &mut Editor<(), DefaultHistory>, path: &Path) {
    if let Err(e) = rl.load_history(path) {
        let is_not_found = matches!(
            &e,
            ReadlineError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound
        );
        if !is_not_found {
            tracing::warn!("Failed to load history: {}", e);
        }
    }
}

/// Save REPL history to disk.
fn save_history(rl: &mut Editor<(), DefaultHistory>, path: &Path) {
    if let Err(e) = rl.save_history(path) {
        tracing::warn!("Failed to save history: {}", e);
    }
}

/// Run the interactive loop until `exit`, Ctrl-D, or a terminal error.
pub fn run() -> Result<()> {
    run_with(ReplConfig::from_env(), Repl::new()?)
}

/// Run the interactive loop with explicit prompt inputs and engine.
pub fn run_with(config: ReplConfig, repl: Repl) -> Result<()> {
    let mut rl: Editor<(), DefaultHistory> = Editor::new().context("Failed to create editor")?;
    load_history(&mut rl, &config.history_path);

    loop {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("?"));
        let prompt = config.prompt(&cwd);

        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Err(e) = rl.add_history_entry(line) {
                    tracing::warn!("Failed to add history entry: {}", e);
                }

                match repl.process_line(line) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Exit) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "line failed");
                        eprintln!("{line} is not valid");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    println!("Exiting shell...");
    save_history(&mut rl, &config.history_path);
    Ok(())
}
