//! Output sinks: where user-visible text goes.
//!
//! The engine never calls `print!` directly. Pipeline output, batch status
//! snapshots, final reports and diagnostics are all written through an
//! [`OutputSink`], shared as `Arc<dyn OutputSink>` between the caller, stage
//! workers and the status reporter.
//!
//! ```text
//!   stage workers ──┐
//!   task workers  ──┼──▶ OutputSink ──▶ Terminal (stdout / stderr)
//!   reporter      ──┘                └─▶ MemorySink (tests, embedders)
//! ```

use std::io::Write;
use std::sync::Mutex;

/// Destination for standard output and standard error text.
pub trait OutputSink: Send + Sync {
    /// Write text to standard output.
    fn out(&self, text: &str);

    /// Write text to standard error.
    fn err(&self, text: &str);
}

/// Writes to the process's own stdout and stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct Terminal;

impl OutputSink for Terminal {
    fn out(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        // A closed stdout leaves nothing to report to.
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn err(&self, text: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(text.as_bytes());
        let _ = stderr.flush();
    }
}

/// Captures both streams in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    out: Mutex<String>,
    err: Mutex<String>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written to standard output so far.
    pub fn stdout(&self) -> String {
        self.out.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Everything written to standard error so far.
    pub fn stderr(&self) -> String {
        self.err.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl OutputSink for MemorySink {
    fn out(&self, text: &str) {
        self.out.lock().unwrap_or_else(|e| e.into_inner()).push_str(text);
    }

    fn err(&self, text: &str) {
        self.err.lock().unwrap_or_else(|e| e.into_inner()).push_str(text);
    }
}
