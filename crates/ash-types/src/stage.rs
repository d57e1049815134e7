//! Stages: one program invocation parsed from a command segment.

use std::fmt;

/// One program invocation: a program name and its arguments.
///
/// Parsed by whitespace-splitting a trimmed segment. No quoting, globbing or
/// variable expansion happens here; every token is passed through literally.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Stage {
    /// Program name or path, resolved through `PATH` by the OS.
    pub program: String,
    /// Arguments in order.
    pub args: Vec<String>,
}

impl Stage {
    /// Create a stage from a program and its arguments.
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse one segment. Returns `None` when the segment has no tokens.
    pub fn parse(segment: &str) -> Option<Self> {
        let mut tokens = segment.split_whitespace();
        let program = tokens.next()?;
        Some(Self {
            program: program.to_string(),
            args: tokens.map(str::to_string).collect(),
        })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Split a line on `|` and parse each segment into a stage.
///
/// Empty segments are dropped rather than treated as errors, so
/// `"a | | b"` yields two stages and `"| a"` yields one.
pub fn parse_pipeline(line: &str) -> Vec<Stage> {
    line.split('|').filter_map(Stage::parse).collect()
}
