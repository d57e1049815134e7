//! Exit outcomes of a finished process.

use std::fmt;

/// How a process that ran to completion exited.
///
/// Exit code 1 is classified as [`ExitOutcome::ExpectedEmptyResult`] for every
/// program, not only filters like `grep`. That is a deliberate policy: the
/// pipeline reports it as an informational "no matches" note rather than as a
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExitOutcome {
    /// Exit code 0.
    Success,
    /// Exit code exactly 1.
    ExpectedEmptyResult,
    /// Any other exit code. Signal deaths are reported as `128 + signal`.
    Failed(i32),
}

impl ExitOutcome {
    /// Classify a raw exit code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ExitOutcome::Success,
            1 => ExitOutcome::ExpectedEmptyResult,
            other => ExitOutcome::Failed(other),
        }
    }

    /// The exit code this outcome was classified from.
    pub fn code(&self) -> i32 {
        match self {
            ExitOutcome::Success => 0,
            ExitOutcome::ExpectedEmptyResult => 1,
            ExitOutcome::Failed(code) => *code,
        }
    }

    /// True for exit code 0 only.
    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Success)
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Success => write!(f, "success"),
            ExitOutcome::ExpectedEmptyResult => write!(f, "no matches"),
            ExitOutcome::Failed(code) => write!(f, "exit status {code}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_exit_codes() {
        assert_eq!(ExitOutcome::from_code(0), ExitOutcome::Success);
        assert_eq!(ExitOutcome::from_code(1), ExitOutcome::ExpectedEmptyResult);
        assert_eq!(ExitOutcome::from_code(2), ExitOutcome::Failed(2));
        assert_eq!(ExitOutcome::from_code(137), ExitOutcome::Failed(137));
    }

    #[test]
    fn code_round_trips_classification() {
        for code in [0, 1, 2, 127, 143] {
            assert_eq!(ExitOutcome::from_code(code).code(), code);
        }
    }

    #[test]
    fn only_zero_is_success() {
        assert!(ExitOutcome::Success.is_success());
        assert!(!ExitOutcome::ExpectedEmptyResult.is_success());
        assert!(!ExitOutcome::Failed(2).is_success());
    }
}
