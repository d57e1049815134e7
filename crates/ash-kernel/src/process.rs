//! Process spawner: the primitive both the pipeline and the batch supervisor
//! are built on.
//!
//! A [`Stage`] is started with a [`Wiring`] that says where each of its three
//! streams goes:
//!
//! | Wiring             | stdin                          | stdout            | stderr          |
//! |--------------------|--------------------------------|-------------------|-----------------|
//! | `inherit`          | terminal                       | terminal          | terminal        |
//! | `stage(.., false)` | terminal / upstream / closed   | captured          | captured        |
//! | `stage(.., true)`  | terminal / upstream / closed   | next stage's pipe | captured        |
//! | `combined`         | closed                         | captured          | merged into out |
//!
//! Captured streams are drained concurrently with the exit wait so a chatty
//! child can never fill a pipe and stall. Under `combined`, stdout and stderr
//! share a single pipe on unix, so the buffer keeps the order the child wrote.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Mutex;
use std::time::Duration;

use ash_types::{ExitOutcome, Stage};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

/// Read end of the pipe shared by stdout and stderr.
#[cfg(unix)]
type SharedPipe = tokio::net::unix::pipe::Receiver;
#[cfg(not(unix))]
type SharedPipe = tokio::process::ChildStdout;

use crate::error::{EngineError, EngineResult};

/// Where a process reads standard input from.
#[derive(Debug)]
pub enum Input {
    /// The shell's own stdin.
    Terminal,
    /// The read end of the previous stage's stdout pipe.
    Upstream(Stdio),
    /// An already closed stdin; reads see EOF immediately.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Terminal,
    Downstream,
    Capture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrOutput {
    Terminal,
    Capture,
    Merged,
}

/// Stream wiring for one spawned process.
#[derive(Debug)]
pub struct Wiring {
    stdin: Input,
    stdout: Output,
    stderr: ErrOutput,
}

impl Wiring {
    /// Share all three of the shell's terminal streams.
    pub fn inherit() -> Self {
        Self {
            stdin: Input::Terminal,
            stdout: Output::Terminal,
            stderr: ErrOutput::Terminal,
        }
    }

    /// A pipeline stage. When `feeds_next` is set, stdout becomes a pipe to be
    /// handed on with [`Process::take_downstream`]; otherwise it is captured.
    /// Stderr is always captured.
    pub fn stage(stdin: Input, feeds_next: bool) -> Self {
        Self {
            stdin,
            stdout: if feeds_next { Output::Downstream } else { Output::Capture },
            stderr: ErrOutput::Capture,
        }
    }

    /// Closed stdin; stdout and stderr captured into one buffer.
    pub fn combined() -> Self {
        Self {
            stdin: Input::Closed,
            stdout: Output::Capture,
            stderr: ErrOutput::Merged,
        }
    }
}

/// What a process left behind once it exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Classified exit status.
    pub outcome: ExitOutcome,
    /// Captured stdout (plus stderr for the combined wiring).
    pub stdout: String,
    /// Captured stderr. Empty for the combined wiring.
    pub stderr: String,
}

/// Start `stage` with the given wiring.
///
/// The upstream read end, if any, is moved into the child's command and the
/// parent's copy is closed when this function returns, so the only remaining
/// holders of the pipe are the two processes it connects.
pub fn spawn(stage: &Stage, wiring: Wiring) -> EngineResult<Process> {
    let Wiring { stdin, stdout, stderr } = wiring;

    let mut cmd = Command::new(&stage.program);
    cmd.args(&stage.args);
    cmd.kill_on_drop(true);

    cmd.stdin(match stdin {
        Input::Terminal => Stdio::inherit(),
        Input::Upstream(pipe) => pipe,
        Input::Closed => Stdio::null(),
    });

    let merged = stderr == ErrOutput::Merged;
    let shared_reader = if merged && cfg!(unix) {
        Some(share_output_pipe(&mut cmd).map_err(|source| EngineError::Pipe {
            command: stage.to_string(),
            source,
        })?)
    } else {
        cmd.stdout(match stdout {
            Output::Terminal => Stdio::inherit(),
            Output::Downstream | Output::Capture => Stdio::piped(),
        });
        cmd.stderr(match stderr {
            ErrOutput::Terminal => Stdio::inherit(),
            ErrOutput::Capture | ErrOutput::Merged => Stdio::piped(),
        });
        None
    };

    let child = cmd.spawn().map_err(|source| EngineError::Spawn {
        command: stage.to_string(),
        source,
    })?;
    // The command holds the parent's copies of the shared write ends; EOF
    // only arrives once they are gone.
    drop(cmd);

    let shared = match shared_reader {
        Some(reader) => Some(into_async_reader(reader).map_err(|source| EngineError::Pipe {
            command: stage.to_string(),
            source,
        })?),
        None => None,
    };

    tracing::debug!(command = %stage, pid = ?child.id(), "spawned");

    Ok(Process {
        stage: stage.clone(),
        child,
        merged,
        shared,
    })
}

/// Point the command's stdout and stderr at one new pipe and return its read end.
fn share_output_pipe(cmd: &mut Command) -> io::Result<io::PipeReader> {
    let (reader, writer) = io::pipe()?;
    cmd.stderr(writer.try_clone()?);
    cmd.stdout(writer);
    Ok(reader)
}

#[cfg(unix)]
fn into_async_reader(reader: io::PipeReader) -> io::Result<SharedPipe> {
    SharedPipe::from_owned_fd(std::os::fd::OwnedFd::from(reader))
}

#[cfg(not(unix))]
fn into_async_reader(_reader: io::PipeReader) -> io::Result<SharedPipe> {
    Err(io::Error::other("shared output pipes need unix"))
}

/// Handle to a started process.
///
/// Dropping the handle without waiting kills the process.
#[derive(Debug)]
pub struct Process {
    stage: Stage,
    child: Child,
    merged: bool,
    shared: Option<SharedPipe>,
}

impl Process {
    /// The stage this process runs.
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// OS process id, while the process is still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Take the read end of this process's stdout pipe, ready to become the
    /// next stage's stdin.
    pub fn take_downstream(&mut self) -> EngineResult<Stdio> {
        let stdout = self.child.stdout.take().ok_or_else(|| EngineError::Pipe {
            command: self.stage.to_string(),
            source: io::Error::other("stdout is not piped"),
        })?;
        TryInto::<Stdio>::try_into(stdout).map_err(|source| EngineError::Pipe {
            command: self.stage.to_string(),
            source,
        })
    }

    /// Wait for the process to exit, collecting captured output.
    pub async fn wait(mut self) -> EngineResult<Completion> {
        self.collect().await
    }

    /// Like [`Process::wait`], but kill the process if it is still running
    /// after `limit`.
    pub async fn wait_with_deadline(mut self, limit: Duration) -> EngineResult<Completion> {
        let finished = tokio::time::timeout(limit, self.collect()).await;
        match finished {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    command = %self.stage,
                    pid = ?self.id(),
                    ?limit,
                    "deadline expired, killing process"
                );
                if let Err(e) = self.child.kill().await {
                    tracing::warn!(command = %self.stage, "failed to kill process: {}", e);
                }
                Err(EngineError::TimedOut {
                    command: self.stage.to_string(),
                    limit,
                })
            }
        }
    }

    async fn collect(&mut self) -> EngineResult<Completion> {
        let stdout_buf = Mutex::new(Vec::new());
        let stderr_buf = Mutex::new(Vec::new());
        let err_target = if self.merged { &stdout_buf } else { &stderr_buf };

        let shared = self.shared.take();
        let stdout = self.child.stdout.take();
        let stderr = self.child.stderr.take();

        let (shared_read, out_read, err_read, status) = tokio::join!(
            drain_into(shared, &stdout_buf),
            drain_into(stdout, &stdout_buf),
            drain_into(stderr, err_target),
            self.child.wait(),
        );

        let status = status.map_err(|source| EngineError::Wait {
            command: self.stage.to_string(),
            source,
        })?;

        for read in [shared_read, out_read, err_read] {
            if let Err(e) = read {
                tracing::debug!(command = %self.stage, "output stream ended early: {}", e);
            }
        }

        let code = exit_code(status);
        tracing::debug!(command = %self.stage, code, "exited");

        Ok(Completion {
            outcome: ExitOutcome::from_code(code),
            stdout: into_string(stdout_buf),
            stderr: into_string(stderr_buf),
        })
    }
}

/// Read a pipe to EOF, appending each chunk to `buf` as it arrives.
async fn drain_into<R>(pipe: Option<R>, buf: &Mutex<Vec<u8>>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok(());
    };

    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(&chunk[..n]);
    }
}

fn into_string(buf: Mutex<Vec<u8>>) -> String {
    let bytes = buf.into_inner().unwrap_or_else(|e| e.into_inner());
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Exit code, with signal deaths mapped to `128 + signal` like a POSIX shell.
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or_else(|| {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            128 + status.signal().unwrap_or(0)
        }
        #[cfg(not(unix))]
        {
            -1
        }
    })
}
