//! ash CLI entry point.
//!
//! Usage:
//!   ash                 # Interactive shell
//!   ash -c <line>       # Execute one line and exit

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use ash_kernel::{EngineConfig, Flow};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> ExitCode {
    // Respects RUST_LOG; diagnostics go to stderr so they never mix with command output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        None => {
            ash_repl::run()?;
            Ok(ExitCode::SUCCESS)
        }

        Some("--help" | "-h") => {
            print_help();
            Ok(ExitCode::SUCCESS)
        }

        Some("--version" | "-V") => {
            println!(
                "ash {} ({} {})",
                env!("CARGO_PKG_VERSION"),
                env!("ASH_GIT_HASH"),
                env!("ASH_BUILD_DATE")
            );
            Ok(ExitCode::SUCCESS)
        }

        Some("-c") => {
            let line = args.get(2).context("-c requires a command argument")?;
            run_command(line)
        }

        Some(unknown) => {
            eprintln!("Unknown option: {unknown}");
            eprintln!("Run 'ash --help' for usage.");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_help() {
    println!(
        r#"ash v{}

Usage:
  ash                          Interactive shell
  ash -c <line>                Execute one line and exit

Options:
  -c <line>                    Execute a command line and exit
  -h, --help                   Show this help
  -V, --version                Show version

Lines:
  cmd args | cmd args ...      Pipeline of external commands
  runparallel a;b;c            Run commands in parallel with a 10s timeout each
  cd <path>                    Change directory (~ is your home)
  exit                         Leave the shell
"#,
        env!("CARGO_PKG_VERSION")
    );
}

/// Execute one line and exit.
fn run_command(line: &str) -> Result<ExitCode> {
    // Captured mode: output goes through the engine's sink like a pipeline.
    let repl = ash_repl::Repl::with_config(EngineConfig::default())?;
    match repl.process_line(line) {
        Ok(Flow::Continue | Flow::Exit) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
