//! Sub-process execution with streamed output.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;

use thiserror::Error;
use tracing::debug;

use super::policy::OutputPolicy;

/// Outcome of one completed sub-process invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandResult {
  pub code: i32,
}

impl CommandResult {
  pub fn success(&self) -> bool {
    self.code == 0
  }
}

/// Errors from executing one external command.
#[derive(Debug, Error)]
pub enum ExecError {
  /// The program could not be started.
  #[error("failed to start '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The program exited with a non-zero status.
  #[error("'{program}' exited with status {code:?}")]
  Failed { program: String, code: Option<i32> },

  /// Reading the program's output failed mid-stream.
  #[error("io error while reading output of '{program}': {source}")]
  Output {
    program: String,
    #[source]
    source: std::io::Error,
  },
}

/// Executes one external command in one working directory.
///
/// Every external tool the pipeline touches (git, cmake, ninja, make,
/// configure scripts, package managers) goes through this seam, so tests can
/// substitute a recording double and observe the exact invocation order.
pub trait Runner {
  fn run(
    &mut self,
    argv: &[String],
    cwd: &Path,
    policy: &mut dyn OutputPolicy,
  ) -> Result<CommandResult, ExecError>;
}

/// Real runner backed by `std::process::Command`.
///
/// Stdout is streamed line-by-line through the policy as it is produced.
/// Stderr is drained on a relay thread so neither pipe can stall the child,
/// and its lines are interleaved into the same policy.
pub struct ProcessRunner;

impl Runner for ProcessRunner {
  fn run(
    &mut self,
    argv: &[String],
    cwd: &Path,
    policy: &mut dyn OutputPolicy,
  ) -> Result<CommandResult, ExecError> {
    let Some((program, args)) = argv.split_first() else {
      return Err(ExecError::Spawn {
        program: String::new(),
        source: std::io::Error::other("empty command line"),
      });
    };

    debug!(cmd = %argv.join(" "), cwd = %cwd.display(), "spawning");

    let mut child = Command::new(program)
      .args(args)
      .current_dir(cwd)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|e| ExecError::Spawn {
        program: program.clone(),
        source: e,
      })?;

    let stderr = child.stderr.take().expect("stderr was piped");
    let (tx, rx) = mpsc::channel::<String>();
    let stderr_thread = thread::spawn(move || {
      for line in BufReader::new(stderr).lines().map_while(Result::ok) {
        if tx.send(line).is_err() {
          break;
        }
      }
    });

    let stdout = child.stdout.take().expect("stdout was piped");
    for line in BufReader::new(stdout).lines() {
      let line = line.map_err(|e| ExecError::Output {
        program: program.clone(),
        source: e,
      })?;
      policy.relay(&line);
      for err_line in rx.try_iter() {
        policy.relay(&err_line);
      }
    }

    let status = child.wait().map_err(|e| ExecError::Output {
      program: program.clone(),
      source: e,
    })?;

    let _ = stderr_thread.join();
    for err_line in rx.try_iter() {
      policy.relay(&err_line);
    }

    if !status.success() {
      return Err(ExecError::Failed {
        program: program.clone(),
        code: status.code(),
      });
    }

    Ok(CommandResult {
      code: status.code().unwrap_or(0),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::exec::CommonPolicy;

  fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
  }

  #[test]
  #[cfg(unix)]
  fn streams_stdout_lines_in_order() {
    let mut lines = Vec::new();
    let mut policy = CommonPolicy::new(|line: &str| lines.push(line.to_string()));

    let result = ProcessRunner
      .run(&sh("echo one; echo two"), Path::new("."), &mut policy)
      .unwrap();

    assert!(result.success());
    assert_eq!(lines, ["one", "two"]);
  }

  #[test]
  #[cfg(unix)]
  fn relays_stderr_lines() {
    let mut lines = Vec::new();
    let mut policy = CommonPolicy::new(|line: &str| lines.push(line.to_string()));

    ProcessRunner
      .run(&sh("echo oops >&2"), Path::new("."), &mut policy)
      .unwrap();

    assert_eq!(lines, ["oops"]);
  }

  #[test]
  #[cfg(unix)]
  fn nonzero_exit_is_an_error() {
    let mut policy = CommonPolicy::new(|_: &str| {});

    let err = ProcessRunner
      .run(&sh("exit 3"), Path::new("."), &mut policy)
      .unwrap_err();

    assert!(matches!(
      err,
      ExecError::Failed { code: Some(3), .. }
    ));
  }

  #[test]
  fn missing_program_is_a_spawn_error() {
    let mut policy = CommonPolicy::new(|_: &str| {});
    let argv = vec!["definitely-not-a-real-tool-0x5f".to_string()];

    let err = ProcessRunner
      .run(&argv, Path::new("."), &mut policy)
      .unwrap_err();

    assert!(matches!(err, ExecError::Spawn { .. }));
  }

  #[test]
  fn empty_argv_is_rejected() {
    let mut policy = CommonPolicy::new(|_: &str| {});
    let err = ProcessRunner.run(&[], Path::new("."), &mut policy).unwrap_err();
    assert!(matches!(err, ExecError::Spawn { .. }));
  }

  #[test]
  #[cfg(unix)]
  fn runs_in_the_given_directory() {
    let temp = tempfile::TempDir::new().unwrap();
    let mut policy = CommonPolicy::new(|_: &str| {});

    ProcessRunner
      .run(&sh("touch marker"), temp.path(), &mut policy)
      .unwrap();

    assert!(temp.path().join("marker").exists());
  }
}
