//! Output policies for external commands.
//!
//! A policy relays each line of a sub-process's output to a reporting sink as
//! the line is produced, keeping progress observable during long builds. The
//! cmake flavor additionally recognizes the generator's own error phrasing
//! and escalates those lines in the log; everything else goes through the
//! generic flavor. Success/failure classification from the exit status is
//! shared and lives in the runner.

use tracing::{error, warn};

/// Relays sub-process output lines as they are produced.
pub trait OutputPolicy {
  fn relay(&mut self, line: &str);
}

/// Generic policy for build tools, configure scripts, and other commands.
pub struct CommonPolicy<F: FnMut(&str)> {
  sink: F,
}

impl<F: FnMut(&str)> CommonPolicy<F> {
  pub fn new(sink: F) -> Self {
    Self { sink }
  }
}

impl<F: FnMut(&str)> OutputPolicy for CommonPolicy<F> {
  fn relay(&mut self, line: &str) {
    (self.sink)(line);
  }
}

/// Policy tuned to cmake's logging conventions.
pub struct CmakePolicy<F: FnMut(&str)> {
  sink: F,
}

impl<F: FnMut(&str)> CmakePolicy<F> {
  pub fn new(sink: F) -> Self {
    Self { sink }
  }
}

impl<F: FnMut(&str)> OutputPolicy for CmakePolicy<F> {
  fn relay(&mut self, line: &str) {
    if line.starts_with("CMake Error") {
      error!(target: "cmake", "{line}");
    } else if line.starts_with("CMake Warning") {
      warn!(target: "cmake", "{line}");
    }
    (self.sink)(line);
  }
}
