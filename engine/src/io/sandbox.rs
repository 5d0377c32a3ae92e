//! Backend selection for sandboxed command execution.
//!
//! [`Sandbox`] is the uniform surface over the two execution backends: the
//! external isolated runner and the in-process confined executor. The
//! [`Dispatcher`] probes for the external runner executable exactly once at
//! construction and routes every call to the chosen backend afterwards.
//! Tests use scripted implementations of the trait instead of spawning
//! processes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::core::exec::ExecOutcome;
use crate::io::external::ExternalRunner;
use crate::io::local::LocalSandbox;

/// Errors that abort a sandbox call outright instead of being captured as an
/// `ok = false` [`ExecOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// The external runner existed when the dispatcher probed for it but was
    /// gone at call time. Configuration rot, not an episode event: surfaced
    /// to the caller rather than silently downgraded to the fallback.
    #[error("external runner vanished from {path}")]
    RunnerVanished { path: PathBuf },
}

/// Uniform contract over execution backends.
///
/// Per-command failures (timeouts, sandbox escapes, patch rejections, missing
/// tools) are data: an outcome with `ok = false`. Only configuration-level
/// failures surface as [`SandboxError`].
pub trait Sandbox {
    /// Run an arbitrary command with working directory `root`.
    fn run(&self, argv: &[String], root: &Path, timeout: Duration)
    -> Result<ExecOutcome, SandboxError>;

    /// Run the workspace test suite.
    fn run_tests(&self, root: &Path, timeout: Duration) -> Result<ExecOutcome, SandboxError>;

    /// Read one file confined to `root`; contents arrive as `stdout`.
    fn read_file(
        &self,
        path: &str,
        root: &Path,
        timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError>;

    /// Apply one unified diff to the workspace.
    fn apply_diff(
        &self,
        diff: &str,
        root: &Path,
        timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError>;
}

/// Routes commands to the external runner or the in-process fallback.
///
/// The choice is made once, at [`Dispatcher::probe`]; a runner binary that
/// appears later is ignored for the dispatcher's lifetime, and one that
/// disappears later is a fatal error (see [`SandboxError::RunnerVanished`]).
#[derive(Debug)]
pub enum Dispatcher {
    External(ExternalRunner),
    Fallback(LocalSandbox),
}

impl Dispatcher {
    /// Probe `runner_path` once and pick the backend.
    pub fn probe(runner_path: impl Into<PathBuf>) -> Self {
        let runner_path = runner_path.into();
        if runner_path.exists() {
            info!(path = %runner_path.display(), "using external isolated runner");
            Dispatcher::External(ExternalRunner::new(runner_path))
        } else {
            info!(path = %runner_path.display(), "external runner absent, using in-process fallback");
            Dispatcher::Fallback(LocalSandbox::default())
        }
    }

    fn backend_label(&self) -> &'static str {
        match self {
            Dispatcher::External(_) => "external",
            Dispatcher::Fallback(_) => "fallback",
        }
    }

    fn tag(&self, mut outcome: ExecOutcome) -> ExecOutcome {
        outcome
            .meta
            .entry("backend".to_string())
            .or_insert_with(|| Value::String(self.backend_label().to_string()));
        outcome
    }
}

impl Sandbox for Dispatcher {
    fn run(
        &self,
        argv: &[String],
        root: &Path,
        timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError> {
        let outcome = match self {
            Dispatcher::External(runner) => runner.run(argv, root, timeout)?,
            Dispatcher::Fallback(local) => local.run(argv, root, timeout)?,
        };
        Ok(self.tag(outcome))
    }

    fn run_tests(&self, root: &Path, timeout: Duration) -> Result<ExecOutcome, SandboxError> {
        let outcome = match self {
            Dispatcher::External(runner) => runner.run_tests(root, timeout)?,
            Dispatcher::Fallback(local) => local.run_tests(root, timeout)?,
        };
        Ok(self.tag(outcome))
    }

    fn read_file(
        &self,
        path: &str,
        root: &Path,
        timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError> {
        let outcome = match self {
            Dispatcher::External(runner) => runner.read_file(path, root, timeout)?,
            Dispatcher::Fallback(local) => local.read_file(path, root, timeout)?,
        };
        Ok(self.tag(outcome))
    }

    fn apply_diff(
        &self,
        diff: &str,
        root: &Path,
        timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError> {
        let outcome = match self {
            Dispatcher::External(runner) => runner.apply_diff(diff, root, timeout)?,
            Dispatcher::Fallback(local) => local.apply_diff(diff, root, timeout)?,
        };
        Ok(self.tag(outcome))
    }
}
