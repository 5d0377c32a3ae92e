//! In-process confined executor, used when the external runner is absent.
//!
//! Confinement here is lexical path containment, patch-header validation, and
//! hard timeouts; process-level isolation is the external runner's job.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::core::confine::resolve_within;
use crate::core::exec::ExecOutcome;
use crate::core::patch::unsafe_patch_path;
use crate::io::process::{CommandOutput, run_command_with_timeout};
use crate::io::sandbox::{Sandbox, SandboxError};

/// Default bound on captured stdout/stderr per command.
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

/// The workspace test suite command.
pub const TEST_COMMAND: &[&str] = &["python", "-m", "pytest", "-q"];

/// Name of the transient patch file written inside the workspace while a
/// diff is being applied.
const PATCH_FILE_NAME: &str = ".sandbox_patch.diff";

/// Confined fallback executor.
#[derive(Debug, Clone)]
pub struct LocalSandbox {
    pub output_limit_bytes: usize,
}

impl Default for LocalSandbox {
    fn default() -> Self {
        Self {
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

/// Removes the transient patch file on every exit path, panics included.
struct PatchFileGuard {
    path: PathBuf,
}

impl Drop for PatchFileGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

impl LocalSandbox {
    fn execute(
        &self,
        argv: &[String],
        stdin: Option<&[u8]>,
        root: &Path,
        timeout: Duration,
    ) -> ExecOutcome {
        if argv.is_empty() {
            return ExecOutcome::failure("missing command argv");
        }

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]).current_dir(root);
        cmd.env("PYTHONUNBUFFERED", "1");

        match run_command_with_timeout(cmd, stdin, timeout, self.output_limit_bytes) {
            Ok(output) => outcome_from_output(argv, &output),
            Err(err) => {
                warn!(command = ?argv, err = %format!("{err:#}"), "command could not be executed");
                let mut outcome = ExecOutcome::failure(format!("{err:#}"));
                outcome.exit_code = 127;
                outcome.meta.insert("command".to_string(), json!(argv));
                outcome
            }
        }
    }
}

fn outcome_from_output(argv: &[String], output: &CommandOutput) -> ExecOutcome {
    let mut outcome = ExecOutcome {
        ok: output.status.success() && !output.timed_out,
        exit_code: output.exit_code(),
        duration_s: output.duration.as_secs_f64(),
        stdout: output.stdout_lossy(),
        stderr: output.stderr_lossy(),
        meta: Default::default(),
    };
    outcome.meta.insert("command".to_string(), json!(argv));
    if output.timed_out {
        outcome
            .meta
            .insert("timed_out".to_string(), Value::Bool(true));
    }
    if output.stdout_truncated > 0 {
        outcome
            .meta
            .insert("stdout_truncated".to_string(), json!(output.stdout_truncated));
    }
    if output.stderr_truncated > 0 {
        outcome
            .meta
            .insert("stderr_truncated".to_string(), json!(output.stderr_truncated));
    }
    outcome
}

impl Sandbox for LocalSandbox {
    fn run(
        &self,
        argv: &[String],
        root: &Path,
        timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError> {
        Ok(self.execute(argv, None, root, timeout))
    }

    fn run_tests(&self, root: &Path, timeout: Duration) -> Result<ExecOutcome, SandboxError> {
        let argv: Vec<String> = TEST_COMMAND.iter().map(|s| s.to_string()).collect();
        Ok(self.execute(&argv, None, root, timeout))
    }

    fn read_file(
        &self,
        path: &str,
        root: &Path,
        _timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError> {
        // The containment check must run before any filesystem access.
        let resolved = match resolve_within(root, path) {
            Ok(resolved) => resolved,
            Err(violation) => {
                warn!(path, %violation, "rejected file read");
                return Ok(ExecOutcome::failure(violation.to_string()));
            }
        };

        match fs::read(&resolved) {
            Ok(bytes) => Ok(ExecOutcome::file_view(
                String::from_utf8_lossy(&bytes).to_string(),
            )),
            Err(err) => Ok(ExecOutcome::failure(format!(
                "read {}: {err}",
                resolved.display()
            ))),
        }
    }

    fn apply_diff(
        &self,
        diff: &str,
        root: &Path,
        timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError> {
        if let Some(path) = unsafe_patch_path(diff) {
            warn!(path, "rejected patch with unsafe header");
            return Ok(ExecOutcome::failure(format!(
                "unsafe patch path in header: {path}"
            )));
        }

        let patch_path = root.join(PATCH_FILE_NAME);
        if let Err(err) = fs::write(&patch_path, diff) {
            return Ok(ExecOutcome::failure(format!(
                "write patch file {}: {err}",
                patch_path.display()
            )));
        }
        let _guard = PatchFileGuard {
            path: patch_path.clone(),
        };

        // Strict apply first, then the looser context-based tool. Both
        // failing must surface as ok = false.
        let git_argv: Vec<String> = [
            "git",
            "apply",
            "--unsafe-paths",
            "--whitespace=nowarn",
            PATCH_FILE_NAME,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let git_outcome = self.execute(&git_argv, None, root, timeout);
        if git_outcome.ok {
            debug!("patch applied with git apply");
            return Ok(git_outcome);
        }

        let patch_argv: Vec<String> = ["patch", "-p1", "-i", PATCH_FILE_NAME]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let patch_outcome = self.execute(&patch_argv, None, root, timeout);
        if !patch_outcome.ok {
            debug!("both patch application stages failed");
        }
        Ok(patch_outcome)
    }
}
