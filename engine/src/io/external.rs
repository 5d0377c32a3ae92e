//! Client for the external isolated-runner executable.
//!
//! The runner is invoked once per command as
//! `<runner> <kind> [flags] --root <path> --timeout-ms <n>`, with the
//! apply-diff payload on stdin. It prints a single JSON object on stdout
//! carrying at least an `ok` field; anything else degrades to the process's
//! own exit-code semantics. A misbehaving runner therefore never aborts an
//! episode — only a runner that disappeared after the dispatcher's probe
//! does.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::exec::ExecOutcome;
use crate::io::local::DEFAULT_OUTPUT_LIMIT_BYTES;
use crate::io::process::run_command_with_timeout;
use crate::io::sandbox::{Sandbox, SandboxError};

/// Extra wall-clock slack granted to the runner process on top of the
/// command budget it enforces itself. Only a wedged runner ever hits this.
const RUNNER_GRACE: Duration = Duration::from_secs(5);

/// Invokes the external isolated runner per call.
#[derive(Debug)]
pub struct ExternalRunner {
    path: PathBuf,
}

/// The runner's JSON report: typed known fields plus an open extension map.
#[derive(Debug, Deserialize)]
struct RunnerPayload {
    ok: bool,
    #[serde(default)]
    exit_code: Option<i32>,
    #[serde(default)]
    duration_s: Option<f64>,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// Decode a runner stdout blob against the JSON contract.
///
/// `None` means the output was not a conforming report and the caller should
/// fall back to raw exit-code semantics.
fn decode_payload(stdout: &str, fallback_exit_code: i32) -> Option<ExecOutcome> {
    let trimmed = stdout.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let payload: RunnerPayload = serde_json::from_str(trimmed).ok()?;
    Some(ExecOutcome {
        ok: payload.ok,
        exit_code: payload.exit_code.unwrap_or(fallback_exit_code),
        duration_s: payload.duration_s.unwrap_or(0.0),
        stdout: payload.stdout,
        stderr: payload.stderr,
        meta: payload.extra,
    })
}

impl ExternalRunner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn call(
        &self,
        args: &[&str],
        stdin: Option<&[u8]>,
        root: &Path,
        timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError> {
        let mut cmd = Command::new(&self.path);
        cmd.args(args)
            .arg("--root")
            .arg(root)
            .arg("--timeout-ms")
            .arg(timeout.as_millis().to_string());

        // The runner enforces the real budget itself; the grace only turns a
        // wedged runner process into a timed-out outcome instead of a hang.
        let output = match run_command_with_timeout(
            cmd,
            stdin,
            timeout + RUNNER_GRACE,
            DEFAULT_OUTPUT_LIMIT_BYTES,
        ) {
            Ok(output) => output,
            Err(err) => {
                if !self.path.exists() {
                    return Err(SandboxError::RunnerVanished {
                        path: self.path.clone(),
                    });
                }
                warn!(err = %format!("{err:#}"), "external runner invocation failed");
                return Ok(ExecOutcome::failure(format!("{err:#}")));
            }
        };

        let stdout = output.stdout_lossy();
        if let Some(outcome) = decode_payload(&stdout, output.exit_code()) {
            debug!(ok = outcome.ok, "decoded runner report");
            return Ok(outcome);
        }

        // Not the JSON contract: trust the runner process's own exit code.
        let mut outcome = ExecOutcome {
            ok: output.status.success() && !output.timed_out,
            exit_code: output.exit_code(),
            duration_s: output.duration.as_secs_f64(),
            stdout,
            stderr: output.stderr_lossy(),
            meta: BTreeMap::new(),
        };
        outcome.meta.insert("raw".to_string(), Value::Bool(true));
        if output.timed_out {
            warn!("external runner process timed out");
            outcome
                .meta
                .insert("timed_out".to_string(), Value::Bool(true));
        }
        Ok(outcome)
    }
}

impl Sandbox for ExternalRunner {
    fn run(
        &self,
        argv: &[String],
        root: &Path,
        timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError> {
        let mut args = vec!["run", "--"];
        args.extend(argv.iter().map(String::as_str));
        self.call(&args, None, root, timeout)
    }

    fn run_tests(&self, root: &Path, timeout: Duration) -> Result<ExecOutcome, SandboxError> {
        self.call(&["pytest"], None, root, timeout)
    }

    fn read_file(
        &self,
        path: &str,
        root: &Path,
        timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError> {
        self.call(&["read-file", "--path", path], None, root, timeout)
    }

    fn apply_diff(
        &self,
        diff: &str,
        root: &Path,
        timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError> {
        self.call(&["apply-diff"], Some(diff.as_bytes()), root, timeout)
    }
}
