//! Uniform result contract for sandboxed command execution.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Outcome of one executed command, regardless of which backend ran it.
///
/// `ok` tracks `exit_code == 0` unless the backend asserts it independently
/// (the external runner reports `ok` in its own payload; timeouts force
/// `ok = false`). `meta` carries backend-specific fields outside the typed
/// contract and serializes flattened, so a serialized outcome is itself a
/// valid runner-protocol report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecOutcome {
    pub ok: bool,
    pub exit_code: i32,
    pub duration_s: f64,
    pub stdout: String,
    pub stderr: String,
    #[serde(flatten)]
    pub meta: BTreeMap<String, Value>,
}

impl ExecOutcome {
    /// An immediate failure that never reached a child process.
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            ok: false,
            exit_code: 1,
            duration_s: 0.0,
            stdout: String::new(),
            stderr: stderr.into(),
            meta: BTreeMap::new(),
        }
    }

    /// File contents surfaced through the result contract.
    pub fn file_view(contents: impl Into<String>) -> Self {
        Self {
            ok: true,
            exit_code: 0,
            duration_s: 0.0,
            stdout: contents.into(),
            stderr: String::new(),
            meta: BTreeMap::new(),
        }
    }

    /// Stdout and stderr as one blob, newline-joined only when both are
    /// non-empty.
    pub fn combined(&self) -> String {
        if self.stdout.is_empty() || self.stderr.is_empty() {
            format!("{}{}", self.stdout, self.stderr)
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}
