//! Task definitions loaded from the on-disk task library.
//!
//! A task is a directory holding the workspace seed tree plus a
//! `patches.json` array of candidate patches.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;

/// One candidate patch.
///
/// Only `diff` is interpreted; every other field is opaque metadata and
/// preserved verbatim.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Patch {
    /// Unified diff applied to the workspace when this patch is chosen.
    pub diff: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Immutable per-episode task definition.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: String,
    /// Directory whose tree seeds the episode workspace.
    pub dir: PathBuf,
    /// Ordered candidate patches; indices are the agent's apply actions.
    pub patches: Vec<Patch>,
}

/// Load a task by name from the task library root.
pub fn load_task(tasks_root: &Path, name: &str) -> Result<TaskSpec> {
    validate_task_name(name)?;

    let dir = tasks_root.join(name);
    if !dir.is_dir() {
        bail!("task not found: {}", dir.display());
    }

    let patches_path = dir.join("patches.json");
    let contents = fs::read_to_string(&patches_path)
        .with_context(|| format!("read {}", patches_path.display()))?;
    let patches: Vec<Patch> = serde_json::from_str(&contents)
        .with_context(|| format!("parse {}", patches_path.display()))?;

    Ok(TaskSpec {
        name: name.to_string(),
        dir,
        patches,
    })
}

fn validate_task_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("task name must be non-empty");
    }
    if name.contains('/') || name.contains('\\') {
        bail!("task name must not contain path separators");
    }
    if name.contains("..") {
        bail!("task name must not contain '..'");
    }
    if !name
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("task name must use [a-z0-9_-] only");
    }
    Ok(())
}
