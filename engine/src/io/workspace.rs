//! Episode workspace lifecycle.
//!
//! Each episode gets a fresh directory seeded with a copy of the task tree.
//! The workspace is exclusively owned by one episode and removed on close,
//! on the next reset, or when the engine is dropped.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use tracing::debug;
use walkdir::WalkDir;

/// An episode-exclusive workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Absolute path to the workspace root.
    pub root: PathBuf,
    /// Directory name (task name, timestamp, random suffix).
    pub name: String,
}

/// Create a workspace under `base_dir` seeded from `seed_dir`.
pub fn create_workspace(base_dir: &Path, task_name: &str, seed_dir: &Path) -> Result<Workspace> {
    fs::create_dir_all(base_dir)
        .with_context(|| format!("create workspace base {}", base_dir.display()))?;

    let name = build_workspace_name(task_name, &generate_timestamp(), &generate_short_id());
    let root = base_dir.join(&name);
    fs::create_dir_all(&root)
        .with_context(|| format!("create workspace root {}", root.display()))?;

    copy_tree(seed_dir, &root)
        .with_context(|| format!("seed workspace from {}", seed_dir.display()))?;

    debug!(root = %root.display(), "workspace created");
    Ok(Workspace { root, name })
}

/// Best-effort removal; a half-deleted workspace is never fatal.
pub fn remove_workspace(root: &Path) {
    if root.is_dir() {
        let _ = fs::remove_dir_all(root);
    }
}

pub fn build_workspace_name(task_name: &str, timestamp: &str, short_id: &str) -> String {
    format!("{task_name}_{timestamp}_{short_id}")
}

fn generate_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

fn generate_short_id() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase()
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.context("walk seed tree")?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .context("strip seed prefix")?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("create {}", target.display()))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::copy(entry.path(), &target)
                .with_context(|| format!("copy {}", target.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_name_uses_expected_format() {
        let name = build_workspace_name("bugfix_1", "20260807_120000", "abc123");
        assert_eq!(name, "bugfix_1_20260807_120000_abc123");
    }

    #[test]
    fn creates_workspace_with_copied_seed_tree() {
        let temp = tempfile::tempdir().expect("tempdir");
        let seed = temp.path().join("seed");
        fs::create_dir_all(seed.join("src")).expect("mkdir");
        fs::write(seed.join("src/solution.py"), "print('hi')\n").expect("write");
        fs::write(seed.join("README.txt"), "seed\n").expect("write");

        let base = temp.path().join("workspaces");
        let workspace = create_workspace(&base, "bugfix_1", &seed).expect("workspace");

        assert!(workspace.name.starts_with("bugfix_1_"));
        assert_eq!(
            fs::read_to_string(workspace.root.join("src/solution.py")).expect("read"),
            "print('hi')\n"
        );
        assert_eq!(
            fs::read_to_string(workspace.root.join("README.txt")).expect("read"),
            "seed\n"
        );
    }

    #[test]
    fn remove_workspace_deletes_tree() {
        let temp = tempfile::tempdir().expect("tempdir");
        let seed = temp.path().join("seed");
        fs::create_dir_all(&seed).expect("mkdir");
        fs::write(seed.join("file.txt"), "x").expect("write");

        let workspace =
            create_workspace(&temp.path().join("ws"), "bugfix_1", &seed).expect("workspace");
        assert!(workspace.root.is_dir());

        remove_workspace(&workspace.root);
        assert!(!workspace.root.exists());
    }

    #[test]
    fn remove_missing_workspace_is_a_noop() {
        remove_workspace(Path::new("/nonexistent/workspace/path"));
    }
}
