//! Episode lifecycle tests: scripted backends for the state machine rules,
//! and a real-filesystem run for the patch/read/test loop.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::time::Duration;

use engine::core::exec::ExecOutcome;
use engine::episode::{EngineError, Episode};
use engine::io::config::EngineConfig;
use engine::io::local::LocalSandbox;
use engine::io::sandbox::{Sandbox, SandboxError};

fn test_run_outcome(summary: &str, exit_code: i32) -> ExecOutcome {
    let mut outcome = ExecOutcome::failure("");
    outcome.ok = exit_code == 0;
    outcome.exit_code = exit_code;
    outcome.stdout = summary.to_string();
    outcome.stderr = String::new();
    outcome
}

/// Backend with a queue of scripted test-run outcomes; other commands
/// succeed silently.
struct ScriptedSandbox {
    test_runs: RefCell<VecDeque<ExecOutcome>>,
}

impl ScriptedSandbox {
    fn new(test_runs: Vec<ExecOutcome>) -> Self {
        Self {
            test_runs: RefCell::new(test_runs.into()),
        }
    }
}

impl Sandbox for ScriptedSandbox {
    fn run(
        &self,
        _argv: &[String],
        _root: &Path,
        _timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError> {
        Ok(ExecOutcome::file_view(""))
    }

    fn run_tests(&self, _root: &Path, _timeout: Duration) -> Result<ExecOutcome, SandboxError> {
        Ok(self
            .test_runs
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| test_run_outcome("0 passed, 1 failed", 1)))
    }

    fn read_file(
        &self,
        _path: &str,
        _root: &Path,
        _timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError> {
        Ok(ExecOutcome::file_view("contents"))
    }

    fn apply_diff(
        &self,
        _diff: &str,
        _root: &Path,
        _timeout: Duration,
    ) -> Result<ExecOutcome, SandboxError> {
        Ok(ExecOutcome::file_view(""))
    }
}

fn write_task(tasks_root: &Path, name: &str, patches: usize) {
    let dir = tasks_root.join(name);
    fs::create_dir_all(dir.join("src")).expect("mkdir");
    fs::write(dir.join("src/solution.py"), "pass\n").expect("write solution");
    let entries: Vec<String> = (0..patches)
        .map(|i| format!(r#"{{"diff": "patch-{i}"}}"#))
        .collect();
    fs::write(dir.join("patches.json"), format!("[{}]", entries.join(","))).expect("write patches");
}

#[test]
fn best_pass_rate_is_monotonic_and_resets() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_task(temp.path(), "bugfix_1", 1);

    let sandbox = ScriptedSandbox::new(vec![
        test_run_outcome("2 passed, 2 failed", 1),
        test_run_outcome("1 passed, 3 failed", 1),
        test_run_outcome("3 passed, 1 failed", 1),
    ]);
    let mut episode = Episode::new(sandbox, EngineConfig::default(), temp.path(), "bugfix_1")
        .with_workspace_base(temp.path().join("ws"));

    let obs = episode.reset().expect("reset");
    assert_eq!(obs.best_pass_rate, 0.0);

    // run-tests is action index 1 for a one-patch task
    let (obs, _, _, _) = episode.step(1).expect("step");
    assert_eq!(obs.last_pass_rate, 0.5);
    assert_eq!(obs.best_pass_rate, 0.5);

    let (obs, _, _, _) = episode.step(1).expect("step");
    assert_eq!(obs.last_pass_rate, 0.25);
    assert_eq!(obs.best_pass_rate, 0.5);

    let (obs, _, _, _) = episode.step(1).expect("step");
    assert_eq!(obs.last_pass_rate, 0.75);
    assert_eq!(obs.best_pass_rate, 0.75);

    let obs = episode.reset().expect("reset");
    assert_eq!(obs.best_pass_rate, 0.0);
    assert_eq!(obs.last_pass_rate, 0.0);
    assert_eq!(obs.step, 0);
}

#[test]
fn step_budget_forces_done_even_for_apply_patch() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_task(temp.path(), "bugfix_1", 1);

    let config = EngineConfig {
        max_steps: 2,
        ..EngineConfig::default()
    };
    let mut episode = Episode::new(ScriptedSandbox::new(vec![]), config, temp.path(), "bugfix_1")
        .with_workspace_base(temp.path().join("ws"));

    episode.reset().expect("reset");
    let (_, _, done, _) = episode.step(0).expect("apply");
    assert!(!done);
    let (_, _, done, info) = episode.step(0).expect("apply");
    assert!(done);
    assert!(info.done);
}

#[test]
fn perfect_test_run_terminates_without_stop_action() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_task(temp.path(), "bugfix_1", 1);

    let sandbox = ScriptedSandbox::new(vec![test_run_outcome("4 passed, 0 failed", 0)]);
    let mut episode = Episode::new(sandbox, EngineConfig::default(), temp.path(), "bugfix_1")
        .with_workspace_base(temp.path().join("ws"));

    episode.reset().expect("reset");
    let (obs, reward, done, _) = episode.step(1).expect("run tests");
    assert!(done);
    assert_eq!(obs.last_pass_rate, 1.0);
    assert!(reward > 0.9);
}

#[test]
fn unreadable_summary_falls_back_to_exit_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_task(temp.path(), "bugfix_1", 1);

    let sandbox = ScriptedSandbox::new(vec![
        test_run_outcome("no recognizable summary", 0),
        test_run_outcome("still nothing here", 2),
    ]);
    let mut episode = Episode::new(sandbox, EngineConfig::default(), temp.path(), "bugfix_1")
        .with_workspace_base(temp.path().join("ws"));

    episode.reset().expect("reset");
    let (obs, _, done, _) = episode.step(1).expect("run tests");
    assert_eq!(obs.last_pass_rate, 1.0);
    assert!(done);

    episode.reset().expect("reset");
    let (obs, _, _, _) = episode.step(1).expect("run tests");
    assert_eq!(obs.last_pass_rate, 0.0);
}

#[test]
fn invalid_actions_error_before_dispatch() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_task(temp.path(), "bugfix_1", 2);

    let mut episode = Episode::new(
        ScriptedSandbox::new(vec![]),
        EngineConfig::default(),
        temp.path(),
        "bugfix_1",
    )
    .with_workspace_base(temp.path().join("ws"));

    let obs = episode.reset().expect("reset");
    assert_eq!(obs.action_size, 5);
    let err = episode.step(17).expect_err("out of range");
    assert!(matches!(err, EngineError::InvalidAction { .. }));
}

/// Real filesystem end-to-end: the patch genuinely rewrites the workspace
/// file and the "test suite" genuinely inspects it.
mod end_to_end {
    use super::*;

    const SEED_CONTENT: &str = "hello\n";
    const FIX_DIFF: &str = "--- a/greeting.txt\n+++ b/greeting.txt\n@@ -1 +1 @@\n-hello\n+goodbye\n";

    /// Applies and reads through the confined executor; the test-suite
    /// command checks the patched file for real.
    struct GrepSuiteSandbox {
        local: LocalSandbox,
    }

    impl Sandbox for GrepSuiteSandbox {
        fn run(
            &self,
            argv: &[String],
            root: &Path,
            timeout: Duration,
        ) -> Result<ExecOutcome, SandboxError> {
            self.local.run(argv, root, timeout)
        }

        fn run_tests(&self, root: &Path, timeout: Duration) -> Result<ExecOutcome, SandboxError> {
            let argv: Vec<String> = [
                "sh",
                "-c",
                "if grep -q goodbye greeting.txt; then echo '1 passed, 0 failed'; \
                 else echo '0 passed, 1 failed'; exit 1; fi",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect();
            self.local.run(&argv, root, timeout)
        }

        fn read_file(
            &self,
            path: &str,
            root: &Path,
            timeout: Duration,
        ) -> Result<ExecOutcome, SandboxError> {
            self.local.read_file(path, root, timeout)
        }

        fn apply_diff(
            &self,
            diff: &str,
            root: &Path,
            timeout: Duration,
        ) -> Result<ExecOutcome, SandboxError> {
            self.local.apply_diff(diff, root, timeout)
        }
    }

    fn write_greeting_task(tasks_root: &Path) {
        let dir = tasks_root.join("fix_greeting");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("greeting.txt"), SEED_CONTENT).expect("write seed");
        let patches = serde_json::json!([{ "diff": FIX_DIFF, "id": "fix-greeting" }]);
        fs::write(dir.join("patches.json"), patches.to_string()).expect("write patches");
    }

    #[test]
    fn apply_then_test_reaches_full_pass_rate() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_greeting_task(temp.path());

        let config = EngineConfig {
            reference_path: "greeting.txt".to_string(),
            ..EngineConfig::default()
        };
        let sandbox = GrepSuiteSandbox {
            local: LocalSandbox::default(),
        };
        let mut episode = Episode::new(sandbox, config, temp.path(), "fix_greeting")
            .with_workspace_base(temp.path().join("ws"));

        episode.reset().expect("reset");
        let mut total = 0.0;

        // Failing baseline run.
        let (obs, reward, done, _) = episode.step(1).expect("run tests");
        total += reward;
        assert!(!done);
        assert_eq!(obs.last_pass_rate, 0.0);

        // Reading the reference file shows the unpatched content.
        let (obs, reward, _, info) = episode.step(2).expect("read file");
        total += reward;
        assert!(info.message.contains("hello"));
        assert!(obs.last_message.contains("hello"));

        // Apply the fixing patch, then re-run the suite.
        let (_, reward, done, _) = episode.step(0).expect("apply patch");
        total += reward;
        assert!(!done);

        let (obs, reward, done, info) = episode.step(1).expect("run tests");
        total += reward;
        assert!(done);
        assert_eq!(obs.last_pass_rate, 1.0);
        assert_eq!(obs.best_pass_rate, 1.0);
        assert!(info.message.contains("1 passed, 0 failed"));

        // The pass-rate reward dominates the per-call and time penalties.
        let penalty_baseline = -4.0 * episode.config().tool_call_penalty;
        assert!(total > penalty_baseline);
        assert!(total > 0.5);

        // The seed tree is untouched; only the workspace was patched.
        let seed = fs::read_to_string(temp.path().join("fix_greeting/greeting.txt")).expect("read");
        assert_eq!(seed, SEED_CONTENT);

        episode.close();
    }
}
