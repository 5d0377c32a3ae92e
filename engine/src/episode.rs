//! The tool-use episode state machine.
//!
//! One [`Episode`] owns an exclusive workspace and drives it through
//! apply-patch / run-tests / read-file / stop actions until the step budget
//! runs out, a test run reaches pass-rate 1.0, or the agent stops. Every
//! per-command failure is folded into the observation; only misuse of the
//! engine itself surfaces as [`EngineError`].

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::core::action::{Action, ToolKind};
use crate::core::passrate::parse_test_tally;
use crate::io::config::EngineConfig;
use crate::io::sandbox::{Sandbox, SandboxError};
use crate::io::task::{TaskSpec, load_task};
use crate::io::workspace::{Workspace, create_workspace, remove_workspace};

/// Configuration-level engine failures.
///
/// Everything else — timeouts, sandbox escapes, failing patches — is data in
/// the returned observation, and the episode continues.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid action {index} for action size {size}")]
    InvalidAction { index: usize, size: usize },
    #[error("no active episode (call reset first)")]
    NotActive,
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error(transparent)]
    Setup(#[from] anyhow::Error),
}

/// Agent-visible snapshot of the episode, recomputed fresh every step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub task: String,
    pub step: u32,
    pub max_steps: u32,
    pub tool_calls: u32,
    pub best_pass_rate: f64,
    pub last_pass_rate: f64,
    pub action_size: usize,
    pub last_message: String,
}

/// Per-step audit record for the caller's logging; not retained here.
#[derive(Debug, Clone, Serialize)]
pub struct StepInfo {
    pub tool: ToolKind,
    pub tool_calls: u32,
    /// Wall time since the episode started, in seconds.
    pub elapsed_s: f64,
    /// Pass-rate known after this step.
    pub pass_rate: f64,
    pub done: bool,
    pub message: String,
}

/// Mutable episode state, exclusively owned by one engine instance.
struct EpisodeState {
    task: TaskSpec,
    workspace: Workspace,
    steps: u32,
    tool_calls: u32,
    best_pass_rate: f64,
    last_pass_rate: f64,
    started: Instant,
    last_message: String,
}

/// The episode engine. Generic over the sandbox backend so tests can drive
/// it with scripted outcomes.
pub struct Episode<S: Sandbox> {
    sandbox: S,
    config: EngineConfig,
    tasks_root: PathBuf,
    task_name: String,
    workspace_base: PathBuf,
    state: Option<EpisodeState>,
}

impl<S: Sandbox> Episode<S> {
    pub fn new(
        sandbox: S,
        config: EngineConfig,
        tasks_root: impl Into<PathBuf>,
        task_name: impl Into<String>,
    ) -> Self {
        Self {
            sandbox,
            config,
            tasks_root: tasks_root.into(),
            task_name: task_name.into(),
            workspace_base: std::env::temp_dir(),
            state: None,
        }
    }

    /// Create episode workspaces under `base` instead of the system temp dir.
    pub fn with_workspace_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.workspace_base = base.into();
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Action-space size of the active episode.
    pub fn action_size(&self) -> Option<usize> {
        self.state
            .as_ref()
            .map(|state| Action::space_size(state.task.patches.len()))
    }

    /// Root of the active episode's workspace.
    pub fn workspace_root(&self) -> Option<&Path> {
        self.state.as_ref().map(|state| state.workspace.root.as_path())
    }

    /// Start a fresh episode, discarding any prior workspace.
    #[instrument(skip_all, fields(task = %self.task_name))]
    pub fn reset(&mut self) -> Result<Observation, EngineError> {
        if let Some(prev) = self.state.take() {
            remove_workspace(&prev.workspace.root);
        }

        let task = load_task(&self.tasks_root, &self.task_name)?;
        let workspace = create_workspace(&self.workspace_base, &task.name, &task.dir)?;
        info!(workspace = %workspace.root.display(), patches = task.patches.len(), "episode reset");

        let state = EpisodeState {
            task,
            workspace,
            steps: 0,
            tool_calls: 0,
            best_pass_rate: 0.0,
            last_pass_rate: 0.0,
            started: Instant::now(),
            last_message: String::new(),
        };
        let obs = observation_of(&state, &self.config);
        self.state = Some(state);
        Ok(obs)
    }

    /// Execute one action.
    ///
    /// Returns the next observation, the shaped reward, the terminal flag,
    /// and the step audit record. An out-of-range action fails before any
    /// state mutation or dispatcher call.
    #[instrument(skip_all, fields(action = index))]
    pub fn step(
        &mut self,
        index: usize,
    ) -> Result<(Observation, f64, bool, StepInfo), EngineError> {
        let Self {
            sandbox,
            config,
            state,
            ..
        } = self;
        let state = state.as_mut().ok_or(EngineError::NotActive)?;

        let num_patches = state.task.patches.len();
        let action = Action::decode(index, num_patches).ok_or(EngineError::InvalidAction {
            index,
            size: Action::space_size(num_patches),
        })?;

        state.steps += 1;
        let call_started = Instant::now();
        let mut done = false;
        let mut reward = 0.0;
        let message;

        match action {
            Action::ApplyPatch(patch_index) => {
                state.tool_calls += 1;
                let diff = &state.task.patches[patch_index].diff;
                let outcome =
                    sandbox.apply_diff(diff, &state.workspace.root, config.tool_timeout())?;
                debug!(ok = outcome.ok, patch_index, "patch application finished");
                let combined = outcome.combined();
                let trimmed = combined.trim();
                message = if trimmed.is_empty() {
                    if outcome.ok { "patch applied" } else { "patch failed" }.to_string()
                } else {
                    trimmed.to_string()
                };
                reward -= config.tool_call_penalty;
            }
            Action::RunTests => {
                state.tool_calls += 1;
                let outcome = sandbox.run_tests(&state.workspace.root, config.test_timeout())?;
                let combined = outcome.combined();
                let pass_rate = match parse_test_tally(&combined) {
                    Some(tally) => tally.pass_rate(),
                    // Summary was unreadable: trust the exit code instead.
                    None => {
                        if outcome.exit_code == 0 {
                            1.0
                        } else {
                            0.0
                        }
                    }
                };
                debug!(pass_rate, exit_code = outcome.exit_code, "test run finished");

                state.last_pass_rate = pass_rate;
                if pass_rate > state.best_pass_rate {
                    state.best_pass_rate = pass_rate;
                }

                // Dense shaping: the measured pass-rate itself.
                reward += pass_rate;
                reward -= config.tool_call_penalty;
                message = tail_chars(combined.trim(), config.message_limit_chars);

                if pass_rate >= 1.0 {
                    done = true;
                }
            }
            Action::ReadFile => {
                state.tool_calls += 1;
                let outcome = sandbox.read_file(
                    &config.reference_path,
                    &state.workspace.root,
                    config.tool_timeout(),
                )?;
                message = head_chars(outcome.stdout.trim(), config.file_view_limit_chars);
                reward -= config.tool_call_penalty;
            }
            Action::Stop => {
                done = true;
                message = "terminated by agent".to_string();
            }
        }

        // Charge for this call's wall time, not cumulative episode time.
        reward -= config.time_penalty_per_s * call_started.elapsed().as_secs_f64();

        // Hard budget, independent of the chosen action.
        if state.steps >= config.max_steps {
            done = true;
        }

        state.last_message = head_chars(&message, config.file_view_limit_chars);

        let info = StepInfo {
            tool: action.kind(),
            tool_calls: state.tool_calls,
            elapsed_s: state.started.elapsed().as_secs_f64(),
            pass_rate: state.last_pass_rate,
            done,
            message: head_chars(&message, config.message_limit_chars),
        };
        Ok((observation_of(state, config), reward, done, info))
    }

    /// End the episode and release its workspace.
    pub fn close(&mut self) {
        if let Some(prev) = self.state.take() {
            remove_workspace(&prev.workspace.root);
        }
    }
}

impl<S: Sandbox> Drop for Episode<S> {
    fn drop(&mut self) {
        self.close();
    }
}

fn observation_of(state: &EpisodeState, config: &EngineConfig) -> Observation {
    Observation {
        task: state.task.name.clone(),
        step: state.steps,
        max_steps: config.max_steps,
        tool_calls: state.tool_calls,
        best_pass_rate: state.best_pass_rate,
        last_pass_rate: state.last_pass_rate,
        action_size: Action::space_size(state.task.patches.len()),
        last_message: head_chars(&state.last_message, config.message_limit_chars),
    }
}

/// First `limit` characters, char-boundary safe.
fn head_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

/// Last `limit` characters, char-boundary safe.
fn tail_chars(text: &str, limit: usize) -> String {
    let count = text.chars().count();
    if count <= limit {
        text.to_string()
    } else {
        text.chars().skip(count - limit).collect()
    }
}
