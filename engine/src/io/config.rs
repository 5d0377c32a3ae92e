//! Engine configuration (TOML).

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Episode-shaping parameters.
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard step budget per episode.
    pub max_steps: u32,

    /// Reward penalty charged per tool call.
    pub tool_call_penalty: f64,

    /// Reward penalty per wall-clock second of a single call.
    pub time_penalty_per_s: f64,

    /// Budget for a test-suite run, in milliseconds.
    pub test_timeout_ms: u64,

    /// Budget for patch application and file reads, in milliseconds.
    pub tool_timeout_ms: u64,

    /// Observation / audit message bound, in characters.
    pub message_limit_chars: usize,

    /// Bound on the read-file message, in characters.
    pub file_view_limit_chars: usize,

    /// Workspace-relative path of the reference file the read action shows.
    pub reference_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            tool_call_penalty: 0.02,
            time_penalty_per_s: 0.01,
            test_timeout_ms: 20_000,
            tool_timeout_ms: 5_000,
            message_limit_chars: 400,
            file_view_limit_chars: 4_000,
            reference_path: "src/solution.py".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.test_timeout_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(anyhow!("max_steps must be > 0"));
        }
        if !self.tool_call_penalty.is_finite() || self.tool_call_penalty < 0.0 {
            return Err(anyhow!("tool_call_penalty must be finite and >= 0"));
        }
        if !self.time_penalty_per_s.is_finite() || self.time_penalty_per_s < 0.0 {
            return Err(anyhow!("time_penalty_per_s must be finite and >= 0"));
        }
        if self.test_timeout_ms == 0 || self.tool_timeout_ms == 0 {
            return Err(anyhow!("timeouts must be > 0"));
        }
        if self.message_limit_chars == 0 || self.file_view_limit_chars == 0 {
            return Err(anyhow!("message bounds must be > 0"));
        }
        if self.reference_path.trim().is_empty() {
            return Err(anyhow!("reference_path must be non-empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
