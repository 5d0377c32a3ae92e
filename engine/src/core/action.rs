//! Discrete action space of a code-repair episode.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An agent action decoded from its discrete index.
///
/// For a task with `n` candidate patches the space has `n + 3` entries:
/// indices `0..n` apply the patch at that index, then run-tests, read-file,
/// and stop in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ApplyPatch(usize),
    RunTests,
    ReadFile,
    Stop,
}

impl Action {
    /// Size of the action space for a task with `num_patches` patches.
    pub fn space_size(num_patches: usize) -> usize {
        num_patches + 3
    }

    /// Decode an action index, or `None` if it is out of range.
    pub fn decode(index: usize, num_patches: usize) -> Option<Self> {
        if index < num_patches {
            return Some(Action::ApplyPatch(index));
        }
        match index - num_patches {
            0 => Some(Action::RunTests),
            1 => Some(Action::ReadFile),
            2 => Some(Action::Stop),
            _ => None,
        }
    }

    /// The tool label recorded in step audit records.
    pub fn kind(&self) -> ToolKind {
        match self {
            Action::ApplyPatch(_) => ToolKind::ApplyPatch,
            Action::RunTests => ToolKind::RunTests,
            Action::ReadFile => ToolKind::ReadFile,
            Action::Stop => ToolKind::Stop,
        }
    }
}

/// Which tool a step invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    ApplyPatch,
    RunTests,
    ReadFile,
    Stop,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::ApplyPatch => "apply_patch",
            ToolKind::RunTests => "run_tests",
            ToolKind::ReadFile => "read_file",
            ToolKind::Stop => "stop",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_action_table() {
        assert_eq!(Action::decode(0, 2), Some(Action::ApplyPatch(0)));
        assert_eq!(Action::decode(1, 2), Some(Action::ApplyPatch(1)));
        assert_eq!(Action::decode(2, 2), Some(Action::RunTests));
        assert_eq!(Action::decode(3, 2), Some(Action::ReadFile));
        assert_eq!(Action::decode(4, 2), Some(Action::Stop));
        assert_eq!(Action::decode(5, 2), None);
    }

    #[test]
    fn zero_patch_task_still_has_three_actions() {
        assert_eq!(Action::space_size(0), 3);
        assert_eq!(Action::decode(0, 0), Some(Action::RunTests));
        assert_eq!(Action::decode(2, 0), Some(Action::Stop));
        assert_eq!(Action::decode(3, 0), None);
    }

    #[test]
    fn tool_kind_labels_are_stable() {
        assert_eq!(ToolKind::ApplyPatch.to_string(), "apply_patch");
        assert_eq!(ToolKind::Stop.to_string(), "stop");
    }
}
