//! Validation of unified-diff headers before a patch touches a workspace.

use std::sync::OnceLock;

use regex::Regex;

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Matches `--- a/src/x.py` / `+++ b/src/x.py` style file headers.
    RE.get_or_init(|| Regex::new(r"^(---|\+\+\+)\s+(?:[ab]/)?(\S+)").expect("valid regex"))
}

/// Return the first diff header path that points outside the workspace, if
/// any.
///
/// Rejects absolute paths, `..` traversal, and backslash separators. `None`
/// means every file header is safe to hand to the patch tools.
pub fn unsafe_patch_path(diff: &str) -> Option<&str> {
    for line in diff.lines() {
        if let Some(caps) = header_re().captures(line) {
            let path = caps.get(2).map_or("", |m| m.as_str());
            if path.starts_with('/') || path.contains("..") || path.contains('\\') {
                return Some(path);
            }
        }
    }
    None
}
