//! Best-effort parsing of test-runner console summaries.

use std::sync::OnceLock;

use regex::Regex;

/// Counts recovered from a test-runner summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestTally {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl TestTally {
    /// Fraction of tests passed out of passed + failed.
    ///
    /// Skipped tests are excluded from the ratio. A tally returned by
    /// [`parse_test_tally`] always has `passed + failed > 0`.
    pub fn pass_rate(&self) -> f64 {
        f64::from(self.passed) / f64::from(self.passed + self.failed)
    }
}

fn passed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s+passed").expect("valid regex"))
}

fn failed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s+failed").expect("valid regex"))
}

fn skipped_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s+skipped").expect("valid regex"))
}

fn first_count(re: &Regex, text: &str) -> u32 {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Scan free-form test-runner output for `<N> passed` / `<N> failed` tokens.
///
/// The first occurrence of each token counts, independent of order and of
/// surrounding decoration. Returns `None` when neither token is present or
/// both counts are zero; the caller decides the fallback (the engine trusts
/// the process exit code). Pure text analysis, no side effects.
pub fn parse_test_tally(text: &str) -> Option<TestTally> {
    let passed = first_count(passed_re(), text);
    let failed = first_count(failed_re(), text);
    if passed + failed == 0 {
        return None;
    }
    Some(TestTally {
        passed,
        failed,
        skipped: first_count(skipped_re(), text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_summary() {
        let tally = parse_test_tally("3 passed, 1 failed in 0.12s").expect("tally");
        assert_eq!(tally.passed, 3);
        assert_eq!(tally.failed, 1);
        assert!((tally.pass_rate() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn token_order_does_not_matter() {
        let tally = parse_test_tally("2 failed, 6 passed").expect("tally");
        assert!((tally.pass_rate() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn tolerates_decorations_around_tokens() {
        let text = "\u{1b}[32m========= 3 passed\u{1b}[0m, \u{1b}[31m1 failed\u{1b}[0m =========";
        let tally = parse_test_tally(text).expect("tally");
        assert_eq!(tally.passed, 3);
        assert_eq!(tally.failed, 1);
    }

    #[test]
    fn case_insensitive() {
        let tally = parse_test_tally("1 PASSED, 1 Failed").expect("tally");
        assert_eq!(tally.passed, 1);
        assert_eq!(tally.failed, 1);
    }

    #[test]
    fn no_tokens_is_unknown() {
        assert_eq!(parse_test_tally("collected 0 items"), None);
        assert_eq!(parse_test_tally(""), None);
    }

    #[test]
    fn zero_counts_are_unknown() {
        assert_eq!(parse_test_tally("0 passed, 0 failed"), None);
    }

    #[test]
    fn skipped_is_counted_but_excluded_from_ratio() {
        let tally = parse_test_tally("2 passed, 1 skipped").expect("tally");
        assert_eq!(tally.skipped, 1);
        assert!((tally.pass_rate() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn all_failed_is_zero_rate() {
        let tally = parse_test_tally("0 passed, 4 failed").expect("tally");
        assert!((tally.pass_rate() - 0.0).abs() < 1e-9);
    }
}
