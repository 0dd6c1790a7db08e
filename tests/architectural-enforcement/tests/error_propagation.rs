//! Integration Test: No Panicking Shortcuts in Production Code
//!
//! **Policy**: library and binary code propagate errors with `?` or log and
//! carry on. `.unwrap()` and `.expect(..)` are for tests only.

use architectural_enforcement::{fail_with, scan, Violation};

fn unwrap_violations(dir: &str) -> Vec<Violation> {
    scan(dir, |_, _, code| code.contains(".unwrap()") || code.contains(".expect("))
}

#[test]
fn test_no_unwrap_in_core() {
    fail_with(
        "unwrap/expect found in spanboard-core production code",
        "Return a Result, or fall back to a sensible default.",
        &unwrap_violations("board/core/src"),
    );
}

#[test]
fn test_no_unwrap_in_tui() {
    fail_with(
        "unwrap/expect found in spanboard-tui production code",
        "Return a Result, or log the failure with tracing and carry on.",
        &unwrap_violations("tui/src"),
    );
}
