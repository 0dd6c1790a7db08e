//! Integration Test: Core Stays Terminal-Agnostic
//!
//! **Policy**: `spanboard-core` models spans and renders text. Everything that
//! touches the real terminal or file descriptors lives in `spanboard-tui`.

use architectural_enforcement::{fail_with, scan};

const CORE_SRC: &str = "board/core/src";

#[test]
fn test_core_has_no_terminal_dependencies() {
    let violations = scan(CORE_SRC, |_, _, code| {
        ["crossterm", "libc::", "tokio::"]
            .iter()
            .any(|name| code.contains(name))
    });

    fail_with(
        "Terminal or runtime dependency found in spanboard-core",
        "Move screen, capture and scheduling code into tui/.",
        &violations,
    );
}

#[test]
fn test_core_never_prints() {
    // Core output must go through the rendered frame, never straight to
    // stdout: stdout is what the dashboard captures.
    let violations = scan(CORE_SRC, |_, _, code| {
        ["println!", "print!", "eprintln!", "eprint!", "dbg!"]
            .iter()
            .any(|mac| code.contains(mac))
    });

    fail_with(
        "Direct printing found in spanboard-core",
        "Use tracing for diagnostics and return strings from render functions.",
        &violations,
    );
}

#[test]
fn test_core_manifest_has_no_terminal_crates() {
    let manifest = std::fs::read_to_string(
        architectural_enforcement::workspace_root().join("board/core/Cargo.toml"),
    )
    .unwrap();

    for forbidden in ["crossterm", "libc", "tokio"] {
        assert!(
            !manifest.lines().any(|line| line.trim_start().starts_with(forbidden)),
            "spanboard-core must not depend on {forbidden}"
        );
    }
}
