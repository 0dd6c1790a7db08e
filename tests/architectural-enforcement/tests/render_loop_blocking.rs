//! Integration Test: Render Loop Never Blocks Its Runtime
//!
//! **Policy**: the render loop is a single-threaded tokio runtime. A blocking
//! sleep inside an `async fn` stalls the force tick and the change watcher.
//! **Required**: `tokio::time::sleep(..).await` in async code.

use architectural_enforcement::{fail_with, is_in_async_function, scan};

#[test]
fn test_no_thread_sleep_in_async_code() {
    let violations = scan("tui/src", |lines, idx, code| {
        code.contains("thread::sleep") && is_in_async_function(lines, idx)
    });

    fail_with(
        "Blocking sleep found inside async code",
        "Use tokio::time::sleep(..).await instead of std::thread::sleep.",
        &violations,
    );
}
