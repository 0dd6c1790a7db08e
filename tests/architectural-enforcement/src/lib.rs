//! Architectural Enforcement Integration Tests
//!
//! Source-scanning checks that keep the workspace honest:
//! - `spanboard-core` stays terminal-agnostic (no crossterm, libc, tokio,
//!   no printing to stdout)
//! - production code propagates errors instead of unwrapping
//! - the render loop never blocks its runtime thread
//!
//! The helpers here read `.rs` files line by line; test modules and
//! comments are skipped.

use std::fs;
use std::path::{Path, PathBuf};

/// One offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: PathBuf,
    pub line_number: usize,
    pub line: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}",
            self.path.display(),
            self.line_number,
            self.line.trim()
        )
    }
}

/// Workspace root, independent of the directory tests are run from
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Every `.rs` file under `dir` (relative to the workspace root)
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let path = workspace_root().join(dir);
    assert!(path.exists(), "{} does not exist", path.display());

    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect()
}

/// Production lines of a file: everything before `#[cfg(test)]`, minus
/// comment lines, paired with 1-based line numbers
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .filter(|(_, line)| !line.trim_start().starts_with("//"))
        .map(|(idx, line)| (idx + 1, line))
        .collect()
}

/// Code part of a line, with any trailing `//` comment removed
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Scan production code in `dir` for lines matching `is_violation`
pub fn scan(dir: &str, is_violation: impl Fn(&[&str], usize, &str) -> bool) -> Vec<Violation> {
    let mut violations = Vec::new();

    for path in rust_files(dir) {
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        let all_lines: Vec<&str> = content.lines().collect();

        for (line_number, line) in production_lines(&content) {
            if is_violation(&all_lines, line_number - 1, code_part(line)) {
                violations.push(Violation {
                    path: path.clone(),
                    line_number,
                    line: line.to_string(),
                });
            }
        }
    }

    violations
}

/// Check if line is inside an async function
pub fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    for i in (0..current_idx).rev() {
        let line = lines[i].trim();

        if line.contains("async fn ") {
            return true;
        }

        if (line.starts_with("fn ") || line.contains(" fn ")) && !line.contains("async") {
            return false;
        }

        // Stop at module/impl boundaries
        if line.starts_with("mod ") || (line.starts_with("impl ") && line.contains('{')) {
            return false;
        }
    }
    false
}

/// Report violations and fail the test
pub fn fail_with(title: &str, hint: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ {title}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    eprintln!("\n{hint}");

    panic!("\nFound {} violation(s). Fix these before merging!", violations.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let content = "fn a() {}\n// note\nfn b() {}\n#[cfg(test)]\nmod tests {}\n";

        let lines = production_lines(content);

        assert_eq!(lines, vec![(1, "fn a() {}"), (3, "fn b() {}")]);
    }

    #[test]
    fn test_code_part_drops_trailing_comment() {
        assert_eq!(code_part("let x = 1; // .unwrap()"), "let x = 1; ");
    }

    #[test]
    fn test_async_function_detection() {
        let code = vec![
            "async fn render_loop() {",
            "    std::thread::sleep(d);",
            "}",
            "fn release() {",
            "    std::thread::sleep(d);",
            "}",
        ];

        assert!(is_in_async_function(&code, 1));
        assert!(!is_in_async_function(&code, 4));
    }

    #[test]
    fn test_workspace_root_holds_members() {
        assert!(workspace_root().join("board/core/src/lib.rs").exists());
        assert!(workspace_root().join("tui/src/lib.rs").exists());
    }
}
