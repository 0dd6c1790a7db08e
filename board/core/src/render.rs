//! Renderer
//!
//! Turns a span subtree into a block of text. Rendering only reads span
//! snapshots; it never mutates the tree and never fails, because it runs on
//! every frame no matter what state producers left the tree in.
//!
//! # Layout
//!
//! ```text
//! [42%] build release                 ← root header
//! | compiling 113/250 crates          ← root rolling log (while open)
//!  >  42% compile                     ← operation status line
//!  | rustc spanboard_core             ← operation rolling log (while open)
//!    ... | link | ld -o target/x      ← detail status line + last line
//!  >  1.2s fetch                      ← finished operation (collapsed)
//!                                     ← blank line closes the root block
//! ```
//!
//! Each nesting level is indented by one space. Siblings beyond the configured
//! limits are dropped by the relevance selector.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::relevance::most_relevant;
use crate::span::{Span, SpanSnapshot};

// ============================================================================
// Defaults
// ============================================================================

/// Default number of root spans on screen
pub const DEFAULT_MAX_ROOTS: usize = 4;

/// Default number of operations shown under a root
pub const DEFAULT_MAX_CHILDREN: usize = 6;

/// Default number of details shown under an operation
pub const DEFAULT_MAX_DETAILS: usize = 12;

/// Default label for spans at exactly 0 % (three columns wide)
pub const DEFAULT_PROGRESS_ZERO_LABEL: &str = "...";

/// Default length above which log lines are center-truncated
pub const DEFAULT_LOGS_MAX_LENGTH: usize = 80;

/// Default prefix for span log lines
pub const DEFAULT_LOGS_PREFIX: &str = "| ";

/// Marker inserted where a long line was cut
const TRUNCATION_MARKER: &str = " .. ";

// ============================================================================
// Palette
// ============================================================================

/// Styling seam between layout and the terminal
///
/// Each method receives one line without its trailing newline.
pub trait Palette: Send + Sync {
    /// Root header line
    fn header(&self, text: &str) -> String;

    /// Status line of a finished span
    fn done(&self, text: &str) -> String;

    /// Status line of an open span
    fn active(&self, text: &str) -> String;

    /// Log line
    fn logs(&self, text: &str) -> String;
}

/// Palette that leaves text untouched
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainPalette;

impl Palette for PlainPalette {
    fn header(&self, text: &str) -> String {
        text.to_string()
    }

    fn done(&self, text: &str) -> String {
        text.to_string()
    }

    fn active(&self, text: &str) -> String {
        text.to_string()
    }

    fn logs(&self, text: &str) -> String {
        text.to_string()
    }
}

// ============================================================================
// Options
// ============================================================================

/// Display limits and labels
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Root spans shown per frame
    pub max_roots: usize,
    /// Operations shown under each root
    pub max_children: usize,
    /// Details shown under each operation
    pub max_details: usize,
    /// Shown instead of `0%`; keep it three columns wide
    pub progress_zero_label: String,
    /// Log lines longer than this are center-truncated (0 = never)
    pub logs_max_length: usize,
    /// Prefix for every span log line
    pub logs_prefix: String,
    /// Hide the children of finished operations
    pub collapse_finished_operations: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_roots: DEFAULT_MAX_ROOTS,
            max_children: DEFAULT_MAX_CHILDREN,
            max_details: DEFAULT_MAX_DETAILS,
            progress_zero_label: DEFAULT_PROGRESS_ZERO_LABEL.to_string(),
            logs_max_length: DEFAULT_LOGS_MAX_LENGTH,
            logs_prefix: DEFAULT_LOGS_PREFIX.to_string(),
            collapse_finished_operations: true,
        }
    }
}

impl RenderOptions {
    /// Create options with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of roots shown
    #[must_use]
    pub fn with_max_roots(mut self, max: usize) -> Self {
        self.max_roots = max;
        self
    }

    /// Set the number of operations shown per root
    #[must_use]
    pub fn with_max_children(mut self, max: usize) -> Self {
        self.max_children = max;
        self
    }

    /// Set the number of details shown per operation
    #[must_use]
    pub fn with_max_details(mut self, max: usize) -> Self {
        self.max_details = max;
        self
    }

    /// Set the 0 % label
    #[must_use]
    pub fn with_progress_zero_label(mut self, label: impl Into<String>) -> Self {
        self.progress_zero_label = label.into();
        self
    }

    /// Set the log line length limit (0 disables truncation)
    #[must_use]
    pub fn with_logs_max_length(mut self, max: usize) -> Self {
        self.logs_max_length = max;
        self
    }

    /// Set the log line prefix
    #[must_use]
    pub fn with_logs_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.logs_prefix = prefix.into();
        self
    }

    /// Choose whether finished operations hide their children
    #[must_use]
    pub fn with_collapse_finished_operations(mut self, collapse: bool) -> Self {
        self.collapse_finished_operations = collapse;
        self
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Render the most relevant roots, one block after the other
#[must_use]
pub fn render_roots(roots: &[Span], options: &RenderOptions, palette: &dyn Palette) -> String {
    most_relevant(roots, options.max_roots)
        .iter()
        .map(|root| render_span(root, options, palette))
        .collect()
}

/// Render a span and its visible descendants
///
/// Every line ends with `\n`. An inert span renders as an empty string.
#[must_use]
pub fn render_span(span: &Span, options: &RenderOptions, palette: &dyn Palette) -> String {
    let mut out = String::new();
    for line in span_lines(span, options, palette) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn span_lines(span: &Span, options: &RenderOptions, palette: &dyn Palette) -> Vec<String> {
    let Some(snapshot) = span.snapshot() else {
        return Vec::new();
    };

    if snapshot.depth.is_root() {
        root_lines(&snapshot, options, palette)
    } else if snapshot.depth.is_operation() {
        operation_lines(&snapshot, options, palette)
    } else {
        vec![status_line(&snapshot, options, palette)]
    }
}

fn root_lines(
    root: &SpanSnapshot,
    options: &RenderOptions,
    palette: &dyn Palette,
) -> Vec<String> {
    let marker = if root.finished {
        "+".to_string()
    } else if root.progress == 0 {
        "-".to_string()
    } else {
        format!("{:2}%", root.progress)
    };

    let mut lines = vec![palette.header(&format!("[{marker}] {}", root.title))];
    if !root.finished {
        lines.extend(log_lines(
            &root.lines,
            &options.logs_prefix,
            options.logs_max_length,
            palette,
        ));
    }
    push_children(&mut lines, &root.children, options.max_children, options, palette);
    lines.push(String::new());
    lines
}

fn operation_lines(
    operation: &SpanSnapshot,
    options: &RenderOptions,
    palette: &dyn Palette,
) -> Vec<String> {
    let mut lines = vec![status_line(operation, options, palette)];
    if operation.finished && options.collapse_finished_operations {
        return lines;
    }

    if !operation.finished {
        let logs = log_lines(
            &operation.lines,
            &options.logs_prefix,
            options.logs_max_length,
            palette,
        );
        lines.extend(logs.into_iter().map(indent));
    }
    push_children(
        &mut lines,
        &operation.children,
        options.max_details,
        options,
        palette,
    );
    lines
}

fn push_children(
    lines: &mut Vec<String>,
    children: &[Span],
    limit: usize,
    options: &RenderOptions,
    palette: &dyn Palette,
) {
    for child in most_relevant(children, limit) {
        lines.extend(span_lines(&child, options, palette).into_iter().map(indent));
    }
}

fn indent(line: String) -> String {
    if line.is_empty() {
        line
    } else {
        format!(" {line}")
    }
}

/// `<marker><progress><delimiter><title>` styled as done or active
fn status_line(span: &SpanSnapshot, options: &RenderOptions, palette: &dyn Palette) -> String {
    let (marker, delimiter) = if span.depth.is_operation() {
        (">", " ")
    } else if span.depth.is_detail() {
        (" ", " | ")
    } else {
        (" ", " ")
    };

    let mut content = format!(
        "{marker}{}{delimiter}{}",
        progress_field(span, options),
        span.title
    );

    if span.depth.is_detail() {
        if let Some(last) = span.lines.last() {
            content.push_str(" | ");
            content.push_str(&truncate_center(last, options.logs_max_length));
        }
    }

    if span.finished {
        palette.done(&content)
    } else {
        palette.active(&content)
    }
}

fn progress_field(span: &SpanSnapshot, options: &RenderOptions) -> String {
    if span.finished {
        return format!("{:>5}", format_duration(span.elapsed()));
    }

    if span.progress == 0 {
        return format!("  {}", options.progress_zero_label);
    }

    format!("  {:2}%", span.progress)
}

fn log_lines(
    lines: &[String],
    prefix: &str,
    max_length: usize,
    palette: &dyn Palette,
) -> Vec<String> {
    lines
        .iter()
        .map(|line| palette.logs(&format!("{prefix}{}", truncate_center(line, max_length))))
        .collect()
}

/// Render log lines as a block, one `\n`-terminated line each
#[must_use]
pub fn render_log_block(
    lines: &[String],
    prefix: &str,
    max_length: usize,
    palette: &dyn Palette,
) -> String {
    let mut out = String::new();
    for line in log_lines(lines, prefix, max_length, palette) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Shorten `line` to its first and last `max / 2` characters
///
/// Lines within the limit, and every line when `max` is 0, come back
/// unchanged. Works on characters, never splitting a code point.
#[must_use]
pub fn truncate_center(line: &str, max: usize) -> String {
    let count = line.chars().count();
    if max == 0 || count <= max {
        return line.to_string();
    }

    let half = max / 2;
    let left: String = line.chars().take(half).collect();
    let right: String = line.chars().skip(count - half).collect();
    format!("{left}{TRUNCATION_MARKER}{right}")
}

/// Format a duration in its largest fitting unit
///
/// Hours above one hour, minutes above five minutes, seconds above one
/// second, milliseconds otherwise.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs > 3600.0 {
        format!("{:.0}h", secs / 3600.0)
    } else if secs > 300.0 {
        format!("{:.0}m", secs / 60.0)
    } else if secs > 1.0 {
        format!("{secs:.0}s")
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerConfig;
    use crate::span::{IdAllocator, SpanOptions};
    use crate::tree::SpanTree;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn tree() -> SpanTree {
        SpanTree::with_allocator(ContainerConfig::default(), Arc::new(IdAllocator::new()))
    }

    fn render(span: &Span, options: &RenderOptions) -> String {
        render_span(span, options, &PlainPalette)
    }

    #[test]
    fn test_format_duration_units() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1000)), "1000ms");
        assert_eq!(format_duration(Duration::from_millis(2400)), "2s");
        assert_eq!(format_duration(Duration::from_secs(299)), "299s");
        assert_eq!(format_duration(Duration::from_secs(420)), "7m");
        assert_eq!(format_duration(Duration::from_secs(3 * 3600)), "3h");
    }

    #[test]
    fn test_truncate_center() {
        assert_eq!(truncate_center("short", 10), "short");
        assert_eq!(truncate_center("abcdefghij", 0), "abcdefghij");
        assert_eq!(truncate_center("abcdefghijkl", 6), "abc .. jkl");
        assert_eq!(truncate_center("ääääbbbbcccc", 4), "ää .. cc");
    }

    #[test]
    fn test_inert_renders_nothing() {
        assert_eq!(render(&Span::inert(), &RenderOptions::default()), "");
    }

    #[test]
    fn test_open_tree_layout() {
        let tree = tree();
        let root = tree.open(&Span::inert(), SpanOptions::titled("deploy"));
        root.write("resolving targets");
        root.set_progress(0.42);

        let op = tree.open(&root, SpanOptions::titled("upload"));
        op.write("chunk 1");
        let detail = tree.open(&op, SpanOptions::titled("eu-west"));
        detail.set_progress(0.5);
        detail.write("sent 3 files");
        let _idle = tree.open(&op, SpanOptions::titled("us-east"));

        let expected = "\
[42%] deploy
| resolving targets
 >  ... upload
  | chunk 1
     50% | eu-west | sent 3 files
     ... | us-east

";
        assert_eq!(render(&root, &RenderOptions::default()), expected);
    }

    #[test]
    fn test_finished_operation_collapses() {
        let tree = tree();
        let root = tree.open(&Span::inert(), SpanOptions::titled("root"));
        let op = tree.open(&root, SpanOptions::titled("op"));
        let _detail = tree.open(&op, SpanOptions::titled("detail"));
        op.end();

        let collapsed = render(&root, &RenderOptions::default());
        let lines: Vec<&str> = collapsed.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "[-] root");
        assert!(lines[1].starts_with(" >"));
        assert!(lines[1].ends_with("ms op"));

        let expanded = render(
            &root,
            &RenderOptions::default().with_collapse_finished_operations(false),
        );
        assert!(expanded.contains("| detail"));
    }

    #[test]
    fn test_finished_root_hides_logs() {
        let tree = tree();
        let root = tree.open(&Span::inert(), SpanOptions::titled("root"));
        root.write("noise");
        root.end();

        let out = render(&root, &RenderOptions::default());
        assert_eq!(out, "[+] root\n\n");
    }

    #[test]
    fn test_children_limited_to_most_relevant() {
        let tree = tree();
        let root = tree.open(&Span::inert(), SpanOptions::titled("root"));
        let ops: Vec<Span> = (0..5)
            .map(|i| tree.open(&root, SpanOptions::titled(format!("op{i}"))))
            .collect();
        ops[4].end();

        let out = render(&root, &RenderOptions::default().with_max_children(3));
        let shown: Vec<&str> = out.lines().filter(|l| l.starts_with(" >")).collect();

        assert_eq!(shown.len(), 3);
        assert!(shown[0].ends_with("op1"));
        assert!(shown[1].ends_with("op2"));
        assert!(shown[2].ends_with("op3"));
    }

    #[test]
    fn test_finished_root_shows_only_selected_children() {
        let tree = tree();
        let root = tree.open(&Span::inert(), SpanOptions::titled("root"));
        for i in 0..8 {
            tree.open(&root, SpanOptions::titled(format!("op{i}")));
        }
        root.end();

        let out = render(&root, &RenderOptions::default().with_max_children(6));
        let lines: Vec<&str> = out.lines().collect();
        let titles: Vec<&str> = lines
            .iter()
            .filter(|l| l.starts_with(" >"))
            .filter_map(|l| l.rsplit(' ').next())
            .collect();

        assert_eq!(lines[0], "[+] root");
        assert_eq!(titles, vec!["op2", "op3", "op4", "op5", "op6", "op7"]);
        assert_eq!(lines.len(), 1 + 6 + 1);
    }

    #[test]
    fn test_long_logs_truncated_from_center() {
        let tree = tree();
        let root = tree.open(&Span::inert(), SpanOptions::titled("root"));
        root.write("0123456789abcdefghij");

        let options = RenderOptions::default()
            .with_logs_max_length(10)
            .with_logs_prefix("> ");
        let out = render(&root, &options);

        assert!(out.contains("> 01234 .. fghij\n"));
    }

    #[test]
    fn test_render_roots_respects_limit() {
        let tree = tree();
        for i in 0..3 {
            tree.open(&Span::inert(), SpanOptions::titled(format!("job{i}")));
        }

        let out = render_roots(
            &tree.roots(),
            &RenderOptions::default().with_max_roots(2),
            &PlainPalette,
        );
        assert_eq!(out, "[-] job1\n\n[-] job2\n\n");
    }

    #[test]
    fn test_log_block() {
        let lines = vec!["a".to_string(), "b".to_string()];
        assert_eq!(render_log_block(&lines, "", 0, &PlainPalette), "a\nb\n");
    }
}
