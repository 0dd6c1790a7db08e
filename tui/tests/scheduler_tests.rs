//! Scheduler Integration Tests
//!
//! Drives a [`Terminal`] end to end with an in-memory stdout and screen:
//!
//! 1. **Live view**: captured lines show up above the spans while active
//! 2. **Replay**: release writes every captured line back, in order
//! 3. **Lifecycle**: restore runs once, spans go inert, re-capture starts clean
//! 4. **Pacing**: change bursts are debounced to the minimum update gap
//! 5. **Failures**: a failed start leaves stdout alone and the dashboard inactive

use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use spanboard_core::{BoardConfig, PlainPalette, SchedulerConfig, SpanContext, SpanOptions};
use spanboard_tui::{CaptureError, MemoryScreen, OutputRedirect, Terminal};

// ============================================================================
// Fake stdout
// ============================================================================

/// Reads whatever the fake stdout sends until the sender is dropped
struct ChannelReader {
    chunks: mpsc::Receiver<Vec<u8>>,
    current: Vec<u8>,
    offset: usize,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.offset == self.current.len() {
            match self.chunks.recv() {
                Ok(chunk) => {
                    self.current = chunk;
                    self.offset = 0;
                }
                Err(_) => return Ok(0),
            }
        }

        let n = buf.len().min(self.current.len() - self.offset);
        buf[..n].copy_from_slice(&self.current[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}

/// Process stdout stand-in: diverted while redirected, recorded otherwise
#[derive(Clone, Default)]
struct FakeStdout {
    pipe: Arc<Mutex<Option<mpsc::Sender<Vec<u8>>>>>,
    passthrough: Arc<Mutex<Vec<String>>>,
    redirects: Arc<AtomicUsize>,
    restores: Arc<AtomicUsize>,
}

impl FakeStdout {
    fn println(&self, line: &str) {
        let bytes = format!("{line}\n").into_bytes();
        match self.pipe.lock().as_ref() {
            Some(sender) => {
                let _ = sender.send(bytes);
            }
            None => self.passthrough.lock().push(line.to_string()),
        }
    }

    fn passthrough(&self) -> Vec<String> {
        self.passthrough.lock().clone()
    }

    fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }

    fn restores(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

struct FakeRedirect(FakeStdout);

impl OutputRedirect for FakeRedirect {
    fn redirect(&mut self) -> Result<Box<dyn Read + Send>, CaptureError> {
        let (sender, chunks) = mpsc::channel();
        *self.0.pipe.lock() = Some(sender);
        self.0.redirects.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(ChannelReader {
            chunks,
            current: Vec::new(),
            offset: 0,
        }))
    }

    fn restore(&mut self) -> Result<(), CaptureError> {
        if self.0.pipe.lock().take().is_some() {
            self.0.restores.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Redirect that cannot create its pipe
struct FailingRedirect(FakeStdout);

impl OutputRedirect for FailingRedirect {
    fn redirect(&mut self) -> Result<Box<dyn Read + Send>, CaptureError> {
        self.0.redirects.fetch_add(1, Ordering::SeqCst);
        Err(CaptureError::Pipe(io::Error::other("pipe table full")))
    }

    fn restore(&mut self) -> Result<(), CaptureError> {
        self.0.restores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn dashboard(stdout: &FakeStdout, screen: &MemoryScreen) -> Terminal {
    dashboard_with(
        stdout,
        screen,
        SchedulerConfig::default()
            .without_pauses()
            .with_force_interval(Duration::from_millis(10)),
    )
}

fn dashboard_with(
    stdout: &FakeStdout,
    screen: &MemoryScreen,
    scheduler: SchedulerConfig,
) -> Terminal {
    let config = BoardConfig::default().with_scheduler(scheduler);
    let stdout = stdout.clone();
    Terminal::with_parts(
        config,
        Box::new(screen.clone()),
        Box::new(move || -> Box<dyn OutputRedirect> { Box::new(FakeRedirect(stdout.clone())) }),
        Box::new(PlainPalette),
    )
}

/// Wait until some drawn frame satisfies `predicate`
fn wait_for_frame(screen: &MemoryScreen, predicate: impl Fn(&str) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if screen.frames().iter().any(|frame| predicate(frame)) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_captured_lines_appear_above_spans() {
    let stdout = FakeStdout::default();
    let screen = MemoryScreen::new(120, 40);
    let terminal = dashboard(&stdout, &screen);

    terminal.capture().unwrap();
    let (_, span) = terminal.start_span(&SpanContext::background(), "deploy", SpanOptions::new());
    stdout.println("hello from the service");

    let seen = wait_for_frame(&screen, |frame| {
        match (frame.find("hello from the service"), frame.find("deploy")) {
            (Some(line), Some(title)) => line < title,
            _ => false,
        }
    });
    assert!(seen, "frames: {:#?}", screen.frames());

    span.end();
    terminal.release();
}

#[test]
fn test_release_replays_everything_in_order() {
    let stdout = FakeStdout::default();
    let screen = MemoryScreen::new(120, 40);
    let terminal = dashboard(&stdout, &screen);

    terminal.capture().unwrap();
    let (_, span) = terminal.start_span(&SpanContext::background(), "build", SpanOptions::new());

    // More lines than the live view keeps; the replay still has all of them.
    let lines: Vec<String> = (0..20).map(|i| format!("line {i}")).collect();
    for line in &lines {
        stdout.println(line);
    }
    span.end();
    terminal.release();

    let frames = screen.frames();
    let replay = frames.last().unwrap();
    let expected = format!("\n{}\n\n", lines.join("\n"));
    assert_eq!(replay, &expected);

    // The last dashboard frame no longer shows the capture block.
    let final_frame = &frames[frames.len() - 2];
    assert!(final_frame.contains("build"));
    assert!(!final_frame.contains("line 0"));
}

#[test]
fn test_restore_runs_once_and_spans_go_inert() {
    let stdout = FakeStdout::default();
    let screen = MemoryScreen::new(80, 24);
    let terminal = dashboard(&stdout, &screen);

    terminal.capture().unwrap();
    assert!(terminal.is_active());

    terminal.release();
    terminal.release();
    assert!(!terminal.is_active());
    assert_eq!(stdout.restores(), 1);

    let (ctx, span) = terminal.start_span(&SpanContext::background(), "late", SpanOptions::new());
    assert!(span.is_inert());
    assert!(ctx.span().is_none());

    stdout.println("after release");
    assert_eq!(stdout.passthrough(), vec!["after release".to_string()]);

    drop(terminal);
    assert_eq!(stdout.restores(), 1);
}

#[test]
fn test_second_capture_while_active_is_noop() {
    let stdout = FakeStdout::default();
    let screen = MemoryScreen::new(80, 24);
    let terminal = dashboard(&stdout, &screen);

    terminal.capture().unwrap();
    terminal.capture().unwrap();
    assert_eq!(stdout.redirects(), 1);

    terminal.release();
    assert_eq!(stdout.restores(), 1);
}

#[test]
fn test_recapture_starts_with_empty_buffer() {
    let stdout = FakeStdout::default();
    let screen = MemoryScreen::new(80, 24);
    let terminal = dashboard(&stdout, &screen);

    terminal.capture().unwrap();
    stdout.println("first session");
    terminal.release();

    terminal.capture().unwrap();
    stdout.println("second session");
    terminal.release();

    assert_eq!(stdout.redirects(), 2);
    assert_eq!(stdout.restores(), 2);
    assert_eq!(screen.last_frame().unwrap(), "\nsecond session\n\n");
}

#[test]
fn test_span_changes_trigger_redraw_between_ticks() {
    let stdout = FakeStdout::default();
    let screen = MemoryScreen::new(80, 24);
    let terminal = dashboard_with(
        &stdout,
        &screen,
        SchedulerConfig::default()
            .without_pauses()
            .with_force_interval(Duration::from_secs(60)),
    );

    terminal.capture().unwrap();
    let (_, span) = terminal.start_span(&SpanContext::background(), "watched", SpanOptions::new());
    span.set_progress(0.42);

    assert!(wait_for_frame(&screen, |frame| frame.contains("42%")));

    span.end();
    terminal.release();
}

#[test]
fn test_change_bursts_are_debounced() {
    let stdout = FakeStdout::default();
    let screen = MemoryScreen::new(80, 24);
    let gap = Duration::from_millis(300);
    let terminal = dashboard_with(
        &stdout,
        &screen,
        SchedulerConfig::default()
            .without_pauses()
            .with_force_interval(Duration::from_secs(60))
            .with_min_update_gap(gap),
    );

    terminal.capture().unwrap();
    let started = Instant::now();
    let (_, span) = terminal.start_span(&SpanContext::background(), "busy", SpanOptions::new());
    for i in 0..100u32 {
        span.set_progress(f64::from(i) / 100.0);
        std::thread::sleep(Duration::from_millis(5));
    }
    let elapsed = started.elapsed();
    let frames = screen.frames().len();

    span.end();
    terminal.release();

    // One frame per elapsed gap, plus the first tick and the edges of the window.
    let allowed = usize::try_from(elapsed.as_millis() / gap.as_millis()).unwrap() + 3;
    assert!(
        frames <= allowed,
        "{frames} frames in {elapsed:?}, expected at most {allowed}"
    );
    assert!(frames >= 1);
}

#[test]
fn test_failed_redirect_leaves_dashboard_inactive() {
    let stdout = FakeStdout::default();
    let screen = MemoryScreen::new(80, 24);
    let redirect_stdout = stdout.clone();
    let terminal = Terminal::with_parts(
        BoardConfig::default().with_scheduler(SchedulerConfig::default().without_pauses()),
        Box::new(screen.clone()),
        Box::new(move || -> Box<dyn OutputRedirect> {
            Box::new(FailingRedirect(redirect_stdout.clone()))
        }),
        Box::new(PlainPalette),
    );

    let result = terminal.capture();
    assert!(matches!(result, Err(CaptureError::Pipe(_))), "{result:?}");
    assert!(!terminal.is_active());
    assert_eq!(stdout.redirects(), 1);
    assert!(screen.frames().is_empty());

    let (ctx, span) = terminal.start_span(&SpanContext::background(), "orphan", SpanOptions::new());
    assert!(span.is_inert());
    assert!(ctx.span().is_none());

    // Nothing was started, so there is nothing to undo.
    terminal.release();
    assert!(screen.frames().is_empty());
}

#[test]
fn test_zero_force_interval_is_rejected_before_redirect() {
    let stdout = FakeStdout::default();
    let screen = MemoryScreen::new(80, 24);
    let terminal = dashboard_with(
        &stdout,
        &screen,
        SchedulerConfig::default()
            .without_pauses()
            .with_force_interval(Duration::ZERO),
    );

    let result = terminal.capture();
    assert!(
        matches!(result, Err(CaptureError::InvalidConfig(_))),
        "{result:?}"
    );
    assert!(!terminal.is_active());
    assert_eq!(stdout.redirects(), 0);
    assert!(screen.frames().is_empty());

    stdout.println("still plain");
    assert_eq!(stdout.passthrough(), vec!["still plain".to_string()]);
}
