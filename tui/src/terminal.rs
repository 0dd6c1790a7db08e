//! Render Scheduler
//!
//! [`Terminal`] owns the span tree, the stdout capture session and the
//! background loop that redraws the screen.
//!
//! # States
//!
//! ```text
//!              capture() [interactive screen only]
//!   INACTIVE ───────────────────────────────────────► ACTIVE
//!   spans are inert                       capture session + render loop
//!      ▲                                                   │
//!      └───────────────── release() ◄──────────────────────┘
//!                  (blocks until teardown is done)
//! ```
//!
//! # Render loop
//!
//! One thread runs a current-thread tokio runtime with two tasks:
//!
//! - the change watcher polls [`SpanTree::latest_change`] every `watch_poll`
//!   and sends a coalesced signal on a channel of capacity 1
//! - the select loop redraws on the force tick, on a change signal (at most
//!   once per `min_update_gap`), and stops on cancellation
//!
//! Teardown after cancellation: final frame, pause, end the capture session,
//! replay everything captured to the real stdout, pause again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

use spanboard_core::{
    render_log_block, render_roots, BoardConfig, LogContainer, Palette, Span, SpanContext,
    SpanOptions, SpanTree,
};

use crate::capture::{CaptureError, CaptureEvent, CaptureSession, OutputRedirect};
use crate::screen::{clip_to_height, Screen};

/// Builds a fresh redirect for every capture session
pub type RedirectFactory = Box<dyn FnMut() -> Box<dyn OutputRedirect> + Send>;

// ============================================================================
// Shared state
// ============================================================================

/// Captured stdout: a short live view plus everything for the final replay
#[derive(Debug)]
struct CapturedStdout {
    live: LogContainer,
    replay: Vec<String>,
}

/// State shared between the caller-facing handle and the render thread
struct Shared {
    config: BoardConfig,
    tree: SpanTree,
    palette: Box<dyn Palette>,
    active: AtomicBool,
    stdout: Mutex<CapturedStdout>,
    screen: Mutex<Box<dyn Screen>>,
}

impl Shared {
    fn on_capture(&self, event: CaptureEvent) {
        match event {
            CaptureEvent::Line(line) => {
                let mut stdout = self.stdout.lock();
                stdout.live.write(line.clone());
                stdout.replay.push(line);
            }
            CaptureEvent::Closed => tracing::trace!("capture stream closed"),
        }
    }

    fn reset_capture(&self) {
        let mut stdout = self.stdout.lock();
        stdout.live.clear();
        stdout.replay.clear();
    }

    /// Build the current frame
    fn frame(&self) -> String {
        let mut frame = String::new();

        // Hidden once inactive: the full capture is replayed after teardown.
        if self.active.load(Ordering::SeqCst) {
            let live = self.stdout.lock().live.content();
            frame.push_str(&render_log_block(&live, "", 0, self.palette.as_ref()));
            frame.push('\n');
        }

        frame.push_str(&render_roots(
            &self.tree.roots(),
            &self.config.render,
            self.palette.as_ref(),
        ));
        frame
    }

    /// Clear the screen and draw the current frame
    fn update(&self) {
        let frame = self.frame();
        let mut screen = self.screen.lock();
        if let Err(e) = draw(screen.as_mut(), &frame) {
            tracing::debug!(error = %e, "screen update failed");
        }
    }

    /// Write every captured line back to the real stdout
    fn replay_captured(&self) {
        let replay = std::mem::take(&mut self.stdout.lock().replay);

        let mut out = String::from("\n");
        for line in &replay {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');

        let mut screen = self.screen.lock();
        let result = screen
            .write(out.as_bytes())
            .and_then(|()| screen.flush());
        if let Err(e) = result {
            tracing::debug!(error = %e, "failed to replay captured stdout");
        }

        tracing::debug!(lines = replay.len(), "captured stdout replayed");
    }
}

fn draw(screen: &mut dyn Screen, frame: &str) -> std::io::Result<()> {
    let (_, rows) = screen.size()?;
    screen.clear()?;
    screen.move_cursor(0, 0)?;
    screen.write(clip_to_height(frame, rows).as_bytes())?;
    screen.flush()
}

// ============================================================================
// Terminal
// ============================================================================

struct RenderLoop {
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct Control {
    redirect: RedirectFactory,
    running: Option<RenderLoop>,
}

/// Live dashboard bound to one screen
pub struct Terminal {
    shared: Arc<Shared>,
    control: Mutex<Control>,
}

impl Terminal {
    /// Dashboard on the process's stdout, capturing fd 1
    ///
    /// # Errors
    ///
    /// Returns an error if stdout cannot be duplicated for drawing.
    #[cfg(unix)]
    pub fn new(config: BoardConfig) -> std::io::Result<Self> {
        let screen = crate::screen::TermScreen::stdout()?;
        Ok(Self::with_parts(
            config,
            Box::new(screen),
            Box::new(|| -> Box<dyn OutputRedirect> {
                Box::new(crate::capture::FdRedirect::stdout())
            }),
            Box::new(crate::palette::AnsiPalette),
        ))
    }

    /// Dashboard with explicit collaborators
    #[must_use]
    pub fn with_parts(
        config: BoardConfig,
        screen: Box<dyn Screen>,
        redirect: RedirectFactory,
        palette: Box<dyn Palette>,
    ) -> Self {
        let tree = SpanTree::new(config.containers.clone());
        let live = LogContainer::ring(config.scheduler.stdout_max_lines);

        Self {
            shared: Arc::new(Shared {
                config,
                tree,
                palette,
                active: AtomicBool::new(false),
                stdout: Mutex::new(CapturedStdout {
                    live,
                    replay: Vec::new(),
                }),
                screen: Mutex::new(screen),
            }),
            control: Mutex::new(Control {
                redirect,
                running: None,
            }),
        }
    }

    /// Configuration in effect
    #[must_use]
    pub fn config(&self) -> &BoardConfig {
        &self.shared.config
    }

    /// The span tree
    #[must_use]
    pub fn tree(&self) -> &SpanTree {
        &self.shared.tree
    }

    /// Whether capture and the render loop are running
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Open a span under the context's span (or a new root)
    ///
    /// While inactive this returns the context unchanged and an inert span.
    /// `title` is used unless `options` already carries one.
    pub fn start_span(
        &self,
        ctx: &SpanContext,
        title: impl Into<String>,
        mut options: SpanOptions,
    ) -> (SpanContext, Span) {
        if !self.is_active() {
            return (ctx.clone(), Span::inert());
        }

        if options.title.is_none() {
            options.title = Some(title.into());
        }

        let span = self.shared.tree.open(&ctx.span_or_inert(), options);
        (ctx.with_span(span.clone()), span)
    }

    /// Start capturing stdout and drawing the dashboard
    ///
    /// Does nothing when already active or when the screen is not an
    /// interactive terminal.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidConfig`] if the configuration fails
    /// [`BoardConfig::validate`], the capture error if stdout could not be
    /// redirected, or [`CaptureError::Worker`] if the render thread could not
    /// start. Stdout is left untouched in every case.
    pub fn capture(&self) -> Result<(), CaptureError> {
        let mut control = self.control.lock();
        if control.running.is_some() {
            return Ok(());
        }

        if !self.shared.screen.lock().is_interactive() {
            tracing::debug!("output is not an interactive terminal; dashboard disabled");
            return Ok(());
        }

        // Configs built in code never went through the loader's check.
        self.shared.config.validate()?;

        self.shared.reset_capture();

        let redirect = (control.redirect)();
        let sink = Arc::clone(&self.shared);
        let session = CaptureSession::begin(redirect, move |event| sink.on_capture(event))?;

        let (cancel, cancelled) = oneshot::channel();
        self.shared.active.store(true, Ordering::SeqCst);

        // If the spawn fails the closure is dropped, and the session with it,
        // which restores stdout.
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("spanboard-render".to_string())
            .spawn(move || run_render_thread(&shared, Some(session), cancelled));

        match spawned {
            Ok(handle) => {
                control.running = Some(RenderLoop { cancel, handle });
                tracing::info!("dashboard active");
                Ok(())
            }
            Err(e) => {
                self.shared.active.store(false, Ordering::SeqCst);
                Err(CaptureError::Worker(e))
            }
        }
    }

    /// Stop the dashboard and give stdout back
    ///
    /// Blocks until the final frame is drawn and every captured line has been
    /// replayed. Does nothing when inactive.
    pub fn release(&self) {
        let mut control = self.control.lock();
        let Some(running) = control.running.take() else {
            return;
        };

        self.shared.active.store(false, Ordering::SeqCst);
        thread::sleep(self.shared.config.scheduler.settle_pause);

        let _ = running.cancel.send(());
        if running.handle.join().is_err() {
            tracing::warn!("render loop panicked");
        }

        tracing::info!("dashboard released");
    }

    /// Draw one frame now
    pub fn update(&self) {
        self.shared.update();
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("active", &self.is_active())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Render thread
// ============================================================================

/// Session handed to the render thread; ended there during teardown
type SessionSlot = Option<CaptureSession>;

fn run_render_thread(
    shared: &Arc<Shared>,
    mut session: SessionSlot,
    cancelled: oneshot::Receiver<()>,
) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build();

    match runtime {
        Ok(runtime) => runtime.block_on(render_loop(shared, &mut session, cancelled)),
        Err(e) => {
            tracing::warn!(error = %e, "failed to start render runtime");
            teardown_blocking(shared, &mut session);
        }
    }
}

async fn render_loop(
    shared: &Arc<Shared>,
    session: &mut SessionSlot,
    mut cancelled: oneshot::Receiver<()>,
) {
    let scheduler = &shared.config.scheduler;

    let (changed_tx, mut changed_rx) = mpsc::channel(1);
    let watcher = tokio::spawn(watch_changes(
        Arc::clone(shared),
        changed_tx,
        scheduler.watch_poll,
    ));

    let mut ticker = tokio::time::interval(scheduler.force_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut next_update_at = Instant::now();

    loop {
        tokio::select! {
            _ = &mut cancelled => break,
            _ = ticker.tick() => shared.update(),
            Some(()) = changed_rx.recv() => {
                let now = Instant::now();
                if now < next_update_at {
                    continue;
                }
                next_update_at = now + scheduler.min_update_gap;
                shared.update();
            }
        }
    }

    watcher.abort();

    shared.update();
    tokio::time::sleep(scheduler.flush_pause).await;
    end_session(session);
    shared.replay_captured();
    tokio::time::sleep(scheduler.flush_pause).await;
}

/// Poll the tree and signal when something changed since the last signal
async fn watch_changes(shared: Arc<Shared>, changed: mpsc::Sender<()>, poll: Duration) {
    let mut last_seen = std::time::Instant::now();

    loop {
        if let Some(latest) = shared.tree.latest_change() {
            if latest > last_seen {
                last_seen = latest;
                if let Err(mpsc::error::TrySendError::Closed(())) = changed.try_send(()) {
                    return;
                }
            }
        }
        tokio::time::sleep(poll).await;
    }
}

fn teardown_blocking(shared: &Shared, session: &mut SessionSlot) {
    shared.update();
    end_session(session);
    shared.replay_captured();
}

fn end_session(session: &mut SessionSlot) {
    if let Some(mut session) = session.take() {
        if let Err(e) = session.end() {
            tracing::warn!(error = %e, "failed to end stdout capture");
        }
    }
}
