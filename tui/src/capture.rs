//! Capture Shim
//!
//! Swaps the process's standard output for the write end of an OS pipe and
//! hands every newline-terminated chunk written to it to a callback.
//!
//! # Architecture
//!
//! ```text
//!  println!/print!/libc write(1, ..)
//!            │
//!            ▼
//!     fd 1 ──► pipe write end           saved dup of the original fd 1
//!                  │                                 │
//!                  ▼                                 │ restore(): dup2 back
//!          reader thread                             ▼
//!     read_until('\n') → on_event(Line)      original stdout again
//!                  │
//!            EOF after restore → on_event(Closed)
//! ```
//!
//! The OS side sits behind [`OutputRedirect`] so the scheduler can be driven
//! with an in-memory stream in tests.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use spanboard_core::ConfigError;

/// How long `end` waits for the reader to drain the pipe after restore
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Errors
// ============================================================================

/// Errors starting or stopping a capture session
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The pipe could not be created; capture cannot start
    #[error("failed to create capture pipe: {0}")]
    Pipe(#[source] io::Error),

    /// The original output descriptor could not be saved
    #[error("failed to duplicate original output: {0}")]
    Duplicate(#[source] io::Error),

    /// The output descriptor could not be pointed at the pipe
    #[error("failed to redirect output into capture pipe: {0}")]
    Redirect(#[source] io::Error),

    /// The original output could not be put back
    #[error("failed to restore original output: {0}")]
    Restore(#[source] io::Error),

    /// The reader or render thread could not be started
    #[error("failed to spawn capture worker: {0}")]
    Worker(#[source] io::Error),

    /// The dashboard configuration cannot drive a render loop
    #[error("invalid dashboard configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

// ============================================================================
// Redirect capability
// ============================================================================

/// Narrow capability for swapping an output stream
///
/// `redirect` must leave no partial state behind when it fails. After a
/// successful `restore`, the reader returned by `redirect` must reach EOF
/// once everything written before the restore has been read.
pub trait OutputRedirect: Send {
    /// Start diverting output; returns the stream to read it from
    fn redirect(&mut self) -> Result<Box<dyn Read + Send>, CaptureError>;

    /// Put the original output back; a no-op when not redirected
    fn restore(&mut self) -> Result<(), CaptureError>;
}

#[cfg(unix)]
pub use fd::FdRedirect;

/// Flush ahead of a descriptor swap; a failure only loses buffered bytes
#[cfg(any(unix, test))]
fn flush_logged(out: &mut impl Write) {
    if let Err(e) = out.flush() {
        tracing::debug!(error = %e, "failed to flush output before swap");
    }
}

#[cfg(unix)]
mod fd {
    use std::fs::File;
    use std::io::{self, Read};
    use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

    use super::{flush_logged, CaptureError, OutputRedirect};

    /// Redirects a file descriptor (normally fd 1) into a pipe with `dup2`
    #[derive(Debug)]
    pub struct FdRedirect {
        target: RawFd,
        saved: Option<OwnedFd>,
    }

    impl FdRedirect {
        /// Redirect the process's standard output
        #[must_use]
        pub fn stdout() -> Self {
            Self {
                target: libc::STDOUT_FILENO,
                saved: None,
            }
        }

        /// Whether output is currently diverted
        #[must_use]
        pub fn is_redirected(&self) -> bool {
            self.saved.is_some()
        }
    }

    fn create_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
        let mut fds: [libc::c_int; 2] = [0; 2];
        // SAFETY: `fds` is a valid two-element buffer for pipe(2).
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: pipe(2) succeeded, so both descriptors are open and owned
        // by nobody else.
        let ends = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        Ok(ends)
    }

    impl OutputRedirect for FdRedirect {
        fn redirect(&mut self) -> Result<Box<dyn Read + Send>, CaptureError> {
            if self.saved.is_some() {
                return Err(CaptureError::Redirect(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "output is already redirected",
                )));
            }

            // Anything still buffered belongs to the original stream.
            flush_logged(&mut io::stdout());

            let (read_end, write_end) = create_pipe().map_err(CaptureError::Pipe)?;

            // SAFETY: `target` is a descriptor this process keeps open for its
            // whole lifetime (stdout).
            let saved = unsafe { BorrowedFd::borrow_raw(self.target) }
                .try_clone_to_owned()
                .map_err(CaptureError::Duplicate)?;

            // SAFETY: both descriptors are open; dup2 atomically replaces
            // `target`.
            if unsafe { libc::dup2(write_end.as_raw_fd(), self.target) } < 0 {
                // Dropping `saved` and both pipe ends undoes everything.
                return Err(CaptureError::Redirect(io::Error::last_os_error()));
            }

            // `target` is now the only write end; restoring it yields EOF.
            drop(write_end);
            self.saved = Some(saved);

            tracing::debug!(fd = self.target, "output redirected into capture pipe");
            Ok(Box::new(File::from(read_end)))
        }

        fn restore(&mut self) -> Result<(), CaptureError> {
            let Some(saved) = self.saved.take() else {
                return Ok(());
            };

            flush_logged(&mut io::stdout());

            // SAFETY: `saved` is an open descriptor owned by us.
            if unsafe { libc::dup2(saved.as_raw_fd(), self.target) } < 0 {
                let err = io::Error::last_os_error();
                self.saved = Some(saved);
                return Err(CaptureError::Restore(err));
            }

            tracing::debug!(fd = self.target, "original output restored");
            Ok(())
        }
    }

    impl Drop for FdRedirect {
        fn drop(&mut self) {
            if let Err(e) = self.restore() {
                tracing::warn!(error = %e, "failed to restore output on drop");
            }
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// What the reader delivers to the session callback
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureEvent {
    /// One captured line, without its line terminator
    Line(String),
    /// The stream ended; sent exactly once per session
    Closed,
}

type EventSink = Arc<dyn Fn(CaptureEvent) + Send + Sync>;

/// One redirect → read → restore cycle
///
/// Created by [`CaptureSession::begin`]; ended by [`CaptureSession::end`] or
/// by dropping it.
pub struct CaptureSession {
    redirect: Box<dyn OutputRedirect>,
    on_event: EventSink,
    reader: Option<JoinHandle<()>>,
    drained: mpsc::Receiver<()>,
    ended: bool,
}

impl CaptureSession {
    /// Redirect output and start delivering lines to `on_event`
    ///
    /// # Errors
    ///
    /// Returns the redirect's error if output could not be diverted (nothing
    /// is swapped in that case), or [`CaptureError::Worker`] if the reader
    /// thread could not be started (output is restored first).
    pub fn begin<F>(
        mut redirect: Box<dyn OutputRedirect>,
        on_event: F,
    ) -> Result<Self, CaptureError>
    where
        F: Fn(CaptureEvent) + Send + Sync + 'static,
    {
        let stream = redirect.redirect()?;
        let on_event: EventSink = Arc::new(on_event);
        let (drained_tx, drained) = mpsc::channel();

        let sink = Arc::clone(&on_event);
        let spawned = thread::Builder::new()
            .name("spanboard-capture".to_string())
            .spawn(move || {
                read_lines(stream, sink.as_ref());
                let _ = drained_tx.send(());
            });

        let reader = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(restore_err) = redirect.restore() {
                    tracing::warn!(
                        error = %restore_err,
                        "failed to restore output after spawn failure"
                    );
                }
                return Err(CaptureError::Worker(e));
            }
        };

        tracing::info!("stdout capture started");
        Ok(Self {
            redirect,
            on_event,
            reader: Some(reader),
            drained,
            ended: false,
        })
    }

    /// Whether `end` has already run
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Restore output, wait for the reader to drain and emit `Closed`
    ///
    /// Only the first call does anything.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Restore`] if the original output could not be
    /// put back. `Closed` is still emitted.
    pub fn end(&mut self) -> Result<(), CaptureError> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;

        let restored = self.redirect.restore();

        match self.drained.recv_timeout(READER_DRAIN_TIMEOUT) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if let Some(reader) = self.reader.take() {
                    if reader.join().is_err() {
                        tracing::warn!("capture reader panicked");
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!("capture reader did not reach end of stream; detaching it");
            }
        }

        (self.on_event)(CaptureEvent::Closed);
        tracing::info!("stdout capture stopped");
        restored
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Err(e) = self.end() {
            tracing::warn!(error = %e, "failed to end capture session on drop");
        }
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("ended", &self.ended)
            .finish_non_exhaustive()
    }
}

/// Deliver newline-terminated chunks until EOF or a read error
fn read_lines(stream: Box<dyn Read + Send>, on_event: &(dyn Fn(CaptureEvent) + Send + Sync)) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => on_event(CaptureEvent::Line(decode_line(&buf))),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                // A broken pipe is just the end of the stream.
                tracing::debug!(error = %e, "capture reader stopped");
                break;
            }
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    if raw[..end].ends_with(b"\n") {
        end -= 1;
    }
    if raw[..end].ends_with(b"\r") {
        end -= 1;
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
