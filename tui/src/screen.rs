//! Screen
//!
//! The minimal terminal capability the render scheduler needs: clear, move
//! the cursor, write bytes, flush, and report size and interactivity.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Terminal capability used by the render scheduler
pub trait Screen: Send {
    /// Whether the output is an interactive terminal
    fn is_interactive(&self) -> bool;

    /// Terminal size as `(columns, rows)`
    fn size(&self) -> io::Result<(u16, u16)>;

    /// Clear the whole screen
    fn clear(&mut self) -> io::Result<()>;

    /// Move the cursor to column `x`, row `y` (0-based)
    fn move_cursor(&mut self, x: u16, y: u16) -> io::Result<()>;

    /// Queue raw bytes
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Push everything queued to the terminal
    fn flush(&mut self) -> io::Result<()>;
}

/// Keep at most `rows` lines of `frame`
///
/// The last kept line gets no trailing newline, so a full frame never
/// scrolls the terminal.
#[must_use]
pub fn clip_to_height(frame: &str, rows: u16) -> String {
    frame
        .lines()
        .take(usize::from(rows))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(unix)]
pub use term::TermScreen;

#[cfg(unix)]
mod term {
    use std::fs::File;
    use std::io::{self, BufWriter, IsTerminal, Write};
    use std::os::fd::AsFd;

    use crossterm::cursor::MoveTo;
    use crossterm::queue;
    use crossterm::terminal::{self, Clear, ClearType};

    use super::Screen;

    /// Screen backed by a private duplicate of the process's stdout
    ///
    /// The duplicate is taken at construction, so frames keep reaching the
    /// terminal while fd 1 itself is redirected into the capture pipe.
    #[derive(Debug)]
    pub struct TermScreen {
        out: BufWriter<File>,
        interactive: bool,
    }

    impl TermScreen {
        /// Attach to the current standard output
        ///
        /// # Errors
        ///
        /// Returns an error if the stdout descriptor cannot be duplicated.
        pub fn stdout() -> io::Result<Self> {
            let stdout = io::stdout();
            let interactive = stdout.is_terminal();
            let fd = stdout.as_fd().try_clone_to_owned()?;

            Ok(Self {
                out: BufWriter::new(File::from(fd)),
                interactive,
            })
        }
    }

    impl Screen for TermScreen {
        fn is_interactive(&self) -> bool {
            self.interactive
        }

        fn size(&self) -> io::Result<(u16, u16)> {
            terminal::size()
        }

        fn clear(&mut self) -> io::Result<()> {
            queue!(self.out, Clear(ClearType::All))
        }

        fn move_cursor(&mut self, x: u16, y: u16) -> io::Result<()> {
            queue!(self.out, MoveTo(x, y))
        }

        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.out.write_all(bytes)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.out.flush()
        }
    }
}

/// In-memory screen for tests and headless embedding
///
/// Clones share the same recording, so a test can keep one handle while the
/// scheduler owns another.
#[derive(Debug, Clone)]
pub struct MemoryScreen {
    interactive: bool,
    size: (u16, u16),
    recording: Arc<Mutex<Recording>>,
}

#[derive(Debug, Default)]
struct Recording {
    pending: Vec<u8>,
    frames: Vec<String>,
}

impl MemoryScreen {
    /// An interactive screen of the given size
    #[must_use]
    pub fn new(columns: u16, rows: u16) -> Self {
        Self {
            interactive: true,
            size: (columns, rows),
            recording: Arc::default(),
        }
    }

    /// A screen that reports it is not a terminal
    #[must_use]
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            ..Self::new(80, 24)
        }
    }

    /// Every flushed frame, oldest first
    #[must_use]
    pub fn frames(&self) -> Vec<String> {
        self.recording.lock().frames.clone()
    }

    /// Most recent flushed frame
    #[must_use]
    pub fn last_frame(&self) -> Option<String> {
        self.recording.lock().frames.last().cloned()
    }
}

impl Screen for MemoryScreen {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        Ok(self.size)
    }

    fn clear(&mut self) -> io::Result<()> {
        self.recording.lock().pending.clear();
        Ok(())
    }

    fn move_cursor(&mut self, _x: u16, _y: u16) -> io::Result<()> {
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.recording.lock().pending.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut recording = self.recording.lock();
        let frame = String::from_utf8_lossy(&recording.pending).into_owned();
        recording.pending.clear();
        recording.frames.push(frame);
        Ok(())
    }
}
