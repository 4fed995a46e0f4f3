//! Terminal output with verbosity levels.
//!
//! User-facing lines go to stdout through [`Console`]; diagnostics go to `tracing` (file or
//! dropped, see the binary's logging setup). Every console line is mirrored to `tracing` so a
//! `LOG_FILE` holds the full picture.

use std::io::{self, Write};

pub use stream_event::LogLevel;

pub struct Console {
    verbosity: LogLevel,
    out: Box<dyn Write + Send>,
}

impl Console {
    pub fn new(verbosity: LogLevel, out: impl Write + Send + 'static) -> Self {
        Self {
            verbosity,
            out: Box::new(out),
        }
    }

    pub fn stdout(verbosity: LogLevel) -> Self {
        Self::new(verbosity, std::io::stdout())
    }

    pub fn verbosity(&self) -> LogLevel {
        self.verbosity
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level <= self.verbosity
    }

    /// Prints `message` when `level` is within the configured verbosity.
    ///
    /// # Errors
    ///
    /// Write failures on the output (e.g. a closed pipe) are returned so callers can stop.
    pub fn print_log(&mut self, message: &str, level: LogLevel) -> io::Result<()> {
        match level {
            LogLevel::Quiet => tracing::warn!(target: "beacon::console", "{}", message),
            LogLevel::Info => tracing::info!(target: "beacon::console", "{}", message),
            LogLevel::Verbose | LogLevel::Debug => {
                tracing::debug!(target: "beacon::console", console_level = level.as_str(), "{}", message)
            }
        }
        if self.enabled(level) {
            self.write_line(message)?;
        }
        Ok(())
    }

    /// Prints regardless of verbosity.
    pub fn println(&mut self, message: &str) -> io::Result<()> {
        tracing::info!(target: "beacon::console", "{}", message);
        self.write_line(message)
    }

    fn write_line(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{}", message)?;
        self.out.flush()
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").field("verbosity", &self.verbosity).finish_non_exhaustive()
    }
}

/// In-memory writer for capturing console output in tests.
#[derive(Clone, Default)]
pub struct SharedBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut b) = self.0.lock() {
            b.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
