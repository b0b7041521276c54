use std::{
    io::{self, Write},
    result::Result as StdResult,
};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use thiserror::Error;

/// Indentation level (in spaces) used for nested output sections.
const INDENT: usize = 4;

/// Errors produced by [`Output`] implementations.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Underlying I/O error while writing to the terminal.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for output operations.
pub type Result<T> = StdResult<T, OutputError>;

/// Abstraction over how step progress and diagnostics are reported.
pub trait Output: Send + Sync {
    /// Print an informational message.
    fn message(&self, msg: &str) -> Result<()>;
    /// Print a success message.
    fn success(&self, msg: &str) -> Result<()>;
    /// Print a warning to the diagnostic stream.
    fn warn(&self, msg: &str) -> Result<()>;
    /// Print an error/failure message to the diagnostic stream.
    fn fail(&self, msg: &str) -> Result<()>;
    /// Flush any buffered output.
    fn finish(&self) -> Result<()>;
    /// Create a nested output section that indents subsequent messages.
    fn section(&self, header: &str) -> Box<dyn Output>;
}

/// Output implementation that suppresses all messages.
pub struct Quiet;

impl Output for Quiet {
    fn message(&self, _msg: &str) -> Result<()> {
        Ok(())
    }

    fn success(&self, _msg: &str) -> Result<()> {
        Ok(())
    }

    fn warn(&self, _msg: &str) -> Result<()> {
        Ok(())
    }

    fn fail(&self, _msg: &str) -> Result<()> {
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        Ok(())
    }

    fn section(&self, _header: &str) -> Box<dyn Output> {
        Box::new(Quiet)
    }
}

/// Output whose every write fails as if the reader went away.
#[cfg(test)]
pub(crate) struct ClosedStream;

#[cfg(test)]
impl ClosedStream {
    fn closed() -> Result<()> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe).into())
    }
}

#[cfg(test)]
impl Output for ClosedStream {
    fn message(&self, _msg: &str) -> Result<()> {
        Self::closed()
    }

    fn success(&self, _msg: &str) -> Result<()> {
        Self::closed()
    }

    fn warn(&self, _msg: &str) -> Result<()> {
        Self::closed()
    }

    fn fail(&self, _msg: &str) -> Result<()> {
        Self::closed()
    }

    fn finish(&self) -> Result<()> {
        Self::closed()
    }

    fn section(&self, _header: &str) -> Box<dyn Output> {
        Box::new(ClosedStream)
    }
}

/// Which standard stream a message is written to.
#[derive(Clone, Copy)]
enum Stream {
    /// Progress and results.
    Stdout,
    /// Warnings and failures.
    Stderr,
}

/// Color-capable terminal renderer.
pub struct Terminal {
    /// Color policy passed to `termcolor`.
    color_choice: ColorChoice,
    /// Current indentation in spaces.
    indent: usize,
}

impl Terminal {
    /// Create a new terminal output.
    ///
    /// - `color`: when `true`, always render colored output; when `false`,
    ///   disable ANSI colors.
    pub fn new(color: bool) -> Self {
        let color_choice = if color {
            ColorChoice::Always
        } else {
            ColorChoice::Never
        };
        Self {
            color_choice,
            indent: 0,
        }
    }

    /// Write one indented, colored line to `stream`.
    fn write_colored(&self, stream: Stream, msg: &str, color: Color) -> Result<()> {
        let mut out = match stream {
            Stream::Stdout => StandardStream::stdout(self.color_choice),
            Stream::Stderr => StandardStream::stderr(self.color_choice),
        };
        out.set_color(ColorSpec::new().set_fg(Some(color)))?;
        for line in msg.lines() {
            writeln!(out, "{}{line}", " ".repeat(self.indent))?;
        }
        out.reset()?;
        out.flush()?;
        Ok(())
    }
}

impl Output for Terminal {
    fn message(&self, msg: &str) -> Result<()> {
        self.write_colored(Stream::Stdout, msg, Color::Cyan)
    }

    fn success(&self, msg: &str) -> Result<()> {
        self.write_colored(Stream::Stdout, msg, Color::Green)
    }

    fn warn(&self, msg: &str) -> Result<()> {
        self.write_colored(Stream::Stderr, msg, Color::Rgb(255, 165, 0)) // Orange
    }

    fn fail(&self, msg: &str) -> Result<()> {
        self.write_colored(Stream::Stderr, msg, Color::Red)
    }

    fn finish(&self) -> Result<()> {
        io::stdout().flush()?;
        io::stderr().flush()?;
        Ok(())
    }

    fn section(&self, header: &str) -> Box<dyn Output> {
        let _ = self.message(header);

        Box::new(Self {
            color_choice: self.color_choice,
            indent: self.indent + INDENT,
        })
    }
}
