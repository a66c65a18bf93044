//! Host-facing I/O interface of the shell.
//!
//! The shell core reads lines and writes output only through `IoHost`, so the
//! same loop runs against a terminal or against queued test input.

#[cfg(test)]
pub mod test_host;

#[cfg(test)]
pub use test_host::TestHost;

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(String),
}

/// A key press that ends input without a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Ctrl+C
    Interrupt,
    /// Ctrl+D
    Eof,
}

/// Text written by the shell. The variant decides how a host shows it;
/// `Plain` text may already carry ANSI codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Plain(String),
    /// Hosts add an "Error:" prefix.
    Error(String),
    Info(String),
    Banner(String),
}

impl Output {
    pub fn text(&self) -> &str {
        match self {
            Output::Plain(text) | Output::Error(text) | Output::Info(text) | Output::Banner(text) => {
                text
            }
        }
    }
}

/// What the host needs to draw the next prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptConfig {
    /// The current node, e.g. `User:/app`.
    pub current_address: String,
    pub dry_run: bool,
}

/// Why the shell loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// `exit` or `quit`
    UserExit,
    Eof,
}

/// Host interface for shell I/O.
pub trait IoHost {
    /// Block until a line or a signal is available.
    ///
    /// Afterwards `read_input()` or `read_signal()` returns it.
    fn wait_for_input(&mut self) -> Result<(), IoError>;

    /// The pending input line, if any.
    fn read_input(&mut self) -> Result<Option<String>, IoError>;

    /// The pending signal, if any.
    fn read_signal(&mut self) -> Result<Option<Signal>, IoError>;

    fn write_output(&mut self, output: Output) -> Result<(), IoError>;

    /// Set what the next prompt shows.
    fn write_prompt(&mut self, config: PromptConfig) -> Result<(), IoError>;

    fn flush(&mut self) -> Result<(), IoError> {
        Ok(())
    }
}
