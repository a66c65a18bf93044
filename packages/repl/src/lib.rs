//! # preftree-repl
//!
//! `preftool`, an interactive shell over a preferences store.
//!
//! The shell drives a `preftree_engine::Session`: every mutation goes through
//! the engine, so the tree shown by `tree` stays in step with the store.
//!
//! ## Usage
//!
//! ```bash
//! # Shell over the default store file
//! preftool
//!
//! # One command, then exit
//! preftool --store prefs.json tree
//!
//! # Inside the shell:
//! > mkdir User:/com/example/app
//! > cd User:/com/example/app
//! > put width Int32 640
//! > mv User:/com/example/app System:/com/example
//! > export System:/com/example/app --subtree app.json
//! ```

pub mod commands;
pub mod completer;
pub mod highlighter;
pub mod host;
pub mod io;
pub mod repl;
pub mod shell_context;

pub use commands::{execute, CommandResult};
pub use repl::ReplCore;
pub use shell_context::ShellContext;

use crate::host::TerminalHost;
use crate::io::{ExitReason, IoError};

/// Run the interactive shell on the terminal.
pub fn run(ctx: ShellContext) -> Result<ExitReason, IoError> {
    let mut host = TerminalHost::new().map_err(|e| IoError::Io(e.to_string()))?;
    ReplCore::new(ctx).run(&mut host)
}
