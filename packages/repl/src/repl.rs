//! Platform-independent shell loop.
//!
//! `ReplCore` talks to the user only through `IoHost`, so the terminal host
//! and the test host drive the same loop.

use crate::commands::{self, CommandResult};
use crate::io::{ExitReason, IoError, IoHost, Output, PromptConfig, Signal};
use crate::shell_context::ShellContext;

pub struct ReplCore {
    ctx: ShellContext,
}

impl ReplCore {
    pub fn new(ctx: ShellContext) -> Self {
        Self { ctx }
    }

    /// Run the loop until the user exits or input ends.
    pub fn run(&mut self, io: &mut impl IoHost) -> Result<ExitReason, IoError> {
        io.write_output(Output::Banner(BANNER.to_string()))?;

        loop {
            self.update_prompt(io)?;
            io.wait_for_input()?;

            if let Some(signal) = io.read_signal()? {
                match signal {
                    Signal::Eof => {
                        self.finish(io)?;
                        return Ok(ExitReason::Eof);
                    }
                    Signal::Interrupt => {
                        io.write_output(Output::Info("^C (use 'exit' to quit)".to_string()))?;
                        continue;
                    }
                }
            }

            let input = match io.read_input()? {
                Some(input) => input,
                None => continue,
            };

            match commands::execute(&input, &mut self.ctx) {
                CommandResult::Ok { display: None } => {}
                CommandResult::Ok {
                    display: Some(output),
                } => {
                    io.write_output(Output::Plain(output))?;
                }
                CommandResult::Error(msg) => {
                    io.write_output(Output::Error(msg))?;
                }
                CommandResult::Help => {
                    io.write_output(Output::Plain(commands::format_help()))?;
                }
                CommandResult::Exit => {
                    self.finish(io)?;
                    return Ok(ExitReason::UserExit);
                }
            }

            io.flush()?;
        }
    }

    pub fn context(&self) -> &ShellContext {
        &self.ctx
    }

    /// Push anything still pending to the store before leaving.
    fn finish(&mut self, io: &mut impl IoHost) -> Result<(), IoError> {
        let current = self.ctx.current().clone();
        if let Err(err) = self.ctx.session_mut().flush(&current) {
            io.write_output(Output::Error(err.to_string()))?;
        }
        io.write_output(Output::Info("Goodbye!".to_string()))?;
        io.flush()
    }

    fn update_prompt(&self, io: &mut impl IoHost) -> Result<(), IoError> {
        io.write_prompt(PromptConfig {
            current_address: self.ctx.current().to_string(),
            dry_run: self.ctx.session().config().dry_run,
        })
    }
}

const BANNER: &str = r#"
                  __  _              _
 _ __  _ __ ___  / _|| |_  ___   ___ | |
| '_ \| '__/ _ \| |_ | __|/ _ \ / _ \| |
| |_) | | |  __/|  _|| |_| (_) | (_) | |
| .__/|_|  \___||_|   \__|\___/ \___/|_|
|_|

Type 'help' for available commands, 'exit' to quit.
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::TestHost;
    use preftree_core_store::{address, StoreAdapter};
    use preftree_engine::{EngineConfig, Session};
    use preftree_json_store::{InMemoryStore, JsonFileStore};

    fn core(config: EngineConfig) -> ReplCore {
        let session = Session::open(Box::new(InMemoryStore::new()), config).unwrap();
        ReplCore::new(ShellContext::new(session))
    }

    #[test]
    fn exit_command() {
        let mut core = core(EngineConfig::default());
        let mut host = TestHost::new();
        host.queue_input("exit");

        assert!(matches!(core.run(&mut host), Ok(ExitReason::UserExit)));
        assert!(host.output_text().contains("Goodbye"));
        assert_eq!(host.banners(), 1);
    }

    #[test]
    fn eof_signal() {
        let mut core = core(EngineConfig::default());
        let mut host = TestHost::new();
        host.queue_signal(Signal::Eof);

        assert!(matches!(core.run(&mut host), Ok(ExitReason::Eof)));
    }

    #[test]
    fn interrupt_continues() {
        let mut core = core(EngineConfig::default());
        let mut host = TestHost::new();
        host.queue_signal(Signal::Interrupt);
        host.queue_input("exit");

        assert!(matches!(core.run(&mut host), Ok(ExitReason::UserExit)));
        assert!(host.output_text().contains("^C"));
    }

    #[test]
    fn prompt_tracks_current_node() {
        let mut core = core(EngineConfig::default());
        let mut host = TestHost::new();
        host.queue_inputs(["mkdir System:/app", "cd System:/app", "exit"]);
        core.run(&mut host).unwrap();

        let shown: Vec<&str> = host
            .prompts()
            .iter()
            .map(|p| p.current_address.as_str())
            .collect();
        assert_eq!(shown, vec!["User:/", "User:/", "System:/app"]);
        assert_eq!(core.context().current(), &address!("System:/app"));
    }

    #[test]
    fn errors_do_not_end_the_loop() {
        let mut core = core(EngineConfig::default());
        let mut host = TestHost::new();
        host.queue_inputs(["cd User:/missing", "bogus", "pwd", "exit"]);

        assert!(matches!(core.run(&mut host), Ok(ExitReason::UserExit)));
        assert_eq!(host.errors().len(), 2);
        assert!(host.output_text().contains("User:/"));
    }

    #[test]
    fn dry_run_shows_in_prompt() {
        let mut core = core(EngineConfig {
            dry_run: true,
            ..EngineConfig::default()
        });
        let mut host = TestHost::new();
        host.queue_input("exit");
        core.run(&mut host).unwrap();
        assert!(host.last_prompt().unwrap().dry_run);
    }

    #[test]
    fn exit_flushes_pending_changes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("prefs.json");
        let store = JsonFileStore::open(&file).unwrap();
        let config = EngineConfig {
            flush_after_mutation: false,
            ..EngineConfig::default()
        };
        let session = Session::open(Box::new(store), config).unwrap();
        let mut core = ReplCore::new(ShellContext::new(session));

        let mut host = TestHost::new();
        host.queue_inputs(["mkdir User:/kept", "exit"]);
        core.run(&mut host).unwrap();
        assert!(host.errors().is_empty());

        let mut reopened = JsonFileStore::open(&file).unwrap();
        assert!(reopened.node_exists(&address!("User:/kept")).unwrap());
    }
}
