use std::path::PathBuf;

use clap::Parser;

use preftree_core_store::StoreAdapter;
use preftree_engine::{EngineConfig, Session};
use preftree_json_store::{InMemoryStore, JsonFileStore};
use preftree_repl::commands::format_help;
use preftree_repl::host::EDIT_MODE_VAR;
use preftree_repl::io::IoError;
use preftree_repl::{execute, CommandResult, ShellContext};

/// preftool - browse and edit a preferences store
#[derive(Parser, Debug)]
#[command(name = "preftool")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Store file [default: <data dir>/preftree/store.json]
    #[arg(long, value_name = "FILE", conflicts_with = "memory")]
    store: Option<PathBuf>,

    /// Use an empty in-memory store; nothing is saved
    #[arg(long)]
    memory: bool,

    /// Engine configuration [default: <config dir>/preftree/config.json]
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Describe changes without making them
    #[arg(long)]
    dry_run: bool,

    /// Write changes only on `flush` and on exit
    #[arg(long)]
    no_flush: bool,

    /// Refuse removals; moves leave the source in place
    #[arg(long)]
    disable_destructive_actions: bool,

    /// Force vi editing mode
    #[arg(long, conflicts_with = "emacs")]
    vi: bool,

    /// Force emacs editing mode
    #[arg(long)]
    emacs: bool,

    /// Run this command instead of starting the shell
    #[arg(trailing_var_arg = true, value_name = "COMMAND")]
    command: Vec<String>,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("{0}")]
    Store(#[from] preftree_core_store::Error),

    #[error("{0}")]
    Io(#[from] IoError),

    #[error("{0}")]
    Command(String),

    #[error("no data directory on this system; pass --store or --memory")]
    NoDataDir,
}

impl Args {
    /// The config file (or defaults) with command-line switches applied.
    fn engine_config(&self) -> Result<EngineConfig, CliError> {
        let mut config = match (&self.config, dirs::config_dir()) {
            (Some(file), _) => EngineConfig::load(file)?,
            (None, Some(dir)) => {
                EngineConfig::load_or_default(&dir.join("preftree").join("config.json"))?
            }
            (None, None) => EngineConfig::default(),
        };
        if self.dry_run {
            config.dry_run = true;
        }
        if self.no_flush {
            config.flush_after_mutation = false;
        }
        if self.disable_destructive_actions {
            config.destructive_actions = false;
        }
        Ok(config)
    }

    fn open_store(&self, config: &EngineConfig) -> Result<Box<dyn StoreAdapter>, CliError> {
        if self.memory {
            return Ok(Box::new(InMemoryStore::with_limits(config.limits)));
        }
        let file = match &self.store {
            Some(file) => file.clone(),
            None => dirs::data_local_dir()
                .ok_or(CliError::NoDataDir)?
                .join("preftree")
                .join("store.json"),
        };
        Ok(Box::new(JsonFileStore::open_with_limits(file, config.limits)?))
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let config = args.engine_config()?;
    log::debug!("Engine configuration: {:?}", config);
    let store = args.open_store(&config)?;
    let mut ctx = ShellContext::new(Session::open(store, config)?);

    if args.command.is_empty() {
        preftree_repl::run(ctx)?;
        return Ok(());
    }

    let outcome = match execute(&args.command.join(" "), &mut ctx) {
        CommandResult::Ok { display } => {
            if let Some(text) = display {
                println!("{}", text);
            }
            Ok(())
        }
        CommandResult::Help => {
            println!("{}", format_help());
            Ok(())
        }
        CommandResult::Exit => Ok(()),
        CommandResult::Error(msg) => Err(CliError::Command(msg)),
    };
    // with --no-flush nothing else would write the change out
    let current = ctx.current().clone();
    ctx.session_mut().flush(&current)?;
    outcome
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.vi {
        std::env::set_var(EDIT_MODE_VAR, "vi");
    } else if args.emacs {
        std::env::set_var(EDIT_MODE_VAR, "emacs");
    }

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
