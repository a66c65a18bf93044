//! Shell command parsing and execution.
//!
//! Commands:
//! - `ls [addr]` - List child nodes and values of a node
//! - `tree [addr]` - Show the view tree, whole or from a node
//! - `get <key> [addr]` - Show one value with its inferred type
//! - `put <key> <type> <value>` - Store a value in the current node
//! - `rmkey <key>` - Remove a value from the current node
//! - `mkdir <addr>` - Create a node and any missing ancestors
//! - `rm <addr>` - Remove a node and its subtree
//! - `cp <src> <dest>` - Copy a subtree
//! - `mv <src> <dest-parent> [name]` - Move a subtree
//! - `rename <addr> <name>` - Rename a node in place
//! - `cd [addr]` / `pwd` - Change or print the current node
//! - `refresh`, `sync [addr]`, `flush [addr]` - Reload the view, pull or push store state
//! - `export <addr> [--subtree] [file]` / `import <file> [addr]` - JSON interchange
//! - `help`, `exit`

use std::fs;
use std::str::FromStr;

use nu_ansi_term::{Color, Style};

use preftree_core_store::{NodeAddress, TypeTag};
use preftree_engine::Outcome;
use preftree_json_store::{export, from_json, import, import_at, to_json, ExportDepth};

use crate::shell_context::{ContextError, ShellContext};

/// Result of executing a command
pub enum CommandResult {
    /// Command succeeded, optionally with output to display
    Ok { display: Option<String> },
    /// Command failed with an error message
    Error(String),
    /// User requested to exit
    Exit,
    /// Show help
    Help,
}

impl CommandResult {
    fn ok_display(display: impl Into<String>) -> Self {
        CommandResult::Ok {
            display: Some(display.into()),
        }
    }

    fn ok_none() -> Self {
        CommandResult::Ok { display: None }
    }
}

impl From<ContextError> for CommandResult {
    fn from(err: ContextError) -> Self {
        CommandResult::Error(err.to_string())
    }
}

impl From<preftree_core_store::Error> for CommandResult {
    fn from(err: preftree_core_store::Error) -> Self {
        CommandResult::Error(err.to_string())
    }
}

/// Unwrap a result or return it from the enclosing command as an error.
macro_rules! attempt {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(err) => return CommandResult::from(err),
        }
    };
}

/// Parse and execute a command
pub fn execute(input: &str, ctx: &mut ShellContext) -> CommandResult {
    let input = input.trim();
    if input.is_empty() {
        return CommandResult::ok_none();
    }

    let mut parts = input.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("");
    let args = parts.next().unwrap_or("").trim();

    match command.to_lowercase().as_str() {
        "help" | "?" => CommandResult::Help,
        "exit" | "quit" | "q" => CommandResult::Exit,
        "ls" => cmd_ls(args, ctx),
        "tree" => cmd_tree(args, ctx),
        "get" => cmd_get(args, ctx),
        "put" => cmd_put(args, ctx),
        "rmkey" => cmd_rmkey(args, ctx),
        "mkdir" => cmd_mkdir(args, ctx),
        "rm" => cmd_rm(args, ctx),
        "cp" => cmd_cp(args, ctx),
        "mv" => cmd_mv(args, ctx),
        "rename" => cmd_rename(args, ctx),
        "cd" => cmd_cd(args, ctx),
        "pwd" => CommandResult::ok_display(ctx.current().to_string()),
        "refresh" => cmd_refresh(ctx),
        "sync" => cmd_sync(args, ctx),
        "flush" => cmd_flush(args, ctx),
        "export" => cmd_export(args, ctx),
        "import" => cmd_import(args, ctx),
        _ => CommandResult::Error(format!(
            "Unknown command: '{}'. Type 'help' for available commands.",
            command
        )),
    }
}

/// Split up to `count` leading words off `args`; the remainder is returned
/// trimmed, with inner whitespace kept.
fn take_words(args: &str, count: usize) -> (Vec<&str>, &str) {
    let mut words = Vec::new();
    let mut rest = args.trim_start();
    while words.len() < count && !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        words.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    (words, rest.trim_end())
}

fn usage(text: &str) -> CommandResult {
    CommandResult::Error(format!("Usage: {}", text))
}

fn report(verb: &str, outcome: Outcome) -> CommandResult {
    match outcome {
        Outcome::Applied(address) => CommandResult::ok_display(format!(
            "{} {}",
            Color::Green.paint(verb),
            Color::Yellow.paint(address.to_string())
        )),
        Outcome::Planned(description) => CommandResult::ok_display(
            Color::DarkGray
                .paint(format!("(dry run) {}", description))
                .to_string(),
        ),
    }
}

/// Format help text
pub fn format_help() -> String {
    let cmd_style = Style::new().bold().fg(Color::Cyan);
    let arg_style = Style::new().fg(Color::Yellow);
    let desc_style = Style::new().fg(Color::White);

    let mut help = String::new();
    help.push_str(&format!(
        "{}\n\n",
        Style::new().bold().paint("preftool Commands")
    ));

    let commands = [
        ("ls", "[addr]", "List child nodes and values"),
        ("tree", "[addr]", "Show the node tree"),
        ("get", "<key> [addr]", "Show one value and its type"),
        ("put", "<key> <type> <value>", "Store a value in the current node"),
        ("rmkey", "<key>", "Remove a value from the current node"),
        ("", "", ""),
        ("mkdir", "<addr>", "Create a node (and missing parents)"),
        ("rm", "<addr>", "Remove a node and everything below it"),
        ("cp", "<src> <dest>", "Copy a subtree into dest"),
        ("mv", "<src> <parent> [name]", "Move a subtree under parent"),
        ("rename", "<addr> <name>", "Rename a node"),
        ("", "", ""),
        ("cd", "[addr]", "Change current node"),
        ("pwd", "", "Print current node"),
        ("refresh", "", "Rebuild the tree from the store"),
        ("sync", "[addr]", "Pick up changes written elsewhere"),
        ("flush", "[addr]", "Write pending changes to disk"),
        ("", "", ""),
        ("export", "<addr> [--subtree] [file]", "Export a node as JSON"),
        ("import", "<file> [addr]", "Import a JSON export"),
        ("", "", ""),
        ("help", "", "Show this help message"),
        ("exit", "", "Exit the shell (alias: quit, q)"),
    ];

    for (cmd, args, desc) in commands {
        if cmd.is_empty() {
            help.push('\n');
        } else {
            help.push_str(&format!(
                "  {:<10} {:<28} {}\n",
                cmd_style.paint(cmd),
                arg_style.paint(args),
                desc_style.paint(desc)
            ));
        }
    }

    help.push_str(&format!("\n{}\n", Style::new().bold().paint("Types")));
    let tags = TypeTag::ALL
        .iter()
        .map(|tag| tag.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    help.push_str(&format!("  {}\n", arg_style.paint(tags)));

    help.push_str(&format!(
        "\n{}",
        Style::new().italic().paint(
            "Addresses: 'User:/a/b' or 'System:/x' are absolute, '/a' starts at the current \
             scope root, anything else is relative; '..' goes up"
        )
    ));

    help
}

fn cmd_ls(args: &str, ctx: &mut ShellContext) -> CommandResult {
    let address = attempt!(ctx.resolve(args));
    let session = ctx.session_mut();
    let children = attempt!(session.list_children(&address));
    let entries = attempt!(session.get_entries(&address));

    if children.is_empty() && entries.is_empty() {
        return CommandResult::ok_display(Color::DarkGray.paint("(empty)").to_string());
    }

    let mut lines = Vec::new();
    for name in children {
        lines.push(format!("{}/", Color::Blue.bold().paint(name)));
    }
    for entry in entries {
        lines.push(format!(
            "{:<24} {:<14} {}",
            entry.key,
            Color::DarkGray.paint(entry.tag.as_str()),
            entry.raw_text
        ));
    }
    CommandResult::ok_display(lines.join("\n"))
}

fn cmd_tree(args: &str, ctx: &mut ShellContext) -> CommandResult {
    let view = ctx.session().view();
    let id = if args.is_empty() {
        view.top()
    } else {
        let address = attempt!(ctx.resolve(args));
        match view.find(&address) {
            Some(id) => id,
            None => {
                return CommandResult::Error(format!(
                    "{} is not in the tree (try 'refresh')",
                    address
                ))
            }
        }
    };
    let rendered = attempt!(view.render(id));
    CommandResult::ok_display(rendered.trim_end().to_string())
}

fn cmd_get(args: &str, ctx: &mut ShellContext) -> CommandResult {
    let (words, _) = take_words(args, 2);
    let (key, target) = match words.as_slice() {
        [key] => (*key, ""),
        [key, target] => (*key, *target),
        _ => return usage("get <key> [addr]"),
    };
    let address = attempt!(ctx.resolve(target));
    let entries = attempt!(ctx.session_mut().get_entries(&address));
    match entries.into_iter().find(|entry| entry.key == key) {
        Some(entry) => CommandResult::ok_display(format!(
            "{} {}",
            entry.raw_text,
            Color::DarkGray.paint(format!("({})", entry.tag))
        )),
        None => CommandResult::Error(format!("no key '{}' in {}", key, address)),
    }
}

fn cmd_put(args: &str, ctx: &mut ShellContext) -> CommandResult {
    let (words, value) = take_words(args, 2);
    let [key, tag] = words.as_slice() else {
        return usage("put <key> <type> <value>");
    };
    let tag = attempt!(TypeTag::from_str(tag));
    let address = ctx.current().clone();
    let outcome = attempt!(ctx.session_mut().put_value(&address, key, value, tag));
    report("Set in", outcome)
}

fn cmd_rmkey(args: &str, ctx: &mut ShellContext) -> CommandResult {
    let (words, _) = take_words(args, 1);
    let [key] = words.as_slice() else {
        return usage("rmkey <key>");
    };
    let address = ctx.current().clone();
    let outcome = attempt!(ctx.session_mut().remove_key(&address, key));
    report("Removed key from", outcome)
}

fn cmd_mkdir(args: &str, ctx: &mut ShellContext) -> CommandResult {
    if args.is_empty() {
        return usage("mkdir <addr>");
    }
    let address = attempt!(ctx.resolve(args));
    let outcome = attempt!(ctx.session_mut().add_node(&address));
    report("Created", outcome)
}

fn cmd_rm(args: &str, ctx: &mut ShellContext) -> CommandResult {
    if args.is_empty() {
        return usage("rm <addr>");
    }
    let address = attempt!(ctx.resolve(args));
    let outcome = attempt!(ctx.session_mut().remove_node(&address));
    if let Outcome::Applied(removed) = &outcome {
        ctx.forget(removed);
    }
    report("Removed", outcome)
}

fn cmd_cp(args: &str, ctx: &mut ShellContext) -> CommandResult {
    let (words, _) = take_words(args, 2);
    let [source, destination] = words.as_slice() else {
        return usage("cp <src> <dest>");
    };
    let source = attempt!(ctx.resolve(source));
    let destination = attempt!(ctx.resolve(destination));
    let outcome = attempt!(ctx.session_mut().copy_node(&source, &destination));
    report("Copied to", outcome)
}

fn cmd_mv(args: &str, ctx: &mut ShellContext) -> CommandResult {
    let (words, _) = take_words(args, 3);
    let (source, parent, name) = match words.as_slice() {
        [source, parent] => (*source, *parent, None),
        [source, parent, name] => (*source, *parent, Some(*name)),
        _ => return usage("mv <src> <dest-parent> [name]"),
    };
    let source = attempt!(ctx.resolve(source));
    let parent = attempt!(ctx.resolve(parent));
    let name = name.unwrap_or_else(|| source.name()).to_string();
    let outcome = attempt!(ctx.session_mut().move_node(&source, &parent, &name));
    if let Outcome::Applied(moved) = &outcome {
        ctx.follow(&source, moved);
    }
    report("Moved to", outcome)
}

fn cmd_rename(args: &str, ctx: &mut ShellContext) -> CommandResult {
    let (words, _) = take_words(args, 2);
    let [source, name] = words.as_slice() else {
        return usage("rename <addr> <name>");
    };
    let source = attempt!(ctx.resolve(source));
    let outcome = attempt!(ctx.session_mut().rename_node(&source, name));
    if let Outcome::Applied(renamed) = &outcome {
        ctx.follow(&source, renamed);
    }
    report("Renamed to", outcome)
}

fn cmd_cd(args: &str, ctx: &mut ShellContext) -> CommandResult {
    let target = if args.is_empty() {
        NodeAddress::root(ctx.current().scope)
    } else {
        attempt!(ctx.resolve(args))
    };
    attempt!(ctx.set_current(target));
    CommandResult::ok_none()
}

fn cmd_refresh(ctx: &mut ShellContext) -> CommandResult {
    attempt!(ctx.session_mut().refresh());
    CommandResult::ok_display(format!(
        "{} {} nodes",
        Color::Green.paint("Reloaded"),
        ctx.session().view().len()
    ))
}

fn cmd_sync(args: &str, ctx: &mut ShellContext) -> CommandResult {
    let address = attempt!(ctx.resolve(args));
    attempt!(ctx.session_mut().sync(&address));
    // the current node may have been removed by another writer
    if ctx.session().view().find(ctx.current()).is_none() {
        let fallback = NodeAddress::root(ctx.current().scope);
        attempt!(ctx.set_current(fallback));
    }
    CommandResult::ok_display(format!("{} {}", Color::Green.paint("Synchronized"), address))
}

fn cmd_flush(args: &str, ctx: &mut ShellContext) -> CommandResult {
    let address = attempt!(ctx.resolve(args));
    attempt!(ctx.session_mut().flush(&address));
    CommandResult::ok_display(format!("{} {}", Color::Green.paint("Flushed"), address))
}

fn cmd_export(args: &str, ctx: &mut ShellContext) -> CommandResult {
    let (words, _) = take_words(args, 3);
    let mut depth = ExportDepth::NodeOnly;
    let mut positional = Vec::new();
    for word in words {
        if word == "--subtree" {
            depth = ExportDepth::Subtree;
        } else {
            positional.push(word);
        }
    }
    let (target, file) = match positional.as_slice() {
        [target] => (*target, None),
        [target, file] => (*target, Some(*file)),
        _ => return usage("export <addr> [--subtree] [file]"),
    };

    let address = attempt!(ctx.resolve(target));
    let document = attempt!(export(ctx.session_mut().store_mut(), &address, depth));
    let text = attempt!(to_json(&document));
    match file {
        None => CommandResult::ok_display(text),
        Some(file) => match fs::write(file, text) {
            Ok(()) => CommandResult::ok_display(format!(
                "{} {} to {}",
                Color::Green.paint("Exported"),
                address,
                file
            )),
            Err(err) => CommandResult::Error(format!("cannot write {}: {}", file, err)),
        },
    }
}

fn cmd_import(args: &str, ctx: &mut ShellContext) -> CommandResult {
    let (words, _) = take_words(args, 2);
    let (file, target) = match words.as_slice() {
        [file] => (*file, None),
        [file, target] => (*file, Some(*target)),
        _ => return usage("import <file> [addr]"),
    };

    let text = match fs::read_to_string(file) {
        Ok(text) => text,
        Err(err) => return CommandResult::Error(format!("cannot read {}: {}", file, err)),
    };
    let document = attempt!(from_json(&text));
    let target = match target {
        Some(target) => Some(attempt!(ctx.resolve(target))),
        None => None,
    };

    if ctx.session().config().dry_run {
        let at = target.map_or_else(|| document.address.clone(), |t| t.to_string());
        return report(
            "Imported into",
            Outcome::Planned(format!("would import {} into {}", file, at)),
        );
    }

    let session = ctx.session_mut();
    let imported = match &target {
        Some(target) => import_at(session.store_mut(), &document, target),
        None => import(session.store_mut(), &document),
    };
    let node = match imported {
        Ok(node) => node,
        Err(err) => {
            // writes made before the failure stay in the store
            if let Err(refresh_err) = session.refresh() {
                log::warn!("View not refreshed after failed import: {}", refresh_err);
            }
            return err.into();
        }
    };
    attempt!(session.note_external_change(node.address()));
    report("Imported into", Outcome::Applied(node.address().clone()))
}
