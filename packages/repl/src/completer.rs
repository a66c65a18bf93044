use reedline::{Completer, Span, Suggestion};

/// Every command the shell accepts, in the order help lists them.
pub const COMMANDS: &[&str] = &[
    "ls", "tree", "get", "put", "rmkey", "mkdir", "rm", "cp", "mv", "rename", "cd", "pwd",
    "refresh", "sync", "flush", "export", "import", "help", "exit", "quit",
];

/// Completes command names and, after `put <key>`, value type names.
pub struct ReplCompleter {
    commands: Vec<String>,
}

impl ReplCompleter {
    pub fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Default for ReplCompleter {
    fn default() -> Self {
        Self::new()
    }
}

impl Completer for ReplCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        let line_to_pos = &line[..pos];
        let words: Vec<&str> = line_to_pos.split_whitespace().collect();
        let typing_word = !line_to_pos.ends_with(char::is_whitespace);
        let prefix = if typing_word {
            words.last().copied().unwrap_or("")
        } else {
            ""
        };
        let span = Span::new(pos - prefix.len(), pos);

        // index of the word being completed
        let index = if typing_word {
            words.len().saturating_sub(1)
        } else {
            words.len()
        };

        let candidates: Vec<(String, String)> = match index {
            0 => self
                .commands
                .iter()
                .map(|cmd| (cmd.clone(), command_description(cmd).to_string()))
                .collect(),
            2 if words.first().is_some_and(|w| w.eq_ignore_ascii_case("put")) => {
                preftree_core_store::TypeTag::ALL
                    .iter()
                    .map(|tag| (tag.as_str().to_string(), "value type".to_string()))
                    .collect()
            }
            _ => Vec::new(),
        };

        candidates
            .into_iter()
            .filter(|(value, _)| value.starts_with(prefix))
            .map(|(value, description)| Suggestion {
                value,
                description: Some(description),
                style: None,
                extra: None,
                span,
                append_whitespace: true,
                match_indices: None,
            })
            .collect()
    }
}

fn command_description(cmd: &str) -> &'static str {
    match cmd {
        "ls" => "List children and values",
        "tree" => "Show the node tree",
        "get" => "Show one value",
        "put" => "Store a value",
        "rmkey" => "Remove a value",
        "mkdir" => "Create a node",
        "rm" => "Remove a node",
        "cp" => "Copy a subtree",
        "mv" => "Move a subtree",
        "rename" => "Rename a node",
        "cd" => "Change current node",
        "pwd" => "Print current node",
        "refresh" => "Rebuild the tree",
        "sync" => "Pick up outside changes",
        "flush" => "Write pending changes",
        "export" => "Export as JSON",
        "import" => "Import a JSON export",
        "help" => "Show help",
        "exit" | "quit" => "Exit the shell",
        _ => "",
    }
}
