use std::str::FromStr;

use nu_ansi_term::{Color, Style};
use reedline::{Highlighter, StyledText};

use preftree_core_store::TypeTag;

use crate::completer::COMMANDS;

/// Commands whose arguments are all addresses.
const ADDRESS_COMMANDS: &[&str] = &[
    "ls", "tree", "mkdir", "rm", "cp", "mv", "cd", "sync", "flush", "export",
];

/// Syntax highlighter for the shell
pub struct ReplHighlighter {
    commands: Vec<&'static str>,
}

impl ReplHighlighter {
    pub fn new() -> Self {
        let mut commands = COMMANDS.to_vec();
        commands.extend(["q", "?"]);
        Self { commands }
    }
}

impl Default for ReplHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter for ReplHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled = StyledText::new();

        if line.is_empty() {
            return styled;
        }

        let (command, rest) = match line.find(char::is_whitespace) {
            Some(pos) => (&line[..pos], &line[pos..]),
            None => (line, ""),
        };

        let cmd_lower = command.to_lowercase();
        let cmd_style = if self.commands.contains(&cmd_lower.as_str()) {
            Style::new().bold().fg(Color::Cyan)
        } else {
            Style::new().fg(Color::Red)
        };
        styled.push((cmd_style, command.to_string()));

        if rest.is_empty() {
            return styled;
        }

        if cmd_lower == "put" {
            highlight_put(rest, &mut styled);
        } else if ADDRESS_COMMANDS.contains(&cmd_lower.as_str()) {
            styled.push((Style::new().fg(Color::Yellow), rest.to_string()));
        } else {
            styled.push((Style::new(), rest.to_string()));
        }

        styled
    }
}

/// `put <key> <type> <value>`: the type is green when recognized, red
/// otherwise.
fn highlight_put(rest: &str, styled: &mut StyledText) {
    let type_bounds = word_bounds(rest, 0).and_then(|(_, key_end)| word_bounds(rest, key_end));
    let Some((type_start, type_end)) = type_bounds else {
        styled.push((Style::new(), rest.to_string()));
        return;
    };
    let type_word = &rest[type_start..type_end];
    let type_style = if TypeTag::from_str(type_word).is_ok() {
        Style::new().fg(Color::Green)
    } else {
        Style::new().fg(Color::Red)
    };

    styled.push((Style::new(), rest[..type_start].to_string()));
    styled.push((type_style, type_word.to_string()));
    if type_end < rest.len() {
        styled.push((Style::new(), rest[type_end..].to_string()));
    }
}

/// Byte range of the first word in `text` at or after `from`.
fn word_bounds(text: &str, from: usize) -> Option<(usize, usize)> {
    let start = from + text[from..].find(|c: char| !c.is_whitespace())?;
    let end = text[start..]
        .find(char::is_whitespace)
        .map_or(text.len(), |len| start + len);
    Some((start, end))
}
