//! Terminal host built on Reedline: line editing in vi or emacs mode, command
//! and type completion, highlighting, and history kept under the local data
//! directory.

use std::borrow::Cow;
use std::io::{self, Write};
use std::path::PathBuf;

use nu_ansi_term::{Color, Style};
use reedline::{
    default_emacs_keybindings, default_vi_insert_keybindings, default_vi_normal_keybindings,
    ColumnarMenu, DefaultHinter, EditCommand, EditMode, Emacs, FileBackedHistory, KeyCode,
    KeyModifiers, Keybindings, MenuBuilder, Prompt, PromptEditMode, PromptHistorySearch,
    PromptHistorySearchStatus, PromptViMode, Reedline, ReedlineEvent, ReedlineMenu,
    Signal as ReedlineSignal, Vi,
};

use crate::completer::ReplCompleter;
use crate::highlighter::ReplHighlighter;
use crate::io::{IoError, IoHost, Output, PromptConfig, Signal};

/// Environment variable that forces the edit mode: `vi` or `emacs`.
pub const EDIT_MODE_VAR: &str = "PREFTREE_EDIT_MODE";

const MENU_NAME: &str = "completion_menu";
const HISTORY_SIZE: usize = 1000;

pub struct TerminalHost {
    line_editor: Reedline,
    pending_input: Option<String>,
    pending_signal: Option<Signal>,
    prompt: PromptConfig,
}

impl TerminalHost {
    pub fn new() -> io::Result<Self> {
        let menu = ColumnarMenu::default()
            .with_name(MENU_NAME)
            .with_text_style(Style::new().fg(Color::Cyan))
            .with_selected_text_style(Style::new().fg(Color::Black).on(Color::Cyan).bold());
        let hinter = DefaultHinter::default().with_style(Style::new().fg(Color::LightGray).dimmed());

        let mut line_editor = Reedline::create()
            .with_completer(Box::new(ReplCompleter::new()))
            .with_highlighter(Box::new(ReplHighlighter::new()))
            .with_hinter(Box::new(hinter))
            .with_menu(ReedlineMenu::EngineCompleter(Box::new(menu)))
            .with_edit_mode(edit_mode());

        if let Some(history) = open_history() {
            line_editor = line_editor.with_history(Box::new(history));
        }

        Ok(Self {
            line_editor,
            pending_input: None,
            pending_signal: None,
            prompt: PromptConfig::default(),
        })
    }
}

impl IoHost for TerminalHost {
    fn wait_for_input(&mut self) -> Result<(), IoError> {
        let prompt = TerminalPrompt(self.prompt.clone());
        match self.line_editor.read_line(&prompt) {
            Ok(ReedlineSignal::Success(line)) => self.pending_input = Some(line),
            Ok(ReedlineSignal::CtrlC) => self.pending_signal = Some(Signal::Interrupt),
            Ok(ReedlineSignal::CtrlD) => self.pending_signal = Some(Signal::Eof),
            Err(e) => return Err(IoError::Io(format!("Reedline error: {}", e))),
        }
        Ok(())
    }

    fn read_input(&mut self) -> Result<Option<String>, IoError> {
        Ok(self.pending_input.take())
    }

    fn read_signal(&mut self) -> Result<Option<Signal>, IoError> {
        Ok(self.pending_signal.take())
    }

    fn write_output(&mut self, output: Output) -> Result<(), IoError> {
        match &output {
            Output::Plain(text) => println!("{}", text),
            Output::Error(text) => println!("{} {}", Color::Red.bold().paint("Error:"), text),
            Output::Info(text) | Output::Banner(text) => println!("{}", Color::Cyan.paint(text)),
        }
        Ok(())
    }

    fn write_prompt(&mut self, config: PromptConfig) -> Result<(), IoError> {
        self.prompt = config;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), IoError> {
        io::stdout().flush().map_err(|e| IoError::Io(e.to_string()))
    }
}

/// `[dry run] User:/app > `
struct TerminalPrompt(PromptConfig);

impl Prompt for TerminalPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        let address = Color::Yellow.paint(&self.0.current_address);
        if self.0.dry_run {
            Cow::Owned(format!("{} {}", Color::Magenta.bold().paint("[dry run]"), address))
        } else {
            Cow::Owned(address.to_string())
        }
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, edit_mode: PromptEditMode) -> Cow<'_, str> {
        let indicator = match edit_mode {
            PromptEditMode::Vi(PromptViMode::Normal) => Color::Blue.bold().paint(" [N]>"),
            PromptEditMode::Vi(PromptViMode::Insert) => Color::Green.bold().paint(" [I]>"),
            PromptEditMode::Custom(mode) => return Cow::Owned(format!(" ({})> ", mode)),
            PromptEditMode::Default | PromptEditMode::Emacs => Color::Green.bold().paint(" >"),
        };
        Cow::Owned(format!("{} ", indicator))
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed(": ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let failing = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!("({}reverse-search: {}) ", failing, history_search.term))
    }
}

/// Tab opens the completion menu, then cycles through it.
fn bind_completion(keybindings: &mut Keybindings) {
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::UntilFound(vec![
            ReedlineEvent::Menu(MENU_NAME.to_string()),
            ReedlineEvent::MenuNext,
        ]),
    );
}

fn edit_mode() -> Box<dyn EditMode> {
    if prefers_vi() {
        let mut insert = default_vi_insert_keybindings();
        bind_completion(&mut insert);
        Box::new(Vi::new(insert, default_vi_normal_keybindings()))
    } else {
        let mut keybindings = default_emacs_keybindings();
        bind_completion(&mut keybindings);
        keybindings.add_binding(
            KeyModifiers::CONTROL,
            KeyCode::Char('d'),
            ReedlineEvent::Edit(vec![EditCommand::Clear]),
        );
        Box::new(Emacs::new(keybindings))
    }
}

/// History lives in `<data dir>/preftree/history.txt`; the shell runs without
/// it if that cannot be opened.
fn open_history() -> Option<FileBackedHistory> {
    let path = dirs::data_local_dir()?.join("preftree").join("history.txt");
    if let Some(parent) = path.parent() {
        if let Err(err) = std::fs::create_dir_all(parent) {
            log::warn!("Cannot create {}: {}", parent.display(), err);
        }
    }
    match FileBackedHistory::with_file(HISTORY_SIZE, path) {
        Ok(history) => Some(history),
        Err(err) => {
            log::warn!("History disabled: {}", err);
            None
        }
    }
}

/// `PREFTREE_EDIT_MODE` decides when set; otherwise vi if `EDITOR`, `VISUAL`
/// or an inputrc point to it.
fn prefers_vi() -> bool {
    if let Ok(mode) = std::env::var(EDIT_MODE_VAR) {
        return names_vi(&mode);
    }
    ["EDITOR", "VISUAL"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .any(|editor| names_vi(&editor))
        || inputrc_selects_vi()
}

fn names_vi(value: &str) -> bool {
    let value = value.to_lowercase();
    value == "vi" || value.contains("vim")
}

fn inputrc_selects_vi() -> bool {
    let candidates = [
        std::env::var("INPUTRC").ok().map(PathBuf::from),
        dirs::home_dir().map(|p| p.join(".inputrc")),
        Some(PathBuf::from("/etc/inputrc")),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .any(|content| {
            content.lines().map(str::trim).any(|line| {
                line.starts_with("set") && line.contains("editing-mode") && line.ends_with("vi")
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vi_names() {
        assert!(names_vi("vi"));
        assert!(names_vi("/usr/bin/nvim"));
        assert!(names_vi("VIM"));
        assert!(!names_vi("emacs"));
        assert!(!names_vi("nano"));
    }

    #[test]
    fn prompt_shows_address_and_dry_run() {
        let prompt = TerminalPrompt(PromptConfig {
            current_address: "User:/app".to_string(),
            dry_run: false,
        });
        assert!(prompt.render_prompt_left().contains("User:/app"));
        assert!(!prompt.render_prompt_left().contains("dry run"));

        let prompt = TerminalPrompt(PromptConfig {
            current_address: "User:/".to_string(),
            dry_run: true,
        });
        assert!(prompt.render_prompt_left().contains("dry run"));
    }
}
