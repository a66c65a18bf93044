//! In-memory `IoHost` for driving the shell loop from tests.

use std::collections::VecDeque;

use super::{IoError, IoHost, Output, PromptConfig, Signal};

/// Queued input lines and signals are consumed in order; everything written
/// is kept for inspection.
#[derive(Debug, Default)]
pub struct TestHost {
    input_queue: VecDeque<String>,
    signal_queue: VecDeque<Signal>,
    output_buffer: Vec<Output>,
    prompts: Vec<PromptConfig>,
    flush_count: usize,
}

impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_input(&mut self, line: impl Into<String>) {
        self.input_queue.push_back(line.into());
    }

    pub fn queue_inputs(&mut self, lines: impl IntoIterator<Item = impl Into<String>>) {
        for line in lines {
            self.queue_input(line);
        }
    }

    pub fn queue_signal(&mut self, signal: Signal) {
        self.signal_queue.push_back(signal);
    }

    pub fn output(&self) -> &[Output] {
        &self.output_buffer
    }

    /// All output text, concatenated.
    pub fn output_text(&self) -> String {
        self.output_buffer
            .iter()
            .map(Output::text)
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn errors(&self) -> Vec<&str> {
        self.output_buffer
            .iter()
            .filter(|o| matches!(o, Output::Error(_)))
            .map(Output::text)
            .collect()
    }

    pub fn banners(&self) -> usize {
        self.output_buffer
            .iter()
            .filter(|o| matches!(o, Output::Banner(_)))
            .count()
    }

    /// Every prompt the core asked for, oldest first.
    pub fn prompts(&self) -> &[PromptConfig] {
        &self.prompts
    }

    pub fn last_prompt(&self) -> Option<&PromptConfig> {
        self.prompts.last()
    }

    pub fn flush_count(&self) -> usize {
        self.flush_count
    }
}

impl IoHost for TestHost {
    fn wait_for_input(&mut self) -> Result<(), IoError> {
        Ok(())
    }

    fn read_input(&mut self) -> Result<Option<String>, IoError> {
        Ok(self.input_queue.pop_front())
    }

    fn read_signal(&mut self) -> Result<Option<Signal>, IoError> {
        Ok(self.signal_queue.pop_front())
    }

    fn write_output(&mut self, output: Output) -> Result<(), IoError> {
        self.output_buffer.push(output);
        Ok(())
    }

    fn write_prompt(&mut self, config: PromptConfig) -> Result<(), IoError> {
        self.prompts.push(config);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), IoError> {
        self.flush_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_come_back_in_order() {
        let mut host = TestHost::new();
        host.queue_inputs(["first", "second"]);

        assert_eq!(host.read_input().unwrap().as_deref(), Some("first"));
        assert_eq!(host.read_input().unwrap().as_deref(), Some("second"));
        assert!(host.read_input().unwrap().is_none());
    }

    #[test]
    fn signals_come_back_in_order() {
        let mut host = TestHost::new();
        host.queue_signal(Signal::Interrupt);
        host.queue_signal(Signal::Eof);

        assert_eq!(host.read_signal().unwrap(), Some(Signal::Interrupt));
        assert_eq!(host.read_signal().unwrap(), Some(Signal::Eof));
        assert!(host.read_signal().unwrap().is_none());
    }

    #[test]
    fn output_is_kept_by_kind() {
        let mut host = TestHost::new();
        host.write_output(Output::Banner("hi\n".to_string())).unwrap();
        host.write_output(Output::Plain("ok\n".to_string())).unwrap();
        host.write_output(Output::Error("bad".to_string())).unwrap();
        host.write_output(Output::Info("note".to_string())).unwrap();

        assert_eq!(host.output().len(), 4);
        assert_eq!(host.output()[3], Output::Info("note".to_string()));
        assert_eq!(host.output_text(), "hi\nok\nbadnote");
        assert_eq!(host.errors(), vec!["bad"]);
        assert_eq!(host.banners(), 1);
    }

    #[test]
    fn prompts_and_flushes_are_recorded() {
        let mut host = TestHost::new();
        assert!(host.last_prompt().is_none());

        host.write_prompt(PromptConfig {
            current_address: "System:/x".to_string(),
            dry_run: true,
        })
        .unwrap();
        host.flush().unwrap();
        host.flush().unwrap();

        let prompt = host.last_prompt().unwrap();
        assert_eq!(prompt.current_address, "System:/x");
        assert!(prompt.dry_run);
        assert_eq!(host.prompts().len(), 1);
        assert_eq!(host.flush_count(), 2);
    }
}
