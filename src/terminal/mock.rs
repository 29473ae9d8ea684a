use std::collections::VecDeque;
use std::io::{self, Write};
use std::time::Duration;

use super::{Metrics, Terminal};

/// Terminal double that records output and replays scripted answers
#[derive(Debug)]
pub struct MockTerminal {
    pub output: Vec<u8>,
    pub metrics: Metrics,
    pub column: u16,
    pub answers: VecDeque<u8>,
    pub raw: bool,
    pub raw_toggles: usize,
}

impl MockTerminal {
    /// 80x24 cells of 10x20 pixels
    pub fn new() -> Self {
        MockTerminal::with_metrics(Metrics::new(80, 24, 800, 480))
    }

    pub fn with_metrics(metrics: Metrics) -> Self {
        MockTerminal {
            output: Vec::new(),
            metrics,
            column: 0,
            answers: VecDeque::new(),
            raw: false,
            raw_toggles: 0,
        }
    }

    /// Queue bytes the terminal will "type" in answer to queries
    pub fn answer(&mut self, reply: &str) {
        self.answers.extend(reply.bytes());
    }

    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn clear(&mut self) {
        self.output.clear();
    }
}

impl Default for MockTerminal {
    fn default() -> Self {
        MockTerminal::new()
    }
}

impl Write for MockTerminal {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Terminal for MockTerminal {
    fn metrics(&mut self) -> io::Result<Metrics> {
        Ok(self.metrics)
    }

    fn cursor_column(&mut self) -> io::Result<u16> {
        Ok(self.column)
    }

    fn set_raw_input(&mut self, enabled: bool) -> io::Result<()> {
        self.raw = enabled;
        self.raw_toggles += 1;
        Ok(())
    }

    fn read_byte(&mut self, _timeout: Duration) -> io::Result<Option<u8>> {
        Ok(self.answers.pop_front())
    }
}
