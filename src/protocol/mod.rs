//! Kitty graphics protocol: message codec and a session over a terminal.

pub mod codec;
pub mod control;

use crossterm::QueueableCommand;
use crossterm::cursor::{MoveLeft, MoveRight, MoveToColumn, MoveToRow, MoveUp};
use std::io;
use std::time::Instant;

pub use codec::{Answer, Codec};
pub use control::{Action, Command, Control, DeleteTarget, Format, Medium};

use crate::error::ProtocolError;
use crate::storage::ProtocolConfig;
use crate::terminal::{Metrics, Terminal};

/// A terminal plus the protocol settings used to talk to it
///
/// Everything written is flushed right away, so graphics commands and
/// cursor movement reach the terminal in the order they were issued.
pub struct Session<T: Terminal> {
    term: T,
    codec: Codec,
    /// How image data is handed to the terminal
    pub medium: Medium,
    /// Default stacking order for displayed images
    pub z_index: i32,
}

impl<T: Terminal> Session<T> {
    pub fn new(term: T, codec: Codec) -> Self {
        Session {
            term,
            codec,
            medium: Medium::default(),
            z_index: -1,
        }
    }

    pub fn from_config(term: T, config: &ProtocolConfig) -> Self {
        Session {
            medium: config.medium,
            z_index: config.z_index,
            ..Session::new(term, Codec::from_config(config))
        }
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn terminal(&self) -> &T {
        &self.term
    }

    pub fn terminal_mut(&mut self) -> &mut T {
        &mut self.term
    }

    pub fn into_terminal(self) -> T {
        self.term
    }

    /// Send a command and, for actions the terminal answers, wait for the
    /// answer
    ///
    /// Fails with `Timeout` when no answer arrives before the codec's
    /// timeout, and with `Answer` when the reply is not a success.
    pub fn run(&mut self, command: &Command) -> Result<Option<Answer>, ProtocolError> {
        let messages = self.codec.encode(command)?;
        let message = messages.concat();

        if !command.action().expects_answer() {
            self.send(&message)?;
            return Ok(None);
        }

        // Raw before sending, so an early answer is not echoed
        self.term.set_raw_input(true)?;
        let reply = self.send(&message).and_then(|_| self.read_answer());
        let restored = self.term.set_raw_input(false);
        let reply = reply?;
        restored?;

        match reply {
            None => Err(ProtocolError::Timeout {
                message,
                timeout: self.codec.timeout,
            }),
            Some(raw) => {
                log::trace!("<- {:?}", raw);
                let answer = Answer::new(raw);
                if answer.is_ok() {
                    Ok(Some(answer))
                } else {
                    Err(ProtocolError::Answer {
                        message,
                        answer: answer.raw,
                    })
                }
            }
        }
    }

    fn send(&mut self, message: &str) -> Result<(), ProtocolError> {
        log::trace!("-> {:?}", message);
        self.term.write_all(message.as_bytes())?;
        self.term.flush()?;
        Ok(())
    }

    /// Collect input up to the answer terminator, or `None` past the deadline
    fn read_answer(&mut self) -> Result<Option<String>, ProtocolError> {
        let deadline = Instant::now() + self.codec.timeout;
        let terminator = self.codec.terminator();
        let mut bytes = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log::debug!("No graphics answer after {} bytes", bytes.len());
                return Ok(None);
            }

            match self.term.read_byte(remaining) {
                Ok(Some(byte)) => {
                    bytes.push(byte);
                    if byte == terminator {
                        return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
                    }
                }
                Ok(None) => {}
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Whether the terminal speaks the graphics protocol
    ///
    /// Any answer to a query counts as support, even an error; silence
    /// until the timeout does not.
    pub fn detect_support(&mut self) -> Result<bool, ProtocolError> {
        match self.run(&Command::query(*self.codec.ids.start())) {
            Ok(_) | Err(ProtocolError::Answer { .. }) => Ok(true),
            Err(ProtocolError::Timeout { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Delete the placements and data of image `id`
    pub fn delete(&mut self, id: u32) -> Result<(), ProtocolError> {
        self.run(&Command::delete_id(id, true)).map(|_| ())
    }

    pub fn metrics(&mut self) -> io::Result<Metrics> {
        self.term.metrics()
    }

    pub fn cursor_column(&mut self) -> io::Result<u16> {
        self.term.cursor_column()
    }

    pub fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.term.write_all(text.as_bytes())?;
        self.term.flush()
    }

    pub fn newlines(&mut self, count: u32) -> io::Result<()> {
        if count == 0 {
            return Ok(());
        }
        self.write_text(&"\n".repeat(count as usize))
    }

    pub fn move_to_column(&mut self, column: u16) -> io::Result<()> {
        self.term.queue(MoveToColumn(column))?;
        self.term.flush()
    }

    pub fn move_to_row(&mut self, row: u16) -> io::Result<()> {
        self.term.queue(MoveToRow(row))?;
        self.term.flush()
    }

    pub fn move_up(&mut self, rows: u32) -> io::Result<()> {
        // A zero count still moves one cell
        if rows == 0 {
            return Ok(());
        }
        self.term.queue(MoveUp(clamp_u16(rows as i64)))?;
        self.term.flush()
    }

    pub fn move_right(&mut self, columns: u32) -> io::Result<()> {
        if columns == 0 {
            return Ok(());
        }
        self.term.queue(MoveRight(clamp_u16(columns as i64)))?;
        self.term.flush()
    }

    /// Move horizontally by a signed number of cells
    pub fn move_relative_x(&mut self, columns: i64) -> io::Result<()> {
        if columns < 0 {
            self.term.queue(MoveLeft(clamp_u16(-columns)))?;
            self.term.flush()
        } else {
            self.move_right(columns.min(u32::MAX as i64) as u32)
        }
    }

    /// Move vertically by a signed number of cells
    ///
    /// Downward moves print newlines so the terminal scrolls when needed,
    /// then return to the starting column.
    pub fn move_relative_y(&mut self, rows: i64) -> io::Result<()> {
        if rows < 0 {
            return self.move_up(rows.unsigned_abs().min(u32::MAX as u64) as u32);
        }
        if rows == 0 {
            return Ok(());
        }

        let column = self.cursor_column()?;
        self.newlines(rows.min(u32::MAX as i64) as u32)?;
        self.move_to_column(column)
    }
}

fn clamp_u16(value: i64) -> u16 {
    value.clamp(0, u16::MAX as i64) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::MockTerminal;
    use std::time::Duration;

    fn session() -> Session<MockTerminal> {
        let codec = Codec {
            timeout: Duration::from_millis(20),
            ..Codec::default()
        };
        Session::new(MockTerminal::new(), codec)
    }

    #[test]
    fn test_run_returns_ok_answer() {
        let mut session = session();
        session.terminal_mut().answer("\x1b_Gi=1;OK\x1b\\");

        let answer = session.run(&Command::query(1)).unwrap().unwrap();
        assert_eq!(answer.id(), Some(1));

        let term = session.terminal();
        assert_eq!(term.output_str(), "\x1b_Ga=q,i=1,X=1;\x1b\\");
        assert!(!term.raw);
        assert_eq!(term.raw_toggles, 2);
    }

    #[test]
    fn test_run_error_answer_carries_request_and_reply() {
        let mut session = session();
        session.terminal_mut().answer("\x1b_Gi=1;ENOENT\x1b\\");

        match session.run(&Command::query(1)) {
            Err(ProtocolError::Answer { message, answer }) => {
                assert!(message.contains("a=q"));
                assert!(answer.contains("ENOENT"));
            }
            other => panic!("expected an answer error, got {:?}", other),
        }
        assert!(!session.terminal().raw);
    }

    #[test]
    fn test_run_times_out_and_restores_input() {
        let mut session = session();
        let started = Instant::now();

        let err = session.run(&Command::query(1)).unwrap_err();
        assert!(matches!(err, ProtocolError::Timeout { .. }));
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(!session.terminal().raw);
    }

    #[test]
    fn test_delete_does_not_wait() {
        let mut session = session();
        assert!(session.run(&Command::delete_id(4, true)).unwrap().is_none());
        assert_eq!(session.terminal().raw_toggles, 0);
        assert_eq!(session.terminal().output_str(), "\x1b_Ga=d,d=I,i=4,X=1;\x1b\\");
    }

    #[test]
    fn test_detect_support() {
        let mut session = session();
        session.terminal_mut().answer("\x1b_Gi=1;EINVAL\x1b\\");
        assert!(session.detect_support().unwrap());

        let mut silent = self::session();
        assert!(!silent.detect_support().unwrap());
    }

    #[test]
    fn test_zero_moves_emit_nothing() {
        let mut session = session();
        session.move_up(0).unwrap();
        session.move_right(0).unwrap();
        session.move_relative_y(0).unwrap();
        session.newlines(0).unwrap();
        assert!(session.terminal().output.is_empty());
    }

    #[test]
    fn test_move_relative_y_down_restores_column() {
        let mut session = session();
        session.terminal_mut().column = 4;
        session.move_relative_y(2).unwrap();
        assert_eq!(session.terminal().output_str(), "\n\n\x1b[5G");
    }
}
