use crossterm::{cursor, terminal};
use std::fs::File;
use std::io::{self, Stdout, Write};
use std::time::Duration;

use super::{Metrics, Terminal};

const TTY_PATH: &str = "/dev/tty";

/// The process's own terminal: output on stdout, answers read from the tty
pub struct StdioTerminal {
    out: Stdout,
    tty: Option<File>,
    fallback_cell: (u32, u32),
}

impl StdioTerminal {
    /// `cell_width` and `cell_height` are used when the terminal does not
    /// report its size in pixels
    pub fn new(cell_width: u32, cell_height: u32) -> Self {
        StdioTerminal {
            out: io::stdout(),
            tty: None,
            fallback_cell: (cell_width.max(1), cell_height.max(1)),
        }
    }

    fn tty(&mut self) -> io::Result<&File> {
        if self.tty.is_none() {
            let file = File::options().read(true).write(true).open(TTY_PATH)?;
            log::debug!("Opened {} for terminal answers", TTY_PATH);
            self.tty = Some(file);
        }

        self.tty
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, TTY_PATH))
    }
}

impl Default for StdioTerminal {
    fn default() -> Self {
        StdioTerminal::new(8, 16)
    }
}

impl Write for StdioTerminal {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Terminal for StdioTerminal {
    fn metrics(&mut self) -> io::Result<Metrics> {
        let size = terminal::window_size()?;
        if size.width == 0 || size.height == 0 {
            log::debug!(
                "Terminal reports no pixel size, assuming {}x{} cells",
                self.fallback_cell.0,
                self.fallback_cell.1
            );
            let (cell_width, cell_height) = self.fallback_cell;
            return Ok(Metrics::with_cell_size(
                size.columns,
                size.rows,
                cell_width,
                cell_height,
            ));
        }

        Ok(Metrics::new(
            size.columns,
            size.rows,
            size.width as u32,
            size.height as u32,
        ))
    }

    fn cursor_column(&mut self) -> io::Result<u16> {
        self.out.flush()?;
        let (column, _) = cursor::position()?;
        Ok(column)
    }

    fn set_raw_input(&mut self, enabled: bool) -> io::Result<()> {
        if enabled {
            terminal::enable_raw_mode()
        } else {
            terminal::disable_raw_mode()
        }
    }

    #[cfg(unix)]
    fn read_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>> {
        use nix::errno::Errno;
        use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
        use std::io::Read;
        use std::os::fd::AsFd;

        let tty = self.tty()?;
        let millis = timeout.as_millis().min(u16::MAX as u128) as u16;

        let ready = {
            let mut fds = [PollFd::new(tty.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, PollTimeout::from(millis)) {
                Ok(n) => n,
                Err(Errno::EINTR) => return Err(io::ErrorKind::Interrupted.into()),
                Err(errno) => return Err(errno.into()),
            }
        };

        if ready == 0 {
            return Ok(None);
        }

        let mut byte = [0u8; 1];
        match (&*tty).read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    #[cfg(not(unix))]
    fn read_byte(&mut self, _timeout: Duration) -> io::Result<Option<u8>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "reading terminal answers needs a unix tty",
        ))
    }
}
