//! Blocking line I/O used inside a compute-unit process.
//!
//! The worker talks to its dispatcher over stdin/stdout. Reads and writes
//! retry on `EINTR`, and every message is one newline-terminated line.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::os::unix::io::{AsFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use super::protocol::{WorkRequest, WorkResponse};
use crate::error::{PrimesError, Result};

/// Buffer size for the result stream (large limits produce multi-MB lines).
const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// A file descriptor wrapper that implements Read/Write with EINTR handling.
pub struct PipeFd {
    fd: OwnedFd,
}

impl PipeFd {
    /// Create from an owned file descriptor.
    pub fn new(fd: OwnedFd) -> Self {
        Self { fd }
    }

    /// Create from a raw file descriptor (takes ownership).
    ///
    /// # Safety
    /// The caller must ensure `fd` is a valid, open descriptor that nothing
    /// else will close.
    pub unsafe fn from_raw(fd: RawFd) -> Self {
        Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        }
    }
}

impl AsFd for PipeFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl Read for PipeFd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match nix::unistd::read(&self.fd, buf) {
                Ok(n) => return Ok(n),
                Err(nix::errno::Errno::EINTR) => continue,
                Err(e) => return Err(io::Error::from_raw_os_error(e as i32)),
            }
        }
    }
}

impl Write for PipeFd {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            match nix::unistd::write(&self.fd, buf) {
                Ok(n) => return Ok(n),
                Err(nix::errno::Errno::EINTR) => continue,
                Err(e) => return Err(io::Error::from_raw_os_error(e as i32)),
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Request/response channel of a single compute unit.
pub struct UnitChannel {
    reader: BufReader<PipeFd>,
    writer: BufWriter<PipeFd>,
    line_buffer: String,
}

impl UnitChannel {
    /// Build a channel from the read and write ends.
    pub fn new(input: PipeFd, output: PipeFd) -> Self {
        Self {
            reader: BufReader::new(input),
            writer: BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, output),
            line_buffer: String::with_capacity(128),
        }
    }

    /// Read the next request. Returns `None` on EOF.
    pub fn recv_request(&mut self) -> Result<Option<WorkRequest>> {
        self.line_buffer.clear();
        if self.reader.read_line(&mut self.line_buffer)? == 0 {
            return Ok(None);
        }
        let request = WorkRequest::from_line(&self.line_buffer)
            .map_err(|e| PrimesError::Protocol(format!("Invalid request: {}", e)))?;
        Ok(Some(request))
    }

    /// Write one response line and flush it.
    pub fn send_response(&mut self, response: &WorkResponse) -> Result<()> {
        let line = response.to_line()?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}
