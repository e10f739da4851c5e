//! One client connection: reading the request line, answering, or resetting.

use std::io::{self, BufWriter, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant};

use log::debug;

use crate::cli::args::SearchArgs;
use crate::cli::commands::service_request;
use crate::config::SearchConfig;
use crate::error::{FerretError, Result};
use crate::index::IndexFile;

/// Written to the client when its query does not parse.
pub const MALFORMED_QUERY_REPLY: &str = "error: malformed query";

/// Bounds applied to every request.
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    /// Time allowed to receive the whole request line; also the write timeout.
    pub timeout: Duration,
    pub max_line_len: usize,
    pub max_args: usize,
}

/// An accepted TCP or Unix-domain connection.
#[derive(Debug)]
pub enum ClientStream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl ClientStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            ClientStream::Tcp(s) => s.set_read_timeout(timeout),
            ClientStream::Unix(s) => s.set_read_timeout(timeout),
        }
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            ClientStream::Tcp(s) => s.set_write_timeout(timeout),
            ClientStream::Unix(s) => s.set_write_timeout(timeout),
        }
    }

    /// Abort the connection instead of closing it normally.
    ///
    /// A TCP connection is closed with a zero linger time, which sends RST
    /// and skips TIME_WAIT. A Unix socket has no reset, so it is shut down.
    pub fn reset(self) {
        match self {
            ClientStream::Tcp(stream) => {
                let linger = libc::linger {
                    l_onoff: 1,
                    l_linger: 0,
                };
                // SAFETY: the descriptor is owned by `stream` and stays open
                // for the duration of the call; `linger` outlives it.
                let rc = unsafe {
                    libc::setsockopt(
                        stream.as_raw_fd(),
                        libc::SOL_SOCKET,
                        libc::SO_LINGER,
                        &linger as *const libc::linger as *const libc::c_void,
                        std::mem::size_of::<libc::linger>() as libc::socklen_t,
                    )
                };
                if rc != 0 {
                    debug!("SO_LINGER failed: {}", io::Error::last_os_error());
                }
            }
            ClientStream::Unix(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
    }

    /// Read one line ending in CR or LF before `timeout` runs out.
    ///
    /// The deadline is fixed when the read starts; every wait uses whatever
    /// time is left, so a client trickling bytes cannot extend it. Bytes after
    /// the line terminator are discarded.
    pub fn read_request_line(&mut self, timeout: Duration, max_len: usize) -> Result<String> {
        let deadline = Instant::now() + timeout;
        let mut line = Vec::new();
        let mut chunk = [0u8; 256];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(FerretError::timeout("no complete request line"));
            }
            self.set_read_timeout(Some(remaining))?;

            let n = match self.read(&mut chunk) {
                Ok(0) => {
                    return Err(FerretError::protocol(
                        "connection closed before end of line",
                    ));
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Err(FerretError::timeout("no complete request line"));
                }
                Err(e) => return Err(e.into()),
            };

            let received = &chunk[..n];
            if let Some(end) = received.iter().position(|&b| b == b'\n' || b == b'\r') {
                line.extend_from_slice(&received[..end]);
                if line.len() > max_len {
                    break;
                }
                return String::from_utf8(line)
                    .map_err(|_| FerretError::protocol("request line is not UTF-8"));
            }
            line.extend_from_slice(received);
            if line.len() > max_len {
                break;
            }
        }
        Err(FerretError::protocol(format!(
            "request line longer than {max_len} bytes"
        )))
    }
}

impl Read for ClientStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ClientStream::Tcp(s) => s.read(buf),
            ClientStream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for ClientStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ClientStream::Tcp(s) => s.write(buf),
            ClientStream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ClientStream::Tcp(s) => s.flush(),
            ClientStream::Unix(s) => s.flush(),
        }
    }
}

/// Split a request line into arguments at whitespace.
pub fn split_args(line: &str, max_args: usize) -> Result<Vec<String>> {
    let args: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    if args.is_empty() {
        return Err(FerretError::protocol("empty request"));
    }
    if args.len() > max_args {
        return Err(FerretError::exhausted(format!(
            "{} arguments, at most {max_args} allowed",
            args.len()
        )));
    }
    Ok(args)
}

/// Read, answer, and close one connection.
///
/// A malformed query is answered with [`MALFORMED_QUERY_REPLY`]; every other
/// failure resets the connection without a reply.
pub fn handle_connection(
    mut stream: ClientStream,
    index: &IndexFile,
    base: &SearchConfig,
    limits: RequestLimits,
) {
    match serve(&mut stream, index, base, limits) {
        Ok(()) => {}
        Err(e) if e.is_reportable() => {
            debug!("rejected query: {e}");
            let _ = writeln!(stream, "{MALFORMED_QUERY_REPLY}");
            let _ = stream.flush();
        }
        Err(e) => {
            debug!("resetting connection: {e}");
            stream.reset();
        }
    }
}

fn serve(
    stream: &mut ClientStream,
    index: &IndexFile,
    base: &SearchConfig,
    limits: RequestLimits,
) -> Result<()> {
    stream.set_write_timeout(Some(limits.timeout))?;
    let line = stream.read_request_line(limits.timeout, limits.max_line_len)?;
    let args = split_args(&line, limits.max_args)?;
    let args = SearchArgs::from_request(args)?;

    let mut out = BufWriter::new(&mut *stream);
    match service_request(index, &args, base, &mut out) {
        Ok(()) => {
            out.flush()?;
            Ok(())
        }
        Err(e) => {
            // Drop whatever was buffered so a failed answer is never sent.
            let _ = out.into_parts();
            Err(e)
        }
    }
}
