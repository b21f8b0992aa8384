use std::io::{self, BufRead, Read, Write};
use std::mem;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::transport::{PortId, TransportError};

/// Longest single blocking read; callers narrow it to their own deadline.
pub const READ_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub baud: u32,
    pub rtscts: bool,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud: 115_200,
            rtscts: false,
        }
    }
}

/// Map a port id to a device path. Indexes count into the OS enumeration.
pub fn resolve_device(id: &PortId) -> Result<String, TransportError> {
    match id {
        PortId::Path(p) => Ok(p.clone()),
        PortId::Index(n) => {
            let ports = serialport::available_ports()
                .map_err(|e| TransportError::Connection(format!("enumerate ports: {}", e)))?;
            ports
                .get(*n as usize)
                .map(|p| p.port_name.clone())
                .ok_or_else(|| {
                    TransportError::Connection(format!(
                        "serial port #{} not found ({} available)",
                        n,
                        ports.len()
                    ))
                })
        }
    }
}

pub fn open_port(dev: &str, settings: &SerialSettings) -> Result<Box<dyn SerialPort>, TransportError> {
    let builder = serialport::new(dev, settings.baud)
        .timeout(READ_POLL)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(if settings.rtscts {
            FlowControl::Hardware
        } else {
            FlowControl::None
        });

    builder
        .open()
        .map_err(|e| TransportError::Connection(format!("open {}: {}", dev, e)))
}

/// Byte stream to the bridge whose blocking-read timeout can be narrowed.
pub trait LinkIo: Read + Write {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl LinkIo for Box<dyn SerialPort> {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }
}

/// One CR/LF-stripped line off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(String),
    /// Not valid UTF-8: boot chatter, baud glitches.
    Garbled(Vec<u8>),
}

pub fn write_line<W: Write + ?Sized>(port: &mut W, line: &str) -> io::Result<()> {
    port.write_all(line.as_bytes())?;
    port.flush()
}

/// Read one line, keeping partial input in `buf` across read timeouts.
///
/// Returns `Ok(None)` when the port timed out before a full line arrived and
/// `UnexpectedEof` once the stream is closed.
pub fn read_crlf_line<R: BufRead + ?Sized>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> io::Result<Option<Line>> {
    match reader.read_until(b'\n', buf) {
        Ok(0) => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "serial link closed",
        )),
        Ok(_) if buf.ends_with(b"\n") => {
            let mut raw = mem::take(buf);
            while matches!(raw.last(), Some(b'\r' | b'\n')) {
                raw.pop();
            }
            Ok(Some(match String::from_utf8(raw) {
                Ok(text) => Line::Text(text),
                Err(e) => Line::Garbled(e.into_bytes()),
            }))
        }
        Ok(_) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    /// Yields its chunks one per read, timing out in between.
    struct Chunked {
        chunks: Vec<&'static [u8]>,
        timeout_next: bool,
    }

    impl Read for Chunked {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            if self.timeout_next {
                self.timeout_next = false;
                return Err(io::Error::new(io::ErrorKind::TimedOut, "poll"));
            }
            self.timeout_next = true;
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0);
            out[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    fn text(s: &str) -> Option<Line> {
        Some(Line::Text(s.to_string()))
    }

    #[test]
    fn reads_complete_lines() {
        let mut r = Cursor::new(b"HELLO ACK addr=000001\r\nREPLY\r\n".to_vec());
        let mut buf = Vec::new();
        assert_eq!(read_crlf_line(&mut r, &mut buf).unwrap(), text("HELLO ACK addr=000001"));
        assert_eq!(read_crlf_line(&mut r, &mut buf).unwrap(), text("REPLY"));
        let err = read_crlf_line(&mut r, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn invalid_utf8_line_does_not_poison_the_next() {
        let mut r = Cursor::new(b"\xff\xfe garbage\r\nREPLY seq=1 src=000001 argc=0\r\n".to_vec());
        let mut buf = Vec::new();
        assert_eq!(
            read_crlf_line(&mut r, &mut buf).unwrap(),
            Some(Line::Garbled(b"\xff\xfe garbage".to_vec()))
        );
        assert_eq!(
            read_crlf_line(&mut r, &mut buf).unwrap(),
            text("REPLY seq=1 src=000001 argc=0")
        );
    }

    #[test]
    fn keeps_partial_line_across_timeouts() {
        let mut r = BufReader::new(Chunked {
            chunks: vec![&b"REPLY se"[..], &b"q=1\r\n"[..]],
            timeout_next: false,
        });
        let mut buf = Vec::new();
        assert_eq!(read_crlf_line(&mut r, &mut buf).unwrap(), None);
        assert_eq!(buf, b"REPLY se");
        assert_eq!(read_crlf_line(&mut r, &mut buf).unwrap(), text("REPLY seq=1"));
        assert!(buf.is_empty());
    }

    #[test]
    fn write_line_writes_all() {
        let mut out = Vec::new();
        write_line(&mut out, "HELLO\r\n").unwrap();
        assert_eq!(out, b"HELLO\r\n");
    }
}
