//! Bridge adapter over a local serial port.
//!
//! The bridge firmware owns mesh routing; this side only frames calls as
//! protocol lines, matches replies by sequence number and re-sends on timeout.

use std::io::BufReader;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serialport::SerialPort;
use tracing::{debug, info, trace, warn};

use super::{CallOutcome, NodeAddress, PortKind, PortSelector, Transport, TransportError};
use crate::port::{
    Line, LinkIo, READ_POLL, SerialSettings, open_port, read_crlf_line, resolve_device, write_line,
};
use crate::proto::command::BridgeCommand;
use crate::proto::parser::{format_command, parse_command};

const HELLO_TOTAL: Duration = Duration::from_millis(2_000);
const HELLO_INITIAL_BACKOFF: Duration = Duration::from_millis(250);

pub struct SerialBridge {
    settings: SerialSettings,
    link: Option<Link<Box<dyn SerialPort>>>,
    seq: u32,
}

struct Link<S: LinkIo> {
    reader: BufReader<S>,
    pending: Vec<u8>,
}

impl<S: LinkIo> Link<S> {
    fn new(stream: S) -> Self {
        Self {
            reader: BufReader::new(stream),
            pending: Vec::new(),
        }
    }

    fn send(&mut self, cmd: &BridgeCommand) -> Result<(), TransportError> {
        let line = format_command(cmd);
        trace!(line = line.trim_end(), "tx");
        write_line(self.reader.get_mut(), &line)?;
        Ok(())
    }

    /// Wait until `deadline` for a line accepted by `pick`.
    ///
    /// No single read blocks past the deadline.
    fn recv_until<T>(
        &mut self,
        deadline: Instant,
        mut pick: impl FnMut(BridgeCommand) -> Option<T>,
    ) -> Result<Option<T>, TransportError> {
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Ok(None);
            }
            self.reader.get_mut().set_read_timeout(left.min(READ_POLL))?;

            let line = match read_crlf_line(&mut self.reader, &mut self.pending)? {
                None => continue,
                Some(Line::Garbled(raw)) => {
                    debug!(len = raw.len(), "ignoring non-UTF-8 bridge line");
                    continue;
                }
                Some(Line::Text(line)) => line,
            };
            trace!(%line, "rx");
            match parse_command(&line) {
                Ok(cmd) => {
                    if let Some(v) = pick(cmd) {
                        return Ok(Some(v));
                    }
                }
                Err(e) => debug!(error = %e, %line, "ignoring unparseable bridge line"),
            }
        }
    }

    /// Send HELLO until acknowledged, doubling the wait each time.
    fn handshake(
        &mut self,
        total: Duration,
        initial_backoff: Duration,
    ) -> Result<Option<NodeAddress>, TransportError> {
        let give_up = Instant::now() + total;
        let mut backoff = initial_backoff;
        while Instant::now() < give_up {
            self.send(&BridgeCommand::Hello)?;
            let deadline = (Instant::now() + backoff).min(give_up);
            let addr = self.recv_until(deadline, |cmd| match cmd {
                BridgeCommand::HelloAck { addr } => Some(addr),
                _ => None,
            })?;
            if addr.is_some() {
                return Ok(addr);
            }
            backoff = backoff.saturating_mul(2);
        }
        Ok(None)
    }

    fn call(
        &mut self,
        seq: u32,
        target: NodeAddress,
        procedure: &str,
        args: &[Bytes],
        retries: u8,
        timeout: Duration,
    ) -> Result<CallOutcome, TransportError> {
        let cmd = BridgeCommand::Call {
            seq,
            dst: target,
            procedure: procedure.to_string(),
            args: args.to_vec(),
        };

        for attempt in 0..=retries {
            if attempt > 0 {
                debug!(seq, attempt, "re-sending call");
            }
            self.send(&cmd)?;
            let deadline = Instant::now() + timeout;
            let reply = self.recv_until(deadline, |cmd| match cmd {
                BridgeCommand::Reply { seq: s, values, .. } if s == seq => Some(values),
                BridgeCommand::Reply { seq: s, .. } => {
                    debug!(expected = seq, got = s, "dropping stale reply");
                    None
                }
                other => {
                    warn!(?other, "unexpected bridge message during call");
                    None
                }
            })?;
            if let Some(values) = reply {
                return Ok(CallOutcome::Reply(values));
            }
        }

        Ok(CallOutcome::NoResponse)
    }
}

impl SerialBridge {
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            link: None,
            seq: 0,
        }
    }

    fn next_seq(&mut self) -> u32 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }
}

impl Transport for SerialBridge {
    fn open_connection(&mut self, port: &PortSelector) -> Result<NodeAddress, TransportError> {
        if port.kind == PortKind::Loopback {
            return Err(TransportError::Connection(
                "loopback ports are not served by the serial bridge".into(),
            ));
        }
        // Reopening replaces any previous link.
        self.link = None;

        let dev = resolve_device(&port.id)?;
        info!(%dev, baud = self.settings.baud, kind = %port.kind, "opening bridge port");
        let raw = open_port(&dev, &self.settings)?;
        raw.clear(serialport::ClearBuffer::All)
            .map_err(|e| TransportError::Connection(format!("clear {}: {}", dev, e)))?;

        let mut link = Link::new(raw);
        match link.handshake(HELLO_TOTAL, HELLO_INITIAL_BACKOFF)? {
            Some(addr) => {
                self.link = Some(link);
                Ok(addr)
            }
            None => Err(TransportError::Connection(format!(
                "bridge on {} did not answer HELLO within {:?}",
                dev, HELLO_TOTAL
            ))),
        }
    }

    fn call(
        &mut self,
        target: NodeAddress,
        procedure: &str,
        args: &[Bytes],
        retries: u8,
        timeout: Duration,
    ) -> Result<CallOutcome, TransportError> {
        if procedure.is_empty() || procedure.contains(char::is_whitespace) {
            return Err(TransportError::Protocol(format!(
                "procedure name {:?} cannot be framed",
                procedure
            )));
        }
        let seq = self.next_seq();
        let link = self.link.as_mut().ok_or(TransportError::NotConnected)?;
        link.call(seq, target, procedure, args, retries, timeout)
    }
}
