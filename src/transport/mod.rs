//! Transport seam between the benchmark and whatever actually carries RPC
//! traffic to the mesh.
//!
//! The benchmark only needs two suspending operations: open a link to the
//! bridge (yielding the bridge's own node address) and issue one call with
//! retry/timeout semantics owned by the transport. Both are blocking calls on
//! the caller's thread; `&mut self` keeps a single call outstanding.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

pub mod address;
pub mod loopback;
pub mod serial;

pub use address::NodeAddress;

/// Kind of bridge attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Bridge on a plain RS-232 serial line.
    Rs232,
    /// Bridge on a USB stick exposing a CDC/FTDI serial device.
    UsbStick,
    /// In-process echo, no hardware.
    Loopback,
}

/// Which port of the given kind to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortId {
    /// Nth enumerated serial port (0 = first, like COM1).
    Index(u32),
    /// Explicit device path such as `/dev/ttyUSB0`.
    Path(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSelector {
    pub kind: PortKind,
    pub id: PortId,
}

/// What came back from one call once the transport gave up or got an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Reply(Vec<Bytes>),
    NoResponse,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("no response after all retries")]
    TimeoutExhausted,
    #[error("transport is not connected")]
    NotConnected,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Transport {
    /// Establish the link on `port` and return the bridge node's address.
    fn open_connection(&mut self, port: &PortSelector) -> Result<NodeAddress, TransportError>;

    /// Invoke `procedure` on `target`, re-sending up to `retries` times and
    /// waiting up to `timeout` for each attempt.
    fn call(
        &mut self,
        target: NodeAddress,
        procedure: &str,
        args: &[Bytes],
        retries: u8,
        timeout: Duration,
    ) -> Result<CallOutcome, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open_connection(&mut self, port: &PortSelector) -> Result<NodeAddress, TransportError> {
        (**self).open_connection(port)
    }

    fn call(
        &mut self,
        target: NodeAddress,
        procedure: &str,
        args: &[Bytes],
        retries: u8,
        timeout: Duration,
    ) -> Result<CallOutcome, TransportError> {
        (**self).call(target, procedure, args, retries, timeout)
    }
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PortKind::Rs232 => "rs232",
            PortKind::UsbStick => "usb-stick",
            PortKind::Loopback => "loopback",
        })
    }
}

impl FromStr for PortKind {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rs232" => Ok(PortKind::Rs232),
            "usb-stick" | "usb" => Ok(PortKind::UsbStick),
            "loopback" => Ok(PortKind::Loopback),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortId::Index(n) => write!(f, "#{}", n),
            PortId::Path(p) => f.write_str(p),
        }
    }
}

impl FromStr for PortId {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(());
        }
        Ok(match s.parse::<u32>() {
            Ok(n) => PortId::Index(n),
            Err(_) => PortId::Path(s.to_string()),
        })
    }
}

impl fmt::Display for PortSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
