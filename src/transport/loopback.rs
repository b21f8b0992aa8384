use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use super::{CallOutcome, NodeAddress, PortSelector, Transport, TransportError};

pub const LOOPBACK_ADDRESS: NodeAddress = NodeAddress([0x00, 0x00, 0x01]);

/// In-process stand-in for a bridge: every call echoes its arguments.
#[derive(Debug, Default)]
pub struct Loopback {
    connected: bool,
    /// Drop every Nth call (1-based), 0 disables.
    drop_every: u64,
    calls: u64,
}

impl Loopback {
    pub fn new(drop_every: u64) -> Self {
        Self {
            connected: false,
            drop_every,
            calls: 0,
        }
    }

    #[cfg(test)]
    fn calls(&self) -> u64 {
        self.calls
    }
}

impl Transport for Loopback {
    fn open_connection(&mut self, port: &PortSelector) -> Result<NodeAddress, TransportError> {
        debug!(%port, "loopback connection opened");
        self.connected = true;
        Ok(LOOPBACK_ADDRESS)
    }

    fn call(
        &mut self,
        _target: NodeAddress,
        _procedure: &str,
        args: &[Bytes],
        _retries: u8,
        _timeout: Duration,
    ) -> Result<CallOutcome, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.calls += 1;
        if self.drop_every > 0 && self.calls % self.drop_every == 0 {
            return Err(TransportError::TimeoutExhausted);
        }
        Ok(CallOutcome::Reply(args.to_vec()))
    }
}
