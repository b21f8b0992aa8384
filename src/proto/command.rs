use bytes::Bytes;

use crate::transport::NodeAddress;

/// Lines exchanged with the serial bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    // ---- Link setup ----
    Hello,
    HelloAck {
        addr: NodeAddress,
    },

    // ---- RPC ----
    Call {
        seq: u32,
        dst: NodeAddress,
        procedure: String,
        args: Vec<Bytes>,
    },
    Reply {
        seq: u32,
        src: NodeAddress,
        values: Vec<Bytes>,
    },
}
