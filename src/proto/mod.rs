//! Line protocol spoken to the serial bridge.
//!
//! Every message is one CRLF-terminated line: a (possibly multi-word) tag
//! followed by `key=value` pairs. Binary RPC arguments travel hex-encoded in a
//! comma-separated `args` field whose length is given by `argc`.
//!
//! ```text
//! HELLO
//! HELLO ACK addr=5de21f
//! CALL seq=7 dst=5de21f proc=str argc=1 args=4142
//! REPLY seq=7 src=5de21f argc=1 args=4142
//! ```

pub mod command;
pub mod parser;
