//! Echo RPC round-trip benchmark for a mesh network reached through a
//! serially attached bridge node.
//!
//! [`bench::run`] drives any [`transport::Transport`]; the crate ships a
//! serial line-protocol bridge adapter and an in-process loopback.

pub mod bench;
pub mod cli;
pub mod config;
pub mod port;
pub mod proto;
pub mod stats;
pub mod transport;
