//! Echo round-trip benchmark.
//!
//! One run opens the bridge link, then issues `num_queries` echo calls one at
//! a time and tallies how many came back intact. Per-call anomalies (a wrong
//! echo, no answer after retries) are counted; only link setup failures and
//! unexpected transport errors abort the run.

use std::num::NonZeroU32;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::transport::{PortSelector, TransportError};

pub mod result;
pub mod runner;

pub use result::BenchmarkResult;
pub use runner::{run, run_batch};

/// Procedure on the bridge that returns its argument unchanged.
pub const DEFAULT_PROCEDURE: &str = "str";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkConfig {
    pub port: PortSelector,
    pub num_queries: NonZeroU32,
    pub payload: Bytes,
    pub timeout: Duration,
    pub retries: u8,
    pub procedure: String,
}

impl BenchmarkConfig {
    pub fn new(port: PortSelector, num_queries: NonZeroU32, payload: impl Into<Bytes>) -> Self {
        Self {
            port,
            num_queries,
            payload: payload.into(),
            timeout: Duration::from_secs(1),
            retries: 3,
            procedure: DEFAULT_PROCEDURE.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_procedure(mut self, procedure: impl Into<String>) -> Self {
        self.procedure = procedure.into();
        self
    }
}

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("opening bridge connection: {0}")]
    Connection(#[source] TransportError),
    #[error("transport failed on query {query}: {source}")]
    Transport {
        query: u32,
        #[source]
        source: TransportError,
    },
}
