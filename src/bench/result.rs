use std::time::Duration;

use tracing::info;

use crate::stats::{LatencySummary, Stats};
use crate::transport::NodeAddress;

/// Outcome of one benchmark run. Built once when the run ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkResult {
    target: NodeAddress,
    queries: u32,
    replies: u32,
    mismatches: u32,
    timeouts: u32,
    elapsed: Duration,
    latency: Option<LatencySummary>,
}

impl BenchmarkResult {
    pub(crate) fn from_stats(target: NodeAddress, stats: &Stats, elapsed: Duration) -> Self {
        Self {
            target,
            queries: stats.total() as u32,
            replies: stats.ok as u32,
            mismatches: stats.mismatched as u32,
            timeouts: stats.timed_out as u32,
            elapsed,
            latency: stats.latency(),
        }
    }

    pub fn target(&self) -> NodeAddress {
        self.target
    }

    pub fn queries(&self) -> u32 {
        self.queries
    }

    pub fn replies(&self) -> u32 {
        self.replies
    }

    pub fn mismatches(&self) -> u32 {
        self.mismatches
    }

    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn latency(&self) -> Option<LatencySummary> {
        self.latency
    }

    pub fn all_succeeded(&self) -> bool {
        self.replies == self.queries
    }

    /// Completed queries per second of wall-clock time.
    pub fn queries_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64().max(1e-6);
        f64::from(self.queries) / secs
    }

    pub fn log(&self) {
        info!(
            "{} queries, {} responses in {} milliseconds",
            self.queries,
            self.replies,
            self.elapsed.as_millis()
        );
        if let Some(lat) = self.latency {
            info!(
                target_node = %self.target,
                mismatches = self.mismatches,
                timeouts = self.timeouts,
                rtt_min_us = lat.min.as_micros() as u64,
                rtt_avg_us = lat.avg.as_micros() as u64,
                rtt_max_us = lat.max.as_micros() as u64,
                "round-trip latency"
            );
        }
    }

    /// One-line console summary.
    pub fn summary(&self) -> String {
        format!(
            "{} queries, {} replies, {} ms ({:.1} q/s)",
            self.queries,
            self.replies,
            self.elapsed.as_millis(),
            self.queries_per_sec()
        )
    }
}
