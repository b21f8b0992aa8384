use std::time::Duration;

/// Running tally for one benchmark run.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub ok: u64,
    pub mismatched: u64,
    pub timed_out: u64,
    rtt_total: Duration,
    rtt_min: Option<Duration>,
    rtt_max: Duration,
}

/// Round-trip latency over successful calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySummary {
    pub min: Duration,
    pub avg: Duration,
    pub max: Duration,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_ok(&mut self, rtt: Duration) {
        self.ok += 1;
        self.rtt_total += rtt;
        self.rtt_min = Some(self.rtt_min.map_or(rtt, |m| m.min(rtt)));
        self.rtt_max = self.rtt_max.max(rtt);
    }

    pub fn inc_mismatch(&mut self) {
        self.mismatched += 1;
    }

    pub fn inc_timeout(&mut self) {
        self.timed_out += 1;
    }

    pub fn total(&self) -> u64 {
        self.ok + self.mismatched + self.timed_out
    }

    pub fn latency(&self) -> Option<LatencySummary> {
        let min = self.rtt_min?;
        let avg = self.rtt_total / self.ok as u32;
        Some(LatencySummary {
            min,
            avg,
            max: self.rtt_max,
        })
    }
}
