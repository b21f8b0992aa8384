use std::num::NonZeroU32;
use std::slice;
use std::time::Instant;

use tracing::{error, info, warn};

use super::{BenchError, BenchmarkConfig, BenchmarkResult};
use crate::stats::Stats;
use crate::transport::{CallOutcome, Transport, TransportError};

/// Run one echo benchmark over `transport`.
///
/// The connection is opened exactly once and never retried here. Calls are
/// strictly sequential; a wrong echo or an exhausted call is tallied and the
/// loop moves on, any other transport error aborts the run.
pub fn run<T: Transport + ?Sized>(
    transport: &mut T,
    config: &BenchmarkConfig,
) -> Result<BenchmarkResult, BenchError> {
    let target = transport
        .open_connection(&config.port)
        .map_err(BenchError::Connection)?;
    info!(bridge = %target, port = %config.port, "Bridge connection opened");

    let expected = slice::from_ref(&config.payload);
    let mut stats = Stats::new();
    let start = Instant::now();

    for query in 0..config.num_queries.get() {
        let sent = Instant::now();
        match transport.call(
            target,
            &config.procedure,
            expected,
            config.retries,
            config.timeout,
        ) {
            Ok(CallOutcome::Reply(values)) if values.as_slice() == expected => {
                stats.inc_ok(sent.elapsed());
            }
            Ok(CallOutcome::Reply(values)) => {
                stats.inc_mismatch();
                error!(query, received = ?values, "we did not receive the correct response");
            }
            Ok(CallOutcome::NoResponse) | Err(TransportError::TimeoutExhausted) => {
                stats.inc_timeout();
                warn!(query, retries = config.retries, "no response");
            }
            Err(source) => return Err(BenchError::Transport { query, source }),
        }
    }

    let result = BenchmarkResult::from_stats(target, &stats, start.elapsed());
    result.log();
    Ok(result)
}

/// Back-to-back runs on the same transport; stops at the first fatal error.
pub fn run_batch<T: Transport + ?Sized>(
    transport: &mut T,
    config: &BenchmarkConfig,
    runs: NonZeroU32,
) -> Result<Vec<BenchmarkResult>, BenchError> {
    (0..runs.get())
        .map(|_| run(&mut *transport, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::transport::loopback::Loopback;
    use crate::transport::{NodeAddress, PortId, PortKind, PortSelector};

    const BRIDGE: NodeAddress = NodeAddress([0x5d, 0xe2, 0x1f]);

    enum Step {
        Echo,
        Return(&'static [u8]),
        NoResponse,
        Timeout,
        Fail,
    }

    /// Answers call `i` according to `script(i)`.
    struct Scripted<F: Fn(u32) -> Step> {
        script: F,
        open_fails: bool,
        opens: u32,
        calls: Vec<(NodeAddress, String, Vec<Bytes>, u8, Duration)>,
        in_flight: u32,
        max_in_flight: u32,
    }

    impl<F: Fn(u32) -> Step> Scripted<F> {
        fn new(script: F) -> Self {
            Self {
                script,
                open_fails: false,
                opens: 0,
                calls: Vec::new(),
                in_flight: 0,
                max_in_flight: 0,
            }
        }
    }

    impl<F: Fn(u32) -> Step> Transport for Scripted<F> {
        fn open_connection(&mut self, _port: &PortSelector) -> Result<NodeAddress, TransportError> {
            self.opens += 1;
            if self.open_fails {
                return Err(TransportError::Connection("no bridge".into()));
            }
            Ok(BRIDGE)
        }

        fn call(
            &mut self,
            target: NodeAddress,
            procedure: &str,
            args: &[Bytes],
            retries: u8,
            timeout: Duration,
        ) -> Result<CallOutcome, TransportError> {
            self.in_flight += 1;
            self.max_in_flight = self.max_in_flight.max(self.in_flight);
            let index = self.calls.len() as u32;
            self.calls
                .push((target, procedure.to_string(), args.to_vec(), retries, timeout));
            let out = match (self.script)(index) {
                Step::Echo => Ok(CallOutcome::Reply(args.to_vec())),
                Step::Return(b) => Ok(CallOutcome::Reply(vec![Bytes::from_static(b)])),
                Step::NoResponse => Ok(CallOutcome::NoResponse),
                Step::Timeout => Err(TransportError::TimeoutExhausted),
                Step::Fail => Err(TransportError::Io(std::io::Error::other("port vanished"))),
            };
            self.in_flight -= 1;
            out
        }
    }

    fn config(n: u32, payload: &'static [u8]) -> BenchmarkConfig {
        BenchmarkConfig::new(
            PortSelector {
                kind: PortKind::Rs232,
                id: PortId::Index(0),
            },
            NonZeroU32::new(n).unwrap(),
            Bytes::from_static(payload),
        )
    }

    #[test]
    fn always_echo_passes() {
        let mut t = Scripted::new(|_| Step::Echo);
        let res = run(&mut t, &config(25, b"ABCDEF")).unwrap();
        assert_eq!(res.queries(), 25);
        assert_eq!(res.replies(), 25);
        assert!(res.all_succeeded());
        assert_eq!(res.target(), BRIDGE);
        assert!(res.latency().is_some());
    }

    #[test]
    fn always_timeout_tallies_without_error() {
        let mut t = Scripted::new(|_| Step::Timeout);
        let res = run(&mut t, &config(5, b"A")).unwrap();
        assert_eq!(res.replies(), 0);
        assert_eq!(res.timeouts(), 5);
        assert!(!res.all_succeeded());
        assert!(res.latency().is_none());
    }

    #[test]
    fn no_response_counts_as_timeout() {
        let mut t = Scripted::new(|i| if i % 2 == 0 { Step::NoResponse } else { Step::Echo });
        let res = run(&mut t, &config(4, b"A")).unwrap();
        assert_eq!(res.replies(), 2);
        assert_eq!(res.timeouts(), 2);
    }

    #[test]
    fn open_failure_is_fatal_and_issues_no_calls() {
        let mut t = Scripted::new(|_| Step::Echo);
        t.open_fails = true;
        let err = run(&mut t, &config(3, b"A")).unwrap_err();
        assert!(matches!(err, BenchError::Connection(TransportError::Connection(_))));
        assert_eq!(t.opens, 1);
        assert!(t.calls.is_empty());
    }

    #[test]
    fn calls_are_sequential_and_carry_config() {
        let mut t = Scripted::new(|_| Step::Echo);
        let cfg = config(7, b"PING")
            .with_retries(5)
            .with_timeout(Duration::from_millis(250))
            .with_procedure("echo");
        run(&mut t, &cfg).unwrap();
        assert_eq!(t.calls.len(), 7);
        assert_eq!(t.max_in_flight, 1);
        for (target, procedure, args, retries, timeout) in &t.calls {
            assert_eq!(*target, BRIDGE);
            assert_eq!(procedure, "echo");
            assert_eq!(args, &vec![Bytes::from_static(b"PING")]);
            assert_eq!(*retries, 5);
            assert_eq!(*timeout, Duration::from_millis(250));
        }
    }

    #[test]
    fn mismatch_is_counted_and_run_completes() {
        let mut t = Scripted::new(|i| if i == 1 { Step::Return(b"XY") } else { Step::Echo });
        let res = run(&mut t, &config(4, b"AB")).unwrap();
        assert_eq!(t.calls.len(), 4);
        assert_eq!(res.replies(), 3);
        assert_eq!(res.mismatches(), 1);
        assert!(!res.all_succeeded());
    }

    #[test]
    fn extra_reply_values_are_a_mismatch() {
        struct Doubler;
        impl Transport for Doubler {
            fn open_connection(&mut self, _: &PortSelector) -> Result<NodeAddress, TransportError> {
                Ok(BRIDGE)
            }
            fn call(
                &mut self,
                _: NodeAddress,
                _: &str,
                args: &[Bytes],
                _: u8,
                _: Duration,
            ) -> Result<CallOutcome, TransportError> {
                Ok(CallOutcome::Reply([args, args].concat()))
            }
        }
        let res = run(&mut Doubler, &config(2, b"AB")).unwrap();
        assert_eq!(res.replies(), 0);
        assert_eq!(res.mismatches(), 2);
    }

    #[test]
    fn unexpected_error_aborts() {
        let mut t = Scripted::new(|i| if i == 2 { Step::Fail } else { Step::Echo });
        let err = run(&mut t, &config(10, b"A")).unwrap_err();
        match err {
            BenchError::Transport { query, source } => {
                assert_eq!(query, 2);
                assert!(matches!(source, TransportError::Io(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(t.calls.len(), 3);
    }

    #[test]
    fn deterministic_transport_gives_identical_tallies() {
        let script = |i: u32| match i % 3 {
            0 => Step::Echo,
            1 => Step::Timeout,
            _ => Step::Return(b"nope"),
        };
        let cfg = config(10, b"AB");
        let a = run(&mut Scripted::new(script), &cfg).unwrap();
        let b = run(&mut Scripted::new(script), &cfg).unwrap();
        assert_eq!(a.replies(), b.replies());
        assert_eq!(a.all_succeeded(), b.all_succeeded());
        assert_eq!(a.mismatches(), b.mismatches());
        assert_eq!(a.timeouts(), b.timeouts());
    }

    #[test]
    fn middle_call_times_out() {
        let mut t = Scripted::new(|i| match i {
            1 => Step::Timeout,
            _ => Step::Return(b"AB"),
        });
        let res = run(&mut t, &config(3, b"AB")).unwrap();
        assert_eq!(res.replies(), 2);
        assert!(!res.all_succeeded());
    }

    #[test]
    fn batch_reopens_each_run() {
        let mut t = Scripted::new(|_| Step::Echo);
        let results = run_batch(&mut t, &config(3, b"A"), NonZeroU32::new(4).unwrap()).unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(t.opens, 4);
        assert_eq!(t.calls.len(), 12);
        assert!(results.iter().all(BenchmarkResult::all_succeeded));
    }

    #[test]
    fn loopback_with_drops() {
        let mut lb = Loopback::new(4);
        let res = run(&mut lb, &config(8, b"payload")).unwrap();
        assert_eq!(res.replies(), 6);
        assert_eq!(res.timeouts(), 2);
    }

    #[test]
    fn boxed_transport_runs() {
        let mut boxed: Box<dyn Transport> = Box::new(Loopback::new(0));
        let res = run(&mut boxed, &config(2, b"A")).unwrap();
        assert!(res.all_succeeded());
    }
}
