use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mesh_echo_bench::bench::{self, BenchmarkResult};
use mesh_echo_bench::cli::Cli;
use mesh_echo_bench::config::Config;
use mesh_echo_bench::transport::loopback::Loopback;
use mesh_echo_bench::transport::serial::SerialBridge;
use mesh_echo_bench::transport::{PortKind, Transport};

fn main() -> Result<ExitCode> {
    let config = Config::load(Cli::parse()).context("loading configuration")?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(
        port = %config.bench.port,
        baud = config.serial.baud,
        queries = config.bench.num_queries.get(),
        payload_len = config.bench.payload.len(),
        timeout_ms = config.bench.timeout.as_millis() as u64,
        retries = config.bench.retries,
        procedure = %config.bench.procedure,
        runs = config.runs.get(),
        "Starting echo benchmark"
    );

    let mut transport: Box<dyn Transport> = match config.bench.port.kind {
        PortKind::Loopback => Box::new(Loopback::new(config.loopback_drop_every)),
        PortKind::Rs232 | PortKind::UsbStick => Box::new(SerialBridge::new(config.serial.clone())),
    };

    let results = match bench::run_batch(&mut transport, &config.bench, config.runs) {
        Ok(r) => r,
        Err(e) => {
            println!("FAILED");
            return Err(e).context("benchmark aborted");
        }
    };

    for (i, res) in results.iter().enumerate() {
        println!("run {}: {}", i + 1, res.summary());
    }

    if results.iter().all(BenchmarkResult::all_succeeded) {
        println!("SUCCESS");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("FAILED");
        Ok(ExitCode::FAILURE)
    }
}
