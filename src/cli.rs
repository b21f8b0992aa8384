use clap::Parser;
use std::path::PathBuf;

/// Every option is optional so values from `--config` can fill the gaps.
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "mesh-echo-bench",
    version,
    about = "Echo RPC round-trip benchmark through a serial mesh bridge"
)]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Bridge attachment: rs232, usb-stick or loopback
    #[arg(long)]
    pub port_type: Option<String>,
    /// Port index (0 = first enumerated port) or device path
    #[arg(short, long)]
    pub port: Option<String>,
    /// Baud rate
    #[arg(long)]
    pub baud: Option<u32>,
    /// Enable RTS/CTS
    #[arg(long, default_value_t = false)]
    pub rtscts: bool,

    /// Number of echo calls per run
    #[arg(short = 'n', long)]
    pub queries: Option<u32>,
    /// Per-attempt timeout in milliseconds
    #[arg(short, long)]
    pub timeout_ms: Option<u64>,
    /// Re-sends after the first attempt
    #[arg(short, long)]
    pub retries: Option<u8>,
    /// Payload text to echo
    #[arg(long, conflicts_with = "payload_len")]
    pub payload: Option<String>,
    /// Generate a payload of this many bytes instead
    #[arg(long)]
    pub payload_len: Option<usize>,
    /// Remote procedure that echoes its argument
    #[arg(long)]
    pub procedure: Option<String>,
    /// Back-to-back benchmark runs
    #[arg(long)]
    pub runs: Option<u32>,

    /// Loopback only: drop every Nth call (0 = never)
    #[arg(long)]
    pub loopback_drop_every: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}
