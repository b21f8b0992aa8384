//! Run configuration.
//!
//! Values come from the command line and an optional TOML file. Command-line
//! values take precedence over file values, which take precedence over the
//! built-in defaults.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;

use crate::bench::{BenchmarkConfig, DEFAULT_PROCEDURE};
use crate::cli::Cli;
use crate::port::SerialSettings;
use crate::transport::{PortId, PortKind, PortSelector};

/// Mixed-class printable payload, 77 bytes.
pub const DEFAULT_PAYLOAD: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz1234567890-=<({[]})=-!@#$";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
    #[error("queries must be at least 1")]
    ZeroQueries,
    #[error("runs must be at least 1")]
    ZeroRuns,
    #[error("invalid port setting: {0}")]
    InvalidPort(String),
    #[error("invalid payload setting: {0}")]
    InvalidPayload(&'static str),
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub port: PortSection,
    #[serde(default)]
    pub bench: BenchSection,
    #[serde(default)]
    pub loopback: LoopbackSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PortSection {
    pub kind: Option<String>,
    /// Index or device path; TOML integers and strings both work.
    pub id: Option<TomlPortId>,
    pub baud: Option<u32>,
    #[serde(default)]
    pub rtscts: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum TomlPortId {
    Index(u32),
    Path(String),
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BenchSection {
    pub queries: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub retries: Option<u8>,
    pub payload: Option<String>,
    pub payload_len: Option<usize>,
    pub procedure: Option<String>,
    pub runs: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoopbackSection {
    pub drop_every: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    pub level: Option<String>,
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bench: BenchmarkConfig,
    pub serial: SerialSettings,
    pub runs: NonZeroU32,
    pub loopback_drop_every: u64,
    pub log_level: String,
}

impl Config {
    /// Resolve `cli` against the TOML file it names, if any.
    pub fn load(cli: Cli) -> Result<Self, ConfigError> {
        let file = match cli.config {
            Some(ref path) => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::FileRead(path.clone(), e))?;
                toml::from_str(&contents).map_err(|e| ConfigError::TomlParse(path.clone(), e))?
            }
            None => TomlConfig::default(),
        };
        Self::merge(cli, file)
    }

    pub fn merge(cli: Cli, file: TomlConfig) -> Result<Self, ConfigError> {
        let kind_s = cli
            .port_type
            .or(file.port.kind)
            .unwrap_or_else(|| "rs232".to_string());
        let kind = kind_s
            .parse::<PortKind>()
            .map_err(|_| ConfigError::InvalidPort(format!("unknown port type {:?}", kind_s)))?;

        let id = match (cli.port, file.port.id) {
            (Some(s), _) => s
                .parse::<PortId>()
                .map_err(|_| ConfigError::InvalidPort(format!("bad port id {:?}", s)))?,
            (None, Some(TomlPortId::Index(n))) => PortId::Index(n),
            (None, Some(TomlPortId::Path(p))) => p
                .parse::<PortId>()
                .map_err(|_| ConfigError::InvalidPort(format!("bad port id {:?}", p)))?,
            (None, None) => PortId::Index(0),
        };

        let queries = cli.queries.or(file.bench.queries).unwrap_or(100);
        let num_queries = NonZeroU32::new(queries).ok_or(ConfigError::ZeroQueries)?;
        let runs = NonZeroU32::new(cli.runs.or(file.bench.runs).unwrap_or(1))
            .ok_or(ConfigError::ZeroRuns)?;

        // A CLI choice of either payload form overrides both file forms.
        let payload = if cli.payload.is_some() || cli.payload_len.is_some() {
            resolve_payload(cli.payload, cli.payload_len)?
        } else {
            resolve_payload(file.bench.payload, file.bench.payload_len)?
        };

        let timeout = Duration::from_millis(cli.timeout_ms.or(file.bench.timeout_ms).unwrap_or(1_000));
        let retries = cli.retries.or(file.bench.retries).unwrap_or(3);
        let procedure = cli
            .procedure
            .or(file.bench.procedure)
            .unwrap_or_else(|| DEFAULT_PROCEDURE.to_string());

        let bench = BenchmarkConfig::new(PortSelector { kind, id }, num_queries, payload)
            .with_timeout(timeout)
            .with_retries(retries)
            .with_procedure(procedure);

        Ok(Config {
            bench,
            serial: SerialSettings {
                baud: cli.baud.or(file.port.baud).unwrap_or(115_200),
                rtscts: cli.rtscts || file.port.rtscts,
            },
            runs,
            loopback_drop_every: cli
                .loopback_drop_every
                .or(file.loopback.drop_every)
                .unwrap_or(0),
            log_level: cli
                .log_level
                .or(file.logging.level)
                .unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn resolve_payload(text: Option<String>, len: Option<usize>) -> Result<Bytes, ConfigError> {
    match (text, len) {
        (Some(_), Some(_)) => Err(ConfigError::InvalidPayload(
            "payload and payload_len are mutually exclusive",
        )),
        (Some(t), None) => Ok(Bytes::from(t)),
        (None, Some(n)) => Ok(pattern_payload(n)),
        (None, None) => Ok(Bytes::from_static(DEFAULT_PAYLOAD.as_bytes())),
    }
}

/// `len` bytes cycling through the default payload.
pub fn pattern_payload(len: usize) -> Bytes {
    DEFAULT_PAYLOAD.bytes().cycle().take(len).collect::<Vec<u8>>().into()
}
