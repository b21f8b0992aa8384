use std::collections::BTreeMap;

use bytes::Bytes;
use thiserror::Error;

use super::command::BridgeCommand;
use crate::transport::NodeAddress;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("malformed key=value pair: {0}")]
    BadPair(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid integer for {0}: {1}")]
    BadInt(&'static str, String),
    #[error("invalid hex for {0}: {1}")]
    BadHex(&'static str, String),
    #[error("invalid node address for {0}: {1}")]
    BadAddress(&'static str, String),
    #[error("unknown tag: {0}")]
    UnknownTag(String),
    #[error("semantic error: {0}")]
    Semantic(&'static str),
}

/// Serialize a command to a CRLF-terminated line.
pub fn format_command(cmd: &BridgeCommand) -> String {
    use BridgeCommand::*;
    let mut out = String::new();

    macro_rules! push_pair {
        ($k:literal, $v:expr) => {{
            out.push(' ');
            out.push_str($k);
            out.push('=');
            out.push_str(&$v.to_string());
        }};
    }

    match cmd {
        Hello => out.push_str("HELLO"),
        HelloAck { addr } => {
            out.push_str("HELLO ACK");
            push_pair!("addr", addr.to_hex());
        }
        Call {
            seq,
            dst,
            procedure,
            args,
        } => {
            out.push_str("CALL");
            push_pair!("seq", seq);
            push_pair!("dst", dst.to_hex());
            push_pair!("proc", procedure);
            push_pair!("argc", args.len());
            if !args.is_empty() {
                push_pair!("args", encode_values(args));
            }
        }
        Reply { seq, src, values } => {
            out.push_str("REPLY");
            push_pair!("seq", seq);
            push_pair!("src", src.to_hex());
            push_pair!("argc", values.len());
            if !values.is_empty() {
                push_pair!("args", encode_values(values));
            }
        }
    }

    out.push_str("\r\n");
    out
}

/// Parse a CR/LF-terminated line into a command.
pub fn parse_command(line: &str) -> Result<BridgeCommand, ParseError> {
    let s = line.trim_matches(|c| c == '\r' || c == '\n' || c == ' ');
    if s.is_empty() {
        return Err(ParseError::Empty);
    }

    // Everything before the first k=v token is the tag.
    let tokens: Vec<&str> = s.split_whitespace().collect();
    let kv_start = tokens
        .iter()
        .position(|t| t.contains('='))
        .unwrap_or(tokens.len());
    let tag = tokens[..kv_start].join(" ");
    let mut map = BTreeMap::<String, String>::new();

    for &tok in &tokens[kv_start..] {
        let (k, v) = tok
            .split_once('=')
            .ok_or_else(|| ParseError::BadPair(tok.to_string()))?;
        if k.is_empty() {
            return Err(ParseError::BadPair(tok.to_string()));
        }
        map.insert(k.to_string(), v.to_string());
    }

    use BridgeCommand::*;

    match tag.as_str() {
        "HELLO" => Ok(Hello),
        "HELLO ACK" => Ok(HelloAck {
            addr: req_addr(&map, "addr")?,
        }),
        "CALL" => Ok(Call {
            seq: req_u32(&map, "seq")?,
            dst: req_addr(&map, "dst")?,
            procedure: req_s(&map, "proc")?.to_string(),
            args: req_values(&map)?,
        }),
        "REPLY" => Ok(Reply {
            seq: req_u32(&map, "seq")?,
            src: req_addr(&map, "src")?,
            values: req_values(&map)?,
        }),
        _ => Err(ParseError::UnknownTag(tag)),
    }
}

/* ---------- helpers ---------- */

fn encode_values(values: &[Bytes]) -> String {
    values
        .iter()
        .map(hex::encode)
        .collect::<Vec<_>>()
        .join(",")
}

fn req_s<'a>(map: &'a BTreeMap<String, String>, k: &'static str) -> Result<&'a str, ParseError> {
    map.get(k)
        .map(|s| s.as_str())
        .ok_or(ParseError::MissingField(k))
}

fn req_u32(map: &BTreeMap<String, String>, k: &'static str) -> Result<u32, ParseError> {
    map.get(k).ok_or(ParseError::MissingField(k)).and_then(|v| {
        v.parse::<u32>()
            .map_err(|_| ParseError::BadInt(k, v.clone()))
    })
}

fn req_usize(map: &BTreeMap<String, String>, k: &'static str) -> Result<usize, ParseError> {
    map.get(k).ok_or(ParseError::MissingField(k)).and_then(|v| {
        v.parse::<usize>()
            .map_err(|_| ParseError::BadInt(k, v.clone()))
    })
}

fn req_addr(map: &BTreeMap<String, String>, k: &'static str) -> Result<NodeAddress, ParseError> {
    map.get(k).ok_or(ParseError::MissingField(k)).and_then(|v| {
        v.parse::<NodeAddress>()
            .map_err(|_| ParseError::BadAddress(k, v.clone()))
    })
}

/// `argc` is authoritative; `args` must carry exactly that many entries.
fn req_values(map: &BTreeMap<String, String>) -> Result<Vec<Bytes>, ParseError> {
    let argc = req_usize(map, "argc")?;
    if argc == 0 {
        if map.get("args").is_some_and(|a| !a.is_empty()) {
            return Err(ParseError::Semantic("args present with argc=0"));
        }
        return Ok(Vec::new());
    }
    let raw = req_s(map, "args")?;
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != argc {
        return Err(ParseError::Semantic("argc does not match args"));
    }
    parts
        .into_iter()
        .map(|p| {
            hex::decode(p)
                .map(Bytes::from)
                .map_err(|_| ParseError::BadHex("args", p.to_string()))
        })
        .collect()
}

/* ---------- tests ---------- */
