use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Three-byte mesh node address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeAddress(pub [u8; 3]);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid node address: {0}")]
pub struct AddressError(pub String);

impl NodeAddress {
    /// Compact wire form, e.g. `5de21f`.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{:02x}.{:02x}.{:02x}", a, b, c)
    }
}

impl FromStr for NodeAddress {
    type Err = AddressError;

    /// Accepts `5de21f`, `5d.e2.1f` and `5D:E2:1F`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s
            .trim()
            .chars()
            .filter(|c| *c != '.' && *c != ':')
            .collect();
        let raw = hex::decode(&digits).map_err(|_| AddressError(s.to_string()))?;
        let bytes: [u8; 3] = raw
            .as_slice()
            .try_into()
            .map_err(|_| AddressError(s.to_string()))?;
        Ok(NodeAddress(bytes))
    }
}
