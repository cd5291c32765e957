//! Type-safe identifiers for vault participants and positions.
//!
//! Members are identified by their 20-byte account address. Addresses are
//! normalized to lowercase `0x`-prefixed hex on construction so that the
//! same account always maps to the same roster entry regardless of the
//! checksum casing the upstream log used.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Length of a hex-encoded account address without the `0x` prefix.
const ADDRESS_HEX_LEN: usize = 40;

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The address is not `0x` followed by 40 hex characters.
    #[error("invalid member address {value:?}: {reason}")]
    InvalidAddress {
        /// The rejected input.
        value: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// A vault member, identified by account address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(try_from = "String", into = "String")]
#[ts(export, export_to = "bindings/")]
pub struct MemberId(String);

impl MemberId {
    /// Parse and normalize an account address.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidAddress`] if the input is not a
    /// `0x`-prefixed 40-character hex string.
    pub fn parse(value: &str) -> Result<Self, IdError> {
        let hex = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .ok_or_else(|| IdError::InvalidAddress {
                value: value.to_owned(),
                reason: "missing 0x prefix",
            })?;

        if hex.len() != ADDRESS_HEX_LEN {
            return Err(IdError::InvalidAddress {
                value: value.to_owned(),
                reason: "expected 40 hex characters",
            });
        }

        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IdError::InvalidAddress {
                value: value.to_owned(),
                reason: "non-hex character",
            });
        }

        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    /// Return the normalized address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MemberId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MemberId> for String {
    fn from(id: MemberId) -> Self {
        id.0
    }
}

impl core::fmt::Display for MemberId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for MemberId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Token id of a vault position (an ERC-721 on the emitting chain).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct PositionId(pub u64);

impl core::fmt::Display for PositionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PositionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
