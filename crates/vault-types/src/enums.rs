//! Enumeration types for the membership vault.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// The kind of asset a vault position holds.
///
/// Positions of different kinds are minted by different token contracts,
/// so a [`PositionId`](crate::PositionId) is only unique within its asset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum VaultAsset {
    /// Vaulted GFI governance tokens.
    Gfi,
    /// Vaulted capital (staked pool positions valued in USDC).
    Capital,
}

impl core::fmt::Display for VaultAsset {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Gfi => f.write_str("gfi"),
            Self::Capital => f.write_str("capital"),
        }
    }
}

impl core::str::FromStr for VaultAsset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gfi" => Ok(Self::Gfi),
            "capital" => Ok(Self::Capital),
            other => Err(format!("unknown vault asset: {other}")),
        }
    }
}

/// Health of the ingestion worker as seen by readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "state", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum IngestHealth {
    /// Events are being applied normally.
    Healthy,
    /// Ingestion stopped on a fatal error; served state may be stale.
    Halted {
        /// The error that stopped ingestion.
        reason: String,
    },
}

impl IngestHealth {
    /// Return whether readers should treat the served state as stale.
    pub const fn is_halted(&self) -> bool {
        matches!(self, Self::Halted { .. })
    }
}
