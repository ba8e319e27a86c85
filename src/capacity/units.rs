//! Byte and unit normalization.
//!
//! Providers report sizes in whatever unit their API happens to use: disk
//! sizes in decimal gigabytes, telemetry in raw bytes, quotas in terabytes.
//! Everything is normalized to an integer byte count on the way in, and every
//! human-facing figure on the way out uses binary (1024-based) units.

use serde::{Deserialize, Serialize};
use std::fmt;

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;
const TIB: f64 = GIB * 1024.0;

const GB: f64 = 1_000_000_000.0;
const TB: f64 = 1_000_000_000_000.0;

/// Unit a provider-reported quantity is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteUnit {
    /// Raw bytes (telemetry samples, usage probes)
    #[default]
    Bytes,
    /// Mebibytes (2^20)
    Mebibytes,
    /// Gibibytes (2^30)
    Gibibytes,
    /// Tebibytes (2^40)
    Tebibytes,
    /// Decimal gigabytes (10^9), as used by most disk size properties
    Gigabytes,
    /// Decimal terabytes (10^12), as used by quota properties
    Terabytes,
}

impl ByteUnit {
    /// Parse a unit from its common abbreviations (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "b" | "byte" | "bytes" => Some(Self::Bytes),
            "mib" | "mebibytes" => Some(Self::Mebibytes),
            "gib" | "gibibytes" => Some(Self::Gibibytes),
            "tib" | "tebibytes" => Some(Self::Tebibytes),
            "gb" | "gigabytes" => Some(Self::Gigabytes),
            "tb" | "terabytes" => Some(Self::Terabytes),
            _ => None,
        }
    }

    fn multiplier(&self) -> f64 {
        match self {
            Self::Bytes => 1.0,
            Self::Mebibytes => MIB,
            Self::Gibibytes => GIB,
            Self::Tebibytes => TIB,
            Self::Gigabytes => GB,
            Self::Terabytes => TB,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bytes => "B",
            Self::Mebibytes => "MiB",
            Self::Gibibytes => "GiB",
            Self::Tebibytes => "TiB",
            Self::Gigabytes => "GB",
            Self::Terabytes => "TB",
        }
    }
}

impl fmt::Display for ByteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Convert a quantity to an integer byte count.
///
/// Negative, NaN and infinite inputs normalize to 0.
pub fn to_bytes(quantity: f64, unit: ByteUnit) -> u64 {
    if !quantity.is_finite() || quantity <= 0.0 {
        return 0;
    }
    let bytes = (quantity * unit.multiplier()).round();
    if bytes >= u64::MAX as f64 {
        u64::MAX
    } else {
        bytes as u64
    }
}

/// Bytes to GiB, rounded to 2 decimals.
pub fn to_gib(bytes: u64) -> f64 {
    round_to(bytes as f64 / GIB, 2)
}

/// Bytes to TiB, rounded to 3 decimals.
pub fn to_tib(bytes: u64) -> f64 {
    round_to(bytes as f64 / TIB, 3)
}

/// Unrounded TiB, for estimates that are scaled before rounding.
pub(crate) fn tib_exact(bytes: u64) -> f64 {
    bytes as f64 / TIB
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
