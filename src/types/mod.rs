// BgpCast: AS-level BGP route extrapolation engine written in Rust
// Copyright (C) 2022-2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Module containing all type definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod prefix;
pub use prefix::Ipv4Prefix;

/// AS Number
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Asn(pub u32);

impl std::fmt::Display for Asn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AS{}", self.0)
    }
}

impl From<u32> for Asn {
    fn from(x: u32) -> Self {
        Self(x)
    }
}

impl From<u64> for Asn {
    fn from(x: u64) -> Self {
        Self(x as u32)
    }
}

impl From<usize> for Asn {
    fn from(x: usize) -> Self {
        Self(x as u32)
    }
}

impl From<i32> for Asn {
    fn from(x: i32) -> Self {
        Self(x as u32)
    }
}

impl<T> From<&T> for Asn
where
    T: Into<Asn> + Copy,
{
    fn from(x: &T) -> Self {
        (*x).into()
    }
}

/// Synthetic origin installed by ROV++ nodes for rejected prefixes.
pub const BLACKHOLE_ASN: Asn = Asn(64512);
/// Marks the origin of a forged announcement seeded in hijack mode.
pub const HIJACK_ORIGIN_ASN: Asn = Asn(64513);
/// Marks the origin of a legitimate announcement seeded in hijack mode.
pub const LEGITIMATE_ORIGIN_ASN: Asn = Asn(64514);
/// Marks a preventive announcement covering a hijacked prefix.
pub const PREVENTIVE_HIJACKED_ASN: Asn = Asn(64515);
/// Marks a preventive announcement covering a clean prefix.
pub const PREVENTIVE_CLEAN_ASN: Asn = Asn(64516);

impl Asn {
    /// Returns `true` if this ASN is one of the reserved origin sentinels
    /// (`64512..=64516`). Sentinels terminate any traceback over
    /// `received_from_asn`.
    pub fn is_sentinel(&self) -> bool {
        (BLACKHOLE_ASN.0..=PREVENTIVE_CLEAN_ASN.0).contains(&self.0)
    }
}

/// The role a neighbor plays towards an AS. Routes learned from a customer are
/// preferred over routes learned from a peer, which are preferred over routes
/// learned from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsRelation {
    /// The neighbor sells transit to this AS.
    Provider,
    /// The neighbor exchanges traffic settlement-free.
    Peer,
    /// The neighbor buys transit from this AS.
    Customer,
}

impl AsRelation {
    /// The dual role, as seen from the other endpoint of the edge.
    pub fn dual(&self) -> Self {
        match self {
            Self::Provider => Self::Customer,
            Self::Peer => Self::Peer,
            Self::Customer => Self::Provider,
        }
    }

    /// The relationship band of the priority encoding. Customer routes occupy
    /// the highest band, then peers, then providers.
    pub fn base_priority(&self) -> u32 {
        match self {
            Self::Provider => 0,
            Self::Peer => 100,
            Self::Customer => 200,
        }
    }
}

impl std::fmt::Display for AsRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provider => write!(f, "provider"),
            Self::Peer => write!(f, "peer"),
            Self::Customer => write!(f, "customer"),
        }
    }
}

/// Result Sink Errors
#[derive(Error, Debug)]
pub enum SinkError {
    /// The underlying writer failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The CSV serializer failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// The sink refused the row.
    #[error("row refused by the sink: {0}")]
    Refused(String),
}

/// Extrapolation Errors
///
/// The engine tolerates dirty input (malformed records are skipped, broken
/// paths are truncated, cycles are compressed); only a failing result sink
/// aborts a run.
#[derive(Error, Debug)]
pub enum ExtrapolatorError {
    /// The result sink refused a row. Propagation cannot retry.
    #[error("result sink failure: {0}")]
    SinkFailure(#[from] SinkError),
}
