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

//! Module containing the route advertisement record carried between ASes.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::{AsRelation, Asn, Ipv4Prefix};

/// Largest path-length component of a priority. The component starts at
/// `MAX_PATH_WEIGHT` at the origin and decreases by one per hop, saturating
/// at zero; it can never cross into the next relationship band.
pub const MAX_PATH_WEIGHT: u32 = 99;

/// A route advertisement for a single prefix, exchanged between neighboring
/// ASes during propagation.
///
/// The priority is a single non-negative integer partitioned into a
/// relationship band (customer 200, peer 100, provider 0) and a path-length
/// component (`MAX_PATH_WEIGHT − hops`). A withdrawal reuses the same shape
/// with the `withdraw` flag set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// The AS at the end of the path that originated the route.
    pub origin: Asn,
    /// The prefix this route is for.
    pub prefix: Ipv4Prefix,
    /// The neighbor that delivered this announcement. Equals the holder's own
    /// ASN for self-originated routes, or a reserved sentinel for synthetic
    /// origins.
    pub received_from_asn: Asn,
    /// Selection priority; see [`priority()`].
    pub priority: u32,
    /// Timestamp of the observation this route descends from.
    pub timestamp: i64,
    /// Set on announcements seeded from observed data. Monitor entries are
    /// never replaced or removed during propagation.
    pub from_monitor: bool,
    /// The ASes traversed so far, newest first and the origin last. The
    /// forwarding step prepends the sender.
    pub as_path: Vec<Asn>,
    /// Index of the policy variant that accepted or produced this
    /// announcement at the holding AS.
    pub policy_index: u32,
    /// `true` if this record withdraws a previously advertised route.
    pub withdraw: bool,
    /// Non-zero (the deciding AS) when a random tiebreak was imposed on the
    /// selection of this route.
    pub tiebreak_override: Asn,
    /// `true` if this route descends from an announcement forged by an
    /// attacker.
    pub from_attacker: bool,
}

/// Compute a priority from the relationship band of the delivering neighbor
/// and the number of hops traversed so far.
pub fn priority(relation: AsRelation, hops: u32) -> u32 {
    relation.base_priority() + MAX_PATH_WEIGHT.saturating_sub(hops)
}

impl Announcement {
    /// The path-length component of the priority.
    pub fn path_weight(&self) -> u32 {
        self.priority % 100
    }

    /// `true` if this route sits in the customer band, i.e. it was learned
    /// from a customer or self-originated. Only customer-band routes may be
    /// exported to providers and peers.
    pub fn from_customer_band(&self) -> bool {
        self.priority >= AsRelation::Customer.base_priority()
    }

    /// Compare two announcements for the same prefix under the best-path
    /// relation: higher priority wins, then the shorter AS-path, then the
    /// lower origin, then the lower delivering neighbor. `Ordering::Equal`
    /// means the relation alone cannot decide and a tiebreak applies.
    pub fn compare(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            Ordering::Equal => {}
            o => return o,
        }

        match self.as_path.len().cmp(&other.as_path.len()) {
            Ordering::Equal => {}
            Ordering::Greater => return Ordering::Less,
            Ordering::Less => return Ordering::Greater,
        }

        match self.origin.cmp(&other.origin) {
            Ordering::Equal => {}
            Ordering::Greater => return Ordering::Less,
            Ordering::Less => return Ordering::Greater,
        }

        match self.received_from_asn.cmp(&other.received_from_asn) {
            Ordering::Equal => Ordering::Equal,
            Ordering::Greater => Ordering::Less,
            Ordering::Less => Ordering::Greater,
        }
    }
}
