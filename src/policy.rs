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

//! Module containing the route-origin-validation policy variants.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{announcement::Announcement, types::Asn};

/// A route-admission policy deployed at an AS. Each AS carries an ordered
/// policy vector; only the first tag is consulted at ingress and egress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyTag {
    /// Plain BGP: accept every incoming announcement.
    Bgp,
    /// Route-origin validation: reject announcements originated by a known
    /// attacker.
    Rov,
    /// ROV++: as ROV, but install and propagate a blackhole announcement for
    /// each rejected prefix.
    Rovpp,
    /// ROV++ 0.2bis: as ROV++, but keep blackhole and preventive
    /// announcements away from providers and peers.
    RovppBis,
    /// ROV++ 0.3 (best-path aware): as ROV++ 0.2bis, with a preventive
    /// announcement set.
    RovppBp,
}

impl PolicyTag {
    /// The index of this policy variant, recorded on announcements it
    /// accepts or produces.
    pub fn index(&self) -> u32 {
        match self {
            Self::Bgp => 0,
            Self::Rov => 1,
            Self::Rovpp => 2,
            Self::RovppBis => 3,
            Self::RovppBp => 4,
        }
    }

    /// Ingress check: `true` if the announcement may enter the incoming
    /// queue. All ROV variants reject attacker-origin announcements.
    pub fn accepts(&self, ann: &Announcement, attackers: &HashSet<Asn>) -> bool {
        match self {
            Self::Bgp => true,
            Self::Rov | Self::Rovpp | Self::RovppBis | Self::RovppBp => {
                !attackers.contains(&ann.origin)
            }
        }
    }

    /// `true` if an ingress rejection produces a blackhole announcement for
    /// the rejected prefix.
    pub fn blackholes_on_reject(&self) -> bool {
        matches!(self, Self::Rovpp | Self::RovppBis | Self::RovppBp)
    }

    /// `true` if blackhole and preventive entries must be stripped from
    /// egress vectors destined to providers and peers. They may still leak
    /// to customers.
    pub fn strips_defensive_egress(&self) -> bool {
        matches!(self, Self::RovppBis | Self::RovppBp)
    }
}

impl Default for PolicyTag {
    fn default() -> Self {
        Self::Bgp
    }
}
