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

//! Module containing the engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration of an extrapolation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Record the ASes which do *not* have a route to a (prefix, origin)
    /// pair instead of emitting per-AS rows (smaller result size).
    pub invert_results: bool,
    /// Maintain the depref-RIB (second-best route per prefix) and emit it to
    /// a parallel table.
    pub store_depref: bool,
    /// Resolve full best-path ties with the deterministic per-AS random bit
    /// instead of keeping the incumbent.
    pub random_tiebreak: bool,
    /// Maximum number of prefixes per propagation block; `0` processes the
    /// whole prefix space in a single block.
    pub iteration_size: u32,
    /// Remove single-provider leaf ASes from the graph and synthesize their
    /// results from their parent.
    pub elide_stubs: bool,
    /// In hijack mode, propagate once after seeding the victim table and
    /// once more after seeding the attacker table, instead of a single
    /// propagation after both.
    pub propagate_twice: bool,
    /// In hijack mode, the cap on attacker-edge-removal rounds.
    pub num_rounds: u32,
    /// Seed-time path-length penalty applied to the attacker's forged
    /// announcement, controlling how close the attacker appears.
    pub max_attacker_hops: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            invert_results: true,
            store_depref: false,
            random_tiebreak: true,
            iteration_size: 50_000,
            elide_stubs: false,
            propagate_twice: true,
            num_rounds: 10,
            max_attacker_hops: 0,
        }
    }
}
