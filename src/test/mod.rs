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

use crate::{
    announcement::Announcement,
    config::EngineConfig,
    graph::AsGraph,
    records::MemorySource,
    types::{Asn, Ipv4Prefix},
};

/// An engine configuration with plain per-AS output and incumbent-wins
/// tiebreaking, which most tests expect.
fn config() -> EngineConfig {
    EngineConfig {
        invert_results: false,
        random_tiebreak: false,
        ..Default::default()
    }
}

/// The prefix used throughout the scenarios: 137.99.0.0/16.
fn p16() -> Ipv4Prefix {
    Ipv4Prefix::from_dotted_quad("137.99.0.0", "255.255.0.0").unwrap()
}

/// The chain topology: providers 1 → 2 → 5 and 2 → 4, with the peerings
/// 2 -- 3 and 5 -- 6, and one announcement for [`p16`] observed on the path
/// 3-2-5.
fn chain_source() -> MemorySource {
    let mut source = MemorySource::new();
    source.provider_of(1, 2);
    source.provider_of(2, 5);
    source.provider_of(2, 4);
    source.peer_of(2, 3);
    source.peer_of(5, 6);
    source.announce("137.99.0.0", "255.255.0.0", &[3, 2, 5]);
    source
}

/// The processed graph of [`chain_source`], without its announcement.
fn chain_graph() -> AsGraph {
    AsGraph::from_source(&mut chain_source(), false)
}

/// A plain announcement with the given prefix, origin, priority and
/// delivering neighbor.
fn ann(prefix: Ipv4Prefix, origin: u32, priority: u32, received_from: u32) -> Announcement {
    Announcement {
        origin: Asn(origin),
        prefix,
        received_from_asn: Asn(received_from),
        priority,
        timestamp: 0,
        from_monitor: false,
        as_path: vec![Asn(origin)],
        policy_index: 0,
        withdraw: false,
        tiebreak_override: Asn(0),
        from_attacker: false,
    }
}

mod test_graph;
mod test_hijack;
