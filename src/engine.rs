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

//! # The propagation engine
//!
//! The [`Extrapolator`] replays observed announcements over the AS graph:
//! it seeds each announcement along its observed AS-path, runs the upward
//! and downward sweeps, streams the resulting loc-RIBs to the result sink,
//! and clears the graph before the next prefix block.

use std::collections::HashMap;

use log::*;

use crate::{
    announcement::{Announcement, MAX_PATH_WEIGHT},
    config::EngineConfig,
    graph::AsGraph,
    records::{
        AnnouncementRecord, InverseRow, RecordSource, ResultSink, RibRow,
    },
    types::{
        AsRelation, Asn, ExtrapolatorError, Ipv4Prefix, BLACKHOLE_ASN, HIJACK_ORIGIN_ASN,
        LEGITIMATE_ORIGIN_ASN,
    },
};

use itertools::Itertools;

/// What to record as `received_from_asn` on the announcement installed at
/// the origin of a seeded path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OriginMark {
    /// The origin's own ASN (plain extrapolation).
    SelfAsn,
    /// A reserved sentinel telling hijacked and legitimate origins apart
    /// (hijack mode).
    Sentinel,
}

/// A parsed announcement observation, ready for seeding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SeedRecord {
    pub prefix: Ipv4Prefix,
    pub path: Vec<Asn>,
    pub timestamp: i64,
}

/// Parse raw announcement rows, skipping IPv6 rows and rows with malformed
/// prefixes.
pub(crate) fn parse_seed_records<I>(records: I) -> Vec<SeedRecord>
where
    I: Iterator<Item = AnnouncementRecord>,
{
    let mut out = Vec::new();
    for record in records {
        if record.family == Some(6) {
            continue;
        }
        let prefix = match Ipv4Prefix::from_dotted_quad(&record.host, &record.netmask) {
            Ok(prefix) => prefix,
            Err(e) => {
                warn!(
                    "skipping announcement with malformed prefix {}/{}: {e}",
                    record.host, record.netmask
                );
                continue;
            }
        };
        out.push(SeedRecord {
            prefix,
            path: record.as_path.iter().map(|asn| Asn(*asn)).collect(),
            timestamp: record.timestamp.unwrap_or(0),
        });
    }
    out
}

/// Seed one observed announcement along its AS-path.
///
/// The path is walked from the origin outward. Every hop is translated
/// through the component map; the relationship between each AS and its
/// predecessor selects the relationship band of the installed priority.
/// An unknown AS or a missing relationship breaks the path: the remaining
/// hops are not seeded. Returns `false` for a broken path.
pub(crate) fn seed_path(
    graph: &mut AsGraph,
    config: &EngineConfig,
    raw_path: &[Asn],
    prefix: Ipv4Prefix,
    timestamp: i64,
    mark: OriginMark,
) -> bool {
    let origin = match raw_path.last() {
        Some(origin) => *origin,
        None => return true,
    };
    let from_attacker = graph.attackers().contains(&origin);
    if config.invert_results {
        graph.register_inverse(prefix, origin);
    }

    let mut walked: Vec<Asn> = Vec::new();
    let mut previous: Option<Asn> = None;
    for (hops, raw) in raw_path.iter().rev().enumerate() {
        let asn = graph.translate_asn(*raw);
        if graph.get(asn).is_none() {
            debug!("unknown {raw} on a seeded path; truncating");
            return false;
        }
        if previous == Some(asn) {
            // path prepending, or two members of the same collapsed
            // component; the hop still consumes path weight
            continue;
        }
        let relation = match previous {
            None => AsRelation::Customer,
            Some(prev) => match graph.get(asn).and_then(|node| node.relation_to(prev)) {
                Some(relation) => relation,
                None => {
                    debug!("{prev} and {asn} are not neighbors; truncating the seeded path");
                    return false;
                }
            },
        };
        let mut weight = MAX_PATH_WEIGHT.saturating_sub(hops as u32);
        if from_attacker {
            weight = weight.saturating_sub(config.max_attacker_hops);
        }
        let received_from_asn = match previous {
            Some(prev) => prev,
            None => match mark {
                OriginMark::SelfAsn => asn,
                OriginMark::Sentinel if from_attacker => HIJACK_ORIGIN_ASN,
                OriginMark::Sentinel => LEGITIMATE_ORIGIN_ASN,
            },
        };
        walked.insert(0, asn);
        let ann = Announcement {
            origin,
            prefix,
            received_from_asn,
            priority: relation.base_priority() + weight,
            timestamp,
            from_monitor: true,
            as_path: walked.clone(),
            policy_index: 0,
            withdraw: false,
            tiebreak_override: Asn(0),
            from_attacker,
        };
        graph.seed_announcement(asn, ann, config.random_tiebreak);
        previous = Some(asn);
    }
    true
}

/// Stream the current routing state to the result sink.
///
/// Representative ASes emit one row per loc-RIB entry; members of collapsed
/// components emit the same rows under their own ASN; elided stubs emit
/// their parent's rows. Blackhole entries are mirrored to the parallel
/// blackhole table, and the depref table is filled when enabled. With
/// inverted results, the inverse map is streamed instead.
pub(crate) fn emit_results<K: ResultSink>(
    graph: &AsGraph,
    config: &EngineConfig,
    sink: &mut K,
) -> Result<(), ExtrapolatorError> {
    if config.invert_results {
        for ((prefix, origin), asns) in graph
            .inverse_results()
            .iter()
            .sorted_by_key(|(key, _)| **key)
        {
            for asn in asns.iter().sorted() {
                sink.inverse_row(&InverseRow {
                    asn: *asn,
                    prefix: *prefix,
                    origin: *origin,
                })?;
            }
        }
        return Ok(());
    }

    for (asn, node) in graph.ases().iter().sorted_by_key(|(asn, _)| **asn) {
        for (prefix, ann) in node.loc_rib() {
            let row = RibRow {
                asn: *asn,
                prefix: *prefix,
                origin: ann.origin,
                priority: ann.priority,
                received_from_asn: ann.received_from_asn,
            };
            sink.rib_row(&row)?;
            if ann.origin == BLACKHOLE_ASN {
                sink.blackhole_row(&row)?;
            }
            for member in node.member_ases() {
                let row = RibRow {
                    asn: *member,
                    ..row
                };
                sink.rib_row(&row)?;
                if ann.origin == BLACKHOLE_ASN {
                    sink.blackhole_row(&row)?;
                }
            }
        }
        if config.store_depref {
            for (prefix, ann) in node.depref_rib() {
                sink.depref_row(&RibRow {
                    asn: *asn,
                    prefix: *prefix,
                    origin: ann.origin,
                    priority: ann.priority,
                    received_from_asn: ann.received_from_asn,
                })?;
            }
        }
    }

    for (stub, parent) in graph.stubs_to_parents().iter().sorted() {
        let parent = graph.translate_asn(*parent);
        if let Some(node) = graph.get(parent) {
            for (prefix, ann) in node.loc_rib() {
                sink.rib_row(&RibRow {
                    asn: *stub,
                    prefix: *prefix,
                    origin: ann.origin,
                    priority: ann.priority,
                    received_from_asn: ann.received_from_asn,
                })?;
            }
        }
    }
    Ok(())
}

/// The batch extrapolation engine: build the graph, replay the observed
/// announcements in prefix blocks, and stream the per-AS results.
///
/// ```
/// use bgpcast::prelude::*;
///
/// fn main() -> Result<(), ExtrapolatorError> {
///     let mut source = MemorySource::new();
///     source.provider_of(1, 2);
///     source.announce("137.99.0.0", "255.255.0.0", &[2]);
///
///     let mut config = EngineConfig::default();
///     config.invert_results = false;
///
///     let mut sink = MemorySink::new();
///     let mut extrapolator = Extrapolator::new(config);
///     extrapolator.perform_propagation(&mut source, &mut sink)?;
///
///     // the origin installed its own announcement, and its provider
///     // learned the route from it
///     assert_eq!(sink.rib.len(), 2);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Extrapolator {
    config: EngineConfig,
    graph: AsGraph,
}

impl Extrapolator {
    /// Create an engine with the given configuration and an empty graph.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            graph: AsGraph::new(),
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The AS graph of the last run.
    pub fn graph(&self) -> &AsGraph {
        &self.graph
    }

    /// A mutable reference to the AS graph, for callers that adjust policy
    /// vectors or attacker sets between building and propagating.
    pub fn graph_mut(&mut self) -> &mut AsGraph {
        &mut self.graph
    }

    /// Run a full extrapolation: build the graph from the relationship
    /// stream, then process the announcement stream in prefix blocks of
    /// `iteration_size`, running seed → propagate up → propagate down →
    /// emit → clear per block. Only a sink failure aborts the run.
    pub fn perform_propagation<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
    ) -> Result<(), ExtrapolatorError>
    where
        S: RecordSource,
        K: ResultSink,
    {
        self.graph = AsGraph::from_source(source, self.config.elide_stubs);
        info!("graph built: {} ASes", self.graph.num_ases());

        let seeds = parse_seed_records(source.announcements());
        let mut by_prefix: HashMap<Ipv4Prefix, Vec<&SeedRecord>> = HashMap::new();
        for seed in &seeds {
            by_prefix.entry(seed.prefix).or_default().push(seed);
        }
        let mut prefixes: Vec<Ipv4Prefix> = by_prefix.keys().copied().collect();
        prefixes.sort();

        let block_size = if self.config.iteration_size == 0 {
            prefixes.len().max(1)
        } else {
            self.config.iteration_size as usize
        };

        for (iteration, block) in prefixes.chunks(block_size).enumerate() {
            debug!(
                "iteration {}: extrapolating {} prefixes",
                iteration + 1,
                block.len()
            );
            let mut broken_paths = 0u64;
            for prefix in block {
                for seed in &by_prefix[prefix] {
                    if !seed_path(
                        &mut self.graph,
                        &self.config,
                        &seed.path,
                        seed.prefix,
                        seed.timestamp,
                        OriginMark::SelfAsn,
                    ) {
                        broken_paths += 1;
                    }
                }
            }
            if broken_paths > 0 {
                debug!("iteration {}: {broken_paths} broken paths", iteration + 1);
            }
            self.graph.propagate_up(self.config.random_tiebreak);
            self.graph.propagate_down(self.config.random_tiebreak);
            emit_results(&self.graph, &self.config, sink)?;
            self.graph.clear_routing_state();
        }
        Ok(())
    }
}
