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

//! # The hijack extension
//!
//! The [`RovExtrapolator`] runs attacker/victim scenarios on top of the
//! propagation engine: it seeds the legitimate announcements and the forged
//! ones, lets the ROV policy family reject or blackhole the forgeries,
//! counts the victims that installed an attacker route, and removes the
//! attacker's entry edge before the next round until the attacks dry up.

use std::collections::HashMap;

use itertools::Itertools;
use log::*;

use crate::{
    config::EngineConfig,
    engine::{emit_results, parse_seed_records, seed_path, OriginMark, SeedRecord},
    graph::AsGraph,
    records::{AttackStatsRow, RecordSource, ResultSink},
    types::{Asn, ExtrapolatorError, Ipv4Prefix},
};

/// Upper bound on the traceback depth of the loop check and the
/// attacker-neighbor search.
const MAX_TRACEBACK_DEPTH: usize = 100;

/// A parsed attacker/victim pair.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AttackPair {
    attacker: Asn,
    victim: Asn,
    prefix: Ipv4Prefix,
    path: Vec<Asn>,
}

/// The attacker/victim extrapolation engine.
///
/// Each round seeds the victim announcements and the forged attacker
/// announcements, propagates, checks for traceback loops, and counts the
/// victims whose installed route descends from an attacker. After a round
/// with successful attacks, the edge between each successful attacker and
/// its path neighbor is removed, the graph is re-compressed and re-ranked,
/// and the next round begins; the run stops after `num_rounds` rounds or
/// when no attack succeeds.
#[derive(Debug, Clone, Default)]
pub struct RovExtrapolator {
    config: EngineConfig,
    graph: AsGraph,
    victim_prefixes: HashMap<Asn, Ipv4Prefix>,
    attacker_edge_removal: Vec<(Asn, Asn)>,
    successful_attacks: u64,
    total_attacks: u64,
}

impl RovExtrapolator {
    /// Create an engine with the given configuration and an empty graph.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
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

    /// A mutable reference to the AS graph, for assigning policy vectors
    /// before the run.
    pub fn graph_mut(&mut self) -> &mut AsGraph {
        &mut self.graph
    }

    /// The `(successful, total)` attack counters of the last round.
    pub fn attack_stats(&self) -> (u64, u64) {
        (self.successful_attacks, self.total_attacks)
    }

    /// Build the graph, then run up to `num_rounds` attacker/victim rounds,
    /// emitting results and one statistics row per round.
    ///
    /// Policy vectors must be assigned through [`RovExtrapolator::graph_mut`]
    /// after this function built the graph; to do so, split the run by
    /// calling [`RovExtrapolator::build_graph`] first.
    pub fn perform_propagation<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
    ) -> Result<(), ExtrapolatorError>
    where
        S: RecordSource,
        K: ResultSink,
    {
        if self.graph.num_ases() == 0 {
            self.build_graph(source);
        }
        let victim_seeds = parse_seed_records(source.announcements());
        let pairs = self.parse_pairs(source);
        for pair in &pairs {
            self.graph.add_attacker(pair.attacker);
        }

        let mut round = 1u32;
        loop {
            self.run_round(&victim_seeds, &pairs);
            emit_results(&self.graph, &self.config, sink)?;
            sink.attack_stats_row(&AttackStatsRow {
                round,
                successful_attacks: self.successful_attacks,
                total_attacks: self.total_attacks,
                probability: if self.total_attacks == 0 {
                    0.0
                } else {
                    self.successful_attacks as f64 / self.total_attacks as f64
                },
            })?;
            info!(
                "round {round}: {}/{} successful attacks",
                self.successful_attacks, self.total_attacks
            );

            if self.successful_attacks == 0 || round >= self.config.num_rounds {
                break;
            }
            self.start_next_round();
            round += 1;
        }
        Ok(())
    }

    /// Build the AS graph from the relationship stream without propagating,
    /// so that policy vectors can be assigned before the run.
    pub fn build_graph<S: RecordSource>(&mut self, source: &mut S) {
        self.graph = AsGraph::from_source(source, self.config.elide_stubs);
        info!("graph built: {} ASes", self.graph.num_ases());
    }

    /// Parse the attacker/victim stream, skipping malformed rows.
    fn parse_pairs<S: RecordSource>(&mut self, source: &mut S) -> Vec<AttackPair> {
        let mut pairs = Vec::new();
        for record in source.attacker_victim_pairs() {
            let prefix =
                match Ipv4Prefix::from_dotted_quad(&record.prefix_host, &record.prefix_netmask) {
                    Ok(prefix) => prefix,
                    Err(e) => {
                        warn!(
                            "skipping attacker/victim pair with malformed prefix {}/{}: {e}",
                            record.prefix_host, record.prefix_netmask
                        );
                        continue;
                    }
                };
            pairs.push(AttackPair {
                attacker: Asn(record.attacker_asn),
                victim: Asn(record.victim_asn),
                prefix,
                path: record.as_path.iter().map(|asn| Asn(*asn)).collect(),
            });
        }
        pairs
    }

    /// Seed both tables, propagate, run the loop check and account the
    /// attacks of one round.
    fn run_round(&mut self, victim_seeds: &[SeedRecord], pairs: &[AttackPair]) {
        self.successful_attacks = 0;
        self.total_attacks = 0;

        for seed in victim_seeds {
            seed_path(
                &mut self.graph,
                &self.config,
                &seed.path,
                seed.prefix,
                seed.timestamp,
                OriginMark::Sentinel,
            );
        }
        if self.config.propagate_twice {
            self.graph.propagate_up(self.config.random_tiebreak);
            self.graph.propagate_down(self.config.random_tiebreak);
        }

        for pair in pairs {
            if self.victim_prefixes.contains_key(&pair.victim) {
                continue;
            }
            let attacker = self.graph.translate_asn(pair.attacker);
            match self.graph.get(attacker) {
                // an attacker without upstreams cannot spread the forgery
                Some(node) if node.providers().is_empty() && node.peers().is_empty() => continue,
                None => continue,
                Some(_) => {}
            }
            self.victim_prefixes.insert(pair.victim, pair.prefix);
            seed_path(
                &mut self.graph,
                &self.config,
                &pair.path,
                pair.prefix,
                0,
                OriginMark::Sentinel,
            );
        }
        self.graph.propagate_up(self.config.random_tiebreak);
        self.graph.propagate_down(self.config.random_tiebreak);

        self.check_loops();
        self.account_attacks();
    }

    /// Post-propagation loop check: drop every loc-RIB entry whose
    /// `received_from_asn` traceback revisits its own AS. The traceback
    /// stops at any sentinel.
    pub(crate) fn check_loops(&mut self) {
        let asns: Vec<Asn> = self.graph.ases().keys().copied().sorted().collect();
        for asn in asns {
            let prefixes: Vec<Ipv4Prefix> = match self.graph.get(asn) {
                Some(node) => node.loc_rib().keys().copied().collect(),
                None => continue,
            };
            for prefix in prefixes {
                if self.traceback_loops(prefix, asn) {
                    warn!("dropping looped route for {prefix} at {asn}");
                    self.graph.drop_rib_entry(asn, prefix);
                }
            }
        }
    }

    /// Trace `received_from_asn` back through the graph; `true` if the walk
    /// returns to the starting AS or exceeds the depth bound.
    fn traceback_loops(&self, prefix: Ipv4Prefix, start: Asn) -> bool {
        let mut current = start;
        for _ in 0..MAX_TRACEBACK_DEPTH {
            let ann = match self.graph.get(current).and_then(|n| n.loc_rib().get(&prefix)) {
                Some(ann) => ann,
                // the chain is not continuous, which cannot loop
                None => return false,
            };
            if ann.received_from_asn == start {
                return true;
            }
            if ann.received_from_asn.is_sentinel() {
                return false;
            }
            current = ann.received_from_asn;
        }
        warn!("maximum depth exceeded during traceback of {prefix}");
        true
    }

    /// Count the victims whose installed route for the targeted prefix came
    /// from an attacker, and record the attacker's entry edge for removal.
    /// A victim without any route for the prefix is not counted.
    fn account_attacks(&mut self) {
        let registry: Vec<(Asn, Ipv4Prefix)> = self
            .victim_prefixes
            .iter()
            .map(|(victim, prefix)| (*victim, *prefix))
            .sorted()
            .collect();
        for (victim, prefix) in registry {
            let victim = self.graph.translate_asn(victim);
            let ann = match self.graph.get(victim).and_then(|n| n.loc_rib().get(&prefix)) {
                Some(ann) => ann.clone(),
                None => continue,
            };
            if ann.from_attacker {
                self.successful_attacks += 1;
                let attacker = self.graph.translate_asn(ann.origin);
                if let Some(neighbor) = self.attacker_path_neighbor(prefix, victim, attacker) {
                    self.attacker_edge_removal.push((attacker, neighbor));
                }
            }
            self.total_attacks += 1;
        }
    }

    /// Walk the `received_from_asn` chain from the victim towards the
    /// attacker; the AS whose installed route points directly at the
    /// attacker is the neighbor on the forged path.
    fn attacker_path_neighbor(
        &self,
        prefix: Ipv4Prefix,
        victim: Asn,
        attacker: Asn,
    ) -> Option<Asn> {
        let mut current = victim;
        for _ in 0..MAX_TRACEBACK_DEPTH {
            let from = self
                .graph
                .get(current)
                .and_then(|n| n.loc_rib().get(&prefix))
                .map(|ann| ann.received_from_asn)?;
            if from == attacker {
                return Some(current);
            }
            if from.is_sentinel() {
                return None;
            }
            current = from;
        }
        None
    }

    /// Disconnect the recorded attacker edges, then reset and recompute the
    /// derived topology state for the next round.
    fn start_next_round(&mut self) {
        for (attacker, neighbor) in std::mem::take(&mut self.attacker_edge_removal) {
            debug!("removing attacker edge {attacker} -- {neighbor}");
            self.graph.remove_edge(attacker, neighbor);
        }
        self.graph.clear_routing_state();
        self.graph.reset_topology_state();
        self.graph.process(self.config.elide_stubs);
        self.victim_prefixes.clear();
    }
}
