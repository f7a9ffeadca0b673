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

//! # Top-level AS-graph module
//!
//! The [`AsGraph`] owns every AS node, compresses customer-provider cycles
//! into supernodes, assigns propagation ranks, and drives the two ranked
//! propagation sweeps. It is built from a stream of relationship records and
//! then processed once before announcements are seeded.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use itertools::Itertools;
use log::*;
use petgraph::{algo::tarjan_scc, graph::DiGraph};

use crate::{
    announcement::Announcement,
    node::{AsNode, RibChange},
    records::{RecordSource, RelationshipRecord, SourceRelation},
    types::{AsRelation, Asn, Ipv4Prefix, BLACKHOLE_ASN},
};

/// Which neighbor classes a propagation step sends to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SendScope {
    pub to_providers: bool,
    pub to_peers: bool,
    pub to_customers: bool,
}

/// The AS-level topology: every representative AS node, the rank index used
/// by the propagation sweeps, and the translation maps produced by cycle
/// compression and stub elision.
///
/// The graph also owns the set of attacker ASNs (borrowed by the ROV ingress
/// checks of the nodes) and the optional inverse-results map recording which
/// ASes did *not* install a given route.
#[derive(Debug, Clone, Default)]
pub struct AsGraph {
    ases: HashMap<Asn, AsNode>,
    ases_by_rank: Vec<Vec<Asn>>,
    component_translation: HashMap<Asn, Asn>,
    stubs_to_parents: HashMap<Asn, Asn>,
    attackers: HashSet<Asn>,
    inverse_results: HashMap<(Ipv4Prefix, Asn), HashSet<Asn>>,
}

impl AsGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from the relationship stream of a record source, then
    /// compress cycles, optionally elide stubs, and assign ranks.
    pub fn from_source<S: RecordSource>(source: &mut S, elide_stubs: bool) -> Self {
        let mut graph = Self::new();
        for record in source.relationships() {
            graph.add_relationship_record(&record);
        }
        graph.process(elide_stubs);
        graph
    }

    /// Add one relationship record, updating both endpoints.
    pub fn add_relationship_record(&mut self, record: &RelationshipRecord) {
        let relation = match record.relation {
            SourceRelation::ProviderOf => AsRelation::Customer,
            SourceRelation::PeerOf => AsRelation::Peer,
        };
        self.add_relationship(Asn(record.asn_a), Asn(record.asn_b), relation);
    }

    /// Connect `a` and `b`, where `relation` is the role `b` plays towards
    /// `a` (e.g. `AsRelation::Customer` means `a` is a provider of `b`).
    /// Unknown ASNs create new nodes. Duplicate edges are silently dropped,
    /// including rows that would relate an already-related pair under a
    /// second role.
    pub fn add_relationship(&mut self, a: Asn, b: Asn, relation: AsRelation) {
        if a == b {
            return;
        }
        self.ases.entry(a).or_insert_with(|| AsNode::new(a));
        self.ases.entry(b).or_insert_with(|| AsNode::new(b));
        if self.ases[&a].is_neighbor(b) {
            return;
        }
        if let Some(node) = self.ases.get_mut(&a) {
            node.add_neighbor(b, relation);
        }
        if let Some(node) = self.ases.get_mut(&b) {
            node.add_neighbor(a, relation.dual());
        }
    }

    /// Compress cycles, optionally remove stubs, and assign ranks. Must be
    /// called before announcements are seeded, and again after any edge
    /// removal between rounds.
    pub fn process(&mut self, elide_stubs: bool) {
        self.compress_cycles();
        if elide_stubs {
            self.elide_stubs();
        }
        self.assign_ranks();
    }

    /// Detect strongly connected components of the provider→customer
    /// subgraph and collapse every non-trivial component into its smallest
    /// member. Peer edges are ignored for detection but rewritten through
    /// the translation afterwards; self-loops are discarded.
    fn compress_cycles(&mut self) {
        let mut pg: DiGraph<Asn, ()> = DiGraph::new();
        let mut indices = HashMap::new();
        for asn in self.ases.keys().sorted() {
            indices.insert(*asn, pg.add_node(*asn));
        }
        for (asn, node) in &self.ases {
            for customer in &node.customers {
                if let (Some(&u), Some(&v)) = (indices.get(asn), indices.get(customer)) {
                    pg.add_edge(u, v, ());
                }
            }
        }

        for scc in tarjan_scc(&pg) {
            if scc.len() <= 1 {
                continue;
            }
            let mut members: Vec<Asn> = scc.iter().map(|i| pg[*i]).collect();
            members.sort();
            let representative = members[0];
            debug!(
                "collapsing a customer-provider cycle of {} ASes into {}",
                members.len(),
                representative
            );
            for member in &members[1..] {
                if let Some(node) = self.ases.remove(member) {
                    if let Some(rep) = self.ases.get_mut(&representative) {
                        rep.providers.extend(node.providers.iter().copied());
                        rep.peers.extend(node.peers.iter().copied());
                        rep.customers.extend(node.customers.iter().copied());
                        rep.member_ases.push(*member);
                        rep.member_ases.extend(node.member_ases.iter().copied());
                    }
                }
                self.component_translation.insert(*member, representative);
            }
        }

        self.rebuild_translated_edges();
    }

    /// Rewrite every neighbor set through the component translation,
    /// restoring edge symmetry, dropping self-loops and deduplicating.
    fn rebuild_translated_edges(&mut self) {
        let mut provider_edges: BTreeSet<(Asn, Asn)> = BTreeSet::new();
        let mut peer_edges: BTreeSet<(Asn, Asn)> = BTreeSet::new();
        for (asn, node) in &self.ases {
            for customer in &node.customers {
                let customer = self.translate_asn(*customer);
                if customer != *asn {
                    provider_edges.insert((*asn, customer));
                }
            }
            for provider in &node.providers {
                let provider = self.translate_asn(*provider);
                if provider != *asn {
                    provider_edges.insert((provider, *asn));
                }
            }
            for peer in &node.peers {
                let peer = self.translate_asn(*peer);
                if peer != *asn {
                    peer_edges.insert(((*asn).min(peer), (*asn).max(peer)));
                }
            }
        }
        for node in self.ases.values_mut() {
            node.providers.clear();
            node.peers.clear();
            node.customers.clear();
        }
        for (provider, customer) in provider_edges {
            self.add_relationship(provider, customer, AsRelation::Customer);
        }
        for (a, b) in peer_edges {
            self.add_relationship(a, b, AsRelation::Peer);
        }
    }

    /// Remove every AS with exactly one provider and no peers or customers,
    /// recording its parent so that results can be synthesized for it.
    fn elide_stubs(&mut self) {
        let stubs: Vec<(Asn, Asn)> = self
            .ases
            .iter()
            .filter(|(_, node)| {
                node.customers.is_empty() && node.peers.is_empty() && node.providers.len() == 1
            })
            .filter_map(|(asn, node)| node.providers.iter().next().map(|p| (*asn, *p)))
            .sorted()
            .collect();
        debug!("removing {} stub ASes", stubs.len());
        for (stub, parent) in stubs {
            self.ases.remove(&stub);
            if let Some(node) = self.ases.get_mut(&parent) {
                node.customers.remove(&stub);
            }
            self.stubs_to_parents.insert(stub, parent);
        }
    }

    /// Assign every AS its height in the provider-customer DAG: 0 for ASes
    /// without customers, and `max(customer ranks) + 1` otherwise. Builds
    /// the rank index used by the propagation sweeps.
    fn assign_ranks(&mut self) {
        let mut pending: HashMap<Asn, usize> = self
            .ases
            .iter()
            .map(|(asn, node)| (*asn, node.customers.len()))
            .collect();
        let mut queue: VecDeque<Asn> = VecDeque::new();
        for (asn, node) in self.ases.iter_mut().sorted_by_key(|(asn, _)| **asn) {
            if node.customers.is_empty() {
                node.rank = 0;
                queue.push_back(*asn);
            }
        }
        while let Some(asn) = queue.pop_front() {
            let rank = match self.ases.get(&asn) {
                Some(node) => node.rank,
                None => continue,
            };
            let providers: Vec<Asn> = match self.ases.get(&asn) {
                Some(node) => node.providers.iter().copied().sorted().collect(),
                None => continue,
            };
            for provider in providers {
                if let Some(node) = self.ases.get_mut(&provider) {
                    node.rank = node.rank.max(rank + 1);
                }
                if let Some(count) = pending.get_mut(&provider) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(provider);
                    }
                }
            }
        }

        let max_rank = self
            .ases
            .values()
            .map(|node| node.rank)
            .max()
            .unwrap_or(-1);
        self.ases_by_rank = vec![Vec::new(); (max_rank + 1).max(0) as usize];
        for (asn, node) in self.ases.iter().sorted_by_key(|(asn, _)| **asn) {
            if node.rank >= 0 {
                self.ases_by_rank[node.rank as usize].push(*asn);
            } else {
                warn!("{asn} kept an unassigned rank; it will not propagate");
            }
        }
    }

    /// Resolve an ASN to the node that answers for it: the representative of
    /// its collapsed component, or the representative of its parent for an
    /// elided stub. Identity for every other ASN.
    pub fn translate_asn(&self, asn: Asn) -> Asn {
        let mut current = asn;
        // translation chains are short; the bound guards against dirty maps
        for _ in 0..64 {
            if let Some(&rep) = self.component_translation.get(&current) {
                if rep == current {
                    break;
                }
                current = rep;
            } else if let Some(&parent) = self.stubs_to_parents.get(&current) {
                current = parent;
            } else {
                break;
            }
        }
        current
    }

    /// A reference to the node with the given (representative) ASN.
    pub fn get(&self, asn: Asn) -> Option<&AsNode> {
        self.ases.get(&asn)
    }

    /// A mutable reference to the node with the given (representative) ASN.
    pub fn get_mut(&mut self, asn: Asn) -> Option<&mut AsNode> {
        self.ases.get_mut(&asn)
    }

    /// All representative AS nodes.
    pub fn ases(&self) -> &HashMap<Asn, AsNode> {
        &self.ases
    }

    /// The rank index: `ases_by_rank()[r]` holds every ASN of rank `r`.
    pub fn ases_by_rank(&self) -> &[Vec<Asn>] {
        &self.ases_by_rank
    }

    /// The mapping from collapsed ASNs to their representative.
    pub fn component_translation(&self) -> &HashMap<Asn, Asn> {
        &self.component_translation
    }

    /// The mapping from elided stub ASNs to their single provider.
    pub fn stubs_to_parents(&self) -> &HashMap<Asn, Asn> {
        &self.stubs_to_parents
    }

    /// Register an ASN as an attacker. ROV-aware nodes reject announcements
    /// originated by any registered attacker.
    pub fn add_attacker(&mut self, asn: Asn) {
        self.attackers.insert(asn);
    }

    /// The set of attacker ASNs.
    pub fn attackers(&self) -> &HashSet<Asn> {
        &self.attackers
    }

    /// The inverse-results map: for each seeded (prefix, origin) pair, the
    /// set of ASes that did *not* install that route.
    pub fn inverse_results(&self) -> &HashMap<(Ipv4Prefix, Asn), HashSet<Asn>> {
        &self.inverse_results
    }

    /// Start tracking a (prefix, origin) pair in the inverse-results map.
    /// Initially every AS counts as not having the route.
    pub(crate) fn register_inverse(&mut self, prefix: Ipv4Prefix, origin: Asn) {
        let ases = &self.ases;
        self.inverse_results
            .entry((prefix, origin))
            .or_insert_with(|| ases.keys().copied().collect());
    }

    /// Fold a batch of loc-RIB changes of one AS into the inverse map.
    fn apply_rib_changes(
        inverse: &mut HashMap<(Ipv4Prefix, Asn), HashSet<Asn>>,
        asn: Asn,
        changes: &[RibChange],
    ) {
        if inverse.is_empty() {
            return;
        }
        for change in changes {
            if let Some(old) = change.displaced {
                if let Some(set) = inverse.get_mut(&(change.prefix, old)) {
                    set.insert(asn);
                }
            }
            if let Some(new) = change.installed {
                if let Some(set) = inverse.get_mut(&(change.prefix, new)) {
                    set.remove(&asn);
                }
            }
        }
    }

    /// Install a seeded announcement directly into an AS's loc-RIB.
    pub(crate) fn seed_announcement(&mut self, asn: Asn, ann: Announcement, random_tiebreak: bool) {
        let change = match self.ases.get_mut(&asn) {
            Some(node) => node.process_announcement(ann, random_tiebreak),
            None => return,
        };
        if let Some(change) = change {
            Self::apply_rib_changes(&mut self.inverse_results, asn, &[change]);
        }
    }

    /// Upward sweep: from rank 0 to the top, drain each AS's queue and
    /// export its customer-band routes to its providers and peers.
    pub fn propagate_up(&mut self, random_tiebreak: bool) {
        trace!("upward propagation over {} ranks", self.ases_by_rank.len());
        for level in 0..self.ases_by_rank.len() {
            for asn in self.ases_by_rank[level].clone() {
                self.process_node(asn, random_tiebreak);
                self.send_all_announcements(
                    asn,
                    SendScope {
                        to_providers: true,
                        to_peers: true,
                        to_customers: false,
                    },
                );
            }
        }
    }

    /// Downward sweep: from the top rank to 0, drain each AS's queue and
    /// export every installed route to its customers.
    pub fn propagate_down(&mut self, random_tiebreak: bool) {
        trace!("downward propagation over {} ranks", self.ases_by_rank.len());
        for level in (0..self.ases_by_rank.len()).rev() {
            for asn in self.ases_by_rank[level].clone() {
                self.process_node(asn, random_tiebreak);
                self.send_all_announcements(
                    asn,
                    SendScope {
                        to_providers: false,
                        to_peers: false,
                        to_customers: true,
                    },
                );
            }
        }
    }

    /// Drain one AS's incoming queue and cascade any withdrawals it emitted.
    fn process_node(&mut self, asn: Asn, random_tiebreak: bool) {
        let changes = match self.ases.get_mut(&asn) {
            Some(node) => node.process_incoming(random_tiebreak),
            None => return,
        };
        Self::apply_rib_changes(&mut self.inverse_results, asn, &changes);
        self.process_withdrawals(asn);
    }

    /// Cascade the pending withdrawals of an AS: a neighbor that installed
    /// the withdrawn route from the withdrawing AS drops it and withdraws
    /// onward. Withdrawals for routes not installed are ignored.
    pub(crate) fn process_withdrawals(&mut self, asn: Asn) {
        let mut stack: Vec<(Asn, Announcement)> = match self.ases.get_mut(&asn) {
            Some(node) => std::mem::take(&mut node.withdrawals)
                .into_iter()
                .map(|w| (asn, w))
                .collect(),
            None => return,
        };
        while let Some((from, withdrawal)) = stack.pop() {
            let neighbors: Vec<Asn> = match self.ases.get(&from) {
                Some(node) => node
                    .providers
                    .iter()
                    .chain(node.peers.iter())
                    .chain(node.customers.iter())
                    .copied()
                    .sorted()
                    .collect(),
                None => continue,
            };
            for neighbor in neighbors {
                let change = match self.ases.get_mut(&neighbor) {
                    Some(node) => {
                        // the neighbor only reacts if its installed route
                        // came from the withdrawing AS
                        let mut w = withdrawal.clone();
                        w.received_from_asn = from;
                        node.apply_withdrawal(&w)
                    }
                    None => None,
                };
                if let Some(change) = change {
                    Self::apply_rib_changes(&mut self.inverse_results, neighbor, &[change]);
                    if let Some(node) = self.ases.get_mut(&neighbor) {
                        for w in std::mem::take(&mut node.withdrawals) {
                            stack.push((neighbor, w));
                        }
                    }
                }
            }
        }
    }

    /// Export the loc-RIB of one AS to the selected neighbor classes.
    ///
    /// Valley-free egress: only customer-band routes go to providers and
    /// peers; every route goes to customers. A route is never sent back to
    /// the neighbor it was learned from, nor to a neighbor already on its
    /// AS-path. The ROV++ 0.2bis/0.3 policies strip blackhole and preventive
    /// entries from the provider and peer vectors.
    fn send_all_announcements(&mut self, asn: Asn, scope: SendScope) {
        let (to_providers, to_peers, to_customers, providers, peers, customers) = {
            let node = match self.ases.get(&asn) {
                Some(node) => node,
                None => return,
            };
            let policy = node.policy_vector.first().copied().unwrap_or_default();
            let strip_defensive = policy.strips_defensive_egress();

            let mut to_providers: Vec<(Announcement, Asn)> = Vec::new();
            let mut to_peers: Vec<(Announcement, Asn)> = Vec::new();
            let mut to_customers: Vec<(Announcement, Asn)> = Vec::new();
            for ann in node.loc_rib.values() {
                let weight = ann.path_weight().saturating_sub(1);
                let mut as_path = ann.as_path.clone();
                if as_path.first() != Some(&asn) {
                    as_path.insert(0, asn);
                }
                let learned_from = ann.received_from_asn;
                let template = Announcement {
                    received_from_asn: asn,
                    from_monitor: false,
                    as_path,
                    tiebreak_override: if ann.tiebreak_override == Asn(0) {
                        Asn(0)
                    } else {
                        asn
                    },
                    ..ann.clone()
                };
                let defensive = ann.origin == BLACKHOLE_ASN
                    || node
                        .preventive_anns
                        .iter()
                        .any(|p| p.prefix == ann.prefix && p.origin == ann.origin);
                let upstream_ok = ann.from_customer_band() && !(strip_defensive && defensive);
                if scope.to_providers && upstream_ok {
                    let mut copy = template.clone();
                    copy.priority = AsRelation::Customer.base_priority() + weight;
                    to_providers.push((copy, learned_from));
                }
                if scope.to_peers && upstream_ok {
                    let mut copy = template.clone();
                    copy.priority = AsRelation::Peer.base_priority() + weight;
                    to_peers.push((copy, learned_from));
                }
                if scope.to_customers {
                    let mut copy = template;
                    copy.priority = AsRelation::Provider.base_priority() + weight;
                    to_customers.push((copy, learned_from));
                }
            }
            (
                to_providers,
                to_peers,
                to_customers,
                node.providers.iter().copied().sorted().collect::<Vec<_>>(),
                node.peers.iter().copied().sorted().collect::<Vec<_>>(),
                node.customers.iter().copied().sorted().collect::<Vec<_>>(),
            )
        };

        let Self {
            ases, attackers, ..
        } = self;
        for provider in providers {
            Self::deliver(ases, attackers, provider, &to_providers);
        }
        for peer in peers {
            Self::deliver(ases, attackers, peer, &to_peers);
        }
        for customer in customers {
            Self::deliver(ases, attackers, customer, &to_customers);
        }
    }

    /// Hand a batch of copies to one neighbor, applying split-horizon and
    /// the AS-path loop filter before its ingress policy runs.
    fn deliver(
        ases: &mut HashMap<Asn, AsNode>,
        attackers: &HashSet<Asn>,
        target: Asn,
        anns: &[(Announcement, Asn)],
    ) {
        let node = match ases.get_mut(&target) {
            Some(node) => node,
            None => return,
        };
        let batch: Vec<Announcement> = anns
            .iter()
            .filter(|(ann, learned_from)| *learned_from != target && !ann.as_path.contains(&target))
            .map(|(ann, _)| ann.clone())
            .collect();
        if !batch.is_empty() {
            node.receive(batch, attackers);
        }
    }

    /// Drop one loc-RIB entry (the loop check uses this), keeping the
    /// inverse map consistent.
    pub(crate) fn drop_rib_entry(&mut self, asn: Asn, prefix: Ipv4Prefix) {
        let removed = match self.ases.get_mut(&asn) {
            Some(node) => node.loc_rib.remove(&prefix),
            None => None,
        };
        if let Some(removed) = removed {
            let change = RibChange {
                prefix,
                installed: None,
                displaced: Some(removed.origin),
            };
            Self::apply_rib_changes(&mut self.inverse_results, asn, &[change]);
        }
    }

    /// Remove the edge between two ASes, whatever its role.
    pub(crate) fn remove_edge(&mut self, a: Asn, b: Asn) {
        if let Some(node) = self.ases.get_mut(&a) {
            node.remove_neighbor(b);
        }
        if let Some(node) = self.ases.get_mut(&b) {
            node.remove_neighbor(a);
        }
    }

    /// Per-block reset: empty every AS's routing state and the inverse map,
    /// keeping the topology intact.
    pub fn clear_routing_state(&mut self) {
        for node in self.ases.values_mut() {
            node.clear();
        }
        self.inverse_results.clear();
    }

    /// Multi-round reset: forget ranks, collapsed components and elided
    /// stubs so that [`AsGraph::process`] can recompute them on the mutated
    /// topology.
    pub fn reset_topology_state(&mut self) {
        for node in self.ases.values_mut() {
            node.rank = -1;
            node.member_ases.clear();
        }
        self.ases_by_rank.clear();
        self.component_translation.clear();
        self.stubs_to_parents.clear();
        self.inverse_results.clear();
    }

    /// The number of representative ASes in the graph.
    pub fn num_ases(&self) -> usize {
        self.ases.len()
    }
}
