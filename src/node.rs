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

//! Module defining a single AS node with its neighbor sets, route tables and
//! policy hooks.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
};

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    announcement::Announcement,
    policy::PolicyTag,
    types::{AsRelation, Asn, Ipv4Prefix, BLACKHOLE_ASN},
};

/// The effect of installing an announcement into a loc-RIB: which origin got
/// installed for the prefix, and which origin (if any) lost its slot. Used by
/// the graph to maintain the inverse-results map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RibChange {
    /// The prefix whose entry changed.
    pub prefix: Ipv4Prefix,
    /// The origin of the newly installed route, if one was installed.
    pub installed: Option<Asn>,
    /// The origin of the route that was removed or replaced.
    pub displaced: Option<Asn>,
}

/// How a single best-path decision was resolved.
enum Decision {
    Install,
    Replace { by_tiebreak: bool },
    Reject,
}

/// A single AS in the graph: its business relationships, its route tables,
/// and its admission policy.
///
/// The incoming queue collects announcements received during the current
/// visit of the propagation sweep; best-path selection only happens when the
/// queue is drained. The loc-RIB holds exactly one route per prefix; the
/// depref-RIB holds the second-best route of the round for analysis.
#[derive(Debug, Clone)]
pub struct AsNode {
    asn: Asn,
    /// Height in the provider-customer DAG, `-1` until assigned.
    pub(crate) rank: i32,
    /// Neighbors selling transit to this AS.
    pub(crate) providers: HashSet<Asn>,
    /// Settlement-free neighbors.
    pub(crate) peers: HashSet<Asn>,
    /// Neighbors buying transit from this AS.
    pub(crate) customers: HashSet<Asn>,
    /// Announcements received this round, not yet selected.
    pub(crate) incoming: Vec<Announcement>,
    /// The installed best route per prefix.
    pub(crate) loc_rib: BTreeMap<Ipv4Prefix, Announcement>,
    /// The second-best route of the round per prefix.
    pub(crate) depref_rib: BTreeMap<Ipv4Prefix, Announcement>,
    /// ASNs collapsed into this node during cycle compression.
    pub(crate) member_ases: Vec<Asn>,
    /// Admission policy; only the first tag is consulted.
    pub(crate) policy_vector: Vec<PolicyTag>,
    /// Withdrawals pending to be cascaded to the neighbors.
    pub(crate) withdrawals: Vec<Announcement>,
    /// Preventive announcements held by ROV++ 0.2bis / 0.3 nodes.
    pub(crate) preventive_anns: Vec<Announcement>,
}

impl AsNode {
    /// Create a new AS with the given number and empty state.
    pub fn new(asn: Asn) -> Self {
        Self {
            asn,
            rank: -1,
            providers: HashSet::new(),
            peers: HashSet::new(),
            customers: HashSet::new(),
            incoming: Vec::new(),
            loc_rib: BTreeMap::new(),
            depref_rib: BTreeMap::new(),
            member_ases: Vec::new(),
            policy_vector: Vec::new(),
            withdrawals: Vec::new(),
            preventive_anns: Vec::new(),
        }
    }

    /// The AS number of this node.
    pub fn asn(&self) -> Asn {
        self.asn
    }

    /// The height of this AS in the provider-customer DAG, or `-1` if ranks
    /// have not been assigned yet.
    pub fn rank(&self) -> i32 {
        self.rank
    }

    /// The neighbors selling transit to this AS.
    pub fn providers(&self) -> &HashSet<Asn> {
        &self.providers
    }

    /// The settlement-free neighbors of this AS.
    pub fn peers(&self) -> &HashSet<Asn> {
        &self.peers
    }

    /// The neighbors buying transit from this AS.
    pub fn customers(&self) -> &HashSet<Asn> {
        &self.customers
    }

    /// The installed best route per prefix.
    pub fn loc_rib(&self) -> &BTreeMap<Ipv4Prefix, Announcement> {
        &self.loc_rib
    }

    /// The second-best route of the round per prefix.
    pub fn depref_rib(&self) -> &BTreeMap<Ipv4Prefix, Announcement> {
        &self.depref_rib
    }

    /// The ASNs collapsed into this node during cycle compression. Non-empty
    /// only for the representative of a non-trivial strongly connected
    /// component.
    pub fn member_ases(&self) -> &[Asn] {
        &self.member_ases
    }

    /// The policy vector of this AS. Only the first tag is consulted.
    pub fn policy_vector(&self) -> &[PolicyTag] {
        &self.policy_vector
    }

    /// Replace the policy vector of this AS.
    pub fn set_policy_vector(&mut self, tags: Vec<PolicyTag>) {
        self.policy_vector = tags;
    }

    /// Register a preventive announcement on this AS. Preventive entries are
    /// stripped from provider and peer egress vectors by the ROV++ 0.2bis
    /// and 0.3 policies.
    pub fn add_preventive(&mut self, ann: Announcement) {
        self.preventive_anns.push(ann);
    }

    /// The preventive announcements held by this AS.
    pub fn preventive_anns(&self) -> &[Announcement] {
        &self.preventive_anns
    }

    /// Add a neighbor under the given role.
    pub(crate) fn add_neighbor(&mut self, asn: Asn, relation: AsRelation) {
        match relation {
            AsRelation::Provider => self.providers.insert(asn),
            AsRelation::Peer => self.peers.insert(asn),
            AsRelation::Customer => self.customers.insert(asn),
        };
    }

    /// Remove a neighbor from whichever set holds it.
    pub(crate) fn remove_neighbor(&mut self, asn: Asn) {
        self.providers.remove(&asn);
        self.peers.remove(&asn);
        self.customers.remove(&asn);
    }

    /// The role the given AS plays towards this one, or `None` if they are
    /// not neighbors.
    pub fn relation_to(&self, asn: Asn) -> Option<AsRelation> {
        if self.providers.contains(&asn) {
            Some(AsRelation::Provider)
        } else if self.peers.contains(&asn) {
            Some(AsRelation::Peer)
        } else if self.customers.contains(&asn) {
            Some(AsRelation::Customer)
        } else {
            None
        }
    }

    /// `true` if the given AS appears in any neighbor set.
    pub fn is_neighbor(&self, asn: Asn) -> bool {
        self.providers.contains(&asn) || self.peers.contains(&asn) || self.customers.contains(&asn)
    }

    /// `true` if the loc-RIB holds any entry for the announcement's prefix.
    pub fn already_received(&self, ann: &Announcement) -> bool {
        self.loc_rib.contains_key(&ann.prefix)
    }

    /// Append a batch of announcements to the incoming queue, after applying
    /// the ingress policy. No best-path decision is made here.
    ///
    /// ROV variants reject attacker-origin announcements; the ROV++ family
    /// replaces each rejection with a blackhole announcement for the same
    /// prefix.
    pub fn receive<I>(&mut self, anns: I, attackers: &HashSet<Asn>)
    where
        I: IntoIterator<Item = Announcement>,
    {
        let policy = self.policy_vector.first().copied().unwrap_or_default();
        for mut ann in anns {
            if policy.accepts(&ann, attackers) {
                ann.policy_index = policy.index();
                self.incoming.push(ann);
            } else if policy.blackholes_on_reject() {
                self.incoming.push(Announcement {
                    origin: BLACKHOLE_ASN,
                    received_from_asn: BLACKHOLE_ASN,
                    from_monitor: false,
                    from_attacker: false,
                    policy_index: policy.index(),
                    tiebreak_override: Asn(0),
                    ..ann
                });
            }
        }
    }

    /// Drain the incoming queue into the loc-RIB, running best-path
    /// selection per prefix. Monitor entries are never replaced. Returns the
    /// list of loc-RIB changes for inverse-results bookkeeping.
    pub fn process_incoming(&mut self, random_tiebreak: bool) -> Vec<RibChange> {
        let mut changes = Vec::new();
        let incoming = std::mem::take(&mut self.incoming);
        for ann in incoming {
            if ann.withdraw {
                if let Some(change) = self.apply_withdrawal(&ann) {
                    changes.push(change);
                }
                continue;
            }
            if let Some(change) = self.consider(ann, random_tiebreak) {
                changes.push(change);
            }
        }
        changes
    }

    /// Install a single announcement directly, bypassing the incoming queue.
    /// This is the seeding path: an existing monitor entry is replaced only
    /// when the new entry is itself a monitor entry that outranks it.
    pub fn process_announcement(
        &mut self,
        ann: Announcement,
        random_tiebreak: bool,
    ) -> Option<RibChange> {
        let monitor_wins = match self.loc_rib.get(&ann.prefix) {
            Some(cur) if cur.from_monitor => {
                Some(ann.from_monitor && ann.compare(cur) == Ordering::Greater)
            }
            _ => None,
        };
        match monitor_wins {
            Some(true) => {
                let prefix = ann.prefix;
                let origin = ann.origin;
                let displaced = self.loc_rib.insert(prefix, ann).map(|old| {
                    let origin = old.origin;
                    self.record_depref(old);
                    origin
                });
                Some(RibChange {
                    prefix,
                    installed: Some(origin),
                    displaced,
                })
            }
            Some(false) => {
                self.record_depref(ann);
                None
            }
            None => self.consider(ann, random_tiebreak),
        }
    }

    /// Run the best-path decision for one announcement against the current
    /// loc-RIB entry for its prefix.
    fn consider(&mut self, mut ann: Announcement, random_tiebreak: bool) -> Option<RibChange> {
        let prefix = ann.prefix;
        let decision = match self.loc_rib.get(&prefix) {
            None => Decision::Install,
            Some(cur) if cur.from_monitor => Decision::Reject,
            Some(cur) => match ann.compare(cur) {
                Ordering::Greater => Decision::Replace { by_tiebreak: false },
                Ordering::Less => Decision::Reject,
                Ordering::Equal => {
                    if random_tiebreak && self.random_tiebreak_bit(&prefix) {
                        Decision::Replace { by_tiebreak: true }
                    } else {
                        // the incumbent wins a deterministic tie
                        Decision::Reject
                    }
                }
            },
        };
        match decision {
            Decision::Install => {
                let origin = ann.origin;
                self.loc_rib.insert(prefix, ann);
                Some(RibChange {
                    prefix,
                    installed: Some(origin),
                    displaced: None,
                })
            }
            Decision::Replace { by_tiebreak } => {
                if by_tiebreak {
                    ann.tiebreak_override = self.asn;
                }
                let origin = ann.origin;
                let old = self.loc_rib.insert(prefix, ann);
                let displaced = old.map(|old| {
                    let origin = old.origin;
                    if !self.policy_vector.is_empty() {
                        let mut w = old.clone();
                        w.withdraw = true;
                        self.withdrawals.push(w);
                    }
                    self.record_depref(old);
                    origin
                });
                Some(RibChange {
                    prefix,
                    installed: Some(origin),
                    displaced,
                })
            }
            Decision::Reject => {
                self.record_depref(ann);
                None
            }
        }
    }

    /// Apply an incoming withdrawal: drop the loc-RIB entry for the prefix
    /// if it was learned from the withdrawing AS, and enqueue the removal
    /// for further cascading. Withdrawals for routes not installed are
    /// ignored.
    pub(crate) fn apply_withdrawal(&mut self, w: &Announcement) -> Option<RibChange> {
        let matches = self.loc_rib.get(&w.prefix).map_or(false, |cur| {
            !cur.from_monitor && cur.received_from_asn == w.received_from_asn
        });
        if !matches {
            return None;
        }
        let removed = self.loc_rib.remove(&w.prefix)?;
        let displaced = removed.origin;
        let mut onward = removed;
        onward.withdraw = true;
        self.withdrawals.push(onward);
        Some(RibChange {
            prefix: w.prefix,
            installed: None,
            displaced: Some(displaced),
        })
    }

    /// Record a losing announcement in the depref-RIB. A prior depref entry
    /// is only overwritten by a loser that outranks it.
    fn record_depref(&mut self, loser: Announcement) {
        match self.depref_rib.get(&loser.prefix) {
            Some(cur) if loser.compare(cur) != Ordering::Greater => {}
            _ => {
                self.depref_rib.insert(loser.prefix, loser);
            }
        }
    }

    /// The deterministic pseudo-random tiebreak bit of this AS for a prefix,
    /// seeded by the AS's own number. Stable across rounds and runs.
    fn random_tiebreak_bit(&self, prefix: &Ipv4Prefix) -> bool {
        let seed = ((self.asn.0 as u64) << 32)
            ^ ((prefix.addr() as u64) << 8)
            ^ (prefix.mask() as u64);
        SmallRng::seed_from_u64(seed).gen()
    }

    /// Empty the incoming queue, the loc-RIB, the depref-RIB and the pending
    /// withdrawals.
    pub fn clear(&mut self) {
        self.incoming.clear();
        self.loc_rib.clear();
        self.depref_rib.clear();
        self.withdrawals.clear();
    }
}
