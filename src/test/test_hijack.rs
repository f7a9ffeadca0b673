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

use pretty_assertions::assert_eq;

use super::{ann, config, p16};
use crate::{
    graph::AsGraph,
    hijack::RovExtrapolator,
    policy::PolicyTag,
    records::{MemorySink, MemorySource},
    types::{AsRelation, Asn, BLACKHOLE_ASN, HIJACK_ORIGIN_ASN, LEGITIMATE_ORIGIN_ASN},
};

/// Victim 2 and attacker 3 share the provider 1; the victim originates the
/// prefix, the attacker forges an announcement for the same prefix.
fn shared_provider_source() -> MemorySource {
    let mut source = MemorySource::new();
    source.provider_of(1, 2);
    source.provider_of(1, 3);
    source.announce("137.99.0.0", "255.255.0.0", &[2]);
    source.attack(3, 2, "137.99.0.0", "255.255.0.0", &[3]);
    source
}

#[test]
fn rov_rejects_the_hijack() {
    let mut source = shared_provider_source();
    let mut rov = RovExtrapolator::new(config());
    rov.build_graph(&mut source);
    rov.graph_mut()
        .get_mut(Asn(1))
        .unwrap()
        .set_policy_vector(vec![PolicyTag::Rov]);

    let mut sink = MemorySink::new();
    rov.perform_propagation(&mut source, &mut sink).unwrap();

    // the victim keeps its own legitimate route
    let at_victim = &rov.graph().get(Asn(2)).unwrap().loc_rib()[&p16()];
    assert!(!at_victim.from_attacker);
    assert_eq!(at_victim.received_from_asn, LEGITIMATE_ORIGIN_ASN);
    // the provider installed the victim's route; the forgery was rejected
    // at its ingress
    let at_provider = &rov.graph().get(Asn(1)).unwrap().loc_rib()[&p16()];
    assert_eq!(at_provider.received_from_asn, Asn(2));
    assert_eq!(at_provider.origin, Asn(2));
    assert!(!at_provider.from_attacker);
    // the attempt is counted but not successful
    assert_eq!(rov.attack_stats(), (0, 1));
    assert_eq!(sink.attack_stats.len(), 1);
    assert_eq!(sink.attack_stats[0].successful_attacks, 0);
    assert_eq!(sink.attack_stats[0].total_attacks, 1);
}

#[test]
fn hijack_origins_carry_sentinels() {
    let mut source = shared_provider_source();
    let mut rov = RovExtrapolator::new(config());
    let mut sink = MemorySink::new();
    rov.perform_propagation(&mut source, &mut sink).unwrap();

    let at_attacker = &rov.graph().get(Asn(3)).unwrap().loc_rib()[&p16()];
    assert!(at_attacker.from_attacker);
    assert_eq!(at_attacker.received_from_asn, HIJACK_ORIGIN_ASN);
    let at_victim = &rov.graph().get(Asn(2)).unwrap().loc_rib()[&p16()];
    assert_eq!(at_victim.received_from_asn, LEGITIMATE_ORIGIN_ASN);
}

/// Topology for the blackhole scenarios: X (4) is the ROV++ deployer with
/// the customers A (3, the attacker) and C (5), and a peering with Y (1);
/// Y sells transit to V (2).
fn blackhole_source() -> MemorySource {
    let mut source = MemorySource::new();
    source.provider_of(1, 2);
    source.peer_of(1, 4);
    source.provider_of(4, 3);
    source.provider_of(4, 5);
    source.attack(3, 2, "137.99.0.0", "255.255.0.0", &[3]);
    source
}

#[test]
fn rovpp_blackhole_spreads_like_a_route() {
    let mut source = blackhole_source();
    let mut rov = RovExtrapolator::new(config());
    rov.build_graph(&mut source);
    rov.graph_mut()
        .get_mut(Asn(4))
        .unwrap()
        .set_policy_vector(vec![PolicyTag::Rovpp]);

    let mut sink = MemorySink::new();
    rov.perform_propagation(&mut source, &mut sink).unwrap();

    // the deployer installed a blackhole in place of the forgery
    let at_x = &rov.graph().get(Asn(4)).unwrap().loc_rib()[&p16()];
    assert_eq!(at_x.origin, BLACKHOLE_ASN);
    assert_eq!(at_x.received_from_asn, BLACKHOLE_ASN);
    assert_eq!(at_x.priority, 298);
    // plain ROV++ propagates the blackhole like any customer-band route:
    // the peer and the customers learn it
    let at_y = &rov.graph().get(Asn(1)).unwrap().loc_rib()[&p16()];
    assert_eq!(at_y.origin, BLACKHOLE_ASN);
    assert_eq!(at_y.priority, 197);
    let at_c = &rov.graph().get(Asn(5)).unwrap().loc_rib()[&p16()];
    assert_eq!(at_c.origin, BLACKHOLE_ASN);
    assert_eq!(at_c.priority, 97);
    // the victim ends up blackholed through its provider, which does not
    // count as a compromise
    let at_v = &rov.graph().get(Asn(2)).unwrap().loc_rib()[&p16()];
    assert_eq!(at_v.origin, BLACKHOLE_ASN);
    assert!(!at_v.from_attacker);
    assert_eq!(rov.attack_stats(), (0, 1));
    // every blackhole row also lands in the parallel table
    assert!(sink.blackholes.iter().any(|row| row.asn == Asn(4)));
    assert!(sink
        .blackholes
        .iter()
        .all(|row| row.origin == BLACKHOLE_ASN));
}

#[test]
fn rovpp_bis_keeps_blackholes_away_from_peers() {
    let mut source = blackhole_source();
    let mut rov = RovExtrapolator::new(config());
    rov.build_graph(&mut source);
    rov.graph_mut()
        .get_mut(Asn(4))
        .unwrap()
        .set_policy_vector(vec![PolicyTag::RovppBis]);

    let mut sink = MemorySink::new();
    rov.perform_propagation(&mut source, &mut sink).unwrap();

    // the blackhole still leaks to the customer...
    let at_c = &rov.graph().get(Asn(5)).unwrap().loc_rib()[&p16()];
    assert_eq!(at_c.origin, BLACKHOLE_ASN);
    // ...but neither the peer nor anything behind it sees it
    assert!(rov.graph().get(Asn(1)).unwrap().loc_rib().is_empty());
    assert!(rov.graph().get(Asn(2)).unwrap().loc_rib().is_empty());
}

#[test]
fn withdrawal_cascade_unwinds_stale_routes() {
    let mut g = AsGraph::new();
    g.add_relationship(Asn(1), Asn(2), AsRelation::Customer);
    g.add_relationship(Asn(2), Asn(3), AsRelation::Customer);
    g.process(false);
    // make 2 a policy node so that best-path changes produce withdrawals
    g.get_mut(Asn(2)).unwrap().set_policy_vector(vec![PolicyTag::Bgp]);

    // 3 originates; 2 and 1 install the route along the chain
    let mut seed = ann(p16(), 3, 299, 3);
    seed.from_monitor = true;
    g.seed_announcement(Asn(3), seed, false);
    g.propagate_up(false);
    g.propagate_down(false);
    assert_eq!(g.get(Asn(1)).unwrap().loc_rib()[&p16()].received_from_asn, Asn(2));

    // a better route shows up at 2: the old route towards 3 is withdrawn
    // and the cascade clears the stale entry at 1
    let attackers = Default::default();
    g.get_mut(Asn(2))
        .unwrap()
        .receive(vec![ann(p16(), 9, 299, 9)], &attackers);
    g.get_mut(Asn(2)).unwrap().process_incoming(false);
    g.process_withdrawals(Asn(2));

    assert_eq!(g.get(Asn(2)).unwrap().loc_rib()[&p16()].origin, Asn(9));
    assert!(g.get(Asn(1)).unwrap().loc_rib().is_empty());
    // the origin's own entry did not come from 2 and stays
    assert_eq!(g.get(Asn(3)).unwrap().loc_rib()[&p16()].origin, Asn(3));
}

#[test]
fn loop_check_drops_circular_tracebacks() {
    let mut source = MemorySource::new();
    source.provider_of(10, 20);
    source.peer_of(20, 30);
    let mut rov = RovExtrapolator::new(config());
    rov.build_graph(&mut source);

    // synthetic circular state, possible only through bad seed data
    let g = rov.graph_mut();
    g.get_mut(Asn(10))
        .unwrap()
        .loc_rib
        .insert(p16(), ann(p16(), 7, 200, 20));
    g.get_mut(Asn(20))
        .unwrap()
        .loc_rib
        .insert(p16(), ann(p16(), 7, 200, 10));
    g.get_mut(Asn(30))
        .unwrap()
        .loc_rib
        .insert(p16(), ann(p16(), 7, 200, LEGITIMATE_ORIGIN_ASN.0));

    rov.check_loops();

    // the first AS of the cycle is dropped, which breaks the chain for the
    // second; the sentinel-terminated entry is untouched
    assert!(rov.graph().get(Asn(10)).unwrap().loc_rib().is_empty());
    assert!(!rov.graph().get(Asn(20)).unwrap().loc_rib().is_empty());
    assert!(!rov.graph().get(Asn(30)).unwrap().loc_rib().is_empty());
}

/// Topology for the accounting scenarios: the origin O (2) hangs below
/// Y (4) which hangs below X (1); the attacker A (3) and the victim W (5)
/// are customers of X.
fn accounting_source() -> MemorySource {
    let mut source = MemorySource::new();
    source.provider_of(1, 4);
    source.provider_of(4, 2);
    source.provider_of(1, 3);
    source.provider_of(1, 5);
    source.announce("137.99.0.0", "255.255.0.0", &[2]);
    source.attack(3, 5, "137.99.0.0", "255.255.0.0", &[3]);
    source
}

#[test]
fn successful_attacks_remove_the_entry_edge() {
    let mut cfg = config();
    cfg.num_rounds = 3;
    let mut rov = RovExtrapolator::new(cfg);
    let mut sink = MemorySink::new();
    rov.perform_propagation(&mut accounting_source(), &mut sink)
        .unwrap();

    // round 1: the forgery wins at X (closer than the legitimate origin)
    // and reaches the victim
    assert_eq!(sink.attack_stats.len(), 2);
    assert_eq!(sink.attack_stats[0].round, 1);
    assert_eq!(sink.attack_stats[0].successful_attacks, 1);
    assert_eq!(sink.attack_stats[0].total_attacks, 1);
    assert_eq!(sink.attack_stats[0].probability, 1.0);
    // round 2: the attacker's entry edge (3 -- 1) is gone, so the now
    // disconnected attacker cannot even register an attempt, and the
    // legitimate route reaches the victim
    assert_eq!(sink.attack_stats[1].round, 2);
    assert_eq!(sink.attack_stats[1].successful_attacks, 0);
    assert_eq!(sink.attack_stats[1].total_attacks, 0);

    let at_victim = &rov.graph().get(Asn(5)).unwrap().loc_rib()[&p16()];
    assert_eq!(at_victim.origin, Asn(2));
    assert!(!at_victim.from_attacker);
    // the removed edge stays removed
    assert!(!rov.graph().get(Asn(1)).unwrap().is_neighbor(Asn(3)));
}

#[test]
fn attacker_hop_penalty_weakens_the_forgery() {
    let mut cfg = config();
    cfg.max_attacker_hops = 2;
    let mut rov = RovExtrapolator::new(cfg);
    let mut sink = MemorySink::new();
    rov.perform_propagation(&mut accounting_source(), &mut sink)
        .unwrap();

    // the penalty pushes the forged route below the legitimate one at X
    assert_eq!(sink.attack_stats.len(), 1);
    assert_eq!(sink.attack_stats[0].successful_attacks, 0);
    assert_eq!(sink.attack_stats[0].total_attacks, 1);
    let at_victim = &rov.graph().get(Asn(5)).unwrap().loc_rib()[&p16()];
    assert_eq!(at_victim.origin, Asn(2));
}

#[test]
fn disconnected_attackers_are_skipped() {
    let mut source = MemorySource::new();
    source.provider_of(1, 2);
    source.announce("137.99.0.0", "255.255.0.0", &[2]);
    // the attacker has no providers or peers at all; 9 only shows up as a
    // lone customer of the attacker
    source.provider_of(3, 9);
    source.attack(3, 2, "137.99.0.0", "255.255.0.0", &[3]);

    let mut rov = RovExtrapolator::new(config());
    let mut sink = MemorySink::new();
    rov.perform_propagation(&mut source, &mut sink).unwrap();

    // no forged announcement was seeded, and no attempt was registered
    assert!(!rov
        .graph()
        .get(Asn(3))
        .unwrap()
        .loc_rib()
        .values()
        .any(|a| a.from_attacker));
    assert_eq!(sink.attack_stats[0].total_attacks, 0);
}
