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

use maplit::hashset;
use pretty_assertions::assert_eq;

use super::chain_graph;
use crate::{
    graph::AsGraph,
    types::{AsRelation, Asn},
};

#[test]
fn neighbor_sets_are_symmetric() {
    let g = chain_graph();
    for (asn, node) in g.ases() {
        for provider in node.providers() {
            assert_eq!(
                g.get(*provider).unwrap().relation_to(*asn),
                Some(AsRelation::Customer)
            );
        }
        for peer in node.peers() {
            assert_eq!(
                g.get(*peer).unwrap().relation_to(*asn),
                Some(AsRelation::Peer)
            );
        }
        for customer in node.customers() {
            assert_eq!(
                g.get(*customer).unwrap().relation_to(*asn),
                Some(AsRelation::Provider)
            );
        }
    }
}

#[test]
fn neighbor_sets_are_disjoint() {
    let g = chain_graph();
    for node in g.ases().values() {
        assert!(node.providers().is_disjoint(node.peers()));
        assert!(node.providers().is_disjoint(node.customers()));
        assert!(node.peers().is_disjoint(node.customers()));
    }
}

#[test]
fn duplicate_and_conflicting_rows_are_dropped() {
    let mut g = AsGraph::new();
    g.add_relationship(Asn(1), Asn(2), AsRelation::Customer);
    g.add_relationship(Asn(1), Asn(2), AsRelation::Customer);
    // a second row declaring the same pair as peers is ignored
    g.add_relationship(Asn(1), Asn(2), AsRelation::Peer);
    g.add_relationship(Asn(7), Asn(7), AsRelation::Peer);
    g.process(false);

    let one = g.get(Asn(1)).unwrap();
    assert_eq!(one.customers(), &hashset! { Asn(2) });
    assert!(one.peers().is_empty());
    assert_eq!(g.get(Asn(2)).unwrap().relation_to(Asn(1)), Some(AsRelation::Provider));
    // the self-loop created no edge
    assert!(g.get(Asn(7)).map_or(true, |n| !n.is_neighbor(Asn(7))));
}

#[test]
fn cycle_compression() {
    let mut g = AsGraph::new();
    g.add_relationship(Asn(1), Asn(2), AsRelation::Customer);
    g.add_relationship(Asn(2), Asn(3), AsRelation::Customer);
    g.add_relationship(Asn(3), Asn(1), AsRelation::Customer);
    g.process(false);

    assert_eq!(g.num_ases(), 1);
    let rep = g.get(Asn(1)).unwrap();
    assert_eq!(rep.member_ases(), &[Asn(2), Asn(3)]);
    assert_eq!(g.component_translation()[&Asn(2)], Asn(1));
    assert_eq!(g.component_translation()[&Asn(3)], Asn(1));
    assert_eq!(g.translate_asn(Asn(2)), Asn(1));
    assert_eq!(g.translate_asn(Asn(1)), Asn(1));
    // all edges of the cycle collapsed into self-loops and disappeared
    assert!(rep.providers().is_empty());
    assert!(rep.peers().is_empty());
    assert!(rep.customers().is_empty());
}

#[test]
fn cycle_compression_keeps_outside_edges() {
    let mut g = AsGraph::new();
    g.add_relationship(Asn(10), Asn(11), AsRelation::Customer);
    g.add_relationship(Asn(11), Asn(12), AsRelation::Customer);
    g.add_relationship(Asn(12), Asn(10), AsRelation::Customer);
    // an outside customer hanging off one cycle member, and a peer of
    // another member
    g.add_relationship(Asn(11), Asn(20), AsRelation::Customer);
    g.add_relationship(Asn(10), Asn(30), AsRelation::Peer);
    g.process(false);

    assert_eq!(g.num_ases(), 3);
    assert_eq!(g.translate_asn(Asn(11)), Asn(10));
    assert_eq!(g.translate_asn(Asn(12)), Asn(10));
    let rep = g.get(Asn(10)).unwrap();
    assert_eq!(rep.customers(), &hashset! { Asn(20) });
    assert_eq!(rep.peers(), &hashset! { Asn(30) });
    assert_eq!(g.get(Asn(20)).unwrap().providers(), &hashset! { Asn(10) });
    // ranks on the compressed graph: the representative sits above its
    // customer
    assert_eq!(g.get(Asn(20)).unwrap().rank(), 0);
    assert_eq!(g.get(Asn(30)).unwrap().rank(), 0);
    assert_eq!(rep.rank(), 1);
}

#[test]
fn rank_assignment() {
    let mut g = AsGraph::new();
    g.add_relationship(Asn(1), Asn(2), AsRelation::Customer);
    g.add_relationship(Asn(1), Asn(3), AsRelation::Customer);
    g.add_relationship(Asn(3), Asn(5), AsRelation::Customer);
    g.add_relationship(Asn(3), Asn(6), AsRelation::Customer);
    g.add_relationship(Asn(3), Asn(4), AsRelation::Peer);
    g.process(false);

    assert_eq!(g.get(Asn(2)).unwrap().rank(), 0);
    assert_eq!(g.get(Asn(4)).unwrap().rank(), 0);
    assert_eq!(g.get(Asn(5)).unwrap().rank(), 0);
    assert_eq!(g.get(Asn(6)).unwrap().rank(), 0);
    assert_eq!(g.get(Asn(3)).unwrap().rank(), 1);
    assert_eq!(g.get(Asn(1)).unwrap().rank(), 2);
    assert_eq!(
        g.ases_by_rank(),
        &[
            vec![Asn(2), Asn(4), Asn(5), Asn(6)],
            vec![Asn(3)],
            vec![Asn(1)]
        ]
    );
}

#[test]
fn ranks_dominate_customers() {
    let g = chain_graph();
    for (asn, node) in g.ases() {
        assert!(node.rank() >= 0, "{asn} has no rank");
        for customer in node.customers() {
            assert!(node.rank() > g.get(*customer).unwrap().rank());
        }
    }
}

#[test]
fn stub_elision_and_translation() {
    let mut source = super::MemorySource::new();
    source.provider_of(1, 2);
    source.provider_of(2, 5);
    let g = AsGraph::from_source(&mut source, true);

    assert!(g.get(Asn(5)).is_none());
    assert_eq!(g.stubs_to_parents()[&Asn(5)], Asn(2));
    // a stub lookup resolves to its parent's representative
    assert_eq!(g.translate_asn(Asn(5)), Asn(2));
    assert!(g.get(Asn(2)).unwrap().customers().is_empty());
}
