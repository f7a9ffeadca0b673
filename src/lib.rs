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

#![deny(missing_docs, missing_debug_implementations)]

//! # BgpCast
//!
//! This is a library for extrapolating AS-level BGP routing state from an
//! empirical snapshot of the inter-domain graph.
//!
//! The engine ingests AS business relationships (customer-provider and
//! peering edges) together with announcements observed at route monitors,
//! and computes, for every AS, the route it would install for every prefix
//! under a valley-free model of inter-domain policy routing. It is used to
//! study route hijacks and route-origin-validation defences, and to
//! quantify how widely a forged announcement would spread.
//!
//! ## Main Concepts
//!
//! The [`graph::AsGraph`] is the main datastructure to operate on. It owns
//! one [`node::AsNode`] per AS, collapses customer-provider cycles into
//! supernodes (using the SCC algorithms from
//! [Petgraph](https://docs.rs/petgraph/latest/petgraph/index.html)), and
//! assigns every AS its rank in the resulting hierarchy. Propagation is a
//! pair of ranked sweeps: announcements first climb from customers to
//! providers and peers, then descend to customers, so that a route never
//! transits a peer or provider towards another peer or provider.
//!
//! The [`engine::Extrapolator`] drives a batch run: it seeds every observed
//! announcement along its AS-path, propagates, and streams each AS's
//! installed routes to a [`records::ResultSink`]. The
//! [`hijack::RovExtrapolator`] additionally seeds forged announcements,
//! applies the ROV policy family ([`policy::PolicyTag`]) at ingress, and
//! measures attack success over repeated rounds.
//!
//! Input is consumed from a [`records::RecordSource`]; loading data from
//! persistent storage, as well as the command-line surface, live outside of
//! this crate.
//!
//! ## Example usage
//!
//! ```
//! use bgpcast::prelude::*;
//!
//! fn main() -> Result<(), ExtrapolatorError> {
//!     let mut source = MemorySource::new();
//!     // a small hierarchy: 1 sells transit to 2, which sells transit
//!     // to 5; 2 peers with 3
//!     source.provider_of(1, 2);
//!     source.provider_of(2, 5);
//!     source.peer_of(2, 3);
//!     // one announcement for 137.99.0.0/16, observed on the path 3-2-5
//!     source.announce("137.99.0.0", "255.255.0.0", &[3, 2, 5]);
//!
//!     let mut config = EngineConfig::default();
//!     config.invert_results = false;
//!
//!     let mut sink = MemorySink::new();
//!     let mut extrapolator = Extrapolator::new(config);
//!     extrapolator.perform_propagation(&mut source, &mut sink)?;
//!
//!     // every AS of the graph installed a route for the prefix
//!     assert_eq!(sink.rib.len(), 4);
//!     Ok(())
//! }
//! ```

pub mod announcement;
pub mod config;
pub mod engine;
pub mod graph;
pub mod hijack;
pub mod node;
pub mod policy;
pub mod prelude;
pub mod records;
pub mod types;

#[cfg(test)]
mod test;
