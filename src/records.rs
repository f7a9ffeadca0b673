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

//! Module containing the record source and result sink boundary.
//!
//! The engine never touches persistent storage itself: it consumes raw rows
//! from a [`RecordSource`] and emits typed rows to a [`ResultSink`]. The
//! in-memory implementations are used by the test suite and by callers that
//! assemble their input programmatically; [`CsvSink`] writes the fixed CSV
//! schemas.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::types::{Asn, Ipv4Prefix, SinkError};

/// One AS-relationship row of the input data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    /// First endpoint.
    pub asn_a: u32,
    /// Second endpoint.
    pub asn_b: u32,
    /// The role `asn_a` plays towards `asn_b`.
    pub relation: SourceRelation,
}

/// The declared relationship of a relationship row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceRelation {
    /// `asn_a` sells transit to `asn_b`.
    ProviderOf,
    /// The two ASes peer settlement-free.
    PeerOf,
}

/// One observed announcement row of the input data. The prefix fields are
/// raw dotted-quad strings; the engine parses them and skips malformed rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementRecord {
    /// Network address in dotted-quad form.
    pub host: String,
    /// Netmask in dotted-quad form.
    pub netmask: String,
    /// The observed AS-path, origin last.
    pub as_path: Vec<u32>,
    /// The next hop recorded by the monitor, if any.
    pub next_hop: Option<String>,
    /// The observation timestamp, if any.
    pub timestamp: Option<i64>,
    /// Address family of the row; family-6 rows are skipped.
    pub family: Option<u8>,
}

/// One attacker/victim row of the hijack input data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackerVictimRecord {
    /// The AS announcing the forged route.
    pub attacker_asn: u32,
    /// The AS whose installed route decides the attack outcome.
    pub victim_asn: u32,
    /// Network address of the targeted prefix, dotted-quad.
    pub prefix_host: String,
    /// Netmask of the targeted prefix, dotted-quad.
    pub prefix_netmask: String,
    /// The forged AS-path, origin last.
    pub as_path: Vec<u32>,
}

/// A source of input record streams. A single pass per stream suffices: the
/// engines cache the parsed rows for multi-round runs.
pub trait RecordSource {
    /// The stream of AS-relationship rows.
    fn relationships(&mut self) -> Box<dyn Iterator<Item = RelationshipRecord> + '_>;

    /// The stream of observed announcement rows.
    fn announcements(&mut self) -> Box<dyn Iterator<Item = AnnouncementRecord> + '_>;

    /// The stream of attacker/victim rows (hijack mode only).
    fn attacker_victim_pairs(&mut self) -> Box<dyn Iterator<Item = AttackerVictimRecord> + '_>;
}

/// An in-memory record source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySource {
    /// Relationship rows to serve.
    pub relationships: Vec<RelationshipRecord>,
    /// Announcement rows to serve.
    pub announcements: Vec<AnnouncementRecord>,
    /// Attacker/victim rows to serve.
    pub attacker_victim_pairs: Vec<AttackerVictimRecord>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider→customer relationship row.
    pub fn provider_of(&mut self, provider: u32, customer: u32) -> &mut Self {
        self.relationships.push(RelationshipRecord {
            asn_a: provider,
            asn_b: customer,
            relation: SourceRelation::ProviderOf,
        });
        self
    }

    /// Add a peering relationship row.
    pub fn peer_of(&mut self, a: u32, b: u32) -> &mut Self {
        self.relationships.push(RelationshipRecord {
            asn_a: a,
            asn_b: b,
            relation: SourceRelation::PeerOf,
        });
        self
    }

    /// Add an announcement row for a dotted-quad prefix and a path with the
    /// origin last.
    pub fn announce(&mut self, host: &str, netmask: &str, as_path: &[u32]) -> &mut Self {
        self.announcements.push(AnnouncementRecord {
            host: host.to_string(),
            netmask: netmask.to_string(),
            as_path: as_path.to_vec(),
            next_hop: None,
            timestamp: None,
            family: None,
        });
        self
    }

    /// Add an attacker/victim row for a dotted-quad prefix and a forged path
    /// with the origin last.
    pub fn attack(
        &mut self,
        attacker: u32,
        victim: u32,
        host: &str,
        netmask: &str,
        as_path: &[u32],
    ) -> &mut Self {
        self.attacker_victim_pairs.push(AttackerVictimRecord {
            attacker_asn: attacker,
            victim_asn: victim,
            prefix_host: host.to_string(),
            prefix_netmask: netmask.to_string(),
            as_path: as_path.to_vec(),
        });
        self
    }
}

impl RecordSource for MemorySource {
    fn relationships(&mut self) -> Box<dyn Iterator<Item = RelationshipRecord> + '_> {
        Box::new(self.relationships.iter().cloned())
    }

    fn announcements(&mut self) -> Box<dyn Iterator<Item = AnnouncementRecord> + '_> {
        Box::new(self.announcements.iter().cloned())
    }

    fn attacker_victim_pairs(&mut self) -> Box<dyn Iterator<Item = AttackerVictimRecord> + '_> {
        Box::new(self.attacker_victim_pairs.iter().cloned())
    }
}

/// One row of the extrapolation results, in the fixed schema
/// `asn,prefix,origin,priority,received_from_asn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RibRow {
    /// The AS holding the route.
    pub asn: Asn,
    /// The prefix of the route.
    pub prefix: Ipv4Prefix,
    /// The origin of the route.
    pub origin: Asn,
    /// The selection priority of the route.
    pub priority: u32,
    /// The neighbor (or sentinel) the route was learned from.
    pub received_from_asn: Asn,
}

/// One row of the inverse results: an AS that did *not* install the route
/// for the (prefix, origin) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InverseRow {
    /// The AS without the route.
    pub asn: Asn,
    /// The prefix of the missing route.
    pub prefix: Ipv4Prefix,
    /// The origin of the missing route.
    pub origin: Asn,
}

/// One per-round statistics row of a hijack run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackStatsRow {
    /// The round number, starting at 1.
    pub round: u32,
    /// Attacks whose victim installed the forged route this round.
    pub successful_attacks: u64,
    /// Attack attempts whose targeted prefix reached the victim.
    pub total_attacks: u64,
    /// `successful_attacks / total_attacks`, or 0 for an empty round.
    pub probability: f64,
}

/// A consumer of extrapolation results. A failing sink aborts the run; all
/// tables except the main one default to discarding their rows.
pub trait ResultSink {
    /// Accept one loc-RIB row.
    fn rib_row(&mut self, row: &RibRow) -> Result<(), SinkError>;

    /// Accept one depref (second-best) row.
    fn depref_row(&mut self, row: &RibRow) -> Result<(), SinkError> {
        let _ = row;
        Ok(())
    }

    /// Accept one blackhole row (ROV++ sentinel entries).
    fn blackhole_row(&mut self, row: &RibRow) -> Result<(), SinkError> {
        let _ = row;
        Ok(())
    }

    /// Accept one inverse-results row.
    fn inverse_row(&mut self, row: &InverseRow) -> Result<(), SinkError> {
        let _ = row;
        Ok(())
    }

    /// Accept one per-round attack statistics row.
    fn attack_stats_row(&mut self, row: &AttackStatsRow) -> Result<(), SinkError> {
        let _ = row;
        Ok(())
    }
}

/// An in-memory result sink collecting every row, used by tests and by
/// callers that post-process results programmatically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySink {
    /// Collected loc-RIB rows.
    pub rib: Vec<RibRow>,
    /// Collected depref rows.
    pub depref: Vec<RibRow>,
    /// Collected blackhole rows.
    pub blackholes: Vec<RibRow>,
    /// Collected inverse rows.
    pub inverse: Vec<InverseRow>,
    /// Collected attack statistics rows.
    pub attack_stats: Vec<AttackStatsRow>,
    /// When set, every row is refused (to exercise sink-failure handling).
    pub refuse: bool,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self) -> Result<(), SinkError> {
        if self.refuse {
            Err(SinkError::Refused("sink closed".to_string()))
        } else {
            Ok(())
        }
    }
}

impl ResultSink for MemorySink {
    fn rib_row(&mut self, row: &RibRow) -> Result<(), SinkError> {
        self.check()?;
        self.rib.push(*row);
        Ok(())
    }

    fn depref_row(&mut self, row: &RibRow) -> Result<(), SinkError> {
        self.check()?;
        self.depref.push(*row);
        Ok(())
    }

    fn blackhole_row(&mut self, row: &RibRow) -> Result<(), SinkError> {
        self.check()?;
        self.blackholes.push(*row);
        Ok(())
    }

    fn inverse_row(&mut self, row: &InverseRow) -> Result<(), SinkError> {
        self.check()?;
        self.inverse.push(*row);
        Ok(())
    }

    fn attack_stats_row(&mut self, row: &AttackStatsRow) -> Result<(), SinkError> {
        self.check()?;
        self.attack_stats.push(*row);
        Ok(())
    }
}

/// A result sink writing CSV rows without headers, one writer per table.
/// Tables without a writer discard their rows.
pub struct CsvSink<W: Write> {
    rib: csv::Writer<W>,
    depref: Option<csv::Writer<W>>,
    blackholes: Option<csv::Writer<W>>,
    inverse: Option<csv::Writer<W>>,
    attack_stats: Option<csv::Writer<W>>,
}

impl<W: Write> std::fmt::Debug for CsvSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSink")
            .field("depref", &self.depref.is_some())
            .field("blackholes", &self.blackholes.is_some())
            .field("inverse", &self.inverse.is_some())
            .field("attack_stats", &self.attack_stats.is_some())
            .finish()
    }
}

impl<W: Write> CsvSink<W> {
    fn writer(inner: W) -> csv::Writer<W> {
        csv::WriterBuilder::new().has_headers(false).from_writer(inner)
    }

    /// Create a sink writing the main table to the given writer.
    pub fn new(rib: W) -> Self {
        Self {
            rib: Self::writer(rib),
            depref: None,
            blackholes: None,
            inverse: None,
            attack_stats: None,
        }
    }

    /// Also write the depref table.
    pub fn with_depref(mut self, w: W) -> Self {
        self.depref = Some(Self::writer(w));
        self
    }

    /// Also write the blackhole table.
    pub fn with_blackholes(mut self, w: W) -> Self {
        self.blackholes = Some(Self::writer(w));
        self
    }

    /// Also write the inverse-results table.
    pub fn with_inverse(mut self, w: W) -> Self {
        self.inverse = Some(Self::writer(w));
        self
    }

    /// Also write the per-round attack statistics table.
    pub fn with_attack_stats(mut self, w: W) -> Self {
        self.attack_stats = Some(Self::writer(w));
        self
    }

    /// Flush every table to its underlying writer.
    pub fn flush(&mut self) -> Result<(), SinkError> {
        self.rib.flush()?;
        for w in [
            &mut self.depref,
            &mut self.blackholes,
            &mut self.inverse,
        ]
        .into_iter()
        .flatten()
        {
            w.flush()?;
        }
        if let Some(w) = &mut self.attack_stats {
            w.flush()?;
        }
        Ok(())
    }
}

impl<W: Write> ResultSink for CsvSink<W> {
    fn rib_row(&mut self, row: &RibRow) -> Result<(), SinkError> {
        self.rib.serialize(row)?;
        Ok(())
    }

    fn depref_row(&mut self, row: &RibRow) -> Result<(), SinkError> {
        if let Some(w) = &mut self.depref {
            w.serialize(row)?;
        }
        Ok(())
    }

    fn blackhole_row(&mut self, row: &RibRow) -> Result<(), SinkError> {
        if let Some(w) = &mut self.blackholes {
            w.serialize(row)?;
        }
        Ok(())
    }

    fn inverse_row(&mut self, row: &InverseRow) -> Result<(), SinkError> {
        if let Some(w) = &mut self.inverse {
            w.serialize(row)?;
        }
        Ok(())
    }

    fn attack_stats_row(&mut self, row: &AttackStatsRow) -> Result<(), SinkError> {
        if let Some(w) = &mut self.attack_stats {
            w.serialize(row)?;
        }
        Ok(())
    }
}
