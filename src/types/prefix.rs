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

//! This module contains the definition of the IPv4 prefix value type.

use std::{cmp::Ordering, fmt::Display, net::Ipv4Addr, str::FromStr};

use ipnet::Ipv4Net;
use serde::{de::Error, Deserialize, Serialize};

/// An IPv4 prefix, stored as a 32-bit network address and a 32-bit netmask.
///
/// Host bits (bits not covered by the mask) are always zero; the constructor
/// masks them away. Prefixes are totally ordered by descending mask and
/// ascending address, so that iterating over a sorted collection visits
/// more-specific prefixes before less-specific ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Prefix {
    addr: u32,
    mask: u32,
}

impl Ipv4Prefix {
    /// Create a new prefix from a network address and a netmask. Host bits of
    /// the address are cleared.
    pub fn new(addr: u32, mask: u32) -> Self {
        Self {
            addr: addr & mask,
            mask,
        }
    }

    /// Parse a prefix from a dotted-quad host / netmask pair, as found in the
    /// announcement record streams (e.g. `"137.99.0.0"` / `"255.255.0.0"`).
    pub fn from_dotted_quad(host: &str, netmask: &str) -> Result<Self, std::net::AddrParseError> {
        let addr: Ipv4Addr = host.trim().parse()?;
        let mask: Ipv4Addr = netmask.trim().parse()?;
        Ok(Self::new(addr.into(), mask.into()))
    }

    /// The network address.
    pub fn addr(&self) -> u32 {
        self.addr
    }

    /// The netmask.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Check if `self` contains `other` (or both are equal): `other`'s mask
    /// must cover all bits of `self`'s mask, and both must agree on the
    /// network bits of `self`.
    pub fn contains(&self, other: &Self) -> bool {
        (other.mask & self.mask) == self.mask && (other.addr & self.mask) == self.addr
    }
}

impl Ord for Ipv4Prefix {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .mask
            .cmp(&self.mask)
            .then_with(|| self.addr.cmp(&other.addr))
    }
}

impl PartialOrd for Ipv4Prefix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Ipv4Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}",
            Ipv4Addr::from(self.addr),
            self.mask.count_ones()
        )
    }
}

impl FromStr for Ipv4Prefix {
    type Err = ipnet::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ipv4Net::from_str(s).map(Self::from)
    }
}

impl From<Ipv4Net> for Ipv4Prefix {
    fn from(net: Ipv4Net) -> Self {
        Self::new(net.addr().into(), net.netmask().into())
    }
}

impl Serialize for Ipv4Prefix {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ipv4Prefix {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ipv4Net::from_str(&s)
            .map_err(|e| D::Error::custom(format!("Expected IPv4 prefix, found {s}: {e}")))
            .map(Self::from)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn host_bits_are_cleared() {
        let p = Ipv4Prefix::new(0x8963_1234, 0xffff_0000);
        assert_eq!(p.addr(), 0x8963_0000);
        assert_eq!(p.mask(), 0xffff_0000);
    }

    #[test]
    fn parse_dotted_quad() {
        let p = Ipv4Prefix::from_dotted_quad("137.99.0.0", "255.255.0.0").unwrap();
        assert_eq!(p, Ipv4Prefix::new(0x8963_0000, 0xffff_0000));
        assert_eq!(p.to_string(), "137.99.0.0/16");
        assert!(Ipv4Prefix::from_dotted_quad("137.99.0", "255.255.0.0").is_err());
    }

    #[test]
    fn parse_cidr() {
        let p: Ipv4Prefix = "10.0.0.0/8".parse().unwrap();
        assert_eq!(p, Ipv4Prefix::new(0x0a00_0000, 0xff00_0000));
    }

    #[test]
    fn more_specifics_sort_first() {
        let p16 = Ipv4Prefix::new(0x8963_0000, 0xffff_0000);
        let p24 = Ipv4Prefix::new(0x8963_0000, 0xffff_ff00);
        let q16 = Ipv4Prefix::new(0x0a00_0000, 0xffff_0000);
        let mut v = vec![q16, p16, p24];
        v.sort();
        assert_eq!(v, vec![p24, q16, p16]);
    }

    #[test]
    fn containment() {
        let p16 = Ipv4Prefix::new(0x8963_0000, 0xffff_0000);
        let p24 = Ipv4Prefix::new(0x8963_0100, 0xffff_ff00);
        assert!(p16.contains(&p24));
        assert!(p16.contains(&p16));
        assert!(!p24.contains(&p16));
        let other = Ipv4Prefix::new(0x0a00_0000, 0xffff_ff00);
        assert!(!p16.contains(&other));
    }
}
