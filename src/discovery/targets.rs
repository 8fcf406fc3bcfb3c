//! Target expansion for sweeps
//!
//! Accepts comma-separated entries, each a CIDR block, a last-octet range
//! (`10.0.0.1-20`) or a single address. Expansion is lazy, keeps input
//! order and drops duplicates, so a `/8` never materialises past what the
//! caller consumes.

use ipnetwork::{IpNetwork, IpNetworkIterator};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// One parsed entry of a target list
#[derive(Debug, Clone)]
enum TargetEntry {
    Network(IpNetwork),
    Range { base: [u8; 3], start: u8, end: u8 },
    Single(IpAddr),
}

fn parse_range(entry: &str) -> Option<TargetEntry> {
    let (left, right) = entry.split_once('-')?;
    let start_ip = Ipv4Addr::from_str(left.trim()).ok()?;
    let end: u8 = right.trim().parse().ok()?;
    let [a, b, c, start] = start_ip.octets();
    if end < start {
        return None;
    }
    Some(TargetEntry::Range {
        base: [a, b, c],
        start,
        end,
    })
}

fn parse_entry(entry: &str) -> Option<TargetEntry> {
    if entry.contains('/') {
        return IpNetwork::from_str(entry).ok().map(TargetEntry::Network);
    }
    if entry.contains('-') && entry.matches('.').count() == 3 {
        return parse_range(entry);
    }
    IpAddr::from_str(entry).ok().map(TargetEntry::Single)
}

/// Whether `ip` is a usable host address of `net`.
/// Network and broadcast addresses are excluded below /31 (IPv4); the
/// subnet-router anycast address is excluded below /127 (IPv6).
fn is_host(net: &IpNetwork, ip: IpAddr) -> bool {
    match net {
        IpNetwork::V4(v4) if v4.prefix() < 31 => ip != IpAddr::V4(v4.network()) && ip != IpAddr::V4(v4.broadcast()),
        IpNetwork::V6(v6) if v6.prefix() < 127 => ip != IpAddr::V6(v6.network()),
        _ => true,
    }
}

enum Cursor {
    Network(IpNetwork, IpNetworkIterator),
    Range([u8; 3], u16, u8),
    Single(Option<IpAddr>),
}

impl Cursor {
    fn new(entry: TargetEntry) -> Self {
        match entry {
            TargetEntry::Network(net) => Cursor::Network(net, net.iter()),
            TargetEntry::Range { base, start, end } => Cursor::Range(base, u16::from(start), end),
            TargetEntry::Single(ip) => Cursor::Single(Some(ip)),
        }
    }

    fn next(&mut self) -> Option<IpAddr> {
        match self {
            Cursor::Network(net, iter) => iter.by_ref().find(|ip| is_host(net, *ip)),
            Cursor::Range(base, next, end) => {
                if *next > u16::from(*end) {
                    return None;
                }
                let ip = Ipv4Addr::new(base[0], base[1], base[2], *next as u8);
                *next += 1;
                Some(IpAddr::V4(ip))
            }
            Cursor::Single(ip) => ip.take(),
        }
    }
}

/// Lazy, de-duplicating host iterator
pub struct TargetExpansion {
    entries: std::vec::IntoIter<TargetEntry>,
    current: Option<Cursor>,
    seen: HashSet<IpAddr>,
}

impl Iterator for TargetExpansion {
    type Item = IpAddr;

    fn next(&mut self) -> Option<IpAddr> {
        loop {
            if let Some(cursor) = self.current.as_mut() {
                match cursor.next() {
                    Some(ip) if self.seen.insert(ip) => return Some(ip),
                    Some(_) => continue,
                    None => self.current = None,
                }
            }
            self.current = Some(Cursor::new(self.entries.next()?));
        }
    }
}

/// Expand a target specification.
/// Returns the host iterator and the entries that could not be parsed.
pub fn expand(spec: &str) -> (TargetExpansion, Vec<String>) {
    let mut entries = Vec::new();
    let mut invalid = Vec::new();

    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match parse_entry(entry) {
            Some(parsed) => entries.push(parsed),
            None => invalid.push(entry.to_string()),
        }
    }

    let expansion = TargetExpansion {
        entries: entries.into_iter(),
        current: None,
        seen: HashSet::new(),
    };
    (expansion, invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(spec: &str) -> Vec<String> {
        expand(spec).0.map(|ip| ip.to_string()).collect()
    }

    #[test]
    fn slash_30_excludes_network_and_broadcast() {
        assert_eq!(hosts("10.0.0.0/30"), vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn slash_31_and_32_keep_every_address() {
        assert_eq!(hosts("10.0.0.0/31"), vec!["10.0.0.0", "10.0.0.1"]);
        assert_eq!(hosts("10.0.0.7/32"), vec!["10.0.0.7"]);
    }

    #[test]
    fn host_bits_in_cidr_are_ignored() {
        assert_eq!(hosts("192.168.1.78/30"), vec!["192.168.1.77", "192.168.1.78"]);
    }

    #[test]
    fn last_octet_range_and_dedup() {
        assert_eq!(
            hosts("10.0.0.3-5, 10.0.0.4, 10.0.0.9"),
            vec!["10.0.0.3", "10.0.0.4", "10.0.0.5", "10.0.0.9"]
        );
    }

    #[test]
    fn invalid_entries_are_reported_not_fatal() {
        let (iter, invalid) = expand("10.0.0.1, not-a-host, 10.0.0.9-2, 300.1.1.1");
        assert_eq!(iter.count(), 1);
        assert_eq!(invalid, vec!["not-a-host", "10.0.0.9-2", "300.1.1.1"]);
    }

    #[test]
    fn large_networks_expand_lazily() {
        let (mut iter, _) = expand("10.0.0.0/8");
        assert_eq!(iter.next(), Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert_eq!(iter.take(9).count(), 9);
    }

    #[test]
    fn ipv6_skips_subnet_router_address() {
        assert_eq!(hosts("fd00::/126"), vec!["fd00::1", "fd00::2", "fd00::3"]);
    }
}
