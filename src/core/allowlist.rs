//! Source-network admission.
//!
//! The set of networks permitted to reach the proxy is fixed at compile
//! time: loopback, the RFC1918 private ranges, and the IPv4-mapped IPv6
//! loopback range. There is no runtime mutation; a connection either
//! originates inside the fleet's trusted networks or it is turned away
//! before any other work happens.

use std::net::IpAddr;

/// Networks allowed to talk to the proxy.
const ALLOWED_SOURCE_NETS: &[&str] = &[
    "127.0.0.0/8",
    "::1/128",
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "::ffff:127.0.0.0/104",
];

/// One parsed CIDR entry. Addresses and masks are widened to 128 bits so
/// both families share the same comparison.
#[derive(Debug, Clone, Copy)]
struct Cidr {
    addr: u128,
    mask: u128,
    v4: bool,
}

/// The admission set, built once at startup and read without locking.
#[derive(Debug)]
pub struct Allowlist {
    entries: Vec<Cidr>,
}

impl Allowlist {
    pub fn new() -> Self {
        let entries = ALLOWED_SOURCE_NETS
            .iter()
            .map(|net| parse_cidr(net).expect("allowlist entry must parse"))
            .collect();
        Self { entries }
    }

    /// Whether a remote address may proceed past admission.
    pub fn is_allowed(&self, remote: IpAddr) -> bool {
        let remote = normalize(remote);
        let (bits, v4) = address_bits(remote);
        self.entries
            .iter()
            .filter(|entry| entry.v4 == v4)
            .any(|entry| (bits & entry.mask) == (entry.addr & entry.mask))
    }
}

impl Default for Allowlist {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold an IPv4-mapped IPv6 address (`::ffff:a.b.c.d`) back to its v4 form
/// so loopback from a dual-stack listener is not rejected.
fn normalize(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => addr,
        },
        v4 => v4,
    }
}

fn address_bits(addr: IpAddr) -> (u128, bool) {
    match addr {
        IpAddr::V4(v4) => (u32::from(v4) as u128, true),
        IpAddr::V6(v6) => (u128::from(v6), false),
    }
}

fn parse_cidr(net: &str) -> Option<Cidr> {
    let (addr_part, len_part) = net.split_once('/')?;
    let addr: IpAddr = addr_part.parse().ok()?;
    let len: u32 = len_part.parse().ok()?;

    let (bits, v4) = address_bits(addr);
    let width: u32 = if v4 { 32 } else { 128 };
    if len > width {
        return None;
    }
    let full: u128 = if v4 { u32::MAX as u128 } else { u128::MAX };
    let mask = if len == 0 {
        0
    } else if len == width {
        full
    } else {
        full & !(full >> len)
    };

    Some(Cidr {
        addr: bits,
        mask,
        v4,
    })
}
