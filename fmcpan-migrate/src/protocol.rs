//! IP protocol number to IANA keyword mapping.
//!
//! Source platforms reference transport protocols by number in port
//! literals; canonical and target names use the keyword. The table covers
//! the protocols that appear in firewall policies; anything else is a
//! recoverable [`UnknownProtocolNumber`] and the caller skips the literal.

use thiserror::Error;

/// Raised when a protocol number has no keyword mapping.
///
/// Recoverable: the offending literal or object is logged and skipped,
/// processing continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown protocol number {number}")]
pub struct UnknownProtocolNumber {
    pub number: u8,
}

/// Map an IP protocol number to its IANA keyword.
pub fn protocol_keyword(number: u8) -> Result<&'static str, UnknownProtocolNumber> {
    let keyword = match number {
        1 => "icmp",
        2 => "igmp",
        4 => "ipip",
        6 => "tcp",
        17 => "udp",
        41 => "ipv6",
        46 => "rsvp",
        47 => "gre",
        50 => "esp",
        51 => "ah",
        58 => "ipv6-icmp",
        88 => "eigrp",
        89 => "ospf",
        103 => "pim",
        112 => "vrrp",
        115 => "l2tp",
        132 => "sctp",
        _ => return Err(UnknownProtocolNumber { number }),
    };
    Ok(keyword)
}

/// Whether a protocol number belongs to the ICMP class (ICMP or ICMPv6).
///
/// ICMP-class port literals carry a type/code instead of a port number and
/// are modeled as ICMP objects, not port objects.
pub fn is_icmp_class(number: u8) -> bool {
    matches!(number, 1 | 58)
}
