//! # ofwire-protocol
//!
//! Wire codecs for IPv6 packets and the multicast control messages they
//! carry.
//!
//! This crate provides:
//! - The IPv6 base header and its extension header chain (hop-by-hop,
//!   routing, fragment)
//! - ICMPv6 echo, MLDv1 and MLDv2 queries and reports
//! - IGMP v1, v2 and v3 messages
//! - UDP as a terminal IPv6 payload
//!
//! Every message type implements [`Message`]. Length and count fields are
//! computed while encoding, so a decoded value never disagrees with its own
//! wire form. A value whose collections outgrow their wire fields fails to
//! encode with [`EncodeError`].

pub mod codec;
pub mod error;
pub mod icmpv6;
pub mod igmp;
pub mod ipv6;
pub mod udp;

pub use codec::Message;
pub use error::{DecodeError, EncodeError};
pub use icmpv6::{Echo, Icmpv6, Icmpv6Header, Mld, MldQuery, Mldv2Query, Mldv2Record, Mldv2Report};
pub use igmp::{Igmp, IgmpMessage, IgmpV1or2, IgmpV3GroupRecord, IgmpV3Query, IgmpV3Report};
pub use ipv6::{
    next_header, ExtensionHeader, FragmentHeader, HopByHopHeader, Ipv6Option, Ipv6Packet,
    Ipv6Payload, RoutingHeader, IPV6_HEADER_LEN, MAX_EXTENSION_HEADERS, MAX_FRAGMENT_OFFSET,
};
pub use udp::Udp;

/// Multicast address record types shared by MLDv2 and IGMPv3 reports.
pub mod record_type {
    pub const MODE_IS_INCLUDE: u8 = 1;
    pub const MODE_IS_EXCLUDE: u8 = 2;
    pub const CHANGE_TO_INCLUDE_MODE: u8 = 3;
    pub const CHANGE_TO_EXCLUDE_MODE: u8 = 4;
    pub const ALLOW_NEW_SOURCES: u8 = 5;
    pub const BLOCK_OLD_SOURCES: u8 = 6;
}
