//! IPv6 packets (RFC 8200) with their extension header chain.
//!
//! Decoding reads the 40-byte base header, then follows the next-header code
//! through hop-by-hop, routing and fragment headers until it reaches a code
//! that is not one of those three. That terminal code selects the payload
//! codec: ICMPv6, UDP, or raw bytes for anything else.

mod extension;

pub use extension::{
    ExtensionHeader, FragmentHeader, HopByHopHeader, Ipv6Option, RoutingHeader,
    FRAGMENT_HEADER_LEN, MAX_FRAGMENT_OFFSET, PAD1, PADN, ROUTER_ALERT,
};

use crate::codec::{ensure, ensure_declared, fit, fit_u16, get_ipv6, Message};
use crate::error::{DecodeError, EncodeError};
use crate::icmpv6::Icmpv6;
use crate::udp::Udp;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::Ipv6Addr;

/// IP protocol numbers used as next-header codes.
pub mod next_header {
    pub const HOP_BY_HOP: u8 = 0x00;
    pub const UDP: u8 = 0x11;
    pub const ROUTING: u8 = 0x2b;
    pub const FRAGMENT: u8 = 0x2c;
    pub const ICMPV6: u8 = 0x3a;
    pub const NO_NEXT_HEADER: u8 = 0x3b;
}

/// Size of the fixed IPv6 header.
pub const IPV6_HEADER_LEN: usize = 40;

/// Upper bound on extension headers followed in one packet.
pub const MAX_EXTENSION_HEADERS: usize = 16;

/// The payload behind the last extension header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ipv6Payload {
    Icmpv6(Icmpv6),
    Udp(Udp),
    /// Unrecognised protocol, or a fragment that does not start the packet.
    Raw { next_header: u8, data: Bytes },
}

impl Ipv6Payload {
    /// Next-header code that identifies this payload.
    pub fn code(&self) -> u8 {
        match self {
            Ipv6Payload::Icmpv6(_) => next_header::ICMPV6,
            Ipv6Payload::Udp(_) => next_header::UDP,
            Ipv6Payload::Raw { next_header, .. } => *next_header,
        }
    }

    /// Decodes the payload named by `code` and returns it with the number of
    /// bytes consumed. Never fails on an unknown code.
    pub fn decode_as(code: u8, buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        match code {
            next_header::ICMPV6 => {
                Icmpv6::decode(buf).map(|(m, n)| (Ipv6Payload::Icmpv6(m), n))
            }
            next_header::UDP => Udp::decode(buf).map(|(m, n)| (Ipv6Payload::Udp(m), n)),
            _ => Ok((
                Ipv6Payload::Raw {
                    next_header: code,
                    data: Bytes::copy_from_slice(buf),
                },
                buf.len(),
            )),
        }
    }

    fn length(&self) -> usize {
        match self {
            Ipv6Payload::Icmpv6(m) => m.length(),
            Ipv6Payload::Udp(m) => m.length(),
            Ipv6Payload::Raw { data, .. } => data.len(),
        }
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match self {
            Ipv6Payload::Icmpv6(m) => m.put(buf),
            Ipv6Payload::Udp(m) => m.put(buf),
            Ipv6Payload::Raw { data, .. } => {
                buf.put_slice(data);
                Ok(())
            }
        }
    }
}

/// An IPv6 packet: base header fields, the ordered extension header chain,
/// and the terminal payload.
///
/// The payload length field is derived from the chain, payload and trailer
/// when encoding. `next_header` codes are stored as given;
/// [`Ipv6Packet::build`] and [`Ipv6Packet::thread_next_headers`] set them
/// from the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6Packet {
    /// Always 6 on decoded packets.
    pub version: u8,
    pub traffic_class: u8,
    /// Flow label (20 bits).
    pub flow_label: u32,
    pub next_header: u8,
    pub hop_limit: u8,
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
    pub extensions: Vec<ExtensionHeader>,
    pub payload: Ipv6Payload,
    /// Bytes inside the declared payload length that the payload codec left
    /// unread, such as padding behind a UDP datagram. Written back after the
    /// payload.
    pub trailer: Bytes,
}

impl Ipv6Packet {
    /// Builds a version-6 packet with next-header codes threaded through
    /// `extensions` to `payload`.
    pub fn build(
        source: Ipv6Addr,
        destination: Ipv6Addr,
        hop_limit: u8,
        extensions: Vec<ExtensionHeader>,
        payload: Ipv6Payload,
    ) -> Self {
        let mut packet = Self {
            version: 6,
            traffic_class: 0,
            flow_label: 0,
            next_header: 0,
            hop_limit,
            source,
            destination,
            extensions,
            payload,
            trailer: Bytes::new(),
        };
        packet.thread_next_headers();
        packet
    }

    /// Rewrites every next-header code so that each link names its successor.
    pub fn thread_next_headers(&mut self) {
        let mut code = self.payload.code();
        for ext in self.extensions.iter_mut().rev() {
            ext.set_next_header(code);
            code = ext.code();
        }
        self.next_header = code;
    }

    /// Value of the payload length field: everything after the base header.
    pub fn payload_length(&self) -> usize {
        self.extensions
            .iter()
            .map(ExtensionHeader::length)
            .sum::<usize>()
            + self.payload.length()
            + self.trailer.len()
    }

    /// Reads only the payload length field, for framing. Requires the first
    /// 6 bytes.
    pub fn peek_payload_length(buf: &[u8]) -> Result<usize, DecodeError> {
        ensure(buf, 6)?;
        Ok(u16::from_be_bytes([buf[4], buf[5]]) as usize)
    }
}

impl Message for Ipv6Packet {
    fn length(&self) -> usize {
        IPV6_HEADER_LEN + self.payload_length()
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let version = fit("IP version", self.version as usize, 0x0f)? as u8;
        let flow_label = fit("flow label", self.flow_label as usize, 0xf_ffff)? as u32;
        let payload_length = fit_u16("IPv6 payload length", self.payload_length())?;

        // version(4) | traffic class(8) | flow label(20)
        buf.put_u8((version << 4) | (self.traffic_class >> 4));
        buf.put_u8(((self.traffic_class & 0x0f) << 4) | (flow_label >> 16) as u8);
        buf.put_u16((flow_label & 0xffff) as u16);
        buf.put_u16(payload_length);
        buf.put_u8(self.next_header);
        buf.put_u8(self.hop_limit);
        buf.put_slice(&self.source.octets());
        buf.put_slice(&self.destination.octets());
        for ext in &self.extensions {
            ext.put(buf)?;
        }
        self.payload.put(buf)?;
        buf.put_slice(&self.trailer);
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, IPV6_HEADER_LEN)?;
        let mut cur = buf;
        let b0 = cur.get_u8();
        if b0 >> 4 != 6 {
            return Err(DecodeError::InvalidVersion(b0 >> 4));
        }
        let b1 = cur.get_u8();
        let flow_low = cur.get_u16();
        let payload_length = cur.get_u16() as usize;
        let next_header = cur.get_u8();
        let hop_limit = cur.get_u8();
        let source = get_ipv6(&mut cur);
        let destination = get_ipv6(&mut cur);

        let total = IPV6_HEADER_LEN + payload_length;
        ensure_declared(buf, "IPv6 payload length", total)?;

        let mut rest = &buf[IPV6_HEADER_LEN..total];
        let mut code = next_header;
        let mut extensions = Vec::new();
        let mut trailing_fragment = false;
        while ExtensionHeader::is_extension(code) {
            if extensions.len() == MAX_EXTENSION_HEADERS {
                return Err(DecodeError::ChainTooLong {
                    max: MAX_EXTENSION_HEADERS,
                });
            }
            let (ext, used) = ExtensionHeader::decode_as(code, rest)?;
            rest = &rest[used..];
            code = ext.next_header();
            // Nothing is chained behind a fragment header.
            let is_fragment = match &ext {
                ExtensionHeader::Fragment(frag) => {
                    trailing_fragment = frag.is_trailing_fragment();
                    true
                }
                _ => false,
            };
            extensions.push(ext);
            if is_fragment {
                break;
            }
        }

        let (payload, used) = if trailing_fragment {
            let raw = Ipv6Payload::Raw {
                next_header: code,
                data: Bytes::copy_from_slice(rest),
            };
            (raw, rest.len())
        } else {
            Ipv6Payload::decode_as(code, rest)?
        };
        let trailer = Bytes::copy_from_slice(&rest[used..]);

        Ok((
            Self {
                version: b0 >> 4,
                traffic_class: (b0 << 4) | (b1 >> 4),
                flow_label: (u32::from(b1 & 0x0f) << 16) | u32::from(flow_low),
                next_header,
                hop_limit,
                source,
                destination,
                extensions,
                payload,
                trailer,
            },
            total,
        ))
    }
}
