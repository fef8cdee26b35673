//! IPv6 extension headers (RFC 8200 section 4): hop-by-hop options, routing
//! and fragment.

use super::next_header;
use crate::codec::{consumed, ensure, ensure_declared, fit, fit_u8, get_bytes, pad8, Message};
use crate::error::{DecodeError, EncodeError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Smallest hop-by-hop or routing header (HEL = 0).
const MIN_EXT_LEN: usize = 8;

/// Size of the fragment header.
pub const FRAGMENT_HEADER_LEN: usize = 8;

/// Option type of the single-byte Pad1 option.
pub const PAD1: u8 = 0;
/// Option type of the PadN option.
pub const PADN: u8 = 1;
/// Option type of the router alert option (RFC 2711).
pub const ROUTER_ALERT: u8 = 5;

/// Largest fragment offset, in 8-byte units.
pub const MAX_FRAGMENT_OFFSET: u16 = 0x1fff;

/// A hop-by-hop option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ipv6Option {
    /// Single zero byte, no length or data.
    Pad1,
    /// Type, length, value.
    Tlv { option_type: u8, data: Bytes },
}

impl Ipv6Option {
    pub fn tlv(option_type: u8, data: impl Into<Bytes>) -> Self {
        Ipv6Option::Tlv {
            option_type,
            data: data.into(),
        }
    }

    /// Router alert carrying the given value (0 = MLD).
    pub fn router_alert(value: u16) -> Self {
        Self::tlv(ROUTER_ALERT, Bytes::copy_from_slice(&value.to_be_bytes()))
    }

    fn padding(len: usize) -> Option<Self> {
        match len {
            0 => None,
            1 => Some(Ipv6Option::Pad1),
            n => Some(Self::tlv(PADN, vec![0u8; n - 2])),
        }
    }

    fn wire_len(&self) -> usize {
        match self {
            Ipv6Option::Pad1 => 1,
            Ipv6Option::Tlv { data, .. } => 2 + data.len(),
        }
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match self {
            Ipv6Option::Pad1 => buf.put_u8(PAD1),
            Ipv6Option::Tlv { option_type, data } => {
                let len = fit_u8("option data length", data.len())?;
                buf.put_u8(*option_type);
                buf.put_u8(len);
                buf.put_slice(data);
            }
        }
        Ok(())
    }
}

/// Hop-by-hop options header.
///
/// The HEL field is derived from the options. The option list always ends on
/// an 8-byte boundary: [`HopByHopHeader::new`] appends the Pad1 or PadN option
/// that gets it there, so a header reads back exactly as it was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopByHopHeader {
    pub next_header: u8,
    options: Vec<Ipv6Option>,
}

impl HopByHopHeader {
    pub fn new(next_header: u8, mut options: Vec<Ipv6Option>) -> Self {
        let used = 2 + options.iter().map(Ipv6Option::wire_len).sum::<usize>();
        if let Some(pad) = Ipv6Option::padding(pad8(used) - used) {
            options.push(pad);
        }
        Self {
            next_header,
            options,
        }
    }

    /// Options in wire order, including the trailing padding.
    pub fn options(&self) -> &[Ipv6Option] {
        &self.options
    }

    fn options_len(&self) -> usize {
        self.options.iter().map(Ipv6Option::wire_len).sum()
    }
}

impl Message for HopByHopHeader {
    fn length(&self) -> usize {
        pad8(2 + self.options_len())
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let len = self.length();
        let hel = fit_u8("hop-by-hop header length", len / 8 - 1)?;
        buf.put_u8(self.next_header);
        buf.put_u8(hel);
        for option in &self.options {
            option.put(buf)?;
        }
        debug_assert_eq!(len, 2 + self.options_len());
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, MIN_EXT_LEN)?;
        let next_header = buf[0];
        let len = 8 * (buf[1] as usize + 1);
        ensure_declared(buf, "hop-by-hop header length", len)?;

        let mut options = Vec::new();
        let mut offset = 2;
        while offset < len {
            if buf[offset] == PAD1 {
                options.push(Ipv6Option::Pad1);
                offset += 1;
                continue;
            }
            let remaining = len - offset;
            if remaining < 2 {
                return Err(DecodeError::OptionOverrun {
                    offset,
                    length: 2,
                    remaining,
                });
            }
            let data_len = buf[offset + 1] as usize;
            if 2 + data_len > remaining {
                return Err(DecodeError::OptionOverrun {
                    offset,
                    length: 2 + data_len,
                    remaining,
                });
            }
            options.push(Ipv6Option::Tlv {
                option_type: buf[offset],
                data: Bytes::copy_from_slice(&buf[offset + 2..offset + 2 + data_len]),
            });
            offset += 2 + data_len;
        }

        Ok((
            Self {
                next_header,
                options,
            },
            len,
        ))
    }
}

/// Routing header. The type-specific data is carried opaquely and always
/// fills the header to an 8-byte boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingHeader {
    pub next_header: u8,
    pub routing_type: u8,
    pub segments_left: u8,
    data: Bytes,
}

impl RoutingHeader {
    /// Builds a routing header, zero-padding `data` to an 8-byte boundary.
    pub fn new(next_header: u8, routing_type: u8, segments_left: u8, data: &[u8]) -> Self {
        let mut padded = BytesMut::from(data);
        padded.resize(pad8(4 + data.len()) - 4, 0);
        Self {
            next_header,
            routing_type,
            segments_left,
            data: padded.freeze(),
        }
    }

    /// Type-specific data, including any zero padding.
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl Message for RoutingHeader {
    fn length(&self) -> usize {
        pad8(4 + self.data.len())
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let len = self.length();
        let hel = fit_u8("routing header length", len / 8 - 1)?;
        buf.put_u8(self.next_header);
        buf.put_u8(hel);
        buf.put_u8(self.routing_type);
        buf.put_u8(self.segments_left);
        buf.put_slice(&self.data);
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, MIN_EXT_LEN)?;
        let mut cur = buf;
        let next_header = cur.get_u8();
        let len = 8 * (cur.get_u8() as usize + 1);
        ensure_declared(buf, "routing header length", len)?;
        let routing_type = cur.get_u8();
        let segments_left = cur.get_u8();
        let data = get_bytes(&mut cur, len - 4);
        Ok((
            Self {
                next_header,
                routing_type,
                segments_left,
                data,
            },
            consumed(buf, cur),
        ))
    }
}

/// Fragment header.
///
/// ```text
/// +----------+----------+---------------------+---+---+----------------+
/// | next hdr | reserved | offset (13 bits)    |res| M | identification |
/// +----------+----------+---------------------+---+---+----------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    pub next_header: u8,
    /// Offset in 8-byte units, at most [`MAX_FRAGMENT_OFFSET`].
    pub fragment_offset: u16,
    pub more_fragments: bool,
    pub identification: u32,
}

impl FragmentHeader {
    /// Returns whether the payload behind this header starts mid-packet.
    pub fn is_trailing_fragment(&self) -> bool {
        self.fragment_offset != 0
    }
}

impl Message for FragmentHeader {
    fn length(&self) -> usize {
        FRAGMENT_HEADER_LEN
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let offset = fit(
            "fragment offset",
            self.fragment_offset as usize,
            MAX_FRAGMENT_OFFSET as usize,
        )? as u16;
        buf.put_u8(self.next_header);
        buf.put_u8(0);
        buf.put_u16((offset << 3) | u16::from(self.more_fragments));
        buf.put_u32(self.identification);
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, FRAGMENT_HEADER_LEN)?;
        let mut cur = buf;
        let next_header = cur.get_u8();
        cur.advance(1);
        let offset_flags = cur.get_u16();
        let identification = cur.get_u32();
        Ok((
            Self {
                next_header,
                fragment_offset: offset_flags >> 3,
                more_fragments: offset_flags & 1 == 1,
                identification,
            },
            FRAGMENT_HEADER_LEN,
        ))
    }
}

/// One link of the extension header chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionHeader {
    HopByHop(HopByHopHeader),
    Routing(RoutingHeader),
    Fragment(FragmentHeader),
}

impl ExtensionHeader {
    /// Returns whether `code` names an extension header this walker follows.
    pub fn is_extension(code: u8) -> bool {
        matches!(
            code,
            next_header::HOP_BY_HOP | next_header::ROUTING | next_header::FRAGMENT
        )
    }

    /// Next-header code that identifies this header to its predecessor.
    pub fn code(&self) -> u8 {
        match self {
            ExtensionHeader::HopByHop(_) => next_header::HOP_BY_HOP,
            ExtensionHeader::Routing(_) => next_header::ROUTING,
            ExtensionHeader::Fragment(_) => next_header::FRAGMENT,
        }
    }

    /// Code of whatever follows this header.
    pub fn next_header(&self) -> u8 {
        match self {
            ExtensionHeader::HopByHop(h) => h.next_header,
            ExtensionHeader::Routing(h) => h.next_header,
            ExtensionHeader::Fragment(h) => h.next_header,
        }
    }

    pub fn set_next_header(&mut self, code: u8) {
        match self {
            ExtensionHeader::HopByHop(h) => h.next_header = code,
            ExtensionHeader::Routing(h) => h.next_header = code,
            ExtensionHeader::Fragment(h) => h.next_header = code,
        }
    }

    /// Decodes the extension header named by `code`.
    pub fn decode_as(code: u8, buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        match code {
            next_header::HOP_BY_HOP => {
                HopByHopHeader::decode(buf).map(|(h, n)| (ExtensionHeader::HopByHop(h), n))
            }
            next_header::ROUTING => {
                RoutingHeader::decode(buf).map(|(h, n)| (ExtensionHeader::Routing(h), n))
            }
            next_header::FRAGMENT => {
                FragmentHeader::decode(buf).map(|(h, n)| (ExtensionHeader::Fragment(h), n))
            }
            code => Err(DecodeError::UnknownType {
                kind: "IPv6 extension header",
                code,
            }),
        }
    }

    pub(crate) fn length(&self) -> usize {
        match self {
            ExtensionHeader::HopByHop(h) => h.length(),
            ExtensionHeader::Routing(h) => h.length(),
            ExtensionHeader::Fragment(h) => h.length(),
        }
    }

    pub(crate) fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match self {
            ExtensionHeader::HopByHop(h) => h.put(buf),
            ExtensionHeader::Routing(h) => h.put(buf),
            ExtensionHeader::Fragment(h) => h.put(buf),
        }
    }
}
