//! ICMPv6 messages (RFC 4443) and the type dispatcher that selects a body
//! codec from the leading type byte.

mod mld;

pub use mld::{Mld, MldQuery, Mldv2Query, Mldv2Record, Mldv2Report, MLDV2_QUERY_MIN_LEN, MLD_LEN};

use crate::codec::{consumed, ensure, get_bytes, Message};
use crate::error::{DecodeError, EncodeError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const ECHO_REQUEST: u8 = 128;
pub const ECHO_REPLY: u8 = 129;
pub const MLD_QUERY: u8 = 130;
pub const MLD_REPORT: u8 = 131;
pub const MLD_DONE: u8 = 132;
pub const MLDV2_REPORT: u8 = 143;

/// Size of the common ICMPv6 header.
pub const ICMPV6_HEADER_LEN: usize = 4;

/// Size of the echo request/reply prefix (header + identifier + sequence).
pub const ECHO_PREFIX_LEN: usize = 8;

/// Common ICMPv6 header: type, code, checksum.
///
/// The checksum is carried as supplied; it is never computed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Icmpv6Header {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
}

impl Icmpv6Header {
    pub fn new(icmp_type: u8, code: u8) -> Self {
        Self {
            icmp_type,
            code,
            checksum: 0,
        }
    }

    pub fn with_checksum(mut self, checksum: u16) -> Self {
        self.checksum = checksum;
        self
    }
}

impl Message for Icmpv6Header {
    fn length(&self) -> usize {
        ICMPV6_HEADER_LEN
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.icmp_type);
        buf.put_u8(self.code);
        buf.put_u16(self.checksum);
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, ICMPV6_HEADER_LEN)?;
        let mut cur = buf;
        let header = Self {
            icmp_type: cur.get_u8(),
            code: cur.get_u8(),
            checksum: cur.get_u16(),
        };
        Ok((header, ICMPV6_HEADER_LEN))
    }
}

/// Echo request or reply. The trailing data runs to the end of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Echo {
    pub header: Icmpv6Header,
    pub identifier: u16,
    pub sequence: u16,
    pub data: Bytes,
}

impl Echo {
    pub fn request(identifier: u16, sequence: u16, data: impl Into<Bytes>) -> Self {
        Self {
            header: Icmpv6Header::new(ECHO_REQUEST, 0),
            identifier,
            sequence,
            data: data.into(),
        }
    }

    pub fn reply(identifier: u16, sequence: u16, data: impl Into<Bytes>) -> Self {
        Self {
            header: Icmpv6Header::new(ECHO_REPLY, 0),
            identifier,
            sequence,
            data: data.into(),
        }
    }

    pub fn is_request(&self) -> bool {
        self.header.icmp_type == ECHO_REQUEST
    }
}

impl Message for Echo {
    fn length(&self) -> usize {
        ECHO_PREFIX_LEN + self.data.len()
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        self.header.put(buf)?;
        buf.put_u16(self.identifier);
        buf.put_u16(self.sequence);
        buf.put_slice(&self.data);
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, ECHO_PREFIX_LEN)?;
        let (header, n) = Icmpv6Header::decode(buf)?;
        let mut cur = &buf[n..];
        let identifier = cur.get_u16();
        let sequence = cur.get_u16();
        let rest = cur.len();
        let data = get_bytes(&mut cur, rest);
        Ok((
            Self {
                header,
                identifier,
                sequence,
                data,
            },
            consumed(buf, cur),
        ))
    }
}

/// A decoded ICMPv6 message, one case per supported body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Icmpv6 {
    /// Echo request (128) or reply (129).
    Echo(Echo),
    /// MLD query (130), v1 or v2 depending on input length.
    MldQuery(MldQuery),
    /// MLDv1 report (131) or done (132).
    Mld(Mld),
    /// MLDv2 report (143).
    Mldv2Report(Mldv2Report),
    /// Any other type, carried opaquely.
    Unknown { header: Icmpv6Header, body: Bytes },
}

impl Icmpv6 {
    /// Wire type of the message.
    pub fn message_type(&self) -> u8 {
        self.header().icmp_type
    }

    pub fn header(&self) -> &Icmpv6Header {
        match self {
            Icmpv6::Echo(m) => &m.header,
            Icmpv6::MldQuery(MldQuery::V1(m)) => &m.header,
            Icmpv6::MldQuery(MldQuery::V2(m)) => &m.base.header,
            Icmpv6::Mld(m) => &m.header,
            Icmpv6::Mldv2Report(m) => &m.header,
            Icmpv6::Unknown { header, .. } => header,
        }
    }
}

impl Message for Icmpv6 {
    fn length(&self) -> usize {
        match self {
            Icmpv6::Echo(m) => m.length(),
            Icmpv6::MldQuery(m) => m.length(),
            Icmpv6::Mld(m) => m.length(),
            Icmpv6::Mldv2Report(m) => m.length(),
            Icmpv6::Unknown { body, .. } => ICMPV6_HEADER_LEN + body.len(),
        }
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match self {
            Icmpv6::Echo(m) => m.put(buf),
            Icmpv6::MldQuery(m) => m.put(buf),
            Icmpv6::Mld(m) => m.put(buf),
            Icmpv6::Mldv2Report(m) => m.put(buf),
            Icmpv6::Unknown { header, body } => {
                header.put(buf)?;
                buf.put_slice(body);
                Ok(())
            }
        }
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, ICMPV6_HEADER_LEN)?;
        match buf[0] {
            ECHO_REQUEST | ECHO_REPLY => {
                Echo::decode(buf).map(|(m, n)| (Icmpv6::Echo(m), n))
            }
            MLD_QUERY => MldQuery::decode(buf).map(|(m, n)| (Icmpv6::MldQuery(m), n)),
            MLD_REPORT | MLD_DONE => Mld::decode(buf).map(|(m, n)| (Icmpv6::Mld(m), n)),
            MLDV2_REPORT => {
                Mldv2Report::decode(buf).map(|(m, n)| (Icmpv6::Mldv2Report(m), n))
            }
            _ => {
                let (header, n) = Icmpv6Header::decode(buf)?;
                let body = Bytes::copy_from_slice(&buf[n..]);
                Ok((Icmpv6::Unknown { header, body }, buf.len()))
            }
        }
    }
}
