//! IGMP messages (RFC 1112, RFC 2236, RFC 3376).
//!
//! Structurally parallel to MLD, with 4-byte IPv4 addresses.

use crate::codec::{
    consumed, ensure, ensure_declared, fit_u16, fit_u8, get_ipv4, get_words, pack_s_qrv,
    put_words, unpack_s_qrv, Message,
};
use crate::error::{DecodeError, EncodeError};
use bytes::{Buf, BufMut, BytesMut};
use std::net::Ipv4Addr;

pub const IGMP_QUERY: u8 = 0x11;
pub const IGMPV1_REPORT: u8 = 0x12;
pub const IGMPV2_REPORT: u8 = 0x16;
pub const IGMPV2_LEAVE: u8 = 0x17;
pub const IGMPV3_REPORT: u8 = 0x22;

/// Size of an IGMPv1/v2 message.
pub const IGMPV1OR2_LEN: usize = 8;

/// Size of an IGMPv3 query without sources.
pub const IGMPV3_QUERY_MIN_LEN: usize = 12;

const IGMPV3_REPORT_MIN_LEN: usize = 8;
const IGMPV3_RECORD_MIN_LEN: usize = 8;

/// Exposes the wire type of a decoded IGMP message so callers can dispatch
/// without a separate tag.
pub trait IgmpMessage {
    fn message_type(&self) -> u8;
}

/// IGMPv1/v2 message: type, max response time, checksum, group address.
/// Also the fixed prefix of an IGMPv3 query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IgmpV1or2 {
    pub igmp_type: u8,
    pub max_response_time: u8,
    pub checksum: u16,
    pub group_address: Ipv4Addr,
}

impl IgmpV1or2 {
    pub fn new(igmp_type: u8, max_response_time: u8, group_address: Ipv4Addr) -> Self {
        Self {
            igmp_type,
            max_response_time,
            checksum: 0,
            group_address,
        }
    }

    pub fn query(max_response_time: u8, group_address: Ipv4Addr) -> Self {
        Self::new(IGMP_QUERY, max_response_time, group_address)
    }

    pub fn v1_report(group_address: Ipv4Addr) -> Self {
        Self::new(IGMPV1_REPORT, 0, group_address)
    }

    pub fn v2_report(group_address: Ipv4Addr) -> Self {
        Self::new(IGMPV2_REPORT, 0, group_address)
    }

    pub fn v2_leave(group_address: Ipv4Addr) -> Self {
        Self::new(IGMPV2_LEAVE, 0, group_address)
    }
}

impl IgmpMessage for IgmpV1or2 {
    fn message_type(&self) -> u8 {
        self.igmp_type
    }
}

impl Message for IgmpV1or2 {
    fn length(&self) -> usize {
        IGMPV1OR2_LEN
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.igmp_type);
        buf.put_u8(self.max_response_time);
        buf.put_u16(self.checksum);
        buf.put_slice(&self.group_address.octets());
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, IGMPV1OR2_LEN)?;
        let mut cur = buf;
        let message = Self {
            igmp_type: cur.get_u8(),
            max_response_time: cur.get_u8(),
            checksum: cur.get_u16(),
            group_address: get_ipv4(&mut cur),
        };
        Ok((message, consumed(buf, cur)))
    }
}

/// IGMPv3 membership query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgmpV3Query {
    /// Type, max response code, checksum and group address.
    pub base: IgmpV1or2,
    pub suppress_router_processing: bool,
    /// Querier's robustness variable (3 bits).
    pub robustness: u8,
    /// Querier's query interval code (QQIC).
    pub query_interval: u8,
    pub sources: Vec<Ipv4Addr>,
}

impl IgmpV3Query {
    pub fn new(
        max_response_code: u8,
        group_address: Ipv4Addr,
        robustness: u8,
        query_interval: u8,
        sources: Vec<Ipv4Addr>,
    ) -> Self {
        Self {
            base: IgmpV1or2::query(max_response_code, group_address),
            suppress_router_processing: false,
            robustness,
            query_interval,
            sources,
        }
    }
}

impl IgmpMessage for IgmpV3Query {
    fn message_type(&self) -> u8 {
        self.base.igmp_type
    }
}

impl Message for IgmpV3Query {
    fn length(&self) -> usize {
        IGMPV3_QUERY_MIN_LEN + 4 * self.sources.len()
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let s_qrv = pack_s_qrv(self.suppress_router_processing, self.robustness)?;
        let count = fit_u16("IGMPv3 source count", self.sources.len())?;
        self.base.put(buf)?;
        buf.put_u8(s_qrv);
        buf.put_u8(self.query_interval);
        buf.put_u16(count);
        for source in &self.sources {
            buf.put_slice(&source.octets());
        }
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, IGMPV3_QUERY_MIN_LEN)?;
        let (base, n) = IgmpV1or2::decode(buf)?;
        let mut cur = &buf[n..];
        let (suppress_router_processing, robustness) = unpack_s_qrv(cur.get_u8());
        let query_interval = cur.get_u8();
        let count = cur.get_u16() as usize;
        ensure_declared(buf, "IGMPv3 source count", IGMPV3_QUERY_MIN_LEN + 4 * count)?;
        let sources = (0..count).map(|_| get_ipv4(&mut cur)).collect();
        Ok((
            Self {
                base,
                suppress_router_processing,
                robustness,
                query_interval,
                sources,
            },
            consumed(buf, cur),
        ))
    }
}

/// One group record of an IGMPv3 membership report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgmpV3GroupRecord {
    pub record_type: u8,
    pub group_address: Ipv4Addr,
    pub sources: Vec<Ipv4Addr>,
    /// Auxiliary data, in 4-byte words.
    pub aux_data: Vec<u32>,
}

impl IgmpV3GroupRecord {
    pub fn new(record_type: u8, group_address: Ipv4Addr, sources: Vec<Ipv4Addr>) -> Self {
        Self {
            record_type,
            group_address,
            sources,
            aux_data: Vec::new(),
        }
    }
}

impl Message for IgmpV3GroupRecord {
    fn length(&self) -> usize {
        IGMPV3_RECORD_MIN_LEN + 4 * self.sources.len() + 4 * self.aux_data.len()
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let aux_len = fit_u8("IGMPv3 aux data length", self.aux_data.len())?;
        let count = fit_u16("IGMPv3 source count", self.sources.len())?;
        buf.put_u8(self.record_type);
        buf.put_u8(aux_len);
        buf.put_u16(count);
        buf.put_slice(&self.group_address.octets());
        for source in &self.sources {
            buf.put_slice(&source.octets());
        }
        put_words(buf, &self.aux_data);
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, IGMPV3_RECORD_MIN_LEN)?;
        let mut cur = buf;
        let record_type = cur.get_u8();
        let aux_len = cur.get_u8() as usize;
        let count = cur.get_u16() as usize;
        ensure_declared(
            buf,
            "IGMPv3 group record length",
            IGMPV3_RECORD_MIN_LEN + 4 * count + 4 * aux_len,
        )?;
        let group_address = get_ipv4(&mut cur);
        let sources = (0..count).map(|_| get_ipv4(&mut cur)).collect();
        let aux_data = get_words(&mut cur, aux_len);
        Ok((
            Self {
                record_type,
                group_address,
                sources,
                aux_data,
            },
            consumed(buf, cur),
        ))
    }
}

/// IGMPv3 membership report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IgmpV3Report {
    pub checksum: u16,
    pub records: Vec<IgmpV3GroupRecord>,
}

impl IgmpV3Report {
    pub fn new(records: Vec<IgmpV3GroupRecord>) -> Self {
        Self {
            checksum: 0,
            records,
        }
    }
}

impl IgmpMessage for IgmpV3Report {
    fn message_type(&self) -> u8 {
        IGMPV3_REPORT
    }
}

impl Message for IgmpV3Report {
    fn length(&self) -> usize {
        IGMPV3_REPORT_MIN_LEN + self.records.iter().map(Message::length).sum::<usize>()
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let count = fit_u16("IGMPv3 group record count", self.records.len())?;
        buf.put_u8(IGMPV3_REPORT);
        buf.put_u8(0);
        buf.put_u16(self.checksum);
        buf.put_u16(0);
        buf.put_u16(count);
        for record in &self.records {
            record.put(buf)?;
        }
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, IGMPV3_REPORT_MIN_LEN)?;
        let mut cur = buf;
        let igmp_type = cur.get_u8();
        if igmp_type != IGMPV3_REPORT {
            return Err(DecodeError::UnknownType {
                kind: "IGMPv3 report",
                code: igmp_type,
            });
        }
        cur.advance(1);
        let checksum = cur.get_u16();
        cur.advance(2);
        let count = cur.get_u16() as usize;
        ensure_declared(
            buf,
            "IGMPv3 group record count",
            IGMPV3_REPORT_MIN_LEN + IGMPV3_RECORD_MIN_LEN * count,
        )?;
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            let (record, used) = IgmpV3GroupRecord::decode(cur)?;
            cur.advance(used);
            records.push(record);
        }
        Ok((Self { checksum, records }, consumed(buf, cur)))
    }
}

/// A decoded IGMP message of any version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Igmp {
    V1or2(IgmpV1or2),
    V3Query(IgmpV3Query),
    V3Report(IgmpV3Report),
}

impl IgmpMessage for Igmp {
    fn message_type(&self) -> u8 {
        match self {
            Igmp::V1or2(m) => m.message_type(),
            Igmp::V3Query(m) => m.message_type(),
            Igmp::V3Report(m) => m.message_type(),
        }
    }
}

impl Message for Igmp {
    fn length(&self) -> usize {
        match self {
            Igmp::V1or2(m) => m.length(),
            Igmp::V3Query(m) => m.length(),
            Igmp::V3Report(m) => m.length(),
        }
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match self {
            Igmp::V1or2(m) => m.put(buf),
            Igmp::V3Query(m) => m.put(buf),
            Igmp::V3Report(m) => m.put(buf),
        }
    }

    /// Selects a codec by type byte. Queries longer than 8 bytes are IGMPv3
    /// (RFC 3376 section 7.1). Unknown types have no fallback and fail.
    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, 1)?;
        match buf[0] {
            IGMP_QUERY if buf.len() > IGMPV1OR2_LEN => {
                IgmpV3Query::decode(buf).map(|(m, n)| (Igmp::V3Query(m), n))
            }
            IGMP_QUERY | IGMPV1_REPORT | IGMPV2_REPORT | IGMPV2_LEAVE => {
                IgmpV1or2::decode(buf).map(|(m, n)| (Igmp::V1or2(m), n))
            }
            IGMPV3_REPORT => IgmpV3Report::decode(buf).map(|(m, n)| (Igmp::V3Report(m), n)),
            code => Err(DecodeError::UnknownType { kind: "IGMP", code }),
        }
    }
}
