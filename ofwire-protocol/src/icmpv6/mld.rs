//! Multicast Listener Discovery messages (RFC 2710, RFC 3810).
//!
//! ```text
//! MLDv1 (24 bytes)          MLDv2 query (28 + 16N bytes)
//! +------+------+--------+  +--------------------------+
//! | type | code | cksum  |  | MLDv1 layout (24 bytes)  |
//! +------+------+--------+  +-------+------+-----------+
//! | max resp   | reserved|  | S|QRV | QQIC | N sources |
//! +-------------+--------+  +-------+------+-----------+
//! | multicast address    |  | N x 16-byte source       |
//! +----------------------+  +--------------------------+
//! ```

use super::{Icmpv6Header, MLDV2_REPORT, MLD_DONE, MLD_QUERY, MLD_REPORT};
use crate::codec::{
    consumed, ensure, ensure_declared, fit_u16, fit_u8, get_ipv6, get_words, pack_s_qrv,
    put_words, unpack_s_qrv, Message,
};
use crate::error::{DecodeError, EncodeError};
use bytes::{Buf, BufMut, BytesMut};
use std::net::Ipv6Addr;

/// Size of an MLDv1 query, report or done message.
pub const MLD_LEN: usize = 24;

/// Size of an MLDv2 query without sources. Inputs of this length or shorter
/// decode as MLDv1.
pub const MLDV2_QUERY_MIN_LEN: usize = 28;

const MLDV2_REPORT_MIN_LEN: usize = 8;
const MLDV2_RECORD_MIN_LEN: usize = 20;

/// MLDv1 query, report or done. Also the fixed prefix of an MLDv2 query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mld {
    pub header: Icmpv6Header,
    pub max_response_delay: u16,
    pub multicast_address: Ipv6Addr,
}

impl Mld {
    pub fn query(max_response_delay: u16, multicast_address: Ipv6Addr) -> Self {
        Self {
            header: Icmpv6Header::new(MLD_QUERY, 0),
            max_response_delay,
            multicast_address,
        }
    }

    pub fn report(multicast_address: Ipv6Addr) -> Self {
        Self {
            header: Icmpv6Header::new(MLD_REPORT, 0),
            max_response_delay: 0,
            multicast_address,
        }
    }

    pub fn done(multicast_address: Ipv6Addr) -> Self {
        Self {
            header: Icmpv6Header::new(MLD_DONE, 0),
            max_response_delay: 0,
            multicast_address,
        }
    }
}

impl Message for Mld {
    fn length(&self) -> usize {
        MLD_LEN
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        self.header.put(buf)?;
        buf.put_u16(self.max_response_delay);
        buf.put_u16(0);
        buf.put_slice(&self.multicast_address.octets());
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, MLD_LEN)?;
        let (header, n) = Icmpv6Header::decode(buf)?;
        let mut cur = &buf[n..];
        let max_response_delay = cur.get_u16();
        cur.advance(2);
        let multicast_address = get_ipv6(&mut cur);
        Ok((
            Self {
                header,
                max_response_delay,
                multicast_address,
            },
            consumed(buf, cur),
        ))
    }
}

/// MLDv2 query: the MLDv1 layout followed by querier flags and a source list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mldv2Query {
    pub base: Mld,
    pub suppress_router_processing: bool,
    /// Querier's robustness variable (3 bits).
    pub robustness: u8,
    /// Querier's query interval code (QQIC).
    pub query_interval: u8,
    pub sources: Vec<Ipv6Addr>,
}

impl Message for Mldv2Query {
    fn length(&self) -> usize {
        MLDV2_QUERY_MIN_LEN + 16 * self.sources.len()
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let s_qrv = pack_s_qrv(self.suppress_router_processing, self.robustness)?;
        let count = fit_u16("MLDv2 source count", self.sources.len())?;
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
        ensure(buf, MLDV2_QUERY_MIN_LEN)?;
        let (base, n) = Mld::decode(buf)?;
        let mut cur = &buf[n..];
        let (suppress_router_processing, robustness) = unpack_s_qrv(cur.get_u8());
        let query_interval = cur.get_u8();
        let count = cur.get_u16() as usize;
        ensure_declared(buf, "MLDv2 source count", MLDV2_QUERY_MIN_LEN + 16 * count)?;
        let sources = (0..count).map(|_| get_ipv6(&mut cur)).collect();
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

/// An MLD query. The version is selected purely by input length: up to 28
/// bytes is MLDv1, anything longer is MLDv2.
///
/// A v2 query without sources encodes to exactly 28 bytes and therefore reads
/// back as v1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MldQuery {
    V1(Mld),
    V2(Mldv2Query),
}

impl MldQuery {
    pub fn v1(max_response_delay: u16, multicast_address: Ipv6Addr) -> Self {
        MldQuery::V1(Mld::query(max_response_delay, multicast_address))
    }

    pub fn v2(
        max_response_delay: u16,
        multicast_address: Ipv6Addr,
        robustness: u8,
        query_interval: u8,
        sources: Vec<Ipv6Addr>,
    ) -> Self {
        MldQuery::V2(Mldv2Query {
            base: Mld::query(max_response_delay, multicast_address),
            suppress_router_processing: false,
            robustness,
            query_interval,
            sources,
        })
    }

    pub fn multicast_address(&self) -> Ipv6Addr {
        match self {
            MldQuery::V1(q) => q.multicast_address,
            MldQuery::V2(q) => q.base.multicast_address,
        }
    }

    /// Source addresses; always empty for v1.
    pub fn sources(&self) -> &[Ipv6Addr] {
        match self {
            MldQuery::V1(_) => &[],
            MldQuery::V2(q) => &q.sources,
        }
    }
}

impl Message for MldQuery {
    fn length(&self) -> usize {
        match self {
            MldQuery::V1(q) => q.length(),
            MldQuery::V2(q) => q.length(),
        }
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        match self {
            MldQuery::V1(q) => q.put(buf),
            MldQuery::V2(q) => q.put(buf),
        }
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, MLD_LEN)?;
        if buf.len() > MLDV2_QUERY_MIN_LEN {
            Mldv2Query::decode(buf).map(|(q, n)| (MldQuery::V2(q), n))
        } else {
            Mld::decode(buf).map(|(q, n)| (MldQuery::V1(q), n))
        }
    }
}

/// One multicast address record of an MLDv2 report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mldv2Record {
    pub record_type: u8,
    pub multicast_address: Ipv6Addr,
    pub sources: Vec<Ipv6Addr>,
    /// Auxiliary data, in 4-byte words.
    pub aux_data: Vec<u32>,
}

impl Mldv2Record {
    pub fn new(record_type: u8, multicast_address: Ipv6Addr, sources: Vec<Ipv6Addr>) -> Self {
        Self {
            record_type,
            multicast_address,
            sources,
            aux_data: Vec::new(),
        }
    }
}

impl Message for Mldv2Record {
    fn length(&self) -> usize {
        MLDV2_RECORD_MIN_LEN + 16 * self.sources.len() + 4 * self.aux_data.len()
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let aux_len = fit_u8("MLDv2 aux data length", self.aux_data.len())?;
        let count = fit_u16("MLDv2 source count", self.sources.len())?;
        buf.put_u8(self.record_type);
        buf.put_u8(aux_len);
        buf.put_u16(count);
        buf.put_slice(&self.multicast_address.octets());
        for source in &self.sources {
            buf.put_slice(&source.octets());
        }
        put_words(buf, &self.aux_data);
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, MLDV2_RECORD_MIN_LEN)?;
        let mut cur = buf;
        let record_type = cur.get_u8();
        let aux_len = cur.get_u8() as usize;
        let count = cur.get_u16() as usize;
        ensure_declared(
            buf,
            "MLDv2 record length",
            MLDV2_RECORD_MIN_LEN + 16 * count + 4 * aux_len,
        )?;
        let multicast_address = get_ipv6(&mut cur);
        let sources = (0..count).map(|_| get_ipv6(&mut cur)).collect();
        let aux_data = get_words(&mut cur, aux_len);
        Ok((
            Self {
                record_type,
                multicast_address,
                sources,
                aux_data,
            },
            consumed(buf, cur),
        ))
    }
}

/// MLDv2 listener report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mldv2Report {
    pub header: Icmpv6Header,
    pub records: Vec<Mldv2Record>,
}

impl Mldv2Report {
    pub fn new(records: Vec<Mldv2Record>) -> Self {
        Self {
            header: Icmpv6Header::new(MLDV2_REPORT, 0),
            records,
        }
    }
}

impl Message for Mldv2Report {
    fn length(&self) -> usize {
        MLDV2_REPORT_MIN_LEN + self.records.iter().map(Message::length).sum::<usize>()
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let count = fit_u16("MLDv2 record count", self.records.len())?;
        self.header.put(buf)?;
        buf.put_u16(0);
        buf.put_u16(count);
        for record in &self.records {
            record.put(buf)?;
        }
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, MLDV2_REPORT_MIN_LEN)?;
        let (header, n) = Icmpv6Header::decode(buf)?;
        let mut cur = &buf[n..];
        cur.advance(2);
        let count = cur.get_u16() as usize;
        ensure_declared(
            buf,
            "MLDv2 record count",
            MLDV2_REPORT_MIN_LEN + MLDV2_RECORD_MIN_LEN * count,
        )?;
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            let (record, used) = Mldv2Record::decode(cur)?;
            cur.advance(used);
            records.push(record);
        }
        Ok((Self { header, records }, consumed(buf, cur)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_type;

    fn addr(s: &str) -> Ipv6Addr {
        s.parse().unwrap()
    }

    #[test]
    fn test_mld_layout() {
        let report = Mld::report(addr("ff02::1:ff00:1"));
        let encoded = report.encode().unwrap();
        assert_eq!(encoded.len(), MLD_LEN);
        assert_eq!(&encoded[..8], &[131, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&encoded[8..10], &[0xff, 0x02]);
        assert_eq!(&encoded[20..24], &[0xff, 0x00, 0x00, 0x01]);

        let (decoded, n) = Mld::decode(&encoded).unwrap();
        assert_eq!(n, MLD_LEN);
        assert_eq!(decoded, report);
    }

    #[test]
    fn test_query_v1_from_28_bytes() {
        let v1 = Mld::query(1000, addr("ff02::2"));
        let mut wire = v1.encode().unwrap().to_vec();
        wire.extend_from_slice(&[0, 0, 0, 0]);
        assert_eq!(wire.len(), 28);

        let (decoded, n) = MldQuery::decode(&wire).unwrap();
        assert_eq!(n, MLD_LEN);
        assert_eq!(decoded, MldQuery::V1(v1));
        assert!(decoded.sources().is_empty());
    }

    #[test]
    fn test_query_v1_from_24_bytes() {
        let query = MldQuery::v1(500, Ipv6Addr::UNSPECIFIED);
        let encoded = query.encode().unwrap();
        assert_eq!(encoded.len(), MLD_LEN);
        let (decoded, _) = MldQuery::decode(&encoded).unwrap();
        assert_eq!(decoded, query);
    }

    #[test]
    fn test_query_v2_source_count_matches_length() {
        for k in 1..4 {
            let sources: Vec<Ipv6Addr> = (0..k)
                .map(|i| Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, i as u16 + 1))
                .collect();
            let query = MldQuery::v2(10000, addr("ff0e::101"), 2, 125, sources.clone());
            let encoded = query.encode().unwrap();
            assert_eq!(encoded.len(), MLDV2_QUERY_MIN_LEN + 16 * k);

            let (decoded, n) = MldQuery::decode(&encoded).unwrap();
            assert_eq!(n, encoded.len());
            assert_eq!(decoded.sources(), &sources[..]);
            assert_eq!(decoded, query);
        }
    }

    #[test]
    fn test_query_v2_without_sources_reads_back_as_v1() {
        // Length alone selects the version; a sourceless v2 query is 28 bytes.
        let query = MldQuery::v2(100, addr("ff02::1"), 2, 125, Vec::new());
        let encoded = query.encode().unwrap();
        assert_eq!(encoded.len(), MLDV2_QUERY_MIN_LEN);

        let (decoded, _) = MldQuery::decode(&encoded).unwrap();
        assert!(matches!(decoded, MldQuery::V1(_)));
        assert_eq!(decoded.multicast_address(), addr("ff02::1"));
    }

    #[test]
    fn test_query_v2_flags_byte() {
        let query = Mldv2Query {
            base: Mld::query(0, Ipv6Addr::UNSPECIFIED),
            suppress_router_processing: true,
            robustness: 3,
            query_interval: 60,
            sources: vec![addr("2001:db8::1")],
        };
        let encoded = query.encode().unwrap();
        assert_eq!(encoded[24], 0x0b);
        assert_eq!(encoded[25], 60);
        assert_eq!(&encoded[26..28], &[0, 1]);

        let (decoded, _) = Mldv2Query::decode(&encoded).unwrap();
        assert!(decoded.suppress_router_processing);
        assert_eq!(decoded.robustness, 3);
    }

    #[test]
    fn test_query_v2_source_count_overrun() {
        let query = MldQuery::v2(0, addr("ff02::1"), 2, 125, vec![addr("2001:db8::1")]);
        let mut wire = query.encode().unwrap().to_vec();
        // Claim two sources, carry one
        wire[27] = 2;
        let err = MldQuery::decode(&wire).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InconsistentLength {
                declared: 60,
                available: 44,
                ..
            }
        ));
    }

    #[test]
    fn test_query_truncated() {
        let encoded = MldQuery::v1(1, addr("ff02::1")).encode().unwrap();
        for len in 0..MLD_LEN {
            assert!(MldQuery::decode(&encoded[..len]).unwrap_err().is_truncated());
        }
    }

    #[test]
    fn test_record_layout() {
        let record = Mldv2Record {
            record_type: record_type::CHANGE_TO_EXCLUDE_MODE,
            multicast_address: addr("ff05::fb"),
            sources: vec![addr("2001:db8::a")],
            aux_data: vec![0xdead_beef],
        };
        let encoded = record.encode().unwrap();
        assert_eq!(encoded.len(), 20 + 16 + 4);
        assert_eq!(&encoded[..4], &[4, 1, 0, 1]);
        assert_eq!(&encoded[36..], &[0xde, 0xad, 0xbe, 0xef]);

        let (decoded, n) = Mldv2Record::decode(&encoded).unwrap();
        assert_eq!(n, encoded.len());
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_report_record_counts() {
        let records = vec![
            Mldv2Record::new(record_type::MODE_IS_INCLUDE, addr("ff0e::1"), vec![]),
            Mldv2Record {
                record_type: record_type::ALLOW_NEW_SOURCES,
                multicast_address: addr("ff0e::2"),
                sources: vec![addr("2001:db8::1"), addr("2001:db8::2")],
                aux_data: vec![1, 2, 3],
            },
            Mldv2Record::new(
                record_type::BLOCK_OLD_SOURCES,
                addr("ff0e::3"),
                vec![addr("2001:db8::3")],
            ),
        ];
        let report = Mldv2Report::new(records);
        let encoded = report.encode().unwrap();
        assert_eq!(&encoded[4..8], &[0, 0, 0, 3]);
        assert_eq!(encoded.len(), report.length());

        let (decoded, n) = Mldv2Report::decode(&encoded).unwrap();
        assert_eq!(n, encoded.len());
        assert_eq!(decoded.records.len(), 3);
        assert_eq!(decoded.records[1].sources.len(), 2);
        assert_eq!(decoded.records[1].aux_data, vec![1, 2, 3]);
        assert_eq!(decoded, report);
    }

    #[test]
    fn test_report_record_count_overrun() {
        let report = Mldv2Report::new(vec![Mldv2Record::new(
            record_type::MODE_IS_EXCLUDE,
            addr("ff02::fb"),
            vec![],
        )]);
        let mut wire = report.encode().unwrap().to_vec();
        wire[7] = 5;
        let err = Mldv2Report::decode(&wire).unwrap_err();
        assert!(matches!(err, DecodeError::InconsistentLength { .. }));
    }

    #[test]
    fn test_record_aux_overrun() {
        let record = Mldv2Record::new(record_type::MODE_IS_INCLUDE, addr("ff02::fb"), vec![]);
        let mut wire = record.encode().unwrap().to_vec();
        wire[1] = 1;
        let err = Mldv2Record::decode(&wire).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InconsistentLength {
                field: "MLDv2 record length",
                declared: 24,
                available: 20,
            }
        );
    }

    #[test]
    fn test_report_and_record_truncated() {
        let record = Mldv2Record::new(
            record_type::MODE_IS_EXCLUDE,
            addr("ff02::fb"),
            vec![addr("2001:db8::1")],
        );
        let encoded = record.encode().unwrap();
        for len in 0..MLDV2_RECORD_MIN_LEN {
            let err = Mldv2Record::decode(&encoded[..len]).unwrap_err();
            assert!(err.is_truncated(), "record prefix of {} bytes", len);
        }

        let encoded = Mldv2Report::new(vec![record]).encode().unwrap();
        for len in 0..MLDV2_REPORT_MIN_LEN {
            let err = Mldv2Report::decode(&encoded[..len]).unwrap_err();
            assert!(err.is_truncated(), "report prefix of {} bytes", len);
        }
    }

    #[test]
    fn test_record_rejects_oversized_aux_data() {
        let mut record = Mldv2Record::new(record_type::MODE_IS_INCLUDE, addr("ff02::fb"), vec![]);
        record.aux_data = vec![0; 255];
        assert_eq!(record.encode().unwrap()[1], 255);

        record.aux_data.push(0);
        assert_eq!(
            record.encode().unwrap_err(),
            EncodeError::FieldOverflow {
                field: "MLDv2 aux data length",
                value: 256,
                max: 255
            }
        );
    }

    #[test]
    fn test_source_count_overflow() {
        let sources = vec![Ipv6Addr::UNSPECIFIED; u16::MAX as usize + 1];

        let record = Mldv2Record::new(
            record_type::MODE_IS_INCLUDE,
            addr("ff02::fb"),
            sources.clone(),
        );
        assert!(matches!(
            record.encode(),
            Err(EncodeError::FieldOverflow { field: "MLDv2 source count", value: 65536, .. })
        ));

        let query = MldQuery::v2(0, addr("ff02::1"), 2, 125, sources);
        assert!(matches!(
            query.encode(),
            Err(EncodeError::FieldOverflow { field: "MLDv2 source count", .. })
        ));
    }

    #[test]
    fn test_report_record_count_overflow() {
        let record = Mldv2Record::new(record_type::MODE_IS_INCLUDE, addr("ff02::fb"), vec![]);
        let report = Mldv2Report::new(vec![record; u16::MAX as usize + 1]);
        assert_eq!(
            report.encode().unwrap_err(),
            EncodeError::FieldOverflow {
                field: "MLDv2 record count",
                value: 65536,
                max: 65535
            }
        );
    }

    #[test]
    fn test_query_robustness_out_of_range() {
        let query = MldQuery::v2(0, addr("ff02::1"), 8, 125, vec![addr("2001:db8::1")]);
        assert!(matches!(
            query.encode(),
            Err(EncodeError::FieldOverflow { field: "robustness", value: 8, max: 7 })
        ));
    }
}
