//! UDP datagrams (RFC 768), carried as an IPv6 terminal payload.

use crate::codec::{consumed, ensure, ensure_declared, fit_u16, get_bytes, Message};
use crate::error::{DecodeError, EncodeError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the UDP header.
pub const UDP_HEADER_LEN: usize = 8;

/// A UDP datagram. The length field is derived from the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Udp {
    pub src_port: u16,
    pub dst_port: u16,
    pub checksum: u16,
    pub payload: Bytes,
}

impl Udp {
    pub fn new(src_port: u16, dst_port: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            src_port,
            dst_port,
            checksum: 0,
            payload: payload.into(),
        }
    }
}

impl Message for Udp {
    fn length(&self) -> usize {
        UDP_HEADER_LEN + self.payload.len()
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let length = fit_u16("UDP length", self.length())?;
        buf.put_u16(self.src_port);
        buf.put_u16(self.dst_port);
        buf.put_u16(length);
        buf.put_u16(self.checksum);
        buf.put_slice(&self.payload);
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure(buf, UDP_HEADER_LEN)?;
        let mut cur = buf;
        let src_port = cur.get_u16();
        let dst_port = cur.get_u16();
        let length = cur.get_u16() as usize;
        let checksum = cur.get_u16();
        if length < UDP_HEADER_LEN {
            return Err(DecodeError::InconsistentLength {
                field: "UDP length",
                declared: length,
                available: buf.len(),
            });
        }
        ensure_declared(buf, "UDP length", length)?;
        let payload = get_bytes(&mut cur, length - UDP_HEADER_LEN);
        Ok((
            Self {
                src_port,
                dst_port,
                checksum,
                payload,
            },
            consumed(buf, cur),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udp_layout() {
        let udp = Udp::new(546, 547, &b"\x01\x02\x03"[..]);
        let encoded = udp.encode().unwrap();
        assert_eq!(
            encoded.as_ref(),
            &[0x02, 0x22, 0x02, 0x23, 0x00, 0x0b, 0x00, 0x00, 1, 2, 3]
        );
        let (decoded, n) = Udp::decode(&encoded).unwrap();
        assert_eq!(n, 11);
        assert_eq!(decoded, udp);
    }

    #[test]
    fn test_udp_ignores_trailing_bytes() {
        let mut wire = Udp::new(1, 2, &b"ab"[..]).encode().unwrap().to_vec();
        wire.extend_from_slice(b"trailer");
        let (decoded, n) = Udp::decode(&wire).unwrap();
        assert_eq!(n, 10);
        assert_eq!(decoded.payload.as_ref(), b"ab");
    }

    #[test]
    fn test_udp_length_field_checks() {
        let mut wire = Udp::new(1, 2, &b"ab"[..]).encode().unwrap().to_vec();
        wire[5] = 30;
        assert!(matches!(
            Udp::decode(&wire),
            Err(DecodeError::InconsistentLength { declared: 30, .. })
        ));

        wire[5] = 4;
        assert!(matches!(
            Udp::decode(&wire),
            Err(DecodeError::InconsistentLength { declared: 4, .. })
        ));

        assert!(Udp::decode(&wire[..7]).unwrap_err().is_truncated());
    }

    #[test]
    fn test_udp_truncated_header() {
        let encoded = Udp::new(53, 53, &b"query"[..]).encode().unwrap();
        for len in 0..UDP_HEADER_LEN {
            let err = Udp::decode(&encoded[..len]).unwrap_err();
            assert!(err.is_truncated(), "prefix of {} bytes", len);
        }
    }

    #[test]
    fn test_udp_length_overflow() {
        let max = u16::MAX as usize - UDP_HEADER_LEN;
        let udp = Udp::new(1, 2, vec![0u8; max]);
        assert_eq!(&udp.encode().unwrap()[4..6], &[0xff, 0xff]);

        let udp = Udp::new(1, 2, vec![0u8; max + 1]);
        assert_eq!(
            udp.encode().unwrap_err(),
            EncodeError::FieldOverflow {
                field: "UDP length",
                value: 65536,
                max: 65535
            }
        );
    }
}
