//! The codec contract shared by every wire message, plus the bounds-checked
//! read helpers the concrete codecs are built from.

use crate::error::{DecodeError, EncodeError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::{Ipv4Addr, Ipv6Addr};

/// A self-describing, variable-length wire message.
///
/// `length()` is recomputed from the value on every call. `decode` returns the
/// value together with the number of bytes it consumed, which always equals
/// the `length()` of the decoded value.
///
/// Count and length fields are derived when encoding. A collection too large
/// for its field fails with [`EncodeError::FieldOverflow`] instead of being
/// written with a wrapped count.
pub trait Message: Sized {
    /// Number of bytes the encoded form occupies.
    fn length(&self) -> usize;

    /// Appends exactly `length()` bytes to `buf`. On error `buf` may hold a
    /// partial message.
    fn put(&self, buf: &mut BytesMut) -> Result<(), EncodeError>;

    /// Encodes the message into a buffer of exactly `length()` bytes.
    fn encode(&self) -> Result<Bytes, EncodeError> {
        let len = self.length();
        let mut buf = BytesMut::with_capacity(len);
        self.put(&mut buf)?;
        debug_assert_eq!(buf.len(), len, "put() must write exactly length() bytes");
        Ok(buf.freeze())
    }

    /// Decodes a message from the front of `buf`.
    fn decode(buf: &[u8]) -> Result<(Self, usize), DecodeError>;
}

/// First length check: the fixed part of a message must be present.
pub(crate) fn ensure(buf: &[u8], needed: usize) -> Result<(), DecodeError> {
    if buf.len() < needed {
        return Err(DecodeError::Truncated {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

/// Second length check: a count or length field read from the fixed part
/// must not claim more bytes than the buffer holds.
pub(crate) fn ensure_declared(
    buf: &[u8],
    field: &'static str,
    declared: usize,
) -> Result<(), DecodeError> {
    if buf.len() < declared {
        return Err(DecodeError::InconsistentLength {
            field,
            declared,
            available: buf.len(),
        });
    }
    Ok(())
}

/// Checks that `value` fits a field whose largest value is `max`.
pub(crate) fn fit(field: &'static str, value: usize, max: usize) -> Result<usize, EncodeError> {
    if value > max {
        return Err(EncodeError::FieldOverflow { field, value, max });
    }
    Ok(value)
}

pub(crate) fn fit_u8(field: &'static str, value: usize) -> Result<u8, EncodeError> {
    fit(field, value, u8::MAX as usize).map(|v| v as u8)
}

pub(crate) fn fit_u16(field: &'static str, value: usize) -> Result<u16, EncodeError> {
    fit(field, value, u16::MAX as usize).map(|v| v as u16)
}

/// Bytes consumed so far, given the original buffer and the advanced cursor.
pub(crate) fn consumed(buf: &[u8], cur: &[u8]) -> usize {
    buf.len() - cur.len()
}

pub(crate) fn get_ipv6(cur: &mut &[u8]) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    cur.copy_to_slice(&mut octets);
    Ipv6Addr::from(octets)
}

pub(crate) fn get_ipv4(cur: &mut &[u8]) -> Ipv4Addr {
    let mut octets = [0u8; 4];
    cur.copy_to_slice(&mut octets);
    Ipv4Addr::from(octets)
}

pub(crate) fn get_bytes(cur: &mut &[u8], len: usize) -> Bytes {
    let data = Bytes::copy_from_slice(&cur[..len]);
    cur.advance(len);
    data
}

pub(crate) fn get_words(cur: &mut &[u8], count: usize) -> Vec<u32> {
    (0..count).map(|_| cur.get_u32()).collect()
}

pub(crate) fn put_words(buf: &mut BytesMut, words: &[u32]) {
    for word in words {
        buf.put_u32(*word);
    }
}

/// Rounds `len` up to the next multiple of 8 (extension headers are sized in
/// 8-octet units).
pub(crate) fn pad8(len: usize) -> usize {
    (len + 7) & !7
}

/// Packs the `Resv|S|QRV` byte shared by MLDv2 and IGMPv3 queries. QRV is
/// a 3-bit field.
pub(crate) fn pack_s_qrv(
    suppress_router_processing: bool,
    robustness: u8,
) -> Result<u8, EncodeError> {
    let qrv = fit("robustness", robustness as usize, 0x07)? as u8;
    Ok((u8::from(suppress_router_processing) << 3) | qrv)
}

/// Unpacks the `Resv|S|QRV` byte. The reserved nibble is ignored.
pub(crate) fn unpack_s_qrv(byte: u8) -> (bool, u8) {
    (byte & 0x08 != 0, byte & 0x07)
}
