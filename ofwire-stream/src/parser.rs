//! Message framing and decoding for a byte stream.

use ofwire_protocol::{ipv6::IPV6_HEADER_LEN, DecodeError, Ipv6Packet, Message};

/// Carves and decodes top-level messages from the front of a byte buffer.
///
/// A [`MessageStream`](crate::MessageStream) calls [`frame_len`] on its
/// buffered bytes and, once that many bytes are present, hands exactly that
/// slice to [`parse`].
///
/// [`frame_len`]: Parser::frame_len
/// [`parse`]: Parser::parse
pub trait Parser: Send + 'static {
    type Message: Send + 'static;

    /// Length of the message starting at `buf[0]`, or `None` when more bytes
    /// are needed to tell.
    fn frame_len(&self, buf: &[u8]) -> Result<Option<usize>, DecodeError>;

    /// Decodes one complete frame.
    fn parse(&self, frame: &[u8]) -> Result<Self::Message, DecodeError>;
}

/// Frames raw IPv6 packets by their payload length field.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ipv6Parser;

impl Parser for Ipv6Parser {
    type Message = Ipv6Packet;

    fn frame_len(&self, buf: &[u8]) -> Result<Option<usize>, DecodeError> {
        let Some(&first) = buf.first() else {
            return Ok(None);
        };
        let version = first >> 4;
        if version != 6 {
            return Err(DecodeError::InvalidVersion(version));
        }
        match Ipv6Packet::peek_payload_length(buf) {
            Ok(len) => Ok(Some(IPV6_HEADER_LEN + len)),
            Err(e) if e.is_truncated() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Decodes one packet that must span the whole frame. Bytes past the
    /// declared payload length are rejected; unread bytes inside it are kept
    /// as the packet's trailer.
    fn parse(&self, frame: &[u8]) -> Result<Self::Message, DecodeError> {
        let (packet, used) = Ipv6Packet::decode(frame)?;
        if used != frame.len() {
            return Err(DecodeError::InconsistentLength {
                field: "IPv6 payload length",
                declared: used,
                available: frame.len(),
            });
        }
        Ok(packet)
    }
}
