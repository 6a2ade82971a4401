//! Stream-level length-prefix framing
//!
//! This sits *outside* a message's bytes and has nothing to do with
//! `WireDecoder`'s internal state machine: it is a small helper a caller
//! uses to find where a message body starts and how long it is, before ever
//! constructing a decoder over that body.

use byteorder_lite::{BigEndian, ByteOrder, LittleEndian};

use crate::errors::{Error, ErrorContext, ErrorKind, Result};
use crate::varint;
use crate::wire_type::WireType;

/// The four framing styles a message body can be prefixed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefixStyle {
    /// No prefix: the body runs to EOF.
    None,
    /// An optional header tag (wire type must be `LengthDelimited`) followed
    /// by a varint length.
    Base128,
    /// A little-endian 32-bit length.
    Fixed32,
    /// A big-endian 32-bit length.
    Fixed32BigEndian,
}

/// Result of successfully recognizing a length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthPrefix {
    /// Field number carried by a `Base128` header tag, if the style had one.
    pub field_number: Option<u32>,
    /// Declared body length in bytes.
    pub length: i64,
}

/// `read_length_prefix`'s sentinel for "no complete prefix, and nothing was
/// consumed" (e.g. the stream ended cleanly right before a new message).
pub const NO_MESSAGE_LENGTH: i64 = -1;

/// Recognizes a length prefix at the start of `bytes` according to `style`.
///
/// Returns the number of bytes the prefix itself occupied alongside the
/// parsed [`LengthPrefix`]. A prefix that is entirely absent (zero bytes of
/// `bytes` available) reports `length: NO_MESSAGE_LENGTH` and consumes
/// nothing; a prefix that starts but is cut short is `Truncated`.
pub fn read_length_prefix(bytes: &[u8], style: LengthPrefixStyle) -> Result<(LengthPrefix, usize)> {
    let ctx = ErrorContext::default();
    match style {
        LengthPrefixStyle::None => {
            if bytes.is_empty() {
                Ok((
                    LengthPrefix {
                        field_number: None,
                        length: NO_MESSAGE_LENGTH,
                    },
                    0,
                ))
            } else {
                Ok((
                    LengthPrefix {
                        field_number: None,
                        length: bytes.len() as i64,
                    },
                    0,
                ))
            }
        }
        LengthPrefixStyle::Base128 => {
            if bytes.is_empty() {
                return Ok((
                    LengthPrefix {
                        field_number: None,
                        length: NO_MESSAGE_LENGTH,
                    },
                    0,
                ));
            }
            let mut offset = 0usize;
            let mut field_number = None;
            // An optional header tag: only consumed if it actually parses as
            // a LengthDelimited tag, otherwise this varint *is* the length.
            if let varint::TryDecode::Complete(tag, consumed) = varint::try_decode_u32(bytes) {
                let bits = (tag & 0x7) as u8;
                if bits == WireType::LengthDelimited.bits().unwrap() {
                    field_number = Some(tag >> 3);
                    offset = consumed;
                }
            }
            match varint::try_decode_u32(&bytes[offset..]) {
                varint::TryDecode::Complete(len, consumed) => Ok((
                    LengthPrefix {
                        field_number,
                        length: len as i64,
                    },
                    offset + consumed,
                )),
                varint::TryDecode::Incomplete => Err(Error::new(ErrorKind::Truncated, ctx)),
                varint::TryDecode::Overflow => Err(Error::new(ErrorKind::Overflow, ctx)),
            }
        }
        LengthPrefixStyle::Fixed32 => read_fixed32_prefix(bytes, ctx, LittleEndian::read_u32),
        LengthPrefixStyle::Fixed32BigEndian => read_fixed32_prefix(bytes, ctx, BigEndian::read_u32),
    }
}

fn read_fixed32_prefix(
    bytes: &[u8],
    ctx: ErrorContext,
    read_u32: impl Fn(&[u8]) -> u32,
) -> Result<(LengthPrefix, usize)> {
    if bytes.is_empty() {
        return Ok((
            LengthPrefix {
                field_number: None,
                length: NO_MESSAGE_LENGTH,
            },
            0,
        ));
    }
    if bytes.len() < 4 {
        return Err(Error::new(ErrorKind::Truncated, ctx));
    }
    let len = read_u32(&bytes[..4]);
    Ok((
        LengthPrefix {
            field_number: None,
            length: len as i64,
        },
        4,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_style_reports_remaining_bytes_as_length() {
        let (prefix, consumed) = read_length_prefix(&[1, 2, 3], LengthPrefixStyle::None).unwrap();
        assert_eq!(prefix.length, 3);
        assert_eq!(consumed, 0);
    }

    #[test]
    fn none_style_at_eof_reports_no_message() {
        let (prefix, consumed) = read_length_prefix(&[], LengthPrefixStyle::None).unwrap();
        assert_eq!(prefix.length, NO_MESSAGE_LENGTH);
        assert_eq!(consumed, 0);
    }

    #[test]
    fn base128_without_header_tag_is_just_a_length() {
        // varint 7
        let (prefix, consumed) = read_length_prefix(&[0x07], LengthPrefixStyle::Base128).unwrap();
        assert_eq!(prefix.field_number, None);
        assert_eq!(prefix.length, 7);
        assert_eq!(consumed, 1);
    }

    #[test]
    fn base128_with_header_tag_extracts_field_number() {
        // tag for field 3, LengthDelimited (3 << 3 | 2 = 26 = 0x1a), then length 5
        let (prefix, consumed) = read_length_prefix(&[0x1a, 0x05], LengthPrefixStyle::Base128).unwrap();
        assert_eq!(prefix.field_number, Some(3));
        assert_eq!(prefix.length, 5);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn base128_truncated_prefix_is_an_error() {
        // continuation bit set, nothing follows
        let err = read_length_prefix(&[0x80], LengthPrefixStyle::Base128).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Truncated);
    }

    #[test]
    fn fixed32_little_endian() {
        let (prefix, consumed) = read_length_prefix(&[5, 0, 0, 0], LengthPrefixStyle::Fixed32).unwrap();
        assert_eq!(prefix.length, 5);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn fixed32_big_endian() {
        let (prefix, consumed) =
            read_length_prefix(&[0, 0, 0, 5], LengthPrefixStyle::Fixed32BigEndian).unwrap();
        assert_eq!(prefix.length, 5);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn fixed32_partial_prefix_is_truncated() {
        let err = read_length_prefix(&[0, 0], LengthPrefixStyle::Fixed32).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Truncated);
    }
}
