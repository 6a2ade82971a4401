//! The protobuf wire type sum, plus the internal `None` and `SignedVariant` extensions
//!
//! Wire types only ever occupy the low 3 bits of a tag, so this module also
//! owns `FieldHeader`, the split of a tag varint into `(field_number, wire_type)`.

use crate::errors::{Error, ErrorContext, ErrorKind, Result};

const TAG_VARINT: u8 = 0;
const TAG_FIXED64: u8 = 1;
const TAG_LENGTH_DELIMITED: u8 = 2;
const TAG_START_GROUP: u8 = 3;
const TAG_END_GROUP: u8 = 4;
const TAG_FIXED32: u8 = 5;

/// Maximum field number representable in a protobuf tag (29 bits).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// One of the six wire-level encoding disciplines, plus two decoder-internal
/// extensions: `None` ("no current field") and `SignedVariant` (a caller-hinted
/// upgrade of `Varint` that enables zig-zag decoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireType {
    /// No field header has been read yet, or the last one was fully consumed.
    #[default]
    None,
    Varint,
    Fixed64,
    LengthDelimited,
    StartGroup,
    EndGroup,
    Fixed32,
    /// Caller-hinted: indistinguishable from `Varint` on the wire, but decoded
    /// with zig-zag when the caller has asserted/hinted it via [`WireType::bits`]
    /// equality with `Varint`.
    SignedVariant,
}

impl WireType {
    /// The 3-bit wire-type value this variant would occupy in a tag, if any.
    ///
    /// `None` has no wire representation; `SignedVariant` shares `Varint`'s bits.
    pub fn bits(self) -> Option<u8> {
        match self {
            WireType::None => None,
            WireType::Varint | WireType::SignedVariant => Some(TAG_VARINT),
            WireType::Fixed64 => Some(TAG_FIXED64),
            WireType::LengthDelimited => Some(TAG_LENGTH_DELIMITED),
            WireType::StartGroup => Some(TAG_START_GROUP),
            WireType::EndGroup => Some(TAG_END_GROUP),
            WireType::Fixed32 => Some(TAG_FIXED32),
        }
    }

    /// Parses the low 3 bits of a tag into a wire type. Never produces
    /// `None` or `SignedVariant`: those only arise from decoder state or a
    /// caller's `hint`/`assert`.
    pub(crate) fn from_tag_bits(bits: u8, ctx: ErrorContext) -> Result<WireType> {
        match bits {
            TAG_VARINT => Ok(WireType::Varint),
            TAG_FIXED64 => Ok(WireType::Fixed64),
            TAG_LENGTH_DELIMITED => Ok(WireType::LengthDelimited),
            TAG_START_GROUP => Ok(WireType::StartGroup),
            TAG_END_GROUP => Ok(WireType::EndGroup),
            TAG_FIXED32 => Ok(WireType::Fixed32),
            _ => Err(Error::new(ErrorKind::WireTypeMismatch, ctx)),
        }
    }

    /// Whether `hint`/`assert` may upgrade the current wire type to `target`.
    /// Permitted iff `target`'s wire bits equal this wire type's own bits.
    pub(crate) fn accepts_hint(self, target: WireType) -> bool {
        match (self.bits(), target.bits()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// A parsed field tag: field number plus wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldHeader {
    pub field_number: u32,
    pub wire_type: WireType,
}

impl FieldHeader {
    /// Splits a raw tag varint into `(field_number, wire_type)`.
    ///
    /// Fails with `InvalidField` if the field number is zero; the wire-type
    /// bits are validated by [`WireType::from_tag_bits`].
    pub(crate) fn parse(tag: u32, ctx: ErrorContext) -> Result<FieldHeader> {
        let field_number = tag >> 3;
        let wire_type = WireType::from_tag_bits((tag & 0x7) as u8, ctx)?;
        if field_number < 1 {
            return Err(Error::new(ErrorKind::InvalidField, ctx));
        }
        Ok(FieldHeader {
            field_number,
            wire_type,
        })
    }
}
