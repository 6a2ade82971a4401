//! The decoder's mutable position: offset, current field, nesting depth
//!
//! `DecoderState` itself owns no bytes; `ByteSource` does. It tracks just
//! enough to answer "what did we last read a header for" and "how far can we
//! read before hitting a sub-message boundary".

use crate::errors::ErrorContext;
use crate::wire_type::WireType;

/// Sentinel end boundary meaning "no boundary, read to the true end of stream".
pub const NO_BOUNDARY: u64 = u64::MAX;

/// The decoder's current position and last-read field header.
#[derive(Debug, Clone, Copy)]
pub struct DecoderState {
    pub field_number: u32,
    pub wire_type: WireType,
    pub depth: u32,
}

impl Default for DecoderState {
    fn default() -> Self {
        DecoderState {
            field_number: 0,
            wire_type: WireType::None,
            depth: 0,
        }
    }
}

impl DecoderState {
    /// Snapshots the current position into an [`ErrorContext`] for enriching
    /// a freshly-raised error.
    pub(crate) fn error_context(&self, absolute_offset: u64) -> ErrorContext {
        ErrorContext {
            field_number: self.field_number,
            wire_type: self.wire_type,
            absolute_offset,
            depth: self.depth,
        }
    }
}

/// Opaque token returned by `start_sub_item` and required by `end_sub_item`.
///
/// Carries whatever bookkeeping is needed to validate and undo the
/// sub-message entry: the previous end boundary for both kinds, plus either
/// the new length-delimited end or the group's field number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubItemToken {
    pub(crate) prev_end: u64,
    pub(crate) kind: SubItemTokenKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubItemTokenKind {
    LengthDelimited { new_end: u64 },
    Group { field_number: u32 },
}
