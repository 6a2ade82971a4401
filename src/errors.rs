//! Error taxonomy for the wire decoder, with per-failure diagnostic context
//!
//! Every [`Error`] carries an [`ErrorContext`] snapshot of where in the
//! stream the failure happened (field number, wire type, absolute offset,
//! nesting depth), since the decoder itself never recovers from a failed
//! read: once an operation returns an error the decoder instance is done.

use core::fmt;

use crate::wire_type::WireType;

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unexpected end of stream mid-primitive.
    Truncated,
    /// A varint or a float narrowing exceeded the target width.
    Overflow,
    /// Field number was zero or otherwise reserved.
    InvalidField,
    /// The requested operation is incompatible with the current wire type.
    WireTypeMismatch,
    /// A varint read as `bool` was not 0 or 1.
    InvalidBoolean,
    /// `end_sub_item` was called before the sub-message's bytes were fully consumed.
    IncompleteSubMessage,
    /// A sub-message's accounting read past its declared end.
    OverranSubMessage,
    /// An `EndGroup` tag appeared with no matching `StartGroup` on the stack.
    UnexpectedEndGroup,
    /// An `EndGroup` tag's field number did not match the opening `StartGroup`.
    GroupMismatch,
    /// A string field's bytes were not valid UTF-8.
    MalformedUtf8,
    /// A sub-message dispatch was requested but no type-model collaborator was configured.
    NoTypeModel,
    /// The source was cancelled, or the decoder was used after being torn down.
    Disposed,
}

impl ErrorKind {
    fn message(self) -> &'static str {
        match self {
            ErrorKind::Truncated => "unexpected end of stream",
            ErrorKind::Overflow => "value did not fit in the requested width",
            ErrorKind::InvalidField => "field number must be >= 1",
            ErrorKind::WireTypeMismatch => "operation incompatible with current wire type",
            ErrorKind::InvalidBoolean => "boolean varint was not 0 or 1",
            ErrorKind::IncompleteSubMessage => "sub-message ended before its declared length",
            ErrorKind::OverranSubMessage => "sub-message accounting read past its declared end",
            ErrorKind::UnexpectedEndGroup => "EndGroup tag with no enclosing group",
            ErrorKind::GroupMismatch => "EndGroup field number did not match StartGroup",
            ErrorKind::MalformedUtf8 => "string field was not valid UTF-8",
            ErrorKind::NoTypeModel => "sub-message dispatch requested without a type model",
            ErrorKind::Disposed => "source cancelled or decoder torn down",
        }
    }
}

/// Where in the stream an [`Error`] occurred.
///
/// This is plain diagnostic data; formatting it into a human-facing message
/// (file/line annotations, colorized output, etc.) is host-language plumbing
/// and lives outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorContext {
    pub field_number: u32,
    pub wire_type: WireType,
    pub absolute_offset: u64,
    pub depth: u32,
}

/// A decoder failure, enriched with the state it happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: ErrorContext,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, context: ErrorContext) -> Self {
        Error { kind, context }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (field={}, wire_type={:?}, offset={}, depth={})",
            self.kind.message(),
            self.context.field_number,
            self.context.wire_type,
            self.context.absolute_offset,
            self.context.depth
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
