//! `WireDecoder`: the field-at-a-time streaming decoder over a `ByteSource`
//!
//! One generic type serves both I/O strategies described in the design
//! notes. Every primitive that can ever wait on more bytes is written once,
//! as an `async fn` built from `ByteSource`'s `poll_*` contract via
//! `core::future::poll_fn`; a caller driving a [`PipeSource`] simply
//! `.await`s these methods from whatever executor it already has, while a
//! caller driving a [`MemorySource`] can use [`block_on_ready`], since that
//! source is defined to never return `Poll::Pending`.
//!
//! Operations that touch no bytes at all — `try_read_field_header`, `hint`,
//! `assert`, `end_sub_item`, the object-cache forwarders — stay plain
//! synchronous functions; the concurrency model in the design notes is
//! explicit that suspension only ever happens inside a varint read, a fixed
//! read, a length-delimited body read, or a skip, never inside bookkeeping.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::future::Future;
use core::task::{Context, Poll};

use byteorder_lite::{ByteOrder, LittleEndian};

#[cfg(feature = "std")]
use crate::interner::StringInterner;
use crate::errors::{Error, ErrorKind, Result};
use crate::object_cache::ObjectCache;
use crate::source::{self, noop_waker, ByteSource, MemorySource};
use crate::state::{DecoderState, SubItemToken, SubItemTokenKind};
use crate::type_model::{SerializationContext, TypeModel};
use crate::wire_type::{FieldHeader, WireType};

/// Configuration a [`WireDecoder`] is constructed with. All fields are
/// optional; `WireDecoder::new` uses the defaults.
pub struct DecoderOptions<'cfg> {
    /// Whether decoded strings pass through a [`StringInterner`]. Ignored
    /// without the `std` feature, since the interner needs `HashMap`.
    pub intern_strings: bool,
    /// If set, the decoder starts with visibility constrained to this
    /// absolute end position, as though `start_sub_item` had already been
    /// called once at the top level.
    pub initial_end_boundary: Option<u64>,
    pub type_model: Option<&'cfg dyn TypeModel>,
    pub context: Option<SerializationContext<'cfg>>,
    pub object_cache: Option<&'cfg mut dyn ObjectCache>,
}

impl<'cfg> Default for DecoderOptions<'cfg> {
    fn default() -> Self {
        DecoderOptions {
            intern_strings: true,
            initial_end_boundary: None,
            type_model: None,
            context: None,
            object_cache: None,
        }
    }
}

/// Streaming protobuf wire-format decoder, generic over where its bytes
/// come from.
pub struct WireDecoder<'cfg, S> {
    source: S,
    state: DecoderState,
    intern_strings: bool,
    #[cfg(feature = "std")]
    interner: Option<StringInterner>,
    type_model: Option<&'cfg dyn TypeModel>,
    context: Option<SerializationContext<'cfg>>,
    object_cache: Option<&'cfg mut dyn ObjectCache>,
}

/// Drives a `Future` that is known to resolve on its very first poll,
/// because it is built over a [`MemorySource`] (which never returns
/// `Poll::Pending`). Calling this on a future built over any other source is
/// a programming error, not a recoverable failure.
pub fn block_on_ready<F: Future>(future: F) -> F::Output {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    let mut future = core::pin::pin!(future);
    match future.as_mut().poll(&mut cx) {
        Poll::Ready(value) => value,
        Poll::Pending => panic!("block_on_ready: future did not resolve on a MemorySource"),
    }
}

impl<'cfg, S: ByteSource> WireDecoder<'cfg, S> {
    pub fn new(source: S) -> Self {
        Self::with_options(source, DecoderOptions::default())
    }

    pub fn with_options(mut source: S, options: DecoderOptions<'cfg>) -> Self {
        if let Some(end) = options.initial_end_boundary {
            source.apply_window(end);
        }
        WireDecoder {
            source,
            state: DecoderState::default(),
            intern_strings: options.intern_strings,
            #[cfg(feature = "std")]
            interner: None,
            type_model: options.type_model,
            context: options.context,
            object_cache: options.object_cache,
        }
    }

    /// Absolute byte offset the decoder is currently positioned at.
    pub fn position(&self) -> u64 {
        self.source.absolute_position()
    }

    /// Current sub-message nesting depth.
    pub fn depth(&self) -> u32 {
        self.state.depth
    }

    /// Field number of the last field header read, or `0` if none is current.
    pub fn current_field(&self) -> u32 {
        self.state.field_number
    }

    /// Wire type of the last field header read.
    pub fn current_wire_type(&self) -> WireType {
        self.state.wire_type
    }

    /// The configured serialization context, if any.
    pub fn context(&self) -> Option<SerializationContext<'cfg>> {
        self.context
    }

    fn err(&self, kind: ErrorKind) -> Error {
        Error::new(kind, self.state.error_context(self.source.absolute_position()))
    }

    // -- pure, non-suspending operations -----------------------------------

    /// Reads the next field header only if it is both already fully visible
    /// and matches `expected`; otherwise leaves the decoder untouched.
    /// Never triggers a refill — this is the escape hatch a caller uses to
    /// peek ahead without risking a suspension.
    pub fn try_read_field_header(&mut self, expected: u32) -> Result<bool> {
        let ctx = self.state.error_context(self.source.absolute_position());
        match source::ops::peek_varint_u32(&self.source, ctx)? {
            None => Ok(false),
            Some((tag, consumed)) => {
                if tag == 0 {
                    return Ok(false);
                }
                let header = FieldHeader::parse(tag, ctx)?;
                if header.field_number == expected && header.wire_type != WireType::EndGroup {
                    self.source.advance(consumed);
                    self.state.field_number = header.field_number;
                    self.state.wire_type = header.wire_type;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Upgrades the current wire type to `target` if the wire bits agree
    /// (e.g. `Varint` to `SignedVariant`, to request zig-zag decoding).
    pub fn hint(&mut self, target: WireType) -> bool {
        if self.state.wire_type.accepts_hint(target) {
            self.state.wire_type = target;
            true
        } else {
            false
        }
    }

    /// Like [`WireDecoder::hint`], but fails with `WireTypeMismatch` instead
    /// of returning `false`.
    pub fn assert(&mut self, target: WireType) -> Result<()> {
        if self.hint(target) {
            Ok(())
        } else {
            Err(self.err(ErrorKind::WireTypeMismatch))
        }
    }

    /// Closes a sub-message or group previously opened by `start_sub_item`.
    /// Pure bookkeeping: validates the declared length was consumed exactly
    /// (for length-delimited bodies) or that the matching `EndGroup` was
    /// seen (for groups), then restores the enclosing window.
    pub fn end_sub_item(&mut self, token: SubItemToken) -> Result<()> {
        let ctx = self.state.error_context(self.source.absolute_position());
        match token.kind {
            SubItemTokenKind::LengthDelimited { new_end } => {
                let pos = self.source.absolute_position();
                if pos < new_end {
                    return Err(Error::new(ErrorKind::IncompleteSubMessage, ctx));
                }
                if pos > new_end {
                    return Err(Error::new(ErrorKind::OverranSubMessage, ctx));
                }
                self.source.remove_window(token.prev_end);
                self.state.depth -= 1;
                Ok(())
            }
            SubItemTokenKind::Group { field_number } => {
                if self.state.wire_type != WireType::EndGroup {
                    return Err(Error::new(ErrorKind::GroupMismatch, ctx));
                }
                if self.state.field_number != field_number {
                    return Err(Error::new(ErrorKind::GroupMismatch, ctx));
                }
                self.source.remove_window(token.prev_end);
                self.state.wire_type = WireType::None;
                self.state.field_number = 0;
                self.state.depth -= 1;
                Ok(())
            }
        }
    }

    /// Registers `key` with the configured object cache, or `0` if none is
    /// configured.
    pub fn register_object(&mut self, key: i64) -> u32 {
        match &mut self.object_cache {
            Some(cache) => cache.register(key),
            None => 0,
        }
    }

    /// Looks up `key` in the configured object cache.
    pub fn lookup_object(&self, key: i64) -> Option<u32> {
        self.object_cache.as_ref().and_then(|cache| cache.lookup(key))
    }

    /// Clears the configured object cache, if any.
    pub fn reset_object_cache(&mut self) {
        if let Some(cache) = &mut self.object_cache {
            cache.reset();
        }
    }

    /// The configured type model, if any. Requesting dispatch without one is
    /// a `NoTypeModel` error.
    pub fn type_model(&self) -> Result<&'cfg dyn TypeModel> {
        self.type_model.ok_or_else(|| self.err(ErrorKind::NoTypeModel))
    }

    // -- raw primitives, each a single suspension point --------------------

    async fn raw_tag(&mut self) -> Result<u32> {
        // Distinguishes a clean end of stream/sub-message (0 bytes visible,
        // returns the sentinel 0) from a genuinely truncated tag (some bytes
        // visible but not a complete varint).
        match core::future::poll_fn(|cx| self.source.poll_ensure(cx, 1)).await {
            Ok(()) => {}
            Err(e) => return Err(e),
        }
        if self.source.remaining_in_current() == 0 {
            return Ok(0);
        }
        self.raw_varint_u32().await
    }

    async fn raw_varint_u32(&mut self) -> Result<u32> {
        let ctx = self.state.error_context(self.source.absolute_position());
        core::future::poll_fn(|cx| source::ops::poll_read_varint_u32(&mut self.source, cx, ctx)).await
    }

    async fn raw_varint_u64(&mut self) -> Result<u64> {
        let ctx = self.state.error_context(self.source.absolute_position());
        core::future::poll_fn(|cx| source::ops::poll_read_varint_u64(&mut self.source, cx, ctx)).await
    }

    /// A 32-bit-valued varint as it actually appears on the wire for `int32`,
    /// `uint32` and `sint32` fields: protobuf sign-extends a negative `int32`
    /// to 64 bits before varint-encoding it, so these can legitimately run up
    /// to the full 10-byte width rather than the 5 bytes a bare 32-bit value
    /// would need. Reads the full-width varint and keeps only the low 32
    /// bits, silently discarding the sign-extension bytes above them — the
    /// same tolerance real protobuf implementations apply here.
    async fn raw_varint32_wire(&mut self) -> Result<u32> {
        Ok(self.raw_varint_u64().await? as u32)
    }

    async fn raw_fixed32(&mut self) -> Result<u32> {
        let ctx = self.state.error_context(self.source.absolute_position());
        let bytes =
            core::future::poll_fn(|cx| source::ops::poll_read_fixed::<S, 4>(&mut self.source, cx, ctx)).await?;
        Ok(LittleEndian::read_u32(&bytes))
    }

    async fn raw_fixed64(&mut self) -> Result<u64> {
        let ctx = self.state.error_context(self.source.absolute_position());
        let bytes =
            core::future::poll_fn(|cx| source::ops::poll_read_fixed::<S, 8>(&mut self.source, cx, ctx)).await?;
        Ok(LittleEndian::read_u64(&bytes))
    }

    async fn raw_skip_to(&mut self, target: u64) -> Result<()> {
        let ctx = self.state.error_context(self.source.absolute_position());
        core::future::poll_fn(|cx| source::ops::poll_skip_to(&mut self.source, cx, target, ctx)).await
    }

    async fn raw_read_into(&mut self, n: usize, out: &mut Vec<u8>) -> Result<()> {
        let ctx = self.state.error_context(self.source.absolute_position());
        core::future::poll_fn(|cx| source::ops::poll_read_exact(&mut self.source, cx, n, ctx, out)).await
    }

    // -- field headers -------------------------------------------------

    /// Reads the next field header, returning its field number, or `0` if
    /// the current sub-message/stream has no more fields (either because the
    /// boundary was reached, or because a pending `EndGroup` is waiting to
    /// be consumed by `end_sub_item`).
    pub async fn read_field_header(&mut self) -> Result<u32> {
        if self.state.wire_type == WireType::EndGroup {
            return Ok(0);
        }
        let tag = self.raw_tag().await?;
        if tag == 0 {
            self.state.wire_type = WireType::None;
            self.state.field_number = 0;
            return Ok(0);
        }
        let ctx = self.state.error_context(self.source.absolute_position());
        let header = FieldHeader::parse(tag, ctx)?;
        if header.wire_type == WireType::EndGroup {
            if self.state.depth == 0 {
                return Err(Error::new(ErrorKind::UnexpectedEndGroup, ctx));
            }
            self.state.field_number = header.field_number;
            self.state.wire_type = WireType::EndGroup;
            return Ok(0);
        }
        self.state.field_number = header.field_number;
        self.state.wire_type = header.wire_type;
        Ok(header.field_number)
    }

    // -- typed scalar reads ------------------------------------------------

    /// Raw fixed-width payload, sign-extended to `i64`, backing the coercion
    /// layer shared by the signed integer reads.
    async fn fixed_as_i64(&mut self) -> Result<i64> {
        match self.state.wire_type {
            WireType::Fixed32 => Ok((self.raw_fixed32().await? as i32) as i64),
            WireType::Fixed64 => Ok(self.raw_fixed64().await? as i64),
            _ => Err(self.err(ErrorKind::WireTypeMismatch)),
        }
    }

    /// Raw fixed-width payload, zero-extended to `u64`, backing the coercion
    /// layer shared by the unsigned integer reads.
    async fn fixed_as_u64(&mut self) -> Result<u64> {
        match self.state.wire_type {
            WireType::Fixed32 => Ok(self.raw_fixed32().await? as u64),
            WireType::Fixed64 => Ok(self.raw_fixed64().await?),
            _ => Err(self.err(ErrorKind::WireTypeMismatch)),
        }
    }

    pub async fn read_u32(&mut self) -> Result<u32> {
        let value = match self.state.wire_type {
            WireType::Varint => self.raw_varint32_wire().await?,
            WireType::Fixed32 | WireType::Fixed64 => {
                let v = self.fixed_as_u64().await?;
                u32::try_from(v).map_err(|_| self.err(ErrorKind::Overflow))?
            }
            _ => return Err(self.err(ErrorKind::WireTypeMismatch)),
        };
        self.state.wire_type = WireType::None;
        Ok(value)
    }

    pub async fn read_u64(&mut self) -> Result<u64> {
        let value = match self.state.wire_type {
            WireType::Varint => self.raw_varint_u64().await?,
            WireType::Fixed32 | WireType::Fixed64 => self.fixed_as_u64().await?,
            _ => return Err(self.err(ErrorKind::WireTypeMismatch)),
        };
        self.state.wire_type = WireType::None;
        Ok(value)
    }

    pub async fn read_i32(&mut self) -> Result<i32> {
        let value = match self.state.wire_type {
            WireType::Varint => self.raw_varint32_wire().await? as i32,
            WireType::SignedVariant => crate::varint::zigzag_decode32(self.raw_varint32_wire().await?),
            WireType::Fixed32 | WireType::Fixed64 => {
                let v = self.fixed_as_i64().await?;
                i32::try_from(v).map_err(|_| self.err(ErrorKind::Overflow))?
            }
            _ => return Err(self.err(ErrorKind::WireTypeMismatch)),
        };
        self.state.wire_type = WireType::None;
        Ok(value)
    }

    pub async fn read_i64(&mut self) -> Result<i64> {
        let value = match self.state.wire_type {
            WireType::Varint => self.raw_varint_u64().await? as i64,
            WireType::SignedVariant => crate::varint::zigzag_decode64(self.raw_varint_u64().await?),
            WireType::Fixed32 | WireType::Fixed64 => self.fixed_as_i64().await?,
            _ => return Err(self.err(ErrorKind::WireTypeMismatch)),
        };
        self.state.wire_type = WireType::None;
        Ok(value)
    }

    /// Checked narrowing of [`WireDecoder::read_u32`] to 16 bits.
    pub async fn read_u16(&mut self) -> Result<u16> {
        let v = self.read_u32().await?;
        u16::try_from(v).map_err(|_| self.err(ErrorKind::Overflow))
    }

    /// Checked narrowing of [`WireDecoder::read_u32`] to 8 bits.
    pub async fn read_u8(&mut self) -> Result<u8> {
        let v = self.read_u32().await?;
        u8::try_from(v).map_err(|_| self.err(ErrorKind::Overflow))
    }

    /// Checked narrowing of [`WireDecoder::read_i32`] to 16 bits.
    pub async fn read_i16(&mut self) -> Result<i16> {
        let v = self.read_i32().await?;
        i16::try_from(v).map_err(|_| self.err(ErrorKind::Overflow))
    }

    /// Checked narrowing of [`WireDecoder::read_i32`] to 8 bits.
    pub async fn read_i8(&mut self) -> Result<i8> {
        let v = self.read_i32().await?;
        i8::try_from(v).map_err(|_| self.err(ErrorKind::Overflow))
    }

    /// Reads a `u32` and maps it to `bool`: `0` is `false`, `1` is `true`,
    /// anything else is `InvalidBoolean`.
    pub async fn read_bool(&mut self) -> Result<bool> {
        match self.read_u32().await? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(self.err(ErrorKind::InvalidBoolean)),
        }
    }

    pub async fn read_f32(&mut self) -> Result<f32> {
        let value = match self.state.wire_type {
            WireType::Fixed32 => f32::from_bits(self.raw_fixed32().await?),
            WireType::Fixed64 => {
                let bits = self.raw_fixed64().await?;
                let widened = f64::from_bits(bits);
                let narrowed = widened as f32;
                if narrowed.is_finite() != widened.is_finite() {
                    return Err(self.err(ErrorKind::Overflow));
                }
                narrowed
            }
            _ => return Err(self.err(ErrorKind::WireTypeMismatch)),
        };
        self.state.wire_type = WireType::None;
        Ok(value)
    }

    pub async fn read_f64(&mut self) -> Result<f64> {
        let value = match self.state.wire_type {
            WireType::Fixed32 => f64::from(f32::from_bits(self.raw_fixed32().await?)),
            WireType::Fixed64 => f64::from_bits(self.raw_fixed64().await?),
            _ => return Err(self.err(ErrorKind::WireTypeMismatch)),
        };
        self.state.wire_type = WireType::None;
        Ok(value)
    }

    /// Reads a length-delimited UTF-8 string, optionally deduplicated
    /// through the decoder-local string interner.
    pub async fn read_string(&mut self) -> Result<Rc<str>> {
        if self.state.wire_type != WireType::LengthDelimited {
            return Err(self.err(ErrorKind::WireTypeMismatch));
        }
        let len = self.raw_varint_u32().await? as usize;
        let mut buf = Vec::with_capacity(len);
        if len > 0 {
            self.raw_read_into(len, &mut buf).await?;
        }
        let text = core::str::from_utf8(&buf).map_err(|_| self.err(ErrorKind::MalformedUtf8))?;
        let rc = self.intern(text);
        self.state.wire_type = WireType::None;
        Ok(rc)
    }

    #[cfg(feature = "std")]
    fn intern(&mut self, text: &str) -> Rc<str> {
        if self.intern_strings {
            self.interner.get_or_insert_with(StringInterner::new).intern(text)
        } else {
            Rc::from(text)
        }
    }

    #[cfg(not(feature = "std"))]
    fn intern(&mut self, text: &str) -> Rc<str> {
        let _ = self.intern_strings;
        Rc::from(text)
    }

    /// Reads a length-delimited byte blob, appending onto `existing` (or a
    /// fresh buffer if `None`).
    ///
    /// Preserves the one quirk callers of the non-generic reader relied on:
    /// when the current wire type is `Varint`, this returns an empty buffer
    /// without consuming anything, rather than erroring — some generated
    /// code probes an unknown field this way before deciding how to handle it.
    pub async fn append_bytes(&mut self, existing: Option<Vec<u8>>) -> Result<Vec<u8>> {
        if self.state.wire_type == WireType::Varint {
            return Ok(existing.unwrap_or_default());
        }
        if self.state.wire_type != WireType::LengthDelimited {
            return Err(self.err(ErrorKind::WireTypeMismatch));
        }
        let len = self.raw_varint_u32().await? as usize;
        let mut buf = existing.unwrap_or_default();
        if len > 0 {
            self.raw_read_into(len, &mut buf).await?;
        }
        self.state.wire_type = WireType::None;
        Ok(buf)
    }

    /// Reads a length-delimited byte blob into a fresh buffer.
    pub async fn read_bytes(&mut self) -> Result<Vec<u8>> {
        self.append_bytes(None).await
    }

    // -- sub-messages and groups --------------------------------------

    /// Enters the current field's sub-message body (`LengthDelimited`) or
    /// group (`StartGroup`), returning a token that must later be passed to
    /// [`WireDecoder::end_sub_item`].
    pub async fn start_sub_item(&mut self) -> Result<SubItemToken> {
        match self.state.wire_type {
            WireType::LengthDelimited => {
                let len = self.raw_varint_u32().await? as u64;
                let ctx = self.state.error_context(self.source.absolute_position());
                let prev_end = self.source.end_boundary();
                let new_end = self.source.absolute_position() + len;
                if new_end > prev_end {
                    return Err(Error::new(ErrorKind::OverranSubMessage, ctx));
                }
                self.source.apply_window(new_end);
                self.state.depth += 1;
                self.state.wire_type = WireType::None;
                Ok(SubItemToken {
                    prev_end,
                    kind: SubItemTokenKind::LengthDelimited { new_end },
                })
            }
            WireType::StartGroup => {
                let field_number = self.state.field_number;
                let prev_end = self.source.end_boundary();
                self.state.depth += 1;
                self.state.wire_type = WireType::None;
                Ok(SubItemToken {
                    prev_end,
                    kind: SubItemTokenKind::Group { field_number },
                })
            }
            _ => Err(self.err(ErrorKind::WireTypeMismatch)),
        }
    }

    /// Skips the current field's value, whatever its wire type — including a
    /// `StartGroup`, which recursively skips every field up to and including
    /// its matching `EndGroup`. Consumes exactly as many bytes as a typed
    /// read of the same field would have.
    pub async fn skip_field(&mut self) -> Result<()> {
        if self.state.wire_type != WireType::StartGroup {
            return self.skip_non_group().await;
        }
        // Iterative rather than recursive, so a deeply nested stream of
        // groups doesn't need one stack frame per level: `stack` holds the
        // field number of every group still open.
        let mut stack = Vec::new();
        stack.push(self.state.field_number);
        self.state.depth += 1;
        self.state.wire_type = WireType::None;
        while let Some(&top) = stack.last() {
            let field = self.read_field_header().await?;
            if field == 0 {
                let ctx = self.state.error_context(self.source.absolute_position());
                if self.state.wire_type != WireType::EndGroup {
                    return Err(Error::new(ErrorKind::Truncated, ctx));
                }
                if self.state.field_number != top {
                    return Err(Error::new(ErrorKind::GroupMismatch, ctx));
                }
                stack.pop();
                self.state.depth -= 1;
                self.state.wire_type = WireType::None;
                self.state.field_number = 0;
                continue;
            }
            if self.state.wire_type == WireType::StartGroup {
                stack.push(self.state.field_number);
                self.state.depth += 1;
                self.state.wire_type = WireType::None;
            } else {
                self.skip_non_group().await?;
            }
        }
        Ok(())
    }

    async fn skip_non_group(&mut self) -> Result<()> {
        match self.state.wire_type {
            WireType::Fixed32 => {
                self.raw_fixed32().await?;
            }
            WireType::Fixed64 => {
                self.raw_fixed64().await?;
            }
            WireType::LengthDelimited => {
                let len = self.raw_varint_u32().await? as u64;
                let target = self.source.absolute_position() + len;
                self.raw_skip_to(target).await?;
            }
            WireType::Varint | WireType::SignedVariant => {
                self.raw_varint_u64().await?;
            }
            _ => return Err(self.err(ErrorKind::WireTypeMismatch)),
        }
        self.state.wire_type = WireType::None;
        Ok(())
    }
}

/// Convenience constructor for a decoder over an in-memory buffer.
impl<'a> WireDecoder<'static, MemorySource<'a>> {
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        WireDecoder::new(MemorySource::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn decoder(bytes: &[u8]) -> WireDecoder<'static, MemorySource<'_>> {
        WireDecoder::new(MemorySource::new(bytes))
    }

    #[test]
    fn reads_a_varint_field() {
        // field 1, varint, value 150 (0x96 0x01)
        let mut d = decoder(&[0x08, 0x96, 0x01]);
        let field = block_on_ready(d.read_field_header()).unwrap();
        assert_eq!(field, 1);
        assert_eq!(d.current_wire_type(), WireType::Varint);
        assert_eq!(block_on_ready(d.read_u32()).unwrap(), 150);
        assert_eq!(block_on_ready(d.read_field_header()).unwrap(), 0);
    }

    #[test]
    fn signed_varint_round_trips_negative_value() {
        let mut buf = [0u8; 10];
        let n = crate::varint::encode_u64(crate::varint::zigzag_encode64(-2), &mut buf);
        let mut bytes = alloc::vec![0x08u8];
        bytes.extend_from_slice(&buf[..n]);
        let mut d = decoder(&bytes);
        block_on_ready(d.read_field_header()).unwrap();
        assert!(d.hint(WireType::SignedVariant));
        assert_eq!(block_on_ready(d.read_i64()).unwrap(), -2);
    }

    #[test]
    fn negative_int32_sign_extended_to_ten_bytes_is_tolerated() {
        // Protobuf encodes a plain (non-zigzag) negative int32 by
        // sign-extending it to i64 first, so -1 is a full 10-byte varint
        // rather than the 5 bytes a bare u32 of that magnitude would need.
        let mut buf = [0u8; 10];
        let n = crate::varint::encode_u64(-1i64 as u64, &mut buf);
        assert_eq!(n, 10);
        let mut bytes = alloc::vec![0x08u8];
        bytes.extend_from_slice(&buf[..n]);
        let mut d = decoder(&bytes);
        block_on_ready(d.read_field_header()).unwrap();
        assert_eq!(block_on_ready(d.read_i32()).unwrap(), -1);
    }

    #[test]
    fn fixed32_coerces_into_i64_read() {
        // field 1, fixed32, bytes for value 7 little-endian
        let mut d = decoder(&[0x0d, 0x07, 0x00, 0x00, 0x00]);
        block_on_ready(d.read_field_header()).unwrap();
        assert_eq!(block_on_ready(d.read_i64()).unwrap(), 7);
    }

    #[test]
    fn reads_length_delimited_string() {
        // field 1, length-delimited, "hi"
        let mut d = decoder(&[0x0a, 0x02, b'h', b'i']);
        block_on_ready(d.read_field_header()).unwrap();
        let s = block_on_ready(d.read_string()).unwrap();
        assert_eq!(&*s, "hi");
    }

    #[test]
    fn malformed_utf8_is_rejected() {
        let mut d = decoder(&[0x0a, 0x01, 0xff]);
        block_on_ready(d.read_field_header()).unwrap();
        let err = block_on_ready(d.read_string()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedUtf8);
    }

    #[test]
    fn sub_message_enforces_exact_boundary() {
        // outer field 1 length-delimited, body is one varint field (field 1 = 5)
        let mut d = decoder(&[0x0a, 0x02, 0x08, 0x05]);
        block_on_ready(d.read_field_header()).unwrap();
        let token = block_on_ready(d.start_sub_item()).unwrap();
        assert_eq!(block_on_ready(d.read_field_header()).unwrap(), 1);
        assert_eq!(block_on_ready(d.read_u32()).unwrap(), 5);
        assert_eq!(block_on_ready(d.read_field_header()).unwrap(), 0);
        d.end_sub_item(token).unwrap();
    }

    #[test]
    fn overran_sub_message_detected_eagerly() {
        // declares a length longer than what remains in the enclosing buffer
        let mut d = decoder(&[0x0a, 0x10, 0x00]);
        block_on_ready(d.read_field_header()).unwrap();
        let err = block_on_ready(d.start_sub_item()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OverranSubMessage);
    }

    #[test]
    fn incomplete_sub_message_detected_at_end_sub_item() {
        let mut d = decoder(&[0x0a, 0x02, 0x08]);
        block_on_ready(d.read_field_header()).unwrap();
        let token = block_on_ready(d.start_sub_item()).unwrap();
        // only reads the tag, leaves the sub-message's varint body unread
        block_on_ready(d.read_field_header()).unwrap();
        let err = d.end_sub_item(token).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncompleteSubMessage);
    }

    #[test]
    fn group_round_trips_through_start_and_end_sub_item() {
        // field 1 StartGroup (tag 0x0b), inner field 2 varint = 9, field 1 EndGroup (tag 0x0c)
        let mut d = decoder(&[0x0b, 0x10, 0x09, 0x0c]);
        block_on_ready(d.read_field_header()).unwrap();
        assert_eq!(d.current_wire_type(), WireType::StartGroup);
        let token = block_on_ready(d.start_sub_item()).unwrap();
        assert_eq!(block_on_ready(d.read_field_header()).unwrap(), 2);
        assert_eq!(block_on_ready(d.read_u32()).unwrap(), 9);
        assert_eq!(block_on_ready(d.read_field_header()).unwrap(), 0);
        assert_eq!(d.current_wire_type(), WireType::EndGroup);
        d.end_sub_item(token).unwrap();
    }

    #[test]
    fn skip_field_consumes_nested_group() {
        // field 1 StartGroup, inner field 2 length-delimited "x", field 1 EndGroup, then field 3 varint
        let mut d = decoder(&[0x0b, 0x12, 0x01, b'x', 0x0c, 0x18, 0x01]);
        let field = block_on_ready(d.read_field_header()).unwrap();
        assert_eq!(field, 1);
        block_on_ready(d.skip_field()).unwrap();
        let next = block_on_ready(d.read_field_header()).unwrap();
        assert_eq!(next, 3);
        assert_eq!(block_on_ready(d.read_u32()).unwrap(), 1);
    }

    #[test]
    fn varint_wire_type_short_circuits_append_bytes() {
        let mut d = decoder(&[0x08, 0x05]);
        block_on_ready(d.read_field_header()).unwrap();
        let buf = block_on_ready(d.append_bytes(None)).unwrap();
        assert!(buf.is_empty());
        // the varint byte itself is left untouched for a subsequent typed read
        assert_eq!(block_on_ready(d.read_u32()).unwrap(), 5);
    }

    #[test]
    fn try_read_field_header_does_not_consume_on_mismatch() {
        let mut d = decoder(&[0x08, 0x05]);
        assert!(!d.try_read_field_header(2).unwrap());
        assert!(d.try_read_field_header(1).unwrap());
        assert_eq!(block_on_ready(d.read_u32()).unwrap(), 5);
    }

    #[test]
    fn unexpected_end_group_without_open_group_is_an_error() {
        let mut d = decoder(&[0x0c]);
        let err = block_on_ready(d.read_field_header()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedEndGroup);
    }
}
