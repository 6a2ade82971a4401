//! `ByteSource`: the buffer abstraction `WireDecoder` reads through
//!
//! Two implementations share one trait: [`MemorySource`] wraps a contiguous
//! `&[u8]` and never needs to suspend; [`PipeSource`] buffers segments handed
//! over by a caller-supplied [`BytePump`] and can report [`Poll::Pending`]
//! when the pump has nothing more to give right now. `WireDecoder<S>` is
//! written once against the `ByteSource` trait; only the refill behavior
//! differs between the two.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use crate::errors::{Error, ErrorContext, ErrorKind, Result};
use crate::varint::{self, TryDecode};

/// Byte-level contract `WireDecoder` reads through.
///
/// All primitives are `poll`-shaped so that one trait serves both the
/// synchronous (`MemorySource`) and cooperative-suspension (`PipeSource`)
/// surfaces described in the design notes: a source that never needs to wait
/// simply never returns `Poll::Pending`.
pub trait ByteSource {
    /// Bytes immediately visible from the current position without a refill.
    fn remaining_in_current(&self) -> usize;

    /// The currently buffered, contiguous bytes from the cursor onward,
    /// truncated to the active window if one is applied.
    fn current(&self) -> &[u8];

    /// Advances the cursor by `n` bytes, which must already be visible via
    /// [`ByteSource::current`].
    fn advance(&mut self, n: usize);

    /// Absolute byte offset since the start of the stream.
    fn absolute_position(&self) -> u64;

    /// Ensures at least `want` bytes are visible via [`ByteSource::current`],
    /// refilling from the upstream producer if necessary. Resolves with
    /// `Ok(())` once either `want` bytes are visible or the source is
    /// exhausted (a subsequent read that needs more than what's visible then
    /// fails with `Truncated`).
    fn poll_ensure(&mut self, cx: &mut Context<'_>, want: usize) -> Poll<Result<()>>;

    /// Whether no further bytes are visible (end of the current window, or
    /// true end of stream).
    fn is_fully_consumed(&self) -> bool;

    /// Constrains visibility to `end_absolute`, returning the previous end
    /// boundary (sentinel `u64::MAX` meaning "no boundary").
    fn apply_window(&mut self, end_absolute: u64) -> u64;

    /// Restores a previously-saved end boundary.
    fn remove_window(&mut self, prev_end: u64);

    /// The currently active end boundary (sentinel `u64::MAX` for "none").
    fn end_boundary(&self) -> u64;
}

/// A no-op [`Waker`] for driving a `Poll`-shaped primitive that is known to
/// never actually suspend (every [`MemorySource`] operation).
pub(crate) fn noop_waker() -> Waker {
    fn clone(_: *const ()) -> RawWaker {
        raw()
    }
    fn wake(_: *const ()) {}
    fn wake_by_ref(_: *const ()) {}
    fn drop(_: *const ()) {}

    fn raw() -> RawWaker {
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, wake, wake_by_ref, drop);
        RawWaker::new(core::ptr::null(), &VTABLE)
    }

    unsafe { Waker::from_raw(raw()) }
}

/// Drives a `poll`-shaped call that is guaranteed to resolve immediately
/// (i.e. on a [`MemorySource`]) and unwraps the result.
pub(crate) fn block_ready<T>(poll: Poll<T>) -> T {
    match poll {
        Poll::Ready(v) => v,
        Poll::Pending => unreachable!("MemorySource never suspends"),
    }
}

/// A `ByteSource` over a contiguous in-memory buffer. Can never suspend.
#[derive(Debug, Clone)]
pub struct MemorySource<'a> {
    bytes: &'a [u8],
    position: usize,
    end: u64,
}

impl<'a> MemorySource<'a> {
    /// Creates a source reading `bytes` from the start, with no end boundary
    /// other than the buffer's own length.
    pub fn new(bytes: &'a [u8]) -> Self {
        MemorySource {
            bytes,
            position: 0,
            end: u64::MAX,
        }
    }

    fn visible_end(&self) -> usize {
        let window_end = if self.end == u64::MAX {
            self.bytes.len()
        } else {
            (self.end as usize).min(self.bytes.len())
        };
        window_end
    }
}

impl<'a> ByteSource for MemorySource<'a> {
    fn remaining_in_current(&self) -> usize {
        self.visible_end().saturating_sub(self.position)
    }

    fn current(&self) -> &[u8] {
        &self.bytes[self.position..self.visible_end()]
    }

    fn advance(&mut self, n: usize) {
        self.position += n;
    }

    fn absolute_position(&self) -> u64 {
        self.position as u64
    }

    fn poll_ensure(&mut self, _cx: &mut Context<'_>, _want: usize) -> Poll<Result<()>> {
        // Everything this source will ever have is already resident.
        Poll::Ready(Ok(()))
    }

    fn is_fully_consumed(&self) -> bool {
        self.remaining_in_current() == 0
    }

    fn apply_window(&mut self, end_absolute: u64) -> u64 {
        core::mem::replace(&mut self.end, end_absolute)
    }

    fn remove_window(&mut self, prev_end: u64) {
        self.end = prev_end;
    }

    fn end_boundary(&self) -> u64 {
        self.end
    }
}

/// Upstream byte producer for a [`PipeSource`].
///
/// Mirrors the shape of `tokio`'s `poll_read`-style traits: a pump that isn't
/// ready yet registers `cx`'s waker and returns `Poll::Pending`; an exhausted
/// pump resolves with `Ok(None)`.
pub trait BytePump {
    fn poll_pull(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<Vec<u8>>>>;
}

/// A `ByteSource` refilled on demand from a [`BytePump`], possibly spanning
/// many non-contiguous segments.
pub struct PipeSource<P> {
    pump: P,
    segments: VecDeque<Vec<u8>>,
    /// Offset into `segments[0]` the cursor currently sits at.
    front_offset: usize,
    /// Absolute position of the start of `segments[0]` (or of the cursor, if empty).
    base_position: u64,
    end: u64,
    eof: bool,
}

impl<P: BytePump> PipeSource<P> {
    pub fn new(pump: P) -> Self {
        PipeSource {
            pump,
            segments: VecDeque::new(),
            front_offset: 0,
            base_position: 0,
            end: u64::MAX,
            eof: false,
        }
    }

    fn buffered_len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum::<usize>() - self.front_offset
    }

    /// Coalesces all buffered segments into one contiguous `Vec`, starting at
    /// the cursor. Only called when a primitive needs more contiguous bytes
    /// than the front segment alone holds.
    fn coalesce(&mut self) {
        if self.segments.len() <= 1 {
            return;
        }
        let mut merged = Vec::with_capacity(self.buffered_len());
        if let Some(front) = self.segments.front() {
            merged.extend_from_slice(&front[self.front_offset..]);
        }
        for seg in self.segments.iter().skip(1) {
            merged.extend_from_slice(seg);
        }
        self.segments.clear();
        self.segments.push_back(merged);
        // The merged segment now starts at the old cursor, so the discarded
        // front-segment prefix must be folded into `base_position` before
        // `front_offset` is zeroed, or `absolute_position()` under-reports
        // by that prefix length from here on.
        self.base_position += self.front_offset as u64;
        self.front_offset = 0;
    }
}

impl<P: BytePump> ByteSource for PipeSource<P> {
    fn remaining_in_current(&self) -> usize {
        let visible_from_position = if self.end == u64::MAX {
            usize::MAX
        } else {
            (self.end.saturating_sub(self.absolute_position())) as usize
        };
        self.buffered_len().min(visible_from_position)
    }

    fn current(&self) -> &[u8] {
        let n = self.remaining_in_current();
        match self.segments.front() {
            Some(front) => {
                let avail = &front[self.front_offset..];
                &avail[..avail.len().min(n)]
            }
            None => &[],
        }
    }

    fn advance(&mut self, mut n: usize) {
        while n > 0 {
            match self.segments.front_mut() {
                Some(front) => {
                    let avail = front.len() - self.front_offset;
                    if avail > n {
                        self.front_offset += n;
                        n = 0;
                    } else {
                        n -= avail;
                        self.base_position += front.len() as u64;
                        self.segments.pop_front();
                        self.front_offset = 0;
                    }
                }
                None => break,
            }
        }
    }

    fn absolute_position(&self) -> u64 {
        self.base_position + self.front_offset as u64
    }

    fn poll_ensure(&mut self, cx: &mut Context<'_>, want: usize) -> Poll<Result<()>> {
        while self.buffered_len() < want && !self.eof {
            match self.pump.poll_pull(cx) {
                Poll::Ready(Ok(Some(chunk))) => {
                    if !chunk.is_empty() {
                        self.segments.push_back(chunk);
                    }
                }
                Poll::Ready(Ok(None)) => self.eof = true,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            }
        }
        if self.buffered_len() >= want {
            // Only coalesce once we know a single contiguous span is needed
            // immediately after this call; cheap check avoids needless copies
            // for the common case where the front segment already suffices.
            if self
                .segments
                .front()
                .map(|f| f.len() - self.front_offset)
                .unwrap_or(0)
                < want
            {
                self.coalesce();
            }
        }
        Poll::Ready(Ok(()))
    }

    fn is_fully_consumed(&self) -> bool {
        self.buffered_len() == 0 && (self.eof || self.absolute_position() >= self.end)
    }

    fn apply_window(&mut self, end_absolute: u64) -> u64 {
        core::mem::replace(&mut self.end, end_absolute)
    }

    fn remove_window(&mut self, prev_end: u64) {
        self.end = prev_end;
    }

    fn end_boundary(&self) -> u64 {
        self.end
    }
}

/// Shared primitive helpers layered on top of [`ByteSource`]'s raw contract.
/// `WireDecoder` calls these rather than re-implementing varint/fixed-width
/// decoding per source type.
pub(crate) mod ops {
    use super::*;

    pub fn poll_read_varint_u32<S: ByteSource>(
        source: &mut S,
        cx: &mut Context<'_>,
        ctx: ErrorContext,
    ) -> Poll<Result<u32>> {
        loop {
            match varint::try_decode_u32(source.current()) {
                TryDecode::Complete(v, n) => {
                    source.advance(n);
                    return Poll::Ready(Ok(v));
                }
                TryDecode::Overflow => return Poll::Ready(Err(Error::new(ErrorKind::Overflow, ctx))),
                TryDecode::Incomplete => {
                    let want = source.remaining_in_current() + 1;
                    match source.poll_ensure(cx, want) {
                        Poll::Ready(Ok(())) => {
                            if source.remaining_in_current() < want {
                                // Pump is exhausted and still short a byte.
                                return Poll::Ready(Err(Error::new(ErrorKind::Truncated, ctx)));
                            }
                        }
                        Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                        Poll::Pending => return Poll::Pending,
                    }
                }
            }
        }
    }

    pub fn poll_read_varint_u64<S: ByteSource>(
        source: &mut S,
        cx: &mut Context<'_>,
        ctx: ErrorContext,
    ) -> Poll<Result<u64>> {
        loop {
            match varint::try_decode_u64(source.current()) {
                TryDecode::Complete(v, n) => {
                    source.advance(n);
                    return Poll::Ready(Ok(v));
                }
                TryDecode::Overflow => return Poll::Ready(Err(Error::new(ErrorKind::Overflow, ctx))),
                TryDecode::Incomplete => {
                    let want = source.remaining_in_current() + 1;
                    match source.poll_ensure(cx, want) {
                        Poll::Ready(Ok(())) => {
                            if source.remaining_in_current() < want {
                                return Poll::Ready(Err(Error::new(ErrorKind::Truncated, ctx)));
                            }
                        }
                        Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                        Poll::Pending => return Poll::Pending,
                    }
                }
            }
        }
    }

    /// Non-consuming peek of a u32 varint: `Ok(None)` if not enough bytes are
    /// already visible in the current span (never refills).
    pub fn peek_varint_u32<S: ByteSource>(source: &S, ctx: ErrorContext) -> Result<Option<(u32, usize)>> {
        match varint::try_decode_u32(source.current()) {
            TryDecode::Complete(v, n) => Ok(Some((v, n))),
            TryDecode::Incomplete => Ok(None),
            TryDecode::Overflow => Err(Error::new(ErrorKind::Overflow, ctx)),
        }
    }

    pub fn poll_read_exact<'b, S: ByteSource>(
        source: &mut S,
        cx: &mut Context<'_>,
        n: usize,
        ctx: ErrorContext,
        out: &mut Vec<u8>,
    ) -> Poll<Result<()>> {
        loop {
            if source.remaining_in_current() >= n {
                out.extend_from_slice(&source.current()[..n]);
                source.advance(n);
                return Poll::Ready(Ok(()));
            }
            match source.poll_ensure(cx, n) {
                Poll::Ready(Ok(())) => {
                    if source.remaining_in_current() < n {
                        return Poll::Ready(Err(Error::new(ErrorKind::Truncated, ctx)));
                    }
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            }
        }
    }

    /// Skips forward to absolute position `target`.
    ///
    /// Takes an absolute target rather than a relative count so that
    /// re-polling after `Pending` is safe: progress already made by a prior
    /// call is reflected in `source.absolute_position()` itself, not in a
    /// local counter that a retried call would otherwise reset.
    pub fn poll_skip_to<S: ByteSource>(
        source: &mut S,
        cx: &mut Context<'_>,
        target: u64,
        ctx: ErrorContext,
    ) -> Poll<Result<()>> {
        loop {
            let remaining = target.saturating_sub(source.absolute_position()) as usize;
            if remaining == 0 {
                return Poll::Ready(Ok(()));
            }
            let avail = source.remaining_in_current();
            if avail > 0 {
                source.advance(avail.min(remaining));
                continue;
            }
            match source.poll_ensure(cx, 1) {
                Poll::Ready(Ok(())) => {
                    if source.remaining_in_current() == 0 {
                        return Poll::Ready(Err(Error::new(ErrorKind::Truncated, ctx)));
                    }
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            }
        }
    }

    /// Reads a fixed `N`-byte little-endian span without going through a
    /// `Vec`; used for `fixed32`/`fixed64` field reads.
    pub fn poll_read_fixed<S: ByteSource, const N: usize>(
        source: &mut S,
        cx: &mut Context<'_>,
        ctx: ErrorContext,
    ) -> Poll<Result<[u8; N]>> {
        loop {
            if source.remaining_in_current() >= N {
                let mut buf = [0u8; N];
                buf.copy_from_slice(&source.current()[..N]);
                source.advance(N);
                return Poll::Ready(Ok(buf));
            }
            match source.poll_ensure(cx, N) {
                Poll::Ready(Ok(())) => {
                    if source.remaining_in_current() < N {
                        return Poll::Ready(Err(Error::new(ErrorKind::Truncated, ctx)));
                    }
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_reads_contiguous_bytes() {
        let data = [1u8, 2, 3, 4, 5];
        let mut src = MemorySource::new(&data);
        assert_eq!(src.remaining_in_current(), 5);
        assert_eq!(src.current(), &data[..]);
        src.advance(2);
        assert_eq!(src.current(), &data[2..]);
        assert_eq!(src.absolute_position(), 2);
    }

    #[test]
    fn memory_source_window_bounds_visibility() {
        let data = [1u8, 2, 3, 4, 5];
        let mut src = MemorySource::new(&data);
        let prev = src.apply_window(3);
        assert_eq!(prev, u64::MAX);
        assert_eq!(src.remaining_in_current(), 3);
        src.advance(3);
        assert!(src.is_fully_consumed());
        src.remove_window(prev);
        assert_eq!(src.remaining_in_current(), 2);
    }

    struct VecPump {
        chunks: VecDeque<Vec<u8>>,
    }

    impl BytePump for VecPump {
        fn poll_pull(&mut self, _cx: &mut Context<'_>) -> Poll<Result<Option<Vec<u8>>>> {
            Poll::Ready(Ok(self.chunks.pop_front()))
        }
    }

    #[test]
    fn pipe_source_spans_multiple_segments() {
        let pump = VecPump {
            chunks: VecDeque::from(vec![vec![1, 2], vec![3, 4, 5]]),
        };
        let mut src = PipeSource::new(pump);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        assert_eq!(block_ready(ops::poll_read_exact(
            &mut src,
            &mut cx,
            4,
            ErrorContext::default(),
            &mut Vec::new()
        ))
        .is_ok(), true);
        assert_eq!(src.absolute_position(), 4);

        assert!(block_ready(src.poll_ensure(&mut cx, 1)).is_ok());
        assert_eq!(src.remaining_in_current(), 1);
    }

    #[test]
    fn pipe_source_reports_truncated_at_eof() {
        let pump = VecPump {
            chunks: VecDeque::from(vec![vec![1, 2]]),
        };
        let mut src = PipeSource::new(pump);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut out = Vec::new();
        let result = block_ready(ops::poll_read_exact(&mut src, &mut cx, 5, ErrorContext::default(), &mut out));
        assert_eq!(result.unwrap_err().kind, ErrorKind::Truncated);
    }
}
