//! The type-model collaborator: an opaque handle, not a schema engine
//!
//! Mapping field numbers to object fields, reflection/attribute-driven
//! schema discovery, and recursive sub-message dispatch all live in a
//! higher-level library built on top of this decoder. `WireDecoder` only
//! needs to know *whether* one was configured, so it can raise
//! [`crate::errors::ErrorKind::NoTypeModel`] when a caller asks for dispatch
//! without providing one.

/// Opaque marker for a schema/type-model collaborator.
///
/// Intentionally empty: this decoder has no reflection or schema logic of
/// its own. A real type model lives above this crate and is passed through
/// only so callers building on top of `WireDecoder` have a consistent place
/// to hang dispatch off of.
pub trait TypeModel {}

/// A serialization context forwarded opaquely to sub-message handlers.
///
/// Like [`TypeModel`], the decoder never inspects this; it exists purely as
/// a pass-through seam for `downcast_ref`-style consumers built on top of
/// this crate.
pub type SerializationContext<'a> = &'a dyn core::any::Any;
