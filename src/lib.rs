//! A streaming wire-format decoder for Protocol Buffers binary payloads
//!
//! [`WireDecoder`] reads field headers, scalars, strings, byte blobs and
//! nested sub-messages directly off a contiguous buffer ([`MemorySource`])
//! or a refillable byte pipe ([`PipeSource`]), without any schema of its
//! own — mapping field numbers to a concrete type's fields is a job for a
//! higher-level crate built on top of this one.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod errors;
pub mod framing;
pub mod object_cache;
pub mod reader;
pub mod source;
pub mod state;
pub mod type_model;
pub mod varint;
pub mod wire_type;

#[cfg(feature = "std")]
pub mod interner;

pub use crate::{
    errors::{Error, ErrorContext, ErrorKind, Result},
    framing::{read_length_prefix, LengthPrefix, LengthPrefixStyle, NO_MESSAGE_LENGTH},
    object_cache::{NoopObjectCache, ObjectCache},
    reader::{block_on_ready, DecoderOptions, WireDecoder},
    source::{ByteSource, BytePump, MemorySource, PipeSource},
    state::SubItemToken,
    type_model::{SerializationContext, TypeModel},
    wire_type::{FieldHeader, WireType, MAX_FIELD_NUMBER},
};

#[cfg(feature = "std")]
pub use crate::interner::StringInterner;
