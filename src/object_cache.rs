//! The object-cache collaborator: interface only
//!
//! Reference/object tracking across sub-messages (the graph of "which
//! sub-message instance does this back-reference point to") is owned by a
//! higher-level type model, not by this decoder. `WireDecoder` only needs a
//! seam to thread calls through; it never inspects the keys it's handed back.

/// Register / lookup / reset collaborator for cross-sub-message object
/// identity tracking.
///
/// The decoder threads calls to this trait through verbatim; it does not
/// implement the graph traversal behind it.
pub trait ObjectCache {
    /// Registers a new object under `key`, returning an opaque handle the
    /// caller can later match against with [`ObjectCache::lookup`].
    fn register(&mut self, key: i64) -> u32;

    /// Looks up a previously-registered object by `key`.
    fn lookup(&self, key: i64) -> Option<u32>;

    /// Clears all registrations.
    fn reset(&mut self);

    /// Number of root-object registrations still pending resolution.
    ///
    /// Named "trap count" in the design notes: a collaborator implementing
    /// forward references may need to know how many roots are still
    /// outstanding before it can finalize a graph.
    fn pending_traps(&self) -> u32 {
        0
    }
}

/// An [`ObjectCache`] that registers and tracks nothing. The default when no
/// collaborator is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObjectCache;

impl ObjectCache for NoopObjectCache {
    fn register(&mut self, _key: i64) -> u32 {
        0
    }

    fn lookup(&self, _key: i64) -> Option<u32> {
        None
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_cache_never_resolves_lookups() {
        let mut cache = NoopObjectCache;
        cache.register(1);
        assert_eq!(cache.lookup(1), None);
        assert_eq!(cache.pending_traps(), 0);
    }
}
