//! Default tunables passed to the engine when the caller supplies none.
//!
//! # Design
//! - Mirror the values the engine documents for its own callers.

/// Worker threads requested per session.
pub const DEFAULT_THREAD_COUNT: u32 = 64;
/// Chunk size, in megabytes, requested per session.
pub const DEFAULT_CHUNK_SIZE_MB: u32 = 10;
