#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Event protocol decoding for the native download engine callbacks.
//!
//! Every callback invocation delivers two JSON documents: an envelope naming the
//! event type and the task it concerns, and a payload whose shape depends on that
//! type. This crate turns the raw bytes into typed records.
//!
//! Layout: `envelope.rs` (event kinds and metadata), `payload.rs` (per-kind payload
//! union), `decode.rs` (byte-level parsing), `error.rs` (decode failures).

pub mod decode;
pub mod envelope;
pub mod error;
pub mod payload;

pub use decode::{DecodedEvent, decode};
pub use envelope::{EventEnvelope, EventKind};
pub use error::{DecodeError, DecodeResult, DocumentSide};
pub use payload::{EventPayload, ProgressSnapshot, TaskMarker};
