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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (host library probes), recorder.rs (event capture across threads).

pub mod fixtures;
pub mod recorder;

pub use fixtures::{SYSTEM_LIBRARY_CANDIDATES, system_library};
pub use recorder::EventRecorder;
