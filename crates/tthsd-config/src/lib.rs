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

//! File- and environment-backed configuration for the native engine binding.
//!
//! Layout: `model.rs` (typed config models), `defaults.rs` (engine defaults),
//! `validate.rs` (field validation), `loader.rs` (JSON documents and env overrides).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{LIBRARY_PATH_ENV, PAUSE_CAPABILITY_ENV};
pub use model::{BindingConfig, PauseCapability, SessionDefaults};
pub use validate::validate;
