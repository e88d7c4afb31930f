#![deny(unsafe_code)]
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

//! Safe binding to the native download engine's C ABI.
//!
//! Layout: `library.rs` (loading and export binding), `task.rs` (task array wire
//! format), `trampoline.rs` (native-callable event adapters), `event_log.rs` (logging
//! handler), `session.rs` (session lifecycle), `engine/` (the engine seam and its
//! in-process stub).

/// Engine seam implemented by the loaded library and the stub.
pub mod engine;
pub mod error;
pub mod event_log;
#[allow(unsafe_code)]
pub mod ffi;
#[allow(unsafe_code)]
pub mod library;
pub mod session;
pub mod task;
#[allow(unsafe_code)]
pub mod trampoline;

pub use engine::{NativeEngine, NativeRequest};
pub use error::{BindingError, BindingResult};
pub use event_log::EventLogger;
pub use ffi::RawCallback;
pub use library::{DEFAULT_LIBRARY_NAME, LibraryBinding, default_library_path};
pub use session::{SessionController, SessionHandle, SessionOptions, SessionState};
pub use task::{TaskBatch, TaskDescriptor, build_tasks, default_show_name};
pub use trampoline::{
    CallbackRegistry, ChannelHandler, EventHandler, SLOT_COUNT, Trampoline, TrampolineId,
    channel_handler,
};
pub use tthsd_config::PauseCapability;
pub use tthsd_events::DecodedEvent;

use std::sync::Arc;

use tthsd_config::BindingConfig;

/// Load the configured engine library and build a controller for it.
///
/// # Errors
///
/// Returns the load errors of [`LibraryBinding::load`].
pub fn connect(config: &BindingConfig) -> BindingResult<SessionController<LibraryBinding>> {
    let library = LibraryBinding::load(config.library_path.as_deref())?;
    Ok(
        SessionController::new(Arc::new(library), config.pause_capability)
            .with_defaults(SessionOptions::from(&config.session)),
    )
}
