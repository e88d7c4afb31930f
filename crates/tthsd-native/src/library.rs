//! Loading the engine shared library and binding its exports.

use std::env;
use std::ffi::{c_char, c_int};
use std::fmt::{self, Debug, Formatter};
use std::path::{Path, PathBuf};
use std::ptr;

use libloading::Library;
use tracing::{debug, info};

use crate::engine::{NativeEngine, NativeRequest};
use crate::error::{BindingError, BindingResult};
use crate::ffi::{self, GetDownloaderFn, HandleFn, StartDownloadFn};

/// Library file name used when no explicit path is configured.
#[cfg(target_os = "windows")]
pub const DEFAULT_LIBRARY_NAME: &str = "TTHSD.dll";
/// Library file name used when no explicit path is configured.
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY_NAME: &str = "TTHSD.dylib";
/// Library file name used when no explicit path is configured.
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const DEFAULT_LIBRARY_NAME: &str = "TTHSD.so";

/// [`DEFAULT_LIBRARY_NAME`] inside the current directory.
///
/// Falls back to the bare name when the current directory cannot be read.
#[must_use]
pub fn default_library_path() -> PathBuf {
    env::current_dir().map_or_else(
        |_| PathBuf::from(DEFAULT_LIBRARY_NAME),
        |dir| dir.join(DEFAULT_LIBRARY_NAME),
    )
}

/// Anchor a relative path at the current directory; the platform loader would
/// otherwise search its own directories for it.
fn resolve(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::path::absolute(&path).unwrap_or(path)
}

#[derive(Clone, Copy)]
struct Exports {
    get_downloader: GetDownloaderFn,
    start_download: StartDownloadFn,
    start_download_id: HandleFn,
    start_multiple_downloads_id: HandleFn,
    pause_download: HandleFn,
    resume_download: HandleFn,
    stop_download: HandleFn,
}

/// A loaded engine library with every export bound.
///
/// The function pointers stay valid for as long as this value lives; controllers hold
/// it behind an `Arc` so it outlives every session created through it.
pub struct LibraryBinding {
    exports: Exports,
    path: PathBuf,
    _library: Library,
}

impl LibraryBinding {
    /// Load the library at `path`, or at [`default_library_path`] when `None`.
    ///
    /// Relative paths are resolved against the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::LibraryNotFound`] when the file does not exist,
    /// [`BindingError::LibraryOpen`] when the loader rejects it and
    /// [`BindingError::SignatureMismatch`] for the first missing export.
    pub fn load(path: Option<&Path>) -> BindingResult<Self> {
        let path = resolve(path.map_or_else(default_library_path, Path::to_path_buf));
        if !path.exists() {
            return Err(BindingError::LibraryNotFound { path });
        }

        // SAFETY: loading runs the library's initialisers; the engine library has
        // none that depend on process state set up by this crate.
        let library = unsafe { Library::new(&path) }.map_err(|source| {
            BindingError::LibraryOpen {
                path: path.clone(),
                source,
            }
        })?;

        // SAFETY: each export is bound with the signature the engine declares for it.
        let exports = unsafe {
            Exports {
                get_downloader: bind(&library, ffi::GET_DOWNLOADER)?,
                start_download: bind(&library, ffi::START_DOWNLOAD)?,
                start_download_id: bind(&library, ffi::START_DOWNLOAD_ID)?,
                start_multiple_downloads_id: bind(&library, ffi::START_MULTIPLE_DOWNLOADS_ID)?,
                pause_download: bind(&library, ffi::PAUSE_DOWNLOAD)?,
                resume_download: bind(&library, ffi::RESUME_DOWNLOAD)?,
                stop_download: bind(&library, ffi::STOP_DOWNLOAD)?,
            }
        };

        info!(path = %path.display(), "engine library loaded");
        Ok(Self {
            exports,
            path,
            _library: library,
        })
    }

    /// Path the library was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Debug for LibraryBinding {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LibraryBinding")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// # Safety
///
/// `T` must be the function pointer type matching the export's real signature.
unsafe fn bind<T: Copy>(library: &Library, symbol: &'static [u8]) -> BindingResult<T> {
    let name = ffi::symbol_name(symbol);
    // SAFETY: forwarded to the caller's contract on `T`.
    let export = unsafe { library.get::<T>(symbol) }
        .map_err(|source| BindingError::SignatureMismatch { symbol: name, source })?;
    debug!(symbol = name, "engine export bound");
    Ok(*export)
}

fn optional_ptr(value: Option<&std::ffi::CStr>) -> *const c_char {
    value.map_or(ptr::null(), std::ffi::CStr::as_ptr)
}

fn optional_flag(value: Option<&bool>) -> *const bool {
    value.map_or(ptr::null(), ptr::from_ref)
}

impl NativeEngine for LibraryBinding {
    fn create(&self, request: &NativeRequest<'_>) -> c_int {
        let use_socket = request.use_socket;
        // SAFETY: every pointer references data borrowed for the duration of the call
        // and the export was bound with this signature.
        unsafe {
            (self.exports.get_downloader)(
                request.tasks.as_ptr(),
                request.task_count,
                request.thread_count,
                request.chunk_size_mb,
                request.callback,
                request.use_callback_url,
                optional_ptr(request.user_agent),
                optional_ptr(request.remote_callback_url),
                optional_flag(use_socket.as_ref()),
            )
        }
    }

    fn create_and_start(&self, request: &NativeRequest<'_>) -> c_int {
        let use_socket = request.use_socket;
        let is_multiple = request.is_multiple;
        // SAFETY: as for `create`.
        unsafe {
            (self.exports.start_download)(
                request.tasks.as_ptr(),
                request.task_count,
                request.thread_count,
                request.chunk_size_mb,
                request.callback,
                request.use_callback_url,
                optional_ptr(request.user_agent),
                optional_ptr(request.remote_callback_url),
                optional_flag(use_socket.as_ref()),
                optional_flag(is_multiple.as_ref()),
            )
        }
    }

    fn start_by_id(&self, handle: c_int) -> c_int {
        // SAFETY: plain integer argument; export bound with this signature.
        unsafe { (self.exports.start_download_id)(handle) }
    }

    fn start_multiple_by_id(&self, handle: c_int) -> c_int {
        // SAFETY: as above.
        unsafe { (self.exports.start_multiple_downloads_id)(handle) }
    }

    fn pause(&self, handle: c_int) -> c_int {
        // SAFETY: as above.
        unsafe { (self.exports.pause_download)(handle) }
    }

    fn resume(&self, handle: c_int) -> c_int {
        // SAFETY: as above.
        unsafe { (self.exports.resume_download)(handle) }
    }

    fn stop(&self, handle: c_int) -> c_int {
        // SAFETY: as above.
        unsafe { (self.exports.stop_download)(handle) }
    }
}
