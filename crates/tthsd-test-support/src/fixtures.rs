//! Test fixtures and environment helpers.

use std::path::{Path, PathBuf};

/// Shared libraries present on common hosts that export none of the engine symbols.
pub const SYSTEM_LIBRARY_CANDIDATES: &[&str] = &[
    "/lib/x86_64-linux-gnu/libc.so.6",
    "/lib/aarch64-linux-gnu/libc.so.6",
    "/usr/lib/x86_64-linux-gnu/libm.so.6",
    "/usr/lib/libc.so.6",
    "/lib64/libc.so.6",
    "/usr/lib/libSystem.B.dylib",
];

/// Returns the first existing system shared library, if the host has one.
#[must_use]
pub fn system_library() -> Option<PathBuf> {
    first_existing(SYSTEM_LIBRARY_CANDIDATES)
}

fn first_existing(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(Path::new)
        .find(|path| path.is_file())
        .map(Path::to_path_buf)
}
