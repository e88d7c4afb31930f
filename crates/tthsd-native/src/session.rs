//! Session lifecycle on top of a [`NativeEngine`].
//!
//! # Design
//! - The controller tracks the caller-visible state of every handle it created;
//!   handles it never created make no engine call.
//! - State is checked, the lock dropped, the engine called, then the transition
//!   applied only if the state is still the one checked. Handlers running on engine
//!   threads can call back into the controller, and a `stop` that lands while
//!   another call is in flight is never overwritten.
//! - Failures leave the recorded state untouched.

use std::collections::HashMap;
use std::ffi::{CString, c_int};
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};
use tthsd_config::{PauseCapability, SessionDefaults};
use tthsd_config::defaults::{DEFAULT_CHUNK_SIZE_MB, DEFAULT_THREAD_COUNT};

use crate::engine::{NativeEngine, NativeRequest};
use crate::error::{BindingError, BindingResult};
use crate::task::TaskBatch;
use crate::trampoline::{CallbackRegistry, EventHandler, Trampoline};

/// Engine-assigned session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(c_int);

impl SessionHandle {
    /// Sentinel the engine returns when creation fails.
    pub const INVALID: Self = Self(-1);

    /// Wrap a raw engine value.
    #[must_use]
    pub const fn new(raw: c_int) -> Self {
        Self(raw)
    }

    /// Raw engine value.
    #[must_use]
    pub const fn get(self) -> c_int {
        self.0
    }

    /// Whether the value can identify a session.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl Display for SessionHandle {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Caller-visible lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet started.
    Created,
    /// Downloading.
    Running,
    /// Paused on an engine with resumable pause.
    Paused,
    /// Stopped or destroyed; terminal.
    Stopped,
    /// Creation failed; no session exists.
    Failed,
}

impl SessionState {
    /// State implied by a creation call's return value.
    #[must_use]
    pub const fn from_creation(code: c_int, started: bool) -> Self {
        if code < 0 {
            Self::Failed
        } else if started {
            Self::Running
        } else {
            Self::Created
        }
    }

    /// Lowercase name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl Display for SessionState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Tunables for one creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Worker threads for the session.
    pub thread_count: u32,
    /// Chunk size in megabytes.
    pub chunk_size_mb: u32,
    /// User-Agent override.
    pub user_agent: Option<String>,
    /// Mirror events to `remote_callback_url`.
    pub use_callback_url: bool,
    /// Remote endpoint for mirrored events.
    pub remote_callback_url: Option<String>,
    /// Raw socket instead of websocket for the remote endpoint.
    pub use_socket: Option<bool>,
    /// Parallel mode when starting on creation.
    pub is_multiple: Option<bool>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            thread_count: DEFAULT_THREAD_COUNT,
            chunk_size_mb: DEFAULT_CHUNK_SIZE_MB,
            user_agent: None,
            use_callback_url: false,
            remote_callback_url: None,
            use_socket: None,
            is_multiple: None,
        }
    }
}

impl From<&SessionDefaults> for SessionOptions {
    fn from(defaults: &SessionDefaults) -> Self {
        Self {
            thread_count: defaults.thread_count,
            chunk_size_mb: defaults.chunk_size_mb,
            user_agent: defaults.user_agent.clone(),
            use_callback_url: defaults.use_callback_url,
            remote_callback_url: defaults.remote_callback_url.clone(),
            use_socket: defaults.use_socket,
            is_multiple: defaults.is_multiple,
        }
    }
}

struct PreparedOptions {
    thread_count: c_int,
    chunk_size_mb: c_int,
    user_agent: Option<CString>,
    remote_callback_url: Option<CString>,
}

impl SessionOptions {
    fn prepare(&self) -> BindingResult<PreparedOptions> {
        Ok(PreparedOptions {
            thread_count: positive_c_int("thread_count", self.thread_count)?,
            chunk_size_mb: positive_c_int("chunk_size_mb", self.chunk_size_mb)?,
            user_agent: optional_c_string("user_agent", self.user_agent.as_deref())?,
            remote_callback_url: optional_c_string(
                "remote_callback_url",
                self.remote_callback_url.as_deref(),
            )?,
        })
    }
}

fn positive_c_int(field: &'static str, value: u32) -> BindingResult<c_int> {
    if value == 0 {
        return Err(BindingError::InvalidOption {
            field,
            reason: "must be positive",
        });
    }
    c_int::try_from(value).map_err(|_| BindingError::InvalidOption {
        field,
        reason: "exceeds engine integer range",
    })
}

fn optional_c_string(field: &'static str, value: Option<&str>) -> BindingResult<Option<CString>> {
    value
        .map(|value| {
            CString::new(value).map_err(|_| BindingError::InvalidOption {
                field,
                reason: "must not contain NUL bytes",
            })
        })
        .transpose()
}

struct SessionEntry {
    state: SessionState,
    trampoline: Option<Trampoline>,
}

/// Drives sessions on one engine and tracks their state.
pub struct SessionController<E> {
    engine: Arc<E>,
    registry: Arc<CallbackRegistry>,
    pause_capability: PauseCapability,
    defaults: SessionOptions,
    sessions: Mutex<HashMap<SessionHandle, SessionEntry>>,
}

impl<E: NativeEngine> SessionController<E> {
    /// Controller with its own callback registry.
    #[must_use]
    pub fn new(engine: Arc<E>, pause_capability: PauseCapability) -> Self {
        Self::with_registry(engine, Arc::new(CallbackRegistry::new()), pause_capability)
    }

    /// Controller leasing callbacks through `registry`.
    #[must_use]
    pub fn with_registry(
        engine: Arc<E>,
        registry: Arc<CallbackRegistry>,
        pause_capability: PauseCapability,
    ) -> Self {
        Self {
            engine,
            registry,
            pause_capability,
            defaults: SessionOptions::default(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the options returned by [`SessionController::default_options`].
    #[must_use]
    pub fn with_defaults(mut self, defaults: SessionOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Options configured for this controller.
    #[must_use]
    pub const fn default_options(&self) -> &SessionOptions {
        &self.defaults
    }

    /// Configured pause semantics.
    #[must_use]
    pub const fn pause_capability(&self) -> PauseCapability {
        self.pause_capability
    }

    /// Engine driven by this controller.
    #[must_use]
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Registry holding this controller's callback leases.
    #[must_use]
    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    /// Create a session without starting it and without event delivery.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::InvalidOption`] for unusable options and
    /// [`BindingError::NativeCallFailure`] when the engine refuses the session.
    pub fn create(&self, tasks: &TaskBatch, options: &SessionOptions) -> BindingResult<SessionHandle> {
        self.open(tasks, options, None, false)
    }

    /// Create a session delivering events to `handler`.
    ///
    /// # Errors
    ///
    /// As [`SessionController::create`], plus [`BindingError::CallbackCapacity`].
    pub fn create_with_handler<H: EventHandler>(
        &self,
        tasks: &TaskBatch,
        options: &SessionOptions,
        handler: H,
    ) -> BindingResult<SessionHandle> {
        let handler: Arc<dyn EventHandler> = Arc::new(handler);
        self.open(tasks, options, Some(handler), false)
    }

    /// Create and start a session without event delivery.
    ///
    /// # Errors
    ///
    /// As [`SessionController::create`].
    pub fn start(&self, tasks: &TaskBatch, options: &SessionOptions) -> BindingResult<SessionHandle> {
        self.open(tasks, options, None, true)
    }

    /// Create and start a session delivering events to `handler`.
    ///
    /// # Errors
    ///
    /// As [`SessionController::create_with_handler`].
    pub fn start_with_handler<H: EventHandler>(
        &self,
        tasks: &TaskBatch,
        options: &SessionOptions,
        handler: H,
    ) -> BindingResult<SessionHandle> {
        let handler: Arc<dyn EventHandler> = Arc::new(handler);
        self.open(tasks, options, Some(handler), true)
    }

    /// Start a created session, downloading tasks one after another.
    ///
    /// # Errors
    ///
    /// See [`SessionController::stop`].
    pub fn start_by_id(&self, handle: SessionHandle) -> BindingResult<()> {
        self.transition(
            handle,
            "start_download_id",
            &[SessionState::Created],
            SessionState::Running,
            |engine, raw| engine.start_by_id(raw),
        )
    }

    /// Start a created session, downloading tasks in parallel.
    ///
    /// # Errors
    ///
    /// See [`SessionController::stop`].
    pub fn start_multiple_by_id(&self, handle: SessionHandle) -> BindingResult<()> {
        self.transition(
            handle,
            "start_multiple_downloads_id",
            &[SessionState::Created],
            SessionState::Running,
            |engine, raw| engine.start_multiple_by_id(raw),
        )
    }

    /// Pause a running session.
    ///
    /// With [`PauseCapability::Destructive`] the engine destroys the session and it
    /// moves to [`SessionState::Stopped`].
    ///
    /// # Errors
    ///
    /// See [`SessionController::stop`].
    pub fn pause(&self, handle: SessionHandle) -> BindingResult<()> {
        let next = match self.pause_capability {
            PauseCapability::Resumable => SessionState::Paused,
            PauseCapability::Destructive => SessionState::Stopped,
        };
        self.transition(
            handle,
            "pause_download",
            &[SessionState::Running],
            next,
            |engine, raw| engine.pause(raw),
        )
    }

    /// Resume a paused session.
    ///
    /// # Errors
    ///
    /// See [`SessionController::stop`].
    pub fn resume(&self, handle: SessionHandle) -> BindingResult<()> {
        self.transition(
            handle,
            "resume_download",
            &[SessionState::Paused],
            SessionState::Running,
            |engine, raw| engine.resume(raw),
        )
    }

    /// Stop a session for good.
    ///
    /// The session's callback stays registered: the engine may still deliver its
    /// last events. Call [`SessionController::release`] once they are no longer
    /// expected.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::UnknownSession`] for handles this controller does not
    /// track, [`BindingError::OperationFailed`] when the current state does not allow
    /// the operation (no engine call is made) and [`BindingError::NativeCallFailure`]
    /// when the engine returns a non-zero code.
    pub fn stop(&self, handle: SessionHandle) -> BindingResult<()> {
        self.transition(
            handle,
            "stop_download",
            &[
                SessionState::Created,
                SessionState::Running,
                SessionState::Paused,
            ],
            SessionState::Stopped,
            |engine, raw| engine.stop(raw),
        )
    }

    /// Forget a session and release its callback.
    ///
    /// Only created-but-never-started and stopped sessions can be released. The
    /// caller must know the engine will not deliver further events for the handle.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::UnknownSession`] or [`BindingError::OperationFailed`]
    /// for running or paused sessions.
    pub fn release(&self, handle: SessionHandle) -> BindingResult<()> {
        let entry = {
            let mut sessions = self.lock();
            let state = sessions
                .get(&handle)
                .map(|entry| entry.state)
                .ok_or(BindingError::UnknownSession { handle })?;
            if !matches!(state, SessionState::Created | SessionState::Stopped) {
                return Err(BindingError::OperationFailed {
                    operation: "release",
                    handle,
                    state,
                });
            }
            sessions.remove(&handle)
        };
        if let Some(trampoline) = entry.and_then(|entry| entry.trampoline) {
            self.registry.release(trampoline);
        }
        debug!(handle = %handle, "session released");
        Ok(())
    }

    /// Current state of a tracked session.
    #[must_use]
    pub fn state(&self, handle: SessionHandle) -> Option<SessionState> {
        self.lock().get(&handle).map(|entry| entry.state)
    }

    /// Every tracked session, ordered by handle.
    #[must_use]
    pub fn sessions(&self) -> Vec<(SessionHandle, SessionState)> {
        let mut sessions: Vec<_> = self
            .lock()
            .iter()
            .map(|(handle, entry)| (*handle, entry.state))
            .collect();
        sessions.sort_unstable_by_key(|(handle, _)| *handle);
        sessions
    }

    fn open(
        &self,
        tasks: &TaskBatch,
        options: &SessionOptions,
        handler: Option<Arc<dyn EventHandler>>,
        start: bool,
    ) -> BindingResult<SessionHandle> {
        let operation = if start { "start_download" } else { "get_downloader" };
        let prepared = options.prepare()?;
        let trampoline = handler
            .map(|handler| self.registry.register_shared(handler))
            .transpose()?;

        let request = NativeRequest {
            tasks: tasks.as_c_str(),
            task_count: tasks.count(),
            thread_count: prepared.thread_count,
            chunk_size_mb: prepared.chunk_size_mb,
            callback: trampoline.as_ref().map(Trampoline::as_raw),
            use_callback_url: options.use_callback_url,
            user_agent: prepared.user_agent.as_deref(),
            remote_callback_url: prepared.remote_callback_url.as_deref(),
            use_socket: options.use_socket,
            is_multiple: options.is_multiple,
        };
        let code = if start {
            self.engine.create_and_start(&request)
        } else {
            self.engine.create(&request)
        };

        let state = SessionState::from_creation(code, start);
        if state == SessionState::Failed {
            if let Some(trampoline) = trampoline {
                self.registry.release(trampoline);
            }
            warn!(operation, code, "engine refused to create session");
            return Err(BindingError::NativeCallFailure {
                operation,
                handle: None,
                code,
            });
        }

        let handle = SessionHandle::new(code);
        let replaced = self
            .lock()
            .insert(handle, SessionEntry { state, trampoline });
        if replaced.is_some() {
            warn!(handle = %handle, "engine reused a tracked handle; previous callback lease kept");
        }
        info!(handle = %handle, state = %state, tasks = tasks.count(), "session created");
        Ok(handle)
    }

    fn transition<F>(
        &self,
        handle: SessionHandle,
        operation: &'static str,
        allowed: &[SessionState],
        next: SessionState,
        call: F,
    ) -> BindingResult<()>
    where
        F: FnOnce(&E, c_int) -> c_int,
    {
        let state = self
            .state(handle)
            .ok_or(BindingError::UnknownSession { handle })?;
        if !allowed.contains(&state) {
            debug!(handle = %handle, operation, state = %state, "operation refused in current state");
            return Err(BindingError::OperationFailed {
                operation,
                handle,
                state,
            });
        }

        let code = call(self.engine.as_ref(), handle.get());
        if code != 0 {
            warn!(handle = %handle, operation, code, "engine call failed");
            return Err(BindingError::NativeCallFailure {
                operation,
                handle: Some(handle),
                code,
            });
        }

        let applied = match self.lock().get_mut(&handle) {
            Some(entry) if entry.state == state => {
                entry.state = next;
                true
            }
            _ => false,
        };
        if applied {
            debug!(handle = %handle, operation, from = %state, to = %next, "session transitioned");
        } else {
            debug!(
                handle = %handle,
                operation,
                from = %state,
                "session changed during engine call; transition skipped"
            );
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionHandle, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E> fmt::Debug for SessionController<E> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SessionController")
            .field("pause_capability", &self.pause_capability)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
