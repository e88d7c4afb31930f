//! In-process engine honouring the native ABI.
//!
//! Creation parses the task array, lifecycle calls follow the engine's return-code
//! contract, and events are delivered through the registered callback from spawned
//! threads, the way the real engine calls back from its workers.

use std::collections::HashMap;
use std::ffi::{CStr, CString, c_int};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use serde_json::{Value, json};
use tracing::trace;

use super::{NativeEngine, NativeRequest};
use crate::ffi::RawCallback;

const FAILURE: c_int = -1;
const STUB_FILE_BYTES: u64 = 1000;

/// Engine call as observed by the stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubCall {
    /// `get_downloader`.
    Create,
    /// `start_download` with its parallel flag.
    CreateAndStart {
        /// Value behind the `is_multiple` pointer.
        is_multiple: Option<bool>,
    },
    /// `start_download_id`.
    StartById(c_int),
    /// `start_multiple_downloads_id`.
    StartMultipleById(c_int),
    /// `pause_download`.
    Pause(c_int),
    /// `resume_download`.
    Resume(c_int),
    /// `stop_download`.
    Stop(c_int),
}

/// Creation arguments as the stub received them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubRequest {
    /// Task array text.
    pub tasks: String,
    /// Declared number of tasks.
    pub task_count: c_int,
    /// Worker threads.
    pub thread_count: c_int,
    /// Chunk size in megabytes.
    pub chunk_size_mb: c_int,
    /// Whether a callback pointer was passed.
    pub has_callback: bool,
    /// Remote mirroring switch.
    pub use_callback_url: bool,
    /// User-Agent string, when a pointer was passed.
    pub user_agent: Option<String>,
    /// Remote endpoint, when a pointer was passed.
    pub remote_callback_url: Option<String>,
    /// Value behind the `use_socket` pointer.
    pub use_socket: Option<bool>,
    /// Value behind the `is_multiple` pointer.
    pub is_multiple: Option<bool>,
}

impl StubRequest {
    fn capture(request: &NativeRequest<'_>) -> Self {
        let text = |value: &CStr| value.to_string_lossy().into_owned();
        Self {
            tasks: text(request.tasks),
            task_count: request.task_count,
            thread_count: request.thread_count,
            chunk_size_mb: request.chunk_size_mb,
            has_callback: request.callback.is_some(),
            use_callback_url: request.use_callback_url,
            user_agent: request.user_agent.map(text),
            remote_callback_url: request.remote_callback_url.map(text),
            use_socket: request.use_socket,
            is_multiple: request.is_multiple,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StubState {
    Created,
    Running,
    Paused,
    Stopped,
}

#[derive(Debug, Clone)]
struct StubTask {
    url: String,
    save_path: String,
    show_name: String,
    id: String,
}

struct StubSession {
    state: StubState,
    callback: Option<RawCallback>,
    tasks: Vec<StubTask>,
}

#[derive(Default)]
struct StubInner {
    sessions: HashMap<c_int, StubSession>,
    calls: Vec<StubCall>,
    requests: Vec<StubRequest>,
    workers: Vec<JoinHandle<()>>,
}

/// Engine double; cheap to clone, clones share state.
#[derive(Clone, Default)]
pub struct StubEngine {
    inner: Arc<Mutex<StubInner>>,
    next_handle: Arc<AtomicI32>,
    fail_creation: bool,
    destructive_pause: bool,
}

impl StubEngine {
    /// Engine with resumable pause whose creation calls succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every creation call return `-1`.
    #[must_use]
    pub const fn failing_creation(mut self) -> Self {
        self.fail_creation = true;
        self
    }

    /// Make pause tear the session down, as older engines do.
    #[must_use]
    pub const fn with_destructive_pause(mut self) -> Self {
        self.destructive_pause = true;
        self
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<StubCall> {
        self.lock().calls.clone()
    }

    /// Arguments of every creation call, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<StubRequest> {
        self.lock().requests.clone()
    }

    /// Task array the session was created with, as `(url, save_path, show_name, id)`.
    #[must_use]
    pub fn tasks(&self, handle: c_int) -> Option<Vec<(String, String, String, String)>> {
        self.lock().sessions.get(&handle).map(|session| {
            session
                .tasks
                .iter()
                .map(|task| {
                    (
                        task.url.clone(),
                        task.save_path.clone(),
                        task.show_name.clone(),
                        task.id.clone(),
                    )
                })
                .collect()
        })
    }

    /// Deliver raw documents to the session's callback from an engine thread.
    ///
    /// `None` passes a null pointer. Returns `false` when the session has no callback
    /// or a document contains a NUL byte.
    pub fn emit(&self, handle: c_int, event: Option<&str>, payload: Option<&str>) -> bool {
        let Some(callback) = self
            .lock()
            .sessions
            .get(&handle)
            .and_then(|session| session.callback)
        else {
            return false;
        };
        let Some(event) = event.map(CString::new).transpose().ok() else {
            return false;
        };
        let Some(payload) = payload.map(CString::new).transpose().ok() else {
            return false;
        };
        thread::spawn(move || invoke_raw(callback, event.as_ref(), payload.as_ref()))
            .join()
            .is_ok()
    }

    /// Wait for every download worker spawned so far.
    pub fn wait_idle(&self) {
        let workers = std::mem::take(&mut self.lock().workers);
        for worker in workers {
            if worker.join().is_err() {
                trace!("stub worker panicked");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, StubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self, request: &NativeRequest<'_>, call: StubCall) -> c_int {
        let mut inner = self.lock();
        inner.calls.push(call);
        inner.requests.push(StubRequest::capture(request));
        if self.fail_creation {
            return FAILURE;
        }
        let Some(tasks) = parse_tasks(request) else {
            return FAILURE;
        };
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        inner.sessions.insert(
            handle,
            StubSession {
                state: StubState::Created,
                callback: request.callback,
                tasks,
            },
        );
        handle
    }

    fn run(&self, inner: &mut StubInner, handle: c_int) -> c_int {
        let Some(session) = inner.sessions.get_mut(&handle) else {
            return FAILURE;
        };
        session.state = StubState::Running;
        if let Some(callback) = session.callback {
            let tasks = session.tasks.clone();
            let engine = self.clone();
            inner
                .workers
                .push(thread::spawn(move || engine.download(handle, callback, &tasks)));
        }
        0
    }

    fn download(&self, handle: c_int, callback: RawCallback, tasks: &[StubTask]) {
        let total = tasks.len();
        self.emit_if_running(handle, callback, envelope("start", "", ""), &Value::Null);
        for (index, task) in tasks.iter().enumerate() {
            let marker = json!({
                "URL": task.url,
                "SavePath": task.save_path,
                "ShowName": task.show_name,
                "Index": index + 1,
                "Total": total,
            });
            let tagged = |kind| envelope(kind, &task.show_name, &task.id);
            self.emit_if_running(handle, callback, tagged("startOne"), &marker);
            for downloaded in [STUB_FILE_BYTES / 2, STUB_FILE_BYTES] {
                let progress = json!({
                    "Downloaded": downloaded,
                    "Total": STUB_FILE_BYTES,
                    "current_speed_mbps": 1.5,
                });
                self.emit_if_running(handle, callback, tagged("update"), &progress);
            }
            self.emit_if_running(handle, callback, tagged("endOne"), &marker);
        }
        self.emit_if_running(handle, callback, envelope("end", "", ""), &Value::Null);
    }

    fn emit_if_running(&self, handle: c_int, callback: RawCallback, event: Value, payload: &Value) {
        let running = self
            .lock()
            .sessions
            .get(&handle)
            .is_some_and(|session| session.state == StubState::Running);
        if running {
            invoke_json(callback, &event, payload);
        }
    }

    fn notify(callback: Option<RawCallback>, text: &str) {
        if let Some(callback) = callback {
            let payload = json!({ "Text": text });
            let spawned = thread::spawn(move || {
                invoke_json(callback, &envelope("msg", "global", ""), &payload);
            });
            if spawned.join().is_err() {
                trace!("stub notification thread panicked");
            }
        }
    }

    fn transition(
        &self,
        call: StubCall,
        handle: c_int,
        from: &[StubState],
        to: Option<StubState>,
    ) -> Result<Option<RawCallback>, c_int> {
        let mut inner = self.lock();
        inner.calls.push(call);
        let Some(session) = inner.sessions.get_mut(&handle) else {
            return Err(FAILURE);
        };
        if !from.contains(&session.state) {
            return Err(FAILURE);
        }
        let callback = session.callback;
        match to {
            Some(state) => session.state = state,
            None => {
                inner.sessions.remove(&handle);
            }
        }
        Ok(callback)
    }
}

impl NativeEngine for StubEngine {
    fn create(&self, request: &NativeRequest<'_>) -> c_int {
        self.open(request, StubCall::Create)
    }

    fn create_and_start(&self, request: &NativeRequest<'_>) -> c_int {
        let handle = self.open(
            request,
            StubCall::CreateAndStart {
                is_multiple: request.is_multiple,
            },
        );
        if handle < 0 {
            return handle;
        }
        let mut inner = self.lock();
        if self.run(&mut inner, handle) == 0 {
            handle
        } else {
            FAILURE
        }
    }

    fn start_by_id(&self, handle: c_int) -> c_int {
        self.start_from_created(StubCall::StartById(handle), handle)
    }

    fn start_multiple_by_id(&self, handle: c_int) -> c_int {
        self.start_from_created(StubCall::StartMultipleById(handle), handle)
    }

    fn pause(&self, handle: c_int) -> c_int {
        let to = if self.destructive_pause {
            None
        } else {
            Some(StubState::Paused)
        };
        match self.transition(StubCall::Pause(handle), handle, &[StubState::Running], to) {
            Ok(callback) => {
                Self::notify(callback, "paused");
                0
            }
            Err(code) => code,
        }
    }

    fn resume(&self, handle: c_int) -> c_int {
        let mut inner = self.lock();
        inner.calls.push(StubCall::Resume(handle));
        match inner.sessions.get(&handle).map(|session| session.state) {
            Some(StubState::Paused) => self.run(&mut inner, handle),
            _ => FAILURE,
        }
    }

    fn stop(&self, handle: c_int) -> c_int {
        let from = [StubState::Created, StubState::Running, StubState::Paused];
        match self.transition(
            StubCall::Stop(handle),
            handle,
            &from,
            Some(StubState::Stopped),
        ) {
            Ok(callback) => {
                Self::notify(callback, "stopped");
                0
            }
            Err(code) => code,
        }
    }
}

impl StubEngine {
    fn start_from_created(&self, call: StubCall, handle: c_int) -> c_int {
        let mut inner = self.lock();
        inner.calls.push(call);
        match inner.sessions.get(&handle).map(|session| session.state) {
            Some(StubState::Created) => self.run(&mut inner, handle),
            _ => FAILURE,
        }
    }
}

fn parse_tasks(request: &NativeRequest<'_>) -> Option<Vec<StubTask>> {
    let tasks: Vec<Value> = serde_json::from_slice(request.tasks.to_bytes()).ok()?;
    if usize::try_from(request.task_count).ok()? != tasks.len() {
        return None;
    }
    tasks
        .iter()
        .map(|task| {
            let field = |key: &str| task.get(key).and_then(Value::as_str).map(str::to_owned);
            Some(StubTask {
                url: field("url")?,
                save_path: field("save_path")?,
                show_name: field("show_name")?,
                id: field("id")?,
            })
        })
        .collect()
}

fn envelope(kind: &str, show_name: &str, id: &str) -> Value {
    json!({ "Type": kind, "Name": kind, "ShowName": show_name, "ID": id })
}

fn invoke_json(callback: RawCallback, event: &Value, payload: &Value) {
    let payload = if payload.is_null() {
        String::new()
    } else {
        payload.to_string()
    };
    let (Ok(event), Ok(payload)) = (CString::new(event.to_string()), CString::new(payload)) else {
        return;
    };
    invoke_raw(callback, Some(&event), Some(&payload));
}

fn invoke_raw(callback: RawCallback, event: Option<&CString>, payload: Option<&CString>) {
    let event = event.map_or(std::ptr::null(), |value| value.as_ptr());
    let payload = payload.map_or(std::ptr::null(), |value| value.as_ptr());
    // SAFETY: both pointers are null or reference strings alive for the call.
    unsafe { callback(event, payload) };
}
