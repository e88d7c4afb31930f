//! Native-callable adapters forwarding engine callbacks to Rust handlers.
//!
//! # Design
//! - The engine's callback carries no user data, so each registration leases one of
//!   [`SLOT_COUNT`] statically compiled adapter functions. Only this slot table is
//!   process-wide; leases belong to the [`CallbackRegistry`] that took them.
//! - Leases rotate through the slots, so a vacated slot is handed out again only
//!   after every other free slot. Late events from a released session keep landing
//!   on a vacant slot for as long as possible.
//! - Every lease gets a fresh generation. A [`TrampolineId`] is `(slot, generation)`,
//!   so a stale id never releases a newer registration of the same slot.
//! - Adapters never unwind into the engine: decode failures are logged and dropped,
//!   handler panics are caught and logged.
//! - Adapter functions are never unloaded. Releasing a lease while the engine still
//!   holds the pointer is memory safe, but later events would be dropped or reach
//!   whichever handler leases the slot next. Release only once the session is done.

use std::collections::HashSet;
use std::ffi::{CStr, c_char};
use std::fmt::{self, Display, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};
use tthsd_events::{DecodedEvent, decode};

use crate::error::{BindingError, BindingResult};
use crate::ffi::RawCallback;

/// Number of adapters available to the whole process.
pub const SLOT_COUNT: usize = 64;

/// Receives decoded events on engine threads.
///
/// Implementations should return quickly; hand heavy work to another thread, for
/// example through [`channel_handler`].
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one decoded event.
    fn handle(&self, event: DecodedEvent);
}

impl<F> EventHandler for F
where
    F: Fn(DecodedEvent) + Send + Sync + 'static,
{
    fn handle(&self, event: DecodedEvent) {
        self(event);
    }
}

/// Handler forwarding events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    sender: mpsc::UnboundedSender<DecodedEvent>,
}

impl EventHandler for ChannelHandler {
    fn handle(&self, event: DecodedEvent) {
        if self.sender.send(event).is_err() {
            trace!("event receiver dropped; event discarded");
        }
    }
}

/// Create a handler whose events can be awaited from async code.
#[must_use]
pub fn channel_handler() -> (ChannelHandler, mpsc::UnboundedReceiver<DecodedEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (ChannelHandler { sender }, receiver)
}

/// Identity of one registration: adapter slot plus lease generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrampolineId {
    slot: usize,
    generation: u64,
}

impl TrampolineId {
    /// Adapter slot index.
    #[must_use]
    pub const fn slot(self) -> usize {
        self.slot
    }

    /// Lease generation, unique per process.
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.generation
    }
}

impl Display for TrampolineId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}#{}", self.slot, self.generation)
    }
}

/// Ownership handle for a leased adapter; consumed by [`CallbackRegistry::release`].
///
/// Dropping it without releasing keeps the lease until the registry is cleared.
#[derive(Debug)]
#[must_use = "dropping a trampoline leaks its lease until the registry is cleared"]
pub struct Trampoline {
    id: TrampolineId,
    callback: RawCallback,
}

impl Trampoline {
    /// Registration identity.
    pub const fn id(&self) -> TrampolineId {
        self.id
    }

    /// Function pointer to hand to the engine.
    pub const fn as_raw(&self) -> RawCallback {
        self.callback
    }
}

struct SlotEntry {
    owner: u64,
    generation: u64,
    handler: Arc<dyn EventHandler>,
}

type Slot = RwLock<Option<SlotEntry>>;

static SLOTS: [Slot; SLOT_COUNT] = [const { RwLock::new(None) }; SLOT_COUNT];
static NEXT_SLOT: AtomicUsize = AtomicUsize::new(0);
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);
static NEXT_REGISTRY: AtomicU64 = AtomicU64::new(1);

/// Set of leases taken by one controller or test.
///
/// Dropping the registry releases every lease it still holds.
pub struct CallbackRegistry {
    owner: u64,
    leases: Mutex<HashSet<TrampolineId>>,
}

impl CallbackRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            owner: NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed),
            leases: Mutex::new(HashSet::new()),
        }
    }

    /// Lease an adapter that forwards to `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::CallbackCapacity`] when every slot is leased.
    pub fn register<H: EventHandler>(&self, handler: H) -> BindingResult<Trampoline> {
        self.register_shared(Arc::new(handler))
    }

    /// Lease an adapter for an already shared handler.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::CallbackCapacity`] when every slot is leased.
    pub fn register_shared(&self, handler: Arc<dyn EventHandler>) -> BindingResult<Trampoline> {
        let mut leases = self.lock();
        let id = lease(&SLOTS, &NEXT_SLOT, self.owner, handler).ok_or(BindingError::CallbackCapacity {
            capacity: SLOT_COUNT,
        })?;
        leases.insert(id);
        debug!(slot = id.slot, generation = id.generation, "callback registered");
        Ok(Trampoline {
            id,
            callback: ADAPTERS[id.slot],
        })
    }

    /// Release a registration.
    ///
    /// The caller must guarantee the engine will not invoke the trampoline again:
    /// its session was stopped or never started. Returns `false` when the
    /// trampoline does not belong to this registry.
    pub fn release(&self, trampoline: Trampoline) -> bool {
        let id = trampoline.id;
        let mut leases = self.lock();
        if !leases.remove(&id) {
            warn!(slot = id.slot, generation = id.generation, "release of foreign trampoline ignored");
            return false;
        }
        vacate(&SLOTS, self.owner, id);
        debug!(slot = id.slot, generation = id.generation, "callback released");
        true
    }

    /// Release every lease held by this registry; returns how many were held.
    pub fn clear(&self) -> usize {
        let mut leases = self.lock();
        let released = leases.len();
        for id in leases.drain() {
            vacate(&SLOTS, self.owner, id);
        }
        if released > 0 {
            debug!(released, "callback registry cleared");
        }
        released
    }

    /// Whether `id` is currently leased by this registry.
    #[must_use]
    pub fn contains(&self, id: TrampolineId) -> bool {
        self.lock().contains(&id)
    }

    /// Number of leases held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no lease is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<TrampolineId>> {
        self.leases.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CallbackRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CallbackRegistry")
            .field("owner", &self.owner)
            .field("leases", &self.len())
            .finish()
    }
}

/// Take the first free slot at or after `cursor`, wrapping around.
fn lease(
    slots: &[Slot],
    cursor: &AtomicUsize,
    owner: u64,
    handler: Arc<dyn EventHandler>,
) -> Option<TrampolineId> {
    let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
    let start = cursor.load(Ordering::Relaxed);
    (0..slots.len())
        .map(|offset| (start + offset) % slots.len())
        .find_map(|slot| {
            let mut entry = slots
                .get(slot)?
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if entry.is_some() {
                return None;
            }
            *entry = Some(SlotEntry {
                owner,
                generation,
                handler: Arc::clone(&handler),
            });
            cursor.store(slot + 1, Ordering::Relaxed);
            Some(TrampolineId { slot, generation })
        })
}

fn vacate(slots: &[Slot], owner: u64, id: TrampolineId) -> bool {
    let Some(cell) = slots.get(id.slot) else {
        return false;
    };
    let mut entry = cell.write().unwrap_or_else(PoisonError::into_inner);
    let matches = entry
        .as_ref()
        .is_some_and(|current| current.owner == owner && current.generation == id.generation);
    if matches {
        *entry = None;
    }
    matches
}

fn current_handler(slots: &[Slot], slot: usize) -> Option<Arc<dyn EventHandler>> {
    let cell = slots.get(slot)?;
    let entry = cell.read().unwrap_or_else(PoisonError::into_inner);
    entry.as_ref().map(|current| Arc::clone(&current.handler))
}

/// # Safety
///
/// Non-null `ptr` must point to a NUL-terminated string that outlives `'a`.
unsafe fn c_bytes<'a>(ptr: *const c_char) -> &'a [u8] {
    if ptr.is_null() {
        return &[];
    }
    // SAFETY: forwarded from the caller.
    unsafe { CStr::from_ptr(ptr) }.to_bytes()
}

/// # Safety
///
/// Non-null pointers must reference NUL-terminated strings valid for this call.
unsafe fn dispatch(slots: &[Slot], slot: usize, event: *const c_char, payload: *const c_char) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let Some(handler) = current_handler(slots, slot) else {
            trace!(slot, "event for vacant callback slot dropped");
            return;
        };
        // SAFETY: forwarded from the caller.
        let (event, payload) = unsafe { (c_bytes(event), c_bytes(payload)) };
        match decode(event, payload) {
            Ok(decoded) => handler.handle(decoded),
            Err(err) => warn!(
                slot,
                side = %err.side(),
                error = %err,
                "engine event could not be decoded; dropped"
            ),
        }
    }));
    if outcome.is_err() {
        error!(slot, "event handler panicked; event dropped");
    }
}

macro_rules! slot_adapters {
    ($($slot:literal)*) => {
        const ADAPTERS: [RawCallback; SLOT_COUNT] = [$({
            unsafe extern "C" fn adapter(event: *const c_char, payload: *const c_char) {
                // SAFETY: the engine passes NUL-terminated strings (or null) that stay
                // valid for the duration of the callback.
                unsafe { dispatch(&SLOTS, $slot, event, payload) }
            }
            adapter
        }),*];
    };
}

slot_adapters!(
    0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15
    16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
    32 33 34 35 36 37 38 39 40 41 42 43 44 45 46 47
    48 49 50 51 52 53 54 55 56 57 58 59 60 61 62 63
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::ptr;
    use std::thread;
    use std::time::Duration;

    use tthsd_events::EventKind;
    use tthsd_test_support::EventRecorder;

    fn invoke(trampoline: &Trampoline, event: &str, payload: &str) {
        let event = CString::new(event).expect("event");
        let payload = CString::new(payload).expect("payload");
        // SAFETY: both strings outlive the call.
        unsafe { (trampoline.as_raw())(event.as_ptr(), payload.as_ptr()) };
    }

    fn recording(registry: &CallbackRegistry) -> (EventRecorder, Trampoline) {
        let recorder = EventRecorder::new();
        let sink = recorder.clone();
        let trampoline = registry
            .register(move |event: DecodedEvent| sink.record(event))
            .expect("slot available");
        (recorder, trampoline)
    }

    #[test]
    fn adapter_decodes_and_forwards_progress() {
        let registry = CallbackRegistry::new();
        let (recorder, trampoline) = recording(&registry);
        invoke(
            &trampoline,
            r#"{"Type":"update"}"#,
            r#"{"Downloaded":500,"Total":1000}"#,
        );
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        let progress = events[0].progress().expect("update carries progress");
        assert_eq!(progress.percent_complete(), Some(50.0));
        assert!(registry.release(trampoline));
    }

    #[test]
    fn null_pointers_decode_as_empty_documents() {
        let registry = CallbackRegistry::new();
        let (recorder, trampoline) = recording(&registry);
        // SAFETY: null is accepted for both arguments.
        unsafe { (trampoline.as_raw())(ptr::null(), ptr::null()) };
        assert_eq!(recorder.kinds(), vec![EventKind::Unknown]);
        assert!(registry.release(trampoline));
    }

    #[test]
    fn malformed_json_is_dropped_and_later_events_flow() {
        let registry = CallbackRegistry::new();
        let (recorder, trampoline) = recording(&registry);
        invoke(&trampoline, "{not json", "");
        invoke(&trampoline, r#"{"Type":"msg"}"#, "[1,2]");
        invoke(&trampoline, r#"{"Type":"end"}"#, "");
        assert_eq!(recorder.kinds(), vec![EventKind::End]);
        assert!(registry.release(trampoline));
    }

    #[test]
    fn handler_panic_is_contained() {
        let registry = CallbackRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let trampoline = registry
            .register(move |_event: DecodedEvent| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("handler failure");
                }
            })
            .expect("slot available");
        invoke(&trampoline, r#"{"Type":"start"}"#, "");
        invoke(&trampoline, r#"{"Type":"end"}"#, "");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(registry.release(trampoline));
    }

    #[test]
    fn releasing_one_registration_keeps_the_other() {
        let registry = CallbackRegistry::new();
        let (first_events, first) = recording(&registry);
        let (second_events, second) = recording(&registry);
        assert_ne!(first.id(), second.id());
        let second_id = second.id();

        assert!(registry.release(first));
        assert!(registry.contains(second_id));
        invoke(&second, r#"{"Type":"start"}"#, "");
        assert_eq!(second_events.len(), 1);
        assert!(first_events.is_empty());
        assert!(registry.release(second));
        assert!(registry.is_empty());
    }

    #[test]
    fn same_handler_registered_twice_gets_distinct_identities() {
        let registry = CallbackRegistry::new();
        let recorder = EventRecorder::new();
        let shared: Arc<dyn EventHandler> = {
            let sink = recorder.clone();
            Arc::new(move |event: DecodedEvent| sink.record(event))
        };
        let first = registry
            .register_shared(Arc::clone(&shared))
            .expect("first slot");
        let second = registry.register_shared(shared).expect("second slot");
        assert_ne!(first.id(), second.id());
        assert!(registry.release(first));
        invoke(&second, r#"{"Type":"start"}"#, "");
        assert_eq!(recorder.len(), 1);
        assert!(registry.release(second));
    }

    #[test]
    fn registries_only_release_their_own_leases() {
        let left = CallbackRegistry::new();
        let right = CallbackRegistry::new();
        let (_events, trampoline) = recording(&left);
        let id = trampoline.id();
        assert!(!right.release(trampoline));
        assert!(left.contains(id));
        assert_eq!(left.clear(), 1);
        assert!(!left.contains(id));
    }

    #[test]
    fn dropping_the_registry_vacates_its_slots() {
        let shared: Arc<dyn EventHandler> = Arc::new(|_event: DecodedEvent| {});
        {
            let registry = CallbackRegistry::new();
            let _first = registry
                .register_shared(Arc::clone(&shared))
                .expect("first slot");
            let _second = registry
                .register_shared(Arc::clone(&shared))
                .expect("second slot");
            assert_eq!(Arc::strong_count(&shared), 3);
        }
        assert_eq!(Arc::strong_count(&shared), 1);
    }

    #[test]
    fn concurrent_invocations_reach_the_handler() {
        let registry = CallbackRegistry::new();
        let (recorder, trampoline) = recording(&registry);
        let callback = trampoline.as_raw();
        let workers: Vec<_> = (0..8)
            .map(|_| {
                thread::spawn(move || {
                    let event = CString::new(r#"{"Type":"update"}"#).expect("event");
                    let payload = CString::new(r#"{"Downloaded":1}"#).expect("payload");
                    for _ in 0..25 {
                        // SAFETY: both strings outlive the call.
                        unsafe { callback(event.as_ptr(), payload.as_ptr()) };
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker");
        }
        assert_eq!(recorder.wait_for(200, Duration::from_secs(5)).len(), 200);
        assert!(registry.release(trampoline));
    }

    #[test]
    fn exhausted_slot_table_refuses_new_leases() {
        let slots: [Slot; 2] = [const { RwLock::new(None) }; 2];
        let cursor = AtomicUsize::new(0);
        let handler: Arc<dyn EventHandler> = Arc::new(|_event: DecodedEvent| {});
        let first = lease(&slots, &cursor, 7, Arc::clone(&handler)).expect("first");
        let second = lease(&slots, &cursor, 7, Arc::clone(&handler)).expect("second");
        assert_ne!(first.slot(), second.slot());
        assert!(lease(&slots, &cursor, 7, Arc::clone(&handler)).is_none());

        assert!(!vacate(&slots, 8, first));
        assert!(vacate(&slots, 7, first));
        let reused = lease(&slots, &cursor, 7, handler).expect("slot reused");
        assert_eq!(reused.slot(), first.slot());
        assert!(reused.generation() > first.generation());
        assert!(!vacate(&slots, 7, first));
    }

    #[test]
    fn vacated_slots_are_reused_last() {
        let slots: [Slot; 3] = [const { RwLock::new(None) }; 3];
        let cursor = AtomicUsize::new(0);
        let handler: Arc<dyn EventHandler> = Arc::new(|_event: DecodedEvent| {});

        let first = lease(&slots, &cursor, 1, Arc::clone(&handler)).expect("first");
        assert!(vacate(&slots, 1, first));
        let second = lease(&slots, &cursor, 1, Arc::clone(&handler)).expect("second");
        let third = lease(&slots, &cursor, 1, Arc::clone(&handler)).expect("third");
        assert_eq!([first.slot(), second.slot(), third.slot()], [0, 1, 2]);
        let wrapped = lease(&slots, &cursor, 1, handler).expect("wrapped");
        assert_eq!(wrapped.slot(), first.slot());
    }

    #[test]
    fn late_events_on_a_released_callback_miss_the_next_registration() {
        let registry = CallbackRegistry::new();
        let (released_events, released) = recording(&registry);
        let stale = released.as_raw();
        assert!(registry.release(released));

        let (next_events, next) = recording(&registry);
        let event = CString::new(r#"{"Type":"err"}"#).expect("event");
        let payload = CString::new(r#"{"Error":"late"}"#).expect("payload");
        // SAFETY: adapters are never unloaded; both strings outlive the call.
        unsafe { stale(event.as_ptr(), payload.as_ptr()) };

        assert!(released_events.is_empty());
        assert!(next_events.is_empty());
        assert!(registry.release(next));
    }

    #[tokio::test]
    async fn channel_handler_delivers_off_thread() {
        let registry = CallbackRegistry::new();
        let (handler, mut receiver) = channel_handler();
        let trampoline = registry.register(handler).expect("slot available");
        let callback = trampoline.as_raw();
        thread::spawn(move || {
            let event = CString::new(r#"{"Type":"endOne","ShowName":"a.bin"}"#).expect("event");
            // SAFETY: the string outlives the call; null payload is accepted.
            unsafe { callback(event.as_ptr(), ptr::null()) };
        })
        .join()
        .expect("engine thread");
        let event = receiver.recv().await.expect("event delivered");
        assert_eq!(event.envelope.kind, EventKind::EndOne);
        assert_eq!(event.envelope.display_name(), Some("a.bin"));
        assert!(registry.release(trampoline));
    }
}
