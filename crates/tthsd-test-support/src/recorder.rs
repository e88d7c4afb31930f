//! Thread-safe capture of decoded events delivered from engine threads.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tthsd_events::{DecodedEvent, EventKind};

/// Collects events from any thread and lets a test wait for a number of them.
#[derive(Clone, Default)]
pub struct EventRecorder {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    events: Mutex<Vec<DecodedEvent>>,
    arrived: Condvar,
}

impl EventRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and wake any waiter.
    pub fn record(&self, event: DecodedEvent) {
        self.inner
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        self.inner.arrived.notify_all();
    }

    /// Block until at least `count` events arrived or `timeout` elapsed.
    ///
    /// Returns whatever was recorded by then.
    #[must_use]
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<DecodedEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = self
            .inner
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while events.len() < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            events = self
                .inner
                .arrived
                .wait_timeout(events, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        events.clone()
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<DecodedEvent> {
        self.inner
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Event kinds in arrival order.
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events()
            .iter()
            .map(|event| event.envelope.kind)
            .collect()
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
