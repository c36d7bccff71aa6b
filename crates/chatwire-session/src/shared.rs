//! Per-session shared state: the generation fence and the status slot.
//!
//! The fence is the core safety mechanism: every event handler, timer
//! remnant, and fire-and-forget side-effect task carries the generation it
//! was created under and becomes a no-op once a newer generation is active.
//! Status snapshots are published through the fence, so a retired
//! generation can never clobber the state written by its successor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use tracing::info;

use chatwire_core::{Generation, SessionId, SessionState, StatusSnapshot};

/// State shared between the manager, the supervisor task, and spawned
/// side-effect tasks for one session id.
#[derive(Debug)]
pub(crate) struct SessionShared {
    id: SessionId,
    /// The single active generation; zero means none was ever started.
    active_gen: AtomicU64,
    status: RwLock<StatusSnapshot>,
    phone: Mutex<Option<String>>,
}

impl SessionShared {
    pub(crate) fn new(id: SessionId) -> Self {
        Self {
            id,
            active_gen: AtomicU64::new(0),
            status: RwLock::new(StatusSnapshot::idle()),
            phone: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> &SessionId {
        &self.id
    }

    /// The status snapshot as last published.
    pub(crate) fn snapshot(&self) -> StatusSnapshot {
        self.status.read().unwrap().clone()
    }

    pub(crate) fn set_phone(&self, phone: Option<String>) {
        *self.phone.lock().unwrap() = phone;
    }

    /// Whether `gen` is still the active generation.
    pub(crate) fn is_active(&self, gen: Generation) -> bool {
        self.active_gen.load(Ordering::SeqCst) == gen.value()
    }

    /// Unconditionally claim a new active generation, retiring whatever was
    /// active before. Used by `start`, which may supersede a live session.
    pub(crate) fn take_over(&self) -> Generation {
        let gen = Generation::new(self.active_gen.fetch_add(1, Ordering::SeqCst) + 1);
        info!(session = %self.id, %gen, "generation activated");
        gen
    }

    /// Retire the active generation without activating a successor. Used by
    /// `stop`; every fenced callback becomes a no-op afterwards. Returns the
    /// token [`Self::publish_stopped`] expects.
    pub(crate) fn retire(&self) -> u64 {
        self.active_gen.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Advance from `from` to the next generation, failing if `from` is no
    /// longer active. Used by the supervisor when rolling to a fresh client;
    /// the failure case means `start` or `stop` superseded the supervisor
    /// while it slept.
    pub(crate) fn advance(&self, from: Generation) -> Option<Generation> {
        let next = from.value() + 1;
        self.active_gen
            .compare_exchange(from.value(), next, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        let gen = Generation::new(next);
        info!(session = %self.id, %gen, "generation advanced");
        Some(gen)
    }

    /// Publish a fresh snapshot, fenced on `gen`. Returns false (writing
    /// nothing) when the generation is stale. The fence is checked under the
    /// status lock so a stale writer cannot land after its successor's
    /// publication.
    pub(crate) fn publish(
        &self,
        gen: Generation,
        state: SessionState,
        last_error: Option<String>,
    ) -> bool {
        let mut slot = self.status.write().unwrap();
        if !self.is_active(gen) {
            return false;
        }
        info!(session = %self.id, %gen, %state, "session state transition");
        *slot = StatusSnapshot::new(state, self.phone.lock().unwrap().clone(), last_error);
        true
    }

    /// Publish the idle snapshot after a stop, unless a newer `start`
    /// claimed the session since the retire. Checked under the status lock
    /// so a stopping caller cannot clobber its successor's snapshot.
    pub(crate) fn publish_stopped(&self, token: u64) -> bool {
        let mut slot = self.status.write().unwrap();
        if self.active_gen.load(Ordering::SeqCst) != token {
            return false;
        }
        info!(session = %self.id, state = %SessionState::Idle, "session state transition");
        *slot = StatusSnapshot::new(SessionState::Idle, self.phone.lock().unwrap().clone(), None);
        true
    }
}
