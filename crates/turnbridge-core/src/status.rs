use std::collections::HashMap;
use std::time::Instant;

use turnbridge_protocol::{ThreadId, TurnId};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThreadStatus {
    pub is_processing: bool,
    pub is_reviewing: bool,
    pub active_turn_id: Option<TurnId>,
    pub processing_started_at: Option<Instant>,
    pub last_duration_ms: Option<u64>,
}

/// Emitted when the observable `(is_processing, is_reviewing)` pair of a
/// thread actually changed; the outbound queue reconciles on every one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub thread_id: ThreadId,
    pub is_processing: bool,
    pub is_reviewing: bool,
}

/// Pure reducer over per-thread status. No transition reads another
/// thread's state, so events for different threads replay independently in
/// any interleaving.
#[derive(Debug, Default)]
pub struct ThreadStatusStore {
    threads: HashMap<ThreadId, ThreadStatus>,
}

impl ThreadStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the status entry without transitioning anything.
    pub fn touch(&mut self, thread_id: &ThreadId) {
        self.entry(thread_id);
    }

    pub fn status(&self, thread_id: &ThreadId) -> Option<&ThreadStatus> {
        self.threads.get(thread_id)
    }

    pub fn is_processing(&self, thread_id: &ThreadId) -> bool {
        self.threads
            .get(thread_id)
            .is_some_and(|status| status.is_processing)
    }

    pub fn is_reviewing(&self, thread_id: &ThreadId) -> bool {
        self.threads
            .get(thread_id)
            .is_some_and(|status| status.is_reviewing)
    }

    pub fn active_turn_id(&self, thread_id: &ThreadId) -> Option<&TurnId> {
        self.threads
            .get(thread_id)
            .and_then(|status| status.active_turn_id.as_ref())
    }

    pub fn threads(&self) -> impl Iterator<Item = (&ThreadId, &ThreadStatus)> {
        self.threads.iter()
    }

    pub fn mark_processing(
        &mut self,
        thread_id: &ThreadId,
        is_processing: bool,
        now: Instant,
    ) -> Option<StatusChange> {
        let status = self.entry(thread_id);
        if status.is_processing == is_processing {
            return None;
        }
        if is_processing {
            status.processing_started_at = Some(now);
        } else if let Some(started_at) = status.processing_started_at.take() {
            let elapsed = now.duration_since(started_at);
            status.last_duration_ms = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        }
        status.is_processing = is_processing;
        Some(StatusChange {
            thread_id: thread_id.clone(),
            is_processing: status.is_processing,
            is_reviewing: status.is_reviewing,
        })
    }

    pub fn mark_reviewing(
        &mut self,
        thread_id: &ThreadId,
        is_reviewing: bool,
    ) -> Option<StatusChange> {
        let status = self.entry(thread_id);
        if status.is_reviewing == is_reviewing {
            return None;
        }
        status.is_reviewing = is_reviewing;
        Some(StatusChange {
            thread_id: thread_id.clone(),
            is_processing: status.is_processing,
            is_reviewing: status.is_reviewing,
        })
    }

    pub fn set_active_turn_id(&mut self, thread_id: &ThreadId, turn_id: Option<TurnId>) {
        self.entry(thread_id).active_turn_id = turn_id;
    }

    /// Re-key a thread's status when the backend renames it. The canonical
    /// entry wins if one already exists.
    pub fn migrate(&mut self, old_id: &ThreadId, new_id: &ThreadId) {
        if old_id == new_id {
            return;
        }
        if let Some(status) = self.threads.remove(old_id) {
            self.threads.entry(new_id.clone()).or_insert(status);
        }
    }

    fn entry(&mut self, thread_id: &ThreadId) -> &mut ThreadStatus {
        self.threads.entry(thread_id.clone()).or_default()
    }
}
