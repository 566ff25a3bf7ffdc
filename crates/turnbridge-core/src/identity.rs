use std::collections::HashMap;

use turnbridge_memory::ThreadIdentityView;
use turnbridge_protocol::ThreadId;

/// Alias chains from ephemeral pending thread ids to backend-confirmed
/// canonical ids. Edges are recorded on rename and never deleted, so any
/// late duplicate event keyed under an old id still resolves.
#[derive(Debug, Default)]
pub struct AliasTable {
    edges: HashMap<ThreadId, ThreadId>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow the alias chain to its fixed point. Resolution is idempotent;
    /// traversal is capped at the number of known edges, so a recorded
    /// cycle cannot loop.
    pub fn resolve_canonical(&self, thread_id: &ThreadId) -> ThreadId {
        let mut current = thread_id.clone();
        for _ in 0..=self.edges.len() {
            match self.edges.get(&current) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }

    /// Record `old -> resolve_canonical(new)`. Called whenever the backend
    /// renames a pending thread to its confirmed identity.
    pub fn remember_alias(&mut self, old_id: &ThreadId, new_id: &ThreadId) {
        let canonical = self.resolve_canonical(new_id);
        if *old_id == canonical {
            return;
        }
        self.edges.insert(old_id.clone(), canonical);
    }

    /// The canonical id plus every id that maps to it, directly or
    /// transitively, so lookups under either identity find the same
    /// pending records.
    pub fn collect_related(&self, thread_id: &ThreadId) -> Vec<ThreadId> {
        let canonical = self.resolve_canonical(thread_id);
        let mut related = vec![canonical.clone()];
        for source in self.edges.keys() {
            if *source != canonical && self.resolve_canonical(source) == canonical {
                related.push(source.clone());
            }
        }
        related
    }
}

impl ThreadIdentityView for AliasTable {
    fn resolve_canonical(&self, thread_id: &ThreadId) -> ThreadId {
        AliasTable::resolve_canonical(self, thread_id)
    }

    fn collect_related(&self, thread_id: &ThreadId) -> Vec<ThreadId> {
        AliasTable::collect_related(self, thread_id)
    }
}

/// Activity snapshot of one pending thread, used to attribute
/// session-scoped events that arrive without a thread id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingThreadCandidate {
    pub thread_id: ThreadId,
    pub is_processing: bool,
    pub is_active: bool,
    pub has_active_turn: bool,
    pub has_history: bool,
}

/// Disambiguate which pending thread a session-scoped event belongs to.
/// Strict precedence; ambiguity returns `None` and the caller skips the
/// event rather than guessing. In particular there is no
/// most-recently-created tie-break.
pub fn resolve_pending_thread(candidates: &[PendingThreadCandidate]) -> Option<ThreadId> {
    let processing: Vec<&PendingThreadCandidate> = candidates
        .iter()
        .filter(|candidate| candidate.is_processing)
        .collect();
    match processing.len() {
        1 => return Some(processing[0].thread_id.clone()),
        0 => {}
        _ => {
            return processing
                .iter()
                .find(|candidate| candidate.is_active)
                .map(|candidate| candidate.thread_id.clone());
        }
    }

    let with_turn: Vec<&PendingThreadCandidate> = candidates
        .iter()
        .filter(|candidate| candidate.has_active_turn)
        .collect();
    match with_turn.len() {
        1 => return Some(with_turn[0].thread_id.clone()),
        0 => {}
        _ => {
            return with_turn
                .iter()
                .find(|candidate| candidate.is_active)
                .map(|candidate| candidate.thread_id.clone());
        }
    }

    if let [only] = candidates {
        let any_activity = only.is_processing || only.has_active_turn || only.has_history;
        if any_activity {
            return Some(only.thread_id.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use turnbridge_protocol::ThreadId;

    use super::{resolve_pending_thread, AliasTable, PendingThreadCandidate};

    fn candidate(thread: &str) -> PendingThreadCandidate {
        PendingThreadCandidate {
            thread_id: ThreadId::new(thread),
            is_processing: false,
            is_active: false,
            has_active_turn: false,
            has_history: false,
        }
    }

    #[test]
    fn resolution_is_transitive_and_idempotent() {
        let mut aliases = AliasTable::new();
        aliases.remember_alias(&ThreadId::new("pending-2"), &ThreadId::new("session-X"));
        aliases.remember_alias(&ThreadId::new("pending-1"), &ThreadId::new("pending-2"));

        assert_eq!(
            aliases.resolve_canonical(&ThreadId::new("pending-1")),
            ThreadId::new("session-X")
        );
        assert_eq!(
            aliases.resolve_canonical(&ThreadId::new("session-X")),
            ThreadId::new("session-X")
        );
    }

    #[test]
    fn collect_related_spans_the_whole_chain() {
        let mut aliases = AliasTable::new();
        aliases.remember_alias(&ThreadId::new("pending-1"), &ThreadId::new("pending-2"));
        aliases.remember_alias(&ThreadId::new("pending-2"), &ThreadId::new("session-X"));

        let mut related = aliases.collect_related(&ThreadId::new("pending-1"));
        related.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(
            related,
            vec![
                ThreadId::new("pending-1"),
                ThreadId::new("pending-2"),
                ThreadId::new("session-X"),
            ]
        );
    }

    #[test]
    fn self_aliases_are_not_recorded() {
        let mut aliases = AliasTable::new();
        aliases.remember_alias(&ThreadId::new("session-X"), &ThreadId::new("session-X"));
        assert_eq!(
            aliases.collect_related(&ThreadId::new("session-X")),
            vec![ThreadId::new("session-X")]
        );
    }

    #[test]
    fn single_processing_thread_wins() {
        let mut a = candidate("codex-pending-1");
        a.is_processing = true;
        let b = candidate("codex-pending-2");
        assert_eq!(
            resolve_pending_thread(&[a.clone(), b]),
            Some(a.thread_id)
        );
    }

    #[test]
    fn multiple_processing_threads_need_the_active_one() {
        let mut a = candidate("codex-pending-1");
        a.is_processing = true;
        let mut b = candidate("codex-pending-2");
        b.is_processing = true;

        assert_eq!(resolve_pending_thread(&[a.clone(), b.clone()]), None);

        b.is_active = true;
        assert_eq!(
            resolve_pending_thread(&[a, b.clone()]),
            Some(b.thread_id)
        );
    }

    #[test]
    fn a_bound_turn_breaks_the_tie_when_nothing_processes() {
        let a = candidate("codex-pending-1");
        let mut b = candidate("codex-pending-2");
        b.has_active_turn = true;
        assert_eq!(
            resolve_pending_thread(&[a, b.clone()]),
            Some(b.thread_id)
        );
    }

    #[test]
    fn a_single_idle_thread_needs_some_activity_signal() {
        let idle = candidate("codex-pending-1");
        assert_eq!(resolve_pending_thread(&[idle.clone()]), None);

        let mut with_history = idle;
        with_history.has_history = true;
        assert_eq!(
            resolve_pending_thread(&[with_history.clone()]),
            Some(with_history.thread_id)
        );
    }

    #[test]
    fn two_idle_threads_are_unattributable() {
        let a = candidate("codex-pending-1");
        let b = candidate("codex-pending-2");
        assert_eq!(resolve_pending_thread(&[a, b]), None);
        assert_eq!(resolve_pending_thread(&[]), None);
    }
}
