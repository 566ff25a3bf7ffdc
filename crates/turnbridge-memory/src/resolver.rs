use std::collections::HashMap;
use std::time::{Duration, Instant};

use turnbridge_protocol::ThreadId;

use crate::records::{
    AssistantCompletedPayload, InputCapturedPayload, MatchedTurn, PendingAssistantCompletion,
    PendingMemoryCapture,
};

/// Wide on purpose: some engines' turns routinely exceed 30 seconds, and a
/// narrow window would drop legitimate write-backs.
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Alias lookup the resolver needs from the identity layer. Implemented by
/// the core's alias table; tests substitute a fixed map.
pub trait ThreadIdentityView {
    fn resolve_canonical(&self, thread_id: &ThreadId) -> ThreadId;

    /// The canonical id plus every id aliased to it, directly or
    /// transitively.
    fn collect_related(&self, thread_id: &ThreadId) -> Vec<ThreadId>;
}

/// Matches the asynchronously-captured user input against the
/// asynchronously-completed assistant output for the same logical turn,
/// in either arrival order. Both mailboxes are keyed by canonical thread
/// id and mutated only from the event-loop task.
#[derive(Debug)]
pub struct MemoryRaceResolver {
    captures: HashMap<ThreadId, PendingMemoryCapture>,
    completions: HashMap<ThreadId, PendingAssistantCompletion>,
    staleness_window: Duration,
}

impl Default for MemoryRaceResolver {
    fn default() -> Self {
        Self::new(DEFAULT_STALENESS_WINDOW)
    }
}

impl MemoryRaceResolver {
    pub fn new(staleness_window: Duration) -> Self {
        Self {
            captures: HashMap::new(),
            completions: HashMap::new(),
            staleness_window,
        }
    }

    /// Record the user-input half. Returns the matched pair when a fresh
    /// completion was already waiting under any related id.
    pub fn on_input_captured(
        &mut self,
        payload: InputCapturedPayload,
        identity: &dyn ThreadIdentityView,
        now: Instant,
    ) -> Option<MatchedTurn> {
        let canonical = identity.resolve_canonical(&payload.thread_id);
        let capture = PendingMemoryCapture {
            workspace_id: payload.workspace_id,
            thread_id: canonical.clone(),
            turn_id: payload.turn_id,
            input_text: payload.input_text,
            memory_id: payload.memory_id,
            created_at: now,
        };
        self.captures.insert(canonical.clone(), capture);

        let completion = self.take_completion(&canonical, identity)?;
        if self.is_stale(completion.created_at, now) {
            tracing::debug!(
                thread_id = canonical.as_str(),
                "discarding stale assistant completion; keeping new capture"
            );
            return None;
        }
        let capture = self.captures.remove(&canonical)?;
        Some(matched(capture, completion))
    }

    /// Record the assistant-output half. Returns the matched pair when a
    /// fresh capture was waiting; a stale capture is abandoned together
    /// with this completion.
    pub fn on_assistant_completed(
        &mut self,
        payload: AssistantCompletedPayload,
        identity: &dyn ThreadIdentityView,
        now: Instant,
    ) -> Option<MatchedTurn> {
        let canonical = identity.resolve_canonical(&payload.thread_id);
        let completion = PendingAssistantCompletion {
            workspace_id: payload.workspace_id,
            thread_id: canonical.clone(),
            item_id: payload.item_id,
            text: payload.text,
            created_at: now,
        };

        let Some(capture) = self.take_capture(&canonical, identity) else {
            self.completions.insert(canonical, completion);
            return None;
        };
        if self.is_stale(capture.created_at, now) {
            tracing::debug!(
                thread_id = canonical.as_str(),
                "abandoning stale capture and its completion"
            );
            return None;
        }
        Some(matched(capture, completion))
    }

    /// Re-key pending records when a thread is renamed. Called alongside
    /// alias recording so later lookups under either id still match.
    pub fn migrate(&mut self, old_id: &ThreadId, new_id: &ThreadId) {
        if old_id == new_id {
            return;
        }
        if let Some(capture) = self.captures.remove(old_id) {
            self.captures.entry(new_id.clone()).or_insert(capture);
        }
        if let Some(completion) = self.completions.remove(old_id) {
            self.completions
                .entry(new_id.clone())
                .or_insert(completion);
        }
    }

    pub fn pending_capture(&self, thread_id: &ThreadId) -> Option<&PendingMemoryCapture> {
        self.captures.get(thread_id)
    }

    pub fn pending_completion(&self, thread_id: &ThreadId) -> Option<&PendingAssistantCompletion> {
        self.completions.get(thread_id)
    }

    fn is_stale(&self, created_at: Instant, now: Instant) -> bool {
        now.duration_since(created_at) >= self.staleness_window
    }

    fn take_completion(
        &mut self,
        canonical: &ThreadId,
        identity: &dyn ThreadIdentityView,
    ) -> Option<PendingAssistantCompletion> {
        for related in identity.collect_related(canonical) {
            if let Some(completion) = self.completions.remove(&related) {
                return Some(completion);
            }
        }
        None
    }

    fn take_capture(
        &mut self,
        canonical: &ThreadId,
        identity: &dyn ThreadIdentityView,
    ) -> Option<PendingMemoryCapture> {
        for related in identity.collect_related(canonical) {
            if let Some(capture) = self.captures.remove(&related) {
                return Some(capture);
            }
        }
        None
    }
}

fn matched(capture: PendingMemoryCapture, completion: PendingAssistantCompletion) -> MatchedTurn {
    MatchedTurn {
        workspace_id: capture.workspace_id,
        thread_id: completion.thread_id,
        turn_id: capture.turn_id,
        input_text: capture.input_text,
        assistant_text: completion.text,
        prior_memory_id: capture.memory_id,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    use turnbridge_protocol::{ThreadId, WorkspaceId};

    use super::{MemoryRaceResolver, ThreadIdentityView, DEFAULT_STALENESS_WINDOW};
    use crate::records::{AssistantCompletedPayload, InputCapturedPayload};

    #[derive(Default)]
    struct FixedAliases {
        edges: HashMap<ThreadId, ThreadId>,
    }

    impl FixedAliases {
        fn with_edge(mut self, old: &str, new: &str) -> Self {
            self.edges.insert(ThreadId::new(old), ThreadId::new(new));
            self
        }
    }

    impl ThreadIdentityView for FixedAliases {
        fn resolve_canonical(&self, thread_id: &ThreadId) -> ThreadId {
            let mut current = thread_id.clone();
            for _ in 0..=self.edges.len() {
                match self.edges.get(&current) {
                    Some(next) => current = next.clone(),
                    None => break,
                }
            }
            current
        }

        fn collect_related(&self, thread_id: &ThreadId) -> Vec<ThreadId> {
            let canonical = self.resolve_canonical(thread_id);
            let mut related = vec![canonical.clone()];
            for source in self.edges.keys() {
                if self.resolve_canonical(source) == canonical {
                    related.push(source.clone());
                }
            }
            related
        }
    }

    fn capture(thread: &str, text: &str) -> InputCapturedPayload {
        InputCapturedPayload {
            workspace_id: WorkspaceId::new("ws-1"),
            thread_id: ThreadId::new(thread),
            turn_id: None,
            input_text: text.to_owned(),
            memory_id: None,
        }
    }

    fn completion(thread: &str, text: &str) -> AssistantCompletedPayload {
        AssistantCompletedPayload {
            workspace_id: WorkspaceId::new("ws-1"),
            thread_id: ThreadId::new(thread),
            item_id: None,
            text: text.to_owned(),
        }
    }

    #[test]
    fn in_order_arrival_merges_on_completion() {
        let mut resolver = MemoryRaceResolver::default();
        let identity = FixedAliases::default();
        let start = Instant::now();

        assert!(resolver
            .on_input_captured(capture("thr_1", "fix the bug"), &identity, start)
            .is_none());
        let matched = resolver
            .on_assistant_completed(
                completion("thr_1", "Fixed null check at line 42."),
                &identity,
                start + Duration::from_secs(2),
            )
            .expect("matched turn");

        assert_eq!(matched.input_text, "fix the bug");
        assert_eq!(matched.assistant_text, "Fixed null check at line 42.");
        assert!(resolver.pending_capture(&ThreadId::new("thr_1")).is_none());
        assert!(resolver
            .pending_completion(&ThreadId::new("thr_1"))
            .is_none());
    }

    #[test]
    fn out_of_order_arrival_merges_on_capture() {
        let mut resolver = MemoryRaceResolver::default();
        let identity = FixedAliases::default();
        let start = Instant::now();

        assert!(resolver
            .on_assistant_completed(completion("thr_1", "Done."), &identity, start)
            .is_none());
        let matched = resolver
            .on_input_captured(
                capture("thr_1", "do the thing"),
                &identity,
                start + Duration::from_secs(5),
            )
            .expect("matched turn");

        assert_eq!(matched.input_text, "do the thing");
        assert_eq!(matched.assistant_text, "Done.");
    }

    #[test]
    fn alias_chain_connects_the_two_halves() {
        let mut resolver = MemoryRaceResolver::default();
        let identity = FixedAliases::default()
            .with_edge("pending-1", "pending-2")
            .with_edge("pending-2", "session-X");
        let start = Instant::now();

        assert!(resolver
            .on_input_captured(capture("pending-1", "question"), &identity, start)
            .is_none());
        let matched = resolver
            .on_assistant_completed(
                completion("session-X", "answer"),
                &identity,
                start + Duration::from_secs(1),
            )
            .expect("matched across aliases");
        assert_eq!(matched.thread_id, ThreadId::new("session-X"));
    }

    #[test]
    fn stale_capture_is_abandoned_with_its_completion() {
        let mut resolver = MemoryRaceResolver::default();
        let identity = FixedAliases::default();
        let start = Instant::now();

        resolver.on_input_captured(capture("thr_1", "old question"), &identity, start);
        let result = resolver.on_assistant_completed(
            completion("thr_1", "late answer"),
            &identity,
            start + DEFAULT_STALENESS_WINDOW + Duration::from_secs(1),
        );

        assert!(result.is_none());
        assert!(resolver.pending_capture(&ThreadId::new("thr_1")).is_none());
        assert!(resolver
            .pending_completion(&ThreadId::new("thr_1"))
            .is_none());
    }

    #[test]
    fn stale_completion_is_discarded_and_capture_kept() {
        let mut resolver = MemoryRaceResolver::default();
        let identity = FixedAliases::default();
        let start = Instant::now();

        resolver.on_assistant_completed(completion("thr_1", "ancient answer"), &identity, start);
        let result = resolver.on_input_captured(
            capture("thr_1", "new question"),
            &identity,
            start + DEFAULT_STALENESS_WINDOW + Duration::from_secs(1),
        );

        assert!(result.is_none());
        assert!(resolver.pending_capture(&ThreadId::new("thr_1")).is_some());
        assert!(resolver
            .pending_completion(&ThreadId::new("thr_1"))
            .is_none());
    }

    #[test]
    fn a_new_capture_replaces_the_prior_one() {
        let mut resolver = MemoryRaceResolver::default();
        let identity = FixedAliases::default();
        let start = Instant::now();

        resolver.on_input_captured(capture("thr_1", "first"), &identity, start);
        resolver.on_input_captured(
            capture("thr_1", "second"),
            &identity,
            start + Duration::from_secs(1),
        );

        let pending = resolver
            .pending_capture(&ThreadId::new("thr_1"))
            .expect("capture");
        assert_eq!(pending.input_text, "second");
    }

    #[test]
    fn migration_rekeys_pending_records() {
        let mut resolver = MemoryRaceResolver::default();
        let identity = FixedAliases::default();
        let start = Instant::now();
        let pending = ThreadId::pending("codex", "1");
        let canonical = ThreadId::new("thr_1");

        resolver.on_input_captured(
            capture(pending.as_str(), "question"),
            &identity,
            start,
        );
        resolver.migrate(&pending, &canonical);

        assert!(resolver.pending_capture(&pending).is_none());
        let matched = resolver
            .on_assistant_completed(
                completion(canonical.as_str(), "answer"),
                &identity,
                start + Duration::from_secs(3),
            )
            .expect("matched after migration");
        assert_eq!(matched.input_text, "question");
    }
}
