use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use turnbridge_protocol::{ImageAttachment, MessageId, SendOptions, ThreadId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub id: MessageId,
    pub text: String,
    pub images: Vec<ImageAttachment>,
    pub created_at: Instant,
    pub options: SendOptions,
}

#[derive(Debug, Clone)]
struct InFlight {
    message: QueuedMessage,
    dispatched_at: Instant,
}

/// Per-thread FIFO of user messages awaiting send, plus the single
/// in-flight slot per thread. All mutation happens on the event-loop task.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    queues: HashMap<ThreadId, VecDeque<QueuedMessage>>,
    in_flight: HashMap<ThreadId, InFlight>,
    next_message_id: u64,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint_message(
        &mut self,
        text: impl Into<String>,
        images: Vec<ImageAttachment>,
        options: SendOptions,
        now: Instant,
    ) -> QueuedMessage {
        self.next_message_id += 1;
        QueuedMessage {
            id: MessageId::new(format!("msg-{}", self.next_message_id)),
            text: text.into(),
            images,
            created_at: now,
            options,
        }
    }

    pub fn enqueue(&mut self, thread_id: &ThreadId, message: QueuedMessage) {
        self.queues
            .entry(thread_id.clone())
            .or_default()
            .push_back(message);
    }

    pub fn queued_len(&self, thread_id: &ThreadId) -> usize {
        self.queues.get(thread_id).map_or(0, VecDeque::len)
    }

    pub fn has_in_flight(&self, thread_id: &ThreadId) -> bool {
        self.in_flight.contains_key(thread_id)
    }

    /// Claim the in-flight slot for a message sent outside the queue
    /// (steer bypass or an idle-thread immediate send). Returns false when
    /// a send is already outstanding for the thread.
    pub fn begin_direct_send(
        &mut self,
        thread_id: &ThreadId,
        message: QueuedMessage,
        now: Instant,
    ) -> bool {
        if self.in_flight.contains_key(thread_id) {
            return false;
        }
        self.in_flight.insert(
            thread_id.clone(),
            InFlight {
                message,
                dispatched_at: now,
            },
        );
        true
    }

    /// Drain step, run on every `(thread, is_processing, is_reviewing)`
    /// change. Dequeues the head into the in-flight slot when the thread is
    /// idle, has no outstanding send, and is the active thread. The
    /// returned message is the one to dispatch.
    pub fn reconcile(
        &mut self,
        thread_id: &ThreadId,
        is_processing: bool,
        is_reviewing: bool,
        active_thread: Option<&ThreadId>,
        now: Instant,
    ) -> Option<QueuedMessage> {
        if is_processing || is_reviewing {
            return None;
        }
        if active_thread != Some(thread_id) {
            // Inactive threads keep their backlog; switching back resumes
            // draining without cancelling anything.
            return None;
        }
        if self.in_flight.contains_key(thread_id) {
            return None;
        }
        let queue = self.queues.get_mut(thread_id)?;
        let message = queue.pop_front()?;
        self.in_flight.insert(
            thread_id.clone(),
            InFlight {
                message: message.clone(),
                dispatched_at: now,
            },
        );
        Some(message)
    }

    /// Clear the in-flight slot once the engine acknowledged the send by
    /// starting to process the turn.
    pub fn complete_in_flight(&mut self, thread_id: &ThreadId) -> Option<QueuedMessage> {
        self.in_flight
            .remove(thread_id)
            .map(|in_flight| in_flight.message)
    }

    /// Send failure: the message returns to the *front* of its queue so
    /// retry preserves the original ordering.
    pub fn fail_in_flight(&mut self, thread_id: &ThreadId) -> bool {
        let Some(in_flight) = self.in_flight.remove(thread_id) else {
            return false;
        };
        self.queues
            .entry(thread_id.clone())
            .or_default()
            .push_front(in_flight.message);
        true
    }

    /// Stall-watchdog expiry: the engine never acknowledged the send with
    /// a processing start, so force-clear the slot and requeue at the
    /// front for the next reconciliation to retry.
    pub fn expire_stalled(&mut self, thread_id: &ThreadId) -> bool {
        let Some(in_flight) = self.in_flight.get(thread_id) else {
            return false;
        };
        tracing::debug!(
            thread_id = thread_id.as_str(),
            message_id = in_flight.message.id.as_str(),
            "in-flight send stalled without a processing start; requeueing"
        );
        self.fail_in_flight(thread_id)
    }

    pub fn in_flight_age(&self, thread_id: &ThreadId, now: Instant) -> Option<std::time::Duration> {
        self.in_flight
            .get(thread_id)
            .map(|in_flight| now.duration_since(in_flight.dispatched_at))
    }

    /// Move queued and in-flight state under a renamed thread id. Existing
    /// entries under the new id keep their position ahead of migrated ones.
    pub fn migrate(&mut self, old_id: &ThreadId, new_id: &ThreadId) {
        if old_id == new_id {
            return;
        }
        if let Some(moved) = self.queues.remove(old_id) {
            self.queues.entry(new_id.clone()).or_default().extend(moved);
        }
        if let Some(in_flight) = self.in_flight.remove(old_id) {
            self.in_flight.entry(new_id.clone()).or_insert(in_flight);
        }
    }
}
