use std::time::Instant;

use serde::{Deserialize, Serialize};
use turnbridge_protocol::{ItemId, ThreadId, TurnId, WorkspaceId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryRecordId(String);

impl MemoryRecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The "input captured" half of a memory write.
#[derive(Debug, Clone, PartialEq)]
pub struct InputCapturedPayload {
    pub workspace_id: WorkspaceId,
    pub thread_id: ThreadId,
    pub turn_id: Option<TurnId>,
    pub input_text: String,
    /// Prior memory record for this thread, when the capture updates an
    /// existing memory instead of creating a fresh one.
    pub memory_id: Option<MemoryRecordId>,
}

/// The "assistant completed" half of a memory write.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantCompletedPayload {
    pub workspace_id: WorkspaceId,
    pub thread_id: ThreadId,
    pub item_id: Option<ItemId>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingMemoryCapture {
    pub workspace_id: WorkspaceId,
    pub thread_id: ThreadId,
    pub turn_id: Option<TurnId>,
    pub input_text: String,
    pub memory_id: Option<MemoryRecordId>,
    pub created_at: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingAssistantCompletion {
    pub workspace_id: WorkspaceId,
    pub thread_id: ThreadId,
    pub item_id: Option<ItemId>,
    pub text: String,
    pub created_at: Instant,
}

/// Both halves of one logical turn, matched and ready to merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedTurn {
    pub workspace_id: WorkspaceId,
    pub thread_id: ThreadId,
    pub turn_id: Option<TurnId>,
    pub input_text: String,
    pub assistant_text: String,
    pub prior_memory_id: Option<MemoryRecordId>,
}
