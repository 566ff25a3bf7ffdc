use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ItemId, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageItem {
    pub id: ItemId,
    pub role: MessageRole,
    pub text: String,
    /// Original engine payload, preserved for downstream consumers that
    /// need fields the canonical model does not carry.
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolCallKind {
    FileEdit,
    CommandExecution,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolItem {
    pub id: ItemId,
    pub kind: ToolCallKind,
    pub name: String,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherItem {
    pub id: ItemId,
    pub item_type: String,
    pub raw: Value,
}

/// The typed item union carried by canonical item events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ThreadItem {
    Message(MessageItem),
    Tool(ToolItem),
    Other(OtherItem),
}

impl ThreadItem {
    pub fn id(&self) -> &ItemId {
        match self {
            Self::Message(item) => &item.id,
            Self::Tool(item) => &item.id,
            Self::Other(item) => &item.id,
        }
    }

    pub fn raw(&self) -> &Value {
        match self {
            Self::Message(item) => &item.raw,
            Self::Tool(item) => &item.raw,
            Self::Other(item) => &item.raw,
        }
    }

    /// Final assistant text, when this item is an assistant message.
    pub fn assistant_text(&self) -> Option<&str> {
        match self {
            Self::Message(item) if item.role == MessageRole::Assistant => Some(item.text.as_str()),
            _ => None,
        }
    }
}

/// One engine notification translated into the canonical model. Adapters
/// return `None` for notifications without item/message semantics; the
/// router then falls back to its legacy per-method branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CanonicalEvent {
    ItemStarted {
        thread_id: ThreadId,
        item: ThreadItem,
    },
    ItemUpdated {
        thread_id: ThreadId,
        item: ThreadItem,
    },
    ItemCompleted {
        thread_id: ThreadId,
        item: ThreadItem,
    },
    AppendAgentMessageDelta {
        thread_id: ThreadId,
        item_id: Option<ItemId>,
        delta: String,
    },
    CompleteAgentMessage {
        thread_id: ThreadId,
        item: ThreadItem,
    },
    AppendReasoningSummaryDelta {
        thread_id: ThreadId,
        delta: String,
    },
    AppendReasoningSummaryBoundary {
        thread_id: ThreadId,
    },
    AppendReasoningContentDelta {
        thread_id: ThreadId,
        delta: String,
    },
    AppendToolOutputDelta {
        thread_id: ThreadId,
        item_id: Option<ItemId>,
        tool: ToolCallKind,
        delta: String,
    },
}

impl CanonicalEvent {
    pub fn thread_id(&self) -> &ThreadId {
        match self {
            Self::ItemStarted { thread_id, .. }
            | Self::ItemUpdated { thread_id, .. }
            | Self::ItemCompleted { thread_id, .. }
            | Self::AppendAgentMessageDelta { thread_id, .. }
            | Self::CompleteAgentMessage { thread_id, .. }
            | Self::AppendReasoningSummaryDelta { thread_id, .. }
            | Self::AppendReasoningSummaryBoundary { thread_id }
            | Self::AppendReasoningContentDelta { thread_id, .. }
            | Self::AppendToolOutputDelta { thread_id, .. } => thread_id,
        }
    }
}
