use serde_json::Value;

use crate::ids::{ItemId, ThreadId, TurnId};
use crate::notification::RequestId;
use crate::types::{RateLimitSnapshot, TokenUsage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalKind {
    CommandExecution,
    FileChange,
}

/// A synchronous request/response rpc layered over the notification
/// stream, asking the user to approve an engine action.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRequest {
    pub request_id: RequestId,
    pub thread_id: Option<ThreadId>,
    pub kind: ApprovalKind,
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserInputRequest {
    pub request_id: RequestId,
    pub thread_id: Option<ThreadId>,
    pub params: Value,
}

/// Callback surface exposed to the embedding layer, one method per
/// canonical effect. Every method defaults to a no-op so consumers
/// implement only what they render. Implementations are called from the
/// single event-loop task and must not block.
#[allow(unused_variables)]
pub trait TurnObserver: Send + Sync {
    /// Observe-everything diagnostics hook, invoked before any routing.
    fn on_raw_notification(&self, method: &str, params: &Value) {}

    fn on_connected(&self) {}

    fn on_thread_started(&self, thread_id: &ThreadId, params: &Value) {}

    fn on_thread_session_id_updated(&self, old_id: &ThreadId, new_id: &ThreadId) {}

    fn on_approval_requested(&self, request: &ApprovalRequest) {}

    fn on_user_input_requested(&self, request: &UserInputRequest) {}

    fn on_item_started(&self, thread_id: &ThreadId, item: &Value) {}

    fn on_item_updated(&self, thread_id: &ThreadId, item: &Value) {}

    fn on_item_completed(&self, thread_id: &ThreadId, item: &Value) {}

    fn on_agent_message_delta(&self, thread_id: &ThreadId, item_id: Option<&ItemId>, delta: &str) {
    }

    fn on_agent_message_completed(&self, thread_id: &ThreadId, text: &str) {}

    fn on_reasoning_delta(&self, thread_id: &ThreadId, delta: &str) {}

    fn on_reasoning_boundary(&self, thread_id: &ThreadId) {}

    fn on_tool_output_delta(&self, thread_id: &ThreadId, item_id: Option<&ItemId>, delta: &str) {}

    fn on_file_change_output_delta(
        &self,
        thread_id: &ThreadId,
        item_id: Option<&ItemId>,
        delta: &str,
    ) {
    }

    fn on_turn_started(&self, thread_id: &ThreadId, turn_id: Option<&TurnId>) {}

    fn on_turn_completed(&self, thread_id: &ThreadId, turn_id: Option<&TurnId>, params: &Value) {}

    fn on_turn_error(&self, thread_id: &ThreadId, message: &str) {}

    fn on_terminal_stdin_echo(&self, thread_id: &ThreadId, text: &str) {}

    fn on_plan_updated(&self, thread_id: &ThreadId, plan: &Value) {}

    fn on_diff_updated(&self, thread_id: &ThreadId, diff: &Value) {}

    fn on_token_usage_updated(&self, thread_id: &ThreadId, usage: &TokenUsage) {}

    fn on_rate_limits_updated(&self, limits: &RateLimitSnapshot) {}

    fn on_heartbeat(&self, thread_id: Option<&ThreadId>) {}

    fn on_context_compacted(&self, thread_id: &ThreadId) {}

    fn on_background_thread_action(&self, thread_id: &ThreadId, params: &Value) {}
}

/// Substituted when no observer is registered.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TurnObserver for NoopObserver {}
