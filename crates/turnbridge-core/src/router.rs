use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::debug;
use turnbridge_adapters::{AdapterContext, AdapterRegistry};
use turnbridge_protocol::fields::{string_field, thread_id_field, turn_id_field, value_field};
use turnbridge_protocol::{
    ApprovalKind, ApprovalRequest, CanonicalEvent, ItemId, RateLimitSnapshot, RawNotification,
    ThreadId, ThreadItem, TokenUsage, ToolCallKind, TurnId, TurnObserver, UserInputRequest,
};

use crate::status::{StatusChange, ThreadStatusStore};

const ENV_CANONICAL_ADAPTERS: &str = "TURNBRIDGE_CANONICAL_ADAPTERS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Attempt canonical adapter mapping before the legacy method table.
    pub canonical_adapters: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        let canonical_adapters = std::env::var(ENV_CANONICAL_ADAPTERS)
            .map(|value| {
                let value = value.trim();
                value != "0" && !value.eq_ignore_ascii_case("false")
            })
            .unwrap_or(true);
        Self { canonical_adapters }
    }
}

/// Side effects the coordinator applies after a notification is routed.
/// Observer callbacks fire inside `handle`; everything that touches state
/// the router does not own comes out as an effect.
#[derive(Debug, Clone, PartialEq)]
pub enum RouterEffect {
    StatusChanged(StatusChange),
    ThreadRenamed {
        old_id: ThreadId,
        new_id: ThreadId,
    },
    /// The assistant's final output for the current turn, feeding the
    /// memory write-back race.
    AssistantCompleted {
        thread_id: ThreadId,
        item_id: Option<ItemId>,
        text: String,
    },
    TurnFailed {
        thread_id: ThreadId,
        message: String,
    },
    /// The thread showed item-level activity, which counts as history for
    /// pending-thread attribution.
    ItemActivity {
        thread_id: ThreadId,
    },
    /// A session-scoped token report without a thread id; the coordinator
    /// attributes it to a pending thread or drops it.
    UnattributedTokenUsage {
        engine: Option<String>,
        usage: TokenUsage,
    },
}

/// Classifies raw notifications by method name and dispatches canonical
/// effects to the status store and the registered observer. Owns the
/// per-thread duplicate-suppression flags and the interrupted set.
pub struct EventRouter {
    config: RouterConfig,
    adapters: AdapterRegistry,
    observer: Arc<dyn TurnObserver>,
    delta_seen: HashMap<ThreadId, bool>,
    completed_seen: HashMap<ThreadId, bool>,
    interrupted: HashSet<ThreadId>,
}

impl EventRouter {
    pub fn new(config: RouterConfig, observer: Arc<dyn TurnObserver>) -> Self {
        Self {
            config,
            adapters: AdapterRegistry::new(),
            observer,
            delta_seen: HashMap::new(),
            completed_seen: HashMap::new(),
            interrupted: HashSet::new(),
        }
    }

    /// Mark a thread's current turn as interrupted so deltas still in
    /// flight from the backend are dropped instead of re-opening
    /// processing state. Cleared when the next turn starts.
    pub fn mark_interrupted(&mut self, thread_id: &ThreadId) {
        self.interrupted.insert(thread_id.clone());
    }

    pub fn handle(
        &mut self,
        raw: &RawNotification,
        status: &mut ThreadStatusStore,
        now: Instant,
    ) -> Vec<RouterEffect> {
        let mut effects = Vec::new();
        let method = raw.method.as_str();
        let params = &raw.params;

        // Diagnostics hook first, before any classification.
        self.observer.on_raw_notification(method, params);

        if is_connection_established(method) {
            self.observer.on_connected();
            return effects;
        }

        if let Some(request_id) = raw.id.as_ref() {
            if let Some(kind) = approval_kind(method) {
                self.observer.on_approval_requested(&ApprovalRequest {
                    request_id: request_id.clone(),
                    thread_id: thread_id_field(params).map(ThreadId::new),
                    kind,
                    params: params.clone(),
                });
                return effects;
            }
            if is_user_input_request(method) {
                self.observer.on_user_input_requested(&UserInputRequest {
                    request_id: request_id.clone(),
                    thread_id: thread_id_field(params).map(ThreadId::new),
                    params: params.clone(),
                });
                return effects;
            }
        }

        if self.config.canonical_adapters {
            if let Some(thread_id) = thread_id_field(params).map(ThreadId::new) {
                let context = AdapterContext::new(thread_id.clone(), method, params.clone());
                let mapped = self.adapters.select_adapter(&thread_id).map_event(&context);
                if let Some(event) = mapped {
                    if self.route_canonical_event(event, &mut effects) {
                        return effects;
                    }
                }
            }
        }

        self.handle_legacy(method, params, status, now, &mut effects);
        effects
    }

    /// Canonical routing. Returns false when the event should fall through
    /// to legacy parsing; adapters are advisory, not authoritative.
    fn route_canonical_event(
        &mut self,
        event: CanonicalEvent,
        effects: &mut Vec<RouterEffect>,
    ) -> bool {
        match event {
            CanonicalEvent::ItemStarted { thread_id, item } => {
                self.observer.on_item_started(&thread_id, item.raw());
                effects.push(RouterEffect::ItemActivity { thread_id });
                true
            }
            CanonicalEvent::ItemUpdated { thread_id, item } => {
                self.observer.on_item_updated(&thread_id, item.raw());
                effects.push(RouterEffect::ItemActivity { thread_id });
                true
            }
            CanonicalEvent::ItemCompleted { thread_id, item } => {
                self.emit_item_completed(&thread_id, &item);
                effects.push(RouterEffect::ItemActivity { thread_id });
                true
            }
            CanonicalEvent::AppendAgentMessageDelta {
                thread_id,
                item_id,
                delta,
            } => {
                if delta.is_empty() {
                    return false;
                }
                if self.interrupted.contains(&thread_id) {
                    debug!(
                        thread_id = thread_id.as_str(),
                        "dropping agent message delta for an interrupted turn"
                    );
                    return true;
                }
                self.delta_seen.insert(thread_id.clone(), true);
                self.observer
                    .on_agent_message_delta(&thread_id, item_id.as_ref(), delta.as_str());
                effects.push(RouterEffect::ItemActivity { thread_id });
                true
            }
            CanonicalEvent::CompleteAgentMessage { thread_id, item } => {
                self.emit_item_completed(&thread_id, &item);
                let already_completed = self
                    .completed_seen
                    .get(&thread_id)
                    .copied()
                    .unwrap_or(false);
                if already_completed {
                    debug!(
                        thread_id = thread_id.as_str(),
                        "suppressing duplicate agent message completion"
                    );
                } else if let Some(text) = item.assistant_text().filter(|text| !text.is_empty()) {
                    self.completed_seen.insert(thread_id.clone(), true);
                    self.observer.on_agent_message_completed(&thread_id, text);
                    effects.push(RouterEffect::AssistantCompleted {
                        thread_id: thread_id.clone(),
                        item_id: Some(item.id().clone()),
                        text: text.to_owned(),
                    });
                }
                effects.push(RouterEffect::ItemActivity { thread_id });
                true
            }
            CanonicalEvent::AppendReasoningSummaryDelta { thread_id, delta }
            | CanonicalEvent::AppendReasoningContentDelta { thread_id, delta } => {
                self.observer.on_reasoning_delta(&thread_id, delta.as_str());
                true
            }
            CanonicalEvent::AppendReasoningSummaryBoundary { thread_id } => {
                self.observer.on_reasoning_boundary(&thread_id);
                true
            }
            CanonicalEvent::AppendToolOutputDelta {
                thread_id,
                item_id,
                tool,
                delta,
            } => {
                if tool == ToolCallKind::FileEdit {
                    self.observer.on_file_change_output_delta(
                        &thread_id,
                        item_id.as_ref(),
                        delta.as_str(),
                    );
                } else {
                    self.observer
                        .on_tool_output_delta(&thread_id, item_id.as_ref(), delta.as_str());
                }
                true
            }
        }
    }

    fn handle_legacy(
        &mut self,
        method: &str,
        params: &Value,
        status: &mut ThreadStatusStore,
        now: Instant,
        effects: &mut Vec<RouterEffect>,
    ) {
        match method {
            "thread/started" | "threadStarted" | "thread_started" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                status.touch(&thread_id);
                self.observer.on_thread_started(&thread_id, params);
            }
            "thread/sessionIdUpdated" | "threadSessionIdUpdated" | "thread_session_id_updated" => {
                let old_id = string_field(params, &["oldThreadId", "old_thread_id"])
                    .or_else(|| thread_id_field(params))
                    .map(ThreadId::new);
                let new_id = string_field(
                    params,
                    &["newThreadId", "new_thread_id", "sessionId", "session_id"],
                )
                .map(ThreadId::new);
                let (Some(old_id), Some(new_id)) = (old_id, new_id) else {
                    debug!(method, "session id update missing old or new thread id");
                    return;
                };
                self.observer.on_thread_session_id_updated(&old_id, &new_id);
                effects.push(RouterEffect::ThreadRenamed { old_id, new_id });
            }
            "turn/started" | "turnStarted" | "turn_started" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                self.delta_seen.remove(&thread_id);
                self.completed_seen.remove(&thread_id);
                self.interrupted.remove(&thread_id);
                let turn_id = turn_id_field(params).map(TurnId::new);
                status.set_active_turn_id(&thread_id, turn_id.clone());
                if let Some(change) = status.mark_processing(&thread_id, true, now) {
                    effects.push(RouterEffect::StatusChanged(change));
                }
                self.observer.on_turn_started(&thread_id, turn_id.as_ref());
            }
            "turn/completed" | "turnCompleted" | "turn_completed" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                let turn_id = turn_id_field(params).map(TurnId::new);
                self.observer
                    .on_turn_completed(&thread_id, turn_id.as_ref(), params);

                // Some engines embed the assembled final text in the
                // turn-level payload. Synthesize a message completion from
                // it only when no delta and no completion were streamed,
                // otherwise the message would render twice.
                let delta_seen = self.delta_seen.get(&thread_id).copied().unwrap_or(false);
                let completed_seen = self
                    .completed_seen
                    .get(&thread_id)
                    .copied()
                    .unwrap_or(false);
                if !delta_seen && !completed_seen {
                    if let Some(text) = final_turn_text(params) {
                        self.completed_seen.insert(thread_id.clone(), true);
                        self.observer.on_agent_message_completed(&thread_id, text);
                        effects.push(RouterEffect::AssistantCompleted {
                            thread_id: thread_id.clone(),
                            item_id: None,
                            text: text.to_owned(),
                        });
                    }
                }

                status.set_active_turn_id(&thread_id, None);
                if let Some(change) = status.mark_processing(&thread_id, false, now) {
                    effects.push(RouterEffect::StatusChanged(change));
                }
            }
            "turn/error" | "turnError" | "turn_error" | "turn/failed" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                let message = error_message(params).unwrap_or("turn failed");
                self.observer.on_turn_error(&thread_id, message);
                status.set_active_turn_id(&thread_id, None);
                if let Some(change) = status.mark_processing(&thread_id, false, now) {
                    effects.push(RouterEffect::StatusChanged(change));
                }
                effects.push(RouterEffect::TurnFailed {
                    thread_id,
                    message: message.to_owned(),
                });
            }
            "item/started" | "itemStarted" | "item_started" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                let item = value_field(params, &["item"]).unwrap_or(params);
                self.observer.on_item_started(&thread_id, item);
                effects.push(RouterEffect::ItemActivity { thread_id });
            }
            "item/updated" | "itemUpdated" | "item_updated" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                let item = value_field(params, &["item"]).unwrap_or(params);
                self.observer.on_item_updated(&thread_id, item);
                effects.push(RouterEffect::ItemActivity { thread_id });
            }
            "item/completed" | "itemCompleted" | "item_completed" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                let item = value_field(params, &["item"]).unwrap_or(params);
                self.observer.on_item_completed(&thread_id, item);
                if let Some(usage) = TokenUsage::from_item_value(item) {
                    self.observer.on_token_usage_updated(&thread_id, &usage);
                }
                self.maybe_complete_from_item(&thread_id, item, effects);
                effects.push(RouterEffect::ItemActivity { thread_id });
            }
            "agentMessage/delta" | "agent_message_delta" | "message/delta" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                if self.interrupted.contains(&thread_id) {
                    debug!(
                        thread_id = thread_id.as_str(),
                        "dropping agent message delta for an interrupted turn"
                    );
                    return;
                }
                let Some(delta) = string_field(params, &["delta", "text"]) else {
                    debug!(method, "agent message delta without text");
                    return;
                };
                let item_id = string_field(params, &["itemId", "item_id"]).map(ItemId::new);
                self.delta_seen.insert(thread_id.clone(), true);
                self.observer
                    .on_agent_message_delta(&thread_id, item_id.as_ref(), delta);
                effects.push(RouterEffect::ItemActivity { thread_id });
            }
            "agentMessage/completed" | "agent_message_completed" | "message/completed" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                let already_completed = self
                    .completed_seen
                    .get(&thread_id)
                    .copied()
                    .unwrap_or(false);
                if already_completed {
                    debug!(
                        thread_id = thread_id.as_str(),
                        "suppressing duplicate agent message completion"
                    );
                    return;
                }
                let Some(text) = string_field(params, &["text", "finalText", "final_text"]) else {
                    debug!(method, "agent message completion without text");
                    return;
                };
                self.completed_seen.insert(thread_id.clone(), true);
                self.observer.on_agent_message_completed(&thread_id, text);
                let item_id = string_field(params, &["itemId", "item_id"]).map(ItemId::new);
                effects.push(RouterEffect::AssistantCompleted {
                    thread_id: thread_id.clone(),
                    item_id,
                    text: text.to_owned(),
                });
                effects.push(RouterEffect::ItemActivity { thread_id });
            }
            "reasoning/delta" | "reasoning_delta" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                if let Some(delta) = string_field(params, &["delta", "text"]) {
                    self.observer.on_reasoning_delta(&thread_id, delta);
                }
            }
            "reasoning/boundary" | "reasoning_boundary" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                self.observer.on_reasoning_boundary(&thread_id);
            }
            "toolOutput/delta" | "tool_output_delta" | "commandOutput/delta" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                let Some(delta) = string_field(params, &["delta", "output", "text"]) else {
                    return;
                };
                let item_id = string_field(params, &["itemId", "item_id"]).map(ItemId::new);
                self.observer
                    .on_tool_output_delta(&thread_id, item_id.as_ref(), delta);
            }
            "terminal/stdinEcho" | "terminal_stdin_echo" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                if let Some(text) = string_field(params, &["text", "data"]) {
                    self.observer.on_terminal_stdin_echo(&thread_id, text);
                }
            }
            "plan/updated" | "planUpdated" | "plan_updated" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                let plan = value_field(params, &["plan", "entries"]).unwrap_or(params);
                self.observer.on_plan_updated(&thread_id, plan);
            }
            "diff/updated" | "diffUpdated" | "diff_updated" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                let diff = value_field(params, &["diff", "changes"]).unwrap_or(params);
                self.observer.on_diff_updated(&thread_id, diff);
            }
            "tokenUsage/updated" | "token_usage_updated" | "tokenCount/updated" => {
                let usage = value_field(params, &["usage", "tokenUsage", "token_usage"])
                    .and_then(TokenUsage::from_usage_value)
                    .or_else(|| TokenUsage::from_usage_value(params));
                let Some(usage) = usage else {
                    debug!(method, "token usage update without positive counts");
                    return;
                };
                match thread_id_field(params).map(ThreadId::new) {
                    Some(thread_id) => {
                        self.observer.on_token_usage_updated(&thread_id, &usage);
                    }
                    None => {
                        effects.push(RouterEffect::UnattributedTokenUsage {
                            engine: string_field(params, &["engine", "engineId", "engine_id"])
                                .map(ToOwned::to_owned),
                            usage,
                        });
                    }
                }
            }
            "rateLimits/updated" | "rate_limits_updated" => {
                if let Some(limits) = RateLimitSnapshot::from_params(params) {
                    self.observer.on_rate_limits_updated(&limits);
                } else {
                    debug!(method, "rate limit update without windows");
                }
            }
            "heartbeat" | "ping" => {
                let thread_id = thread_id_field(params).map(ThreadId::new);
                self.observer.on_heartbeat(thread_id.as_ref());
            }
            "context/compacted" | "contextCompacted" | "context_compacted" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                self.observer.on_context_compacted(&thread_id);
            }
            "thread/backgroundAction" | "backgroundThreadAction" | "background_thread_action" => {
                let Some(thread_id) = required_thread_id(method, params) else {
                    return;
                };
                self.observer.on_background_thread_action(&thread_id, params);
            }
            other => {
                debug!(method = other, "unhandled notification method");
            }
        }
    }

    fn emit_item_completed(&self, thread_id: &ThreadId, item: &ThreadItem) {
        self.observer.on_item_completed(thread_id, item.raw());
        if let Some(usage) = TokenUsage::from_item_value(item.raw()) {
            self.observer.on_token_usage_updated(thread_id, &usage);
        }
    }

    fn maybe_complete_from_item(
        &mut self,
        thread_id: &ThreadId,
        item: &Value,
        effects: &mut Vec<RouterEffect>,
    ) {
        let item_type = string_field(item, &["type", "itemType", "item_type"]).unwrap_or("");
        if !matches!(item_type, "agentMessage" | "agent_message") {
            return;
        }
        let already_completed = self
            .completed_seen
            .get(thread_id)
            .copied()
            .unwrap_or(false);
        if already_completed {
            return;
        }
        let Some(text) = string_field(item, &["text", "content"]) else {
            return;
        };
        self.completed_seen.insert(thread_id.clone(), true);
        self.observer.on_agent_message_completed(thread_id, text);
        effects.push(RouterEffect::AssistantCompleted {
            thread_id: thread_id.clone(),
            item_id: string_field(item, &["id", "itemId", "item_id"]).map(ItemId::new),
            text: text.to_owned(),
        });
    }
}

fn is_connection_established(method: &str) -> bool {
    matches!(method, "connected" | "session/connected" | "initialized")
}

fn approval_kind(method: &str) -> Option<ApprovalKind> {
    if method.contains("fileChange/requestApproval")
        || method.contains("applyPatchApproval")
        || method.contains("file_change_request_approval")
    {
        return Some(ApprovalKind::FileChange);
    }
    if method.contains("requestApproval")
        || method.contains("request_approval")
        || method.contains("execCommandApproval")
    {
        return Some(ApprovalKind::CommandExecution);
    }
    None
}

fn is_user_input_request(method: &str) -> bool {
    method.contains("requestUserInput") || method.contains("request_user_input")
}

fn required_thread_id(method: &str, params: &Value) -> Option<ThreadId> {
    match thread_id_field(params) {
        Some(thread_id) => Some(ThreadId::new(thread_id)),
        None => {
            debug!(method, "notification missing thread id; dropping");
            None
        }
    }
}

fn final_turn_text(params: &Value) -> Option<&str> {
    if let Some(text) = string_field(params, &["finalText", "final_text"]) {
        return Some(text);
    }
    let turn = value_field(params, &["turn"])?;
    string_field(turn, &["finalText", "final_text", "text", "message"])
}

fn error_message(params: &Value) -> Option<&str> {
    if let Some(message) = string_field(params, &["message", "error"]) {
        return Some(message);
    }
    let error = value_field(params, &["error"])?;
    string_field(error, &["message"])
}
