use serde_json::Value;
use turnbridge_protocol::fields::{string_field, value_field};
use turnbridge_protocol::{CanonicalEvent, ItemId};

use crate::adapter::{parse_thread_item, tool_kind_from_name, AdapterContext, EngineAdapter};
use crate::engine::EngineKind;

/// Gemini dialect: a single `session/update` envelope discriminated by
/// `params.update.kind`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeminiAdapter;

impl EngineAdapter for GeminiAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::Gemini
    }

    fn map_event(&self, context: &AdapterContext) -> Option<CanonicalEvent> {
        if context.method != "session/update" {
            return None;
        }
        let update = value_field(&context.params, &["update"])?;
        let kind = string_field(update, &["kind", "sessionUpdate", "session_update"])?;
        let thread_id = context.thread_id.clone();

        match kind {
            "agent_message_chunk" => Some(CanonicalEvent::AppendAgentMessageDelta {
                thread_id,
                item_id: string_field(update, &["itemId", "item_id"]).map(ItemId::new),
                delta: chunk_text(update),
            }),
            "agent_message_completed" => Some(CanonicalEvent::CompleteAgentMessage {
                thread_id,
                item: parse_thread_item(value_field(update, &["item"]).unwrap_or(update))?,
            }),
            "agent_thought_chunk" => Some(CanonicalEvent::AppendReasoningContentDelta {
                thread_id,
                delta: chunk_text(update),
            }),
            "thought_summary_chunk" => Some(CanonicalEvent::AppendReasoningSummaryDelta {
                thread_id,
                delta: chunk_text(update),
            }),
            "thought_summary_boundary" => {
                Some(CanonicalEvent::AppendReasoningSummaryBoundary { thread_id })
            }
            "tool_call_output" => Some(CanonicalEvent::AppendToolOutputDelta {
                thread_id,
                item_id: string_field(update, &["itemId", "item_id", "toolCallId", "tool_call_id"])
                    .map(ItemId::new),
                tool: tool_kind_from_name(
                    string_field(update, &["toolKind", "tool_kind", "tool"]).unwrap_or(""),
                ),
                delta: chunk_text(update),
            }),
            "item_started" => Some(CanonicalEvent::ItemStarted {
                thread_id,
                item: parse_thread_item(value_field(update, &["item"])?)?,
            }),
            "item_updated" => Some(CanonicalEvent::ItemUpdated {
                thread_id,
                item: parse_thread_item(value_field(update, &["item"])?)?,
            }),
            "item_completed" => Some(CanonicalEvent::ItemCompleted {
                thread_id,
                item: parse_thread_item(value_field(update, &["item"])?)?,
            }),
            _ => None,
        }
    }
}

fn chunk_text(update: &Value) -> String {
    if let Some(text) = string_field(update, &["text", "delta", "output"]) {
        return text.to_owned();
    }
    value_field(update, &["content"])
        .and_then(|content| string_field(content, &["text"]))
        .unwrap_or_default()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use turnbridge_protocol::{CanonicalEvent, ThreadId};

    use super::GeminiAdapter;
    use crate::adapter::{AdapterContext, EngineAdapter};

    fn context(params: serde_json::Value) -> AdapterContext {
        AdapterContext::new(ThreadId::new("gem_1"), "session/update", params)
    }

    #[test]
    fn agent_message_chunks_map_to_deltas() {
        let event = GeminiAdapter
            .map_event(&context(json!({
                "update": {
                    "kind": "agent_message_chunk",
                    "content": { "text": "partial" }
                }
            })))
            .expect("mapped event");
        assert!(matches!(
            event,
            CanonicalEvent::AppendAgentMessageDelta { delta, .. } if delta == "partial"
        ));
    }

    #[test]
    fn thought_chunks_map_to_reasoning_content() {
        let event = GeminiAdapter
            .map_event(&context(json!({
                "update": { "kind": "agent_thought_chunk", "text": "hmm" }
            })))
            .expect("mapped event");
        assert!(matches!(
            event,
            CanonicalEvent::AppendReasoningContentDelta { .. }
        ));
    }

    #[test]
    fn unknown_update_kinds_fall_through() {
        assert!(GeminiAdapter
            .map_event(&context(json!({ "update": { "kind": "plan_delta" } })))
            .is_none());
        assert!(GeminiAdapter
            .map_event(&AdapterContext::new(
                ThreadId::new("gem_1"),
                "turn/started",
                json!({})
            ))
            .is_none());
    }
}
