use serde_json::Value;
use turnbridge_protocol::fields::string_field;
use turnbridge_protocol::{CanonicalEvent, ItemId, ToolCallKind};

use crate::adapter::{parse_thread_item, AdapterContext, EngineAdapter};
use crate::engine::EngineKind;

/// Codex app-server dialect: item lifecycle plus fine-grained
/// `item/<kind>/<operation>` delta notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodexAdapter;

impl EngineAdapter for CodexAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::Codex
    }

    fn map_event(&self, context: &AdapterContext) -> Option<CanonicalEvent> {
        let thread_id = context.thread_id.clone();
        let params = &context.params;

        match context.method.as_str() {
            "item/started" => Some(CanonicalEvent::ItemStarted {
                thread_id,
                item: parse_thread_item(params.get("item")?)?,
            }),
            "item/updated" => Some(CanonicalEvent::ItemUpdated {
                thread_id,
                item: parse_thread_item(params.get("item")?)?,
            }),
            "item/completed" => Some(CanonicalEvent::ItemCompleted {
                thread_id,
                item: parse_thread_item(params.get("item")?)?,
            }),
            "item/agentMessage/delta" => Some(CanonicalEvent::AppendAgentMessageDelta {
                thread_id,
                item_id: delta_item_id(params),
                delta: delta_text(params),
            }),
            "item/agentMessage/completed" => Some(CanonicalEvent::CompleteAgentMessage {
                thread_id,
                item: parse_thread_item(params.get("item").unwrap_or(params))?,
            }),
            "item/reasoning/summaryTextDelta" => {
                Some(CanonicalEvent::AppendReasoningSummaryDelta {
                    thread_id,
                    delta: delta_text(params),
                })
            }
            "item/reasoning/summaryPartAdded" => {
                Some(CanonicalEvent::AppendReasoningSummaryBoundary { thread_id })
            }
            "item/reasoning/textDelta" => Some(CanonicalEvent::AppendReasoningContentDelta {
                thread_id,
                delta: delta_text(params),
            }),
            "item/commandExecution/outputDelta" => Some(CanonicalEvent::AppendToolOutputDelta {
                thread_id,
                item_id: delta_item_id(params),
                tool: ToolCallKind::CommandExecution,
                delta: delta_text(params),
            }),
            "item/fileChange/outputDelta" => Some(CanonicalEvent::AppendToolOutputDelta {
                thread_id,
                item_id: delta_item_id(params),
                tool: ToolCallKind::FileEdit,
                delta: delta_text(params),
            }),
            _ => None,
        }
    }
}

fn delta_text(params: &Value) -> String {
    string_field(params, &["delta", "text"])
        .unwrap_or_default()
        .to_owned()
}

fn delta_item_id(params: &Value) -> Option<ItemId> {
    string_field(params, &["itemId", "item_id"]).map(ItemId::new)
}
