use turnbridge_protocol::fields::string_field;
use turnbridge_protocol::{CanonicalEvent, ItemId, MessageItem, MessageRole, ThreadItem};

use crate::adapter::{parse_thread_item, tool_kind_from_name, AdapterContext, EngineAdapter};
use crate::engine::EngineKind;

/// Claude Code dialect: assistant-scoped stream notifications plus
/// `thread/item*` lifecycle events.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClaudeCodeAdapter;

impl EngineAdapter for ClaudeCodeAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::ClaudeCode
    }

    fn map_event(&self, context: &AdapterContext) -> Option<CanonicalEvent> {
        let thread_id = context.thread_id.clone();
        let params = &context.params;

        match context.method.as_str() {
            "assistant/messageDelta" => Some(CanonicalEvent::AppendAgentMessageDelta {
                thread_id,
                item_id: string_field(params, &["itemId", "item_id", "messageId", "message_id"])
                    .map(ItemId::new),
                delta: string_field(params, &["delta", "text"])
                    .unwrap_or_default()
                    .to_owned(),
            }),
            "assistant/messageStop" => {
                // The stop notification carries the assembled message, not a
                // nested item payload.
                let id = ItemId::new(string_field(
                    params,
                    &["itemId", "item_id", "messageId", "message_id"],
                )?);
                Some(CanonicalEvent::CompleteAgentMessage {
                    thread_id,
                    item: ThreadItem::Message(MessageItem {
                        id,
                        role: MessageRole::Assistant,
                        text: string_field(params, &["text", "content"])
                            .unwrap_or_default()
                            .to_owned(),
                        raw: params.clone(),
                    }),
                })
            }
            "assistant/thinkingDelta" => Some(CanonicalEvent::AppendReasoningContentDelta {
                thread_id,
                delta: string_field(params, &["delta", "thinking"])
                    .unwrap_or_default()
                    .to_owned(),
            }),
            "assistant/thinkingBoundary" => {
                Some(CanonicalEvent::AppendReasoningSummaryBoundary { thread_id })
            }
            "thread/itemStarted" => Some(CanonicalEvent::ItemStarted {
                thread_id,
                item: parse_thread_item(params.get("item")?)?,
            }),
            "thread/itemUpdated" => Some(CanonicalEvent::ItemUpdated {
                thread_id,
                item: parse_thread_item(params.get("item")?)?,
            }),
            "thread/itemCompleted" => Some(CanonicalEvent::ItemCompleted {
                thread_id,
                item: parse_thread_item(params.get("item")?)?,
            }),
            "tool/outputDelta" => Some(CanonicalEvent::AppendToolOutputDelta {
                thread_id,
                item_id: string_field(params, &["itemId", "item_id"]).map(ItemId::new),
                tool: tool_kind_from_name(
                    string_field(params, &["tool", "toolName", "tool_name"]).unwrap_or(""),
                ),
                delta: string_field(params, &["delta", "output"])
                    .unwrap_or_default()
                    .to_owned(),
            }),
            _ => None,
        }
    }
}
