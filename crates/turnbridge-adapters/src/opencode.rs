use serde_json::Value;
use turnbridge_protocol::fields::{string_field, value_field};
use turnbridge_protocol::{CanonicalEvent, ItemId, MessageItem, MessageRole, ThreadItem};

use crate::adapter::{tool_kind_from_name, AdapterContext, EngineAdapter};
use crate::engine::EngineKind;

/// OpenCode dialect: `message.part.*` notifications discriminated by the
/// embedded part type.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenCodeAdapter;

impl EngineAdapter for OpenCodeAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::OpenCode
    }

    fn map_event(&self, context: &AdapterContext) -> Option<CanonicalEvent> {
        let part = value_field(&context.params, &["part"])?;
        let part_type = string_field(part, &["type", "partType", "part_type"])?;
        let thread_id = context.thread_id.clone();

        match (context.method.as_str(), part_type) {
            ("message.part.updated", "text") => Some(CanonicalEvent::AppendAgentMessageDelta {
                thread_id,
                item_id: part_item_id(part),
                delta: string_field(part, &["delta", "text"])
                    .unwrap_or_default()
                    .to_owned(),
            }),
            ("message.part.completed", "text") => {
                let id = part_item_id(part)?;
                Some(CanonicalEvent::CompleteAgentMessage {
                    thread_id,
                    item: ThreadItem::Message(MessageItem {
                        id,
                        role: MessageRole::Assistant,
                        text: string_field(part, &["text"]).unwrap_or_default().to_owned(),
                        raw: part.clone(),
                    }),
                })
            }
            ("message.part.updated", "reasoning") => {
                Some(CanonicalEvent::AppendReasoningContentDelta {
                    thread_id,
                    delta: string_field(part, &["delta", "text"])
                        .unwrap_or_default()
                        .to_owned(),
                })
            }
            ("message.part.updated", "tool") => Some(CanonicalEvent::AppendToolOutputDelta {
                thread_id,
                item_id: part_item_id(part),
                tool: tool_kind_from_name(string_field(part, &["tool", "name"]).unwrap_or("")),
                delta: string_field(part, &["delta", "output"])
                    .unwrap_or_default()
                    .to_owned(),
            }),
            _ => None,
        }
    }
}

fn part_item_id(part: &Value) -> Option<ItemId> {
    string_field(part, &["id", "messageId", "message_id", "partId", "part_id"]).map(ItemId::new)
}
