use serde_json::Value;
use turnbridge_protocol::fields::string_field;
use turnbridge_protocol::{
    CanonicalEvent, ItemId, MessageItem, MessageRole, OtherItem, ThreadId, ThreadItem,
    ToolCallKind, ToolItem,
};

use crate::engine::EngineKind;

/// One notification, pre-resolved to the thread it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterContext {
    pub thread_id: ThreadId,
    pub method: String,
    pub params: Value,
}

impl AdapterContext {
    pub fn new(thread_id: ThreadId, method: impl Into<String>, params: Value) -> Self {
        Self {
            thread_id,
            method: method.into(),
            params,
        }
    }
}

pub trait EngineAdapter: Send + Sync {
    fn engine(&self) -> EngineKind;

    /// Map one raw notification into the canonical model. `None` means the
    /// notification has no item/message semantics for this dialect.
    fn map_event(&self, context: &AdapterContext) -> Option<CanonicalEvent>;
}

/// Parse an engine item payload into the typed item union. Items without a
/// recognizable id are not mappable; callers fall through to legacy parsing.
pub(crate) fn parse_thread_item(value: &Value) -> Option<ThreadItem> {
    let id = ItemId::new(string_field(value, &["id", "itemId", "item_id"])?);
    let item_type = string_field(value, &["type", "itemType", "item_type"]).unwrap_or("");

    let item = match item_type {
        "agentMessage" | "agent_message" | "assistantMessage" | "assistant_message" => {
            ThreadItem::Message(MessageItem {
                id,
                role: MessageRole::Assistant,
                text: item_text(value).unwrap_or_default(),
                raw: value.clone(),
            })
        }
        "userMessage" | "user_message" => ThreadItem::Message(MessageItem {
            id,
            role: MessageRole::User,
            text: item_text(value).unwrap_or_default(),
            raw: value.clone(),
        }),
        "message" => ThreadItem::Message(MessageItem {
            id,
            role: message_role(value),
            text: item_text(value).unwrap_or_default(),
            raw: value.clone(),
        }),
        "commandExecution" | "command_execution" => ThreadItem::Tool(ToolItem {
            id,
            kind: ToolCallKind::CommandExecution,
            name: tool_name(value),
            raw: value.clone(),
        }),
        "fileChange" | "file_change" | "patch" => ThreadItem::Tool(ToolItem {
            id,
            kind: ToolCallKind::FileEdit,
            name: tool_name(value),
            raw: value.clone(),
        }),
        "tool" | "toolCall" | "tool_call" => {
            let name = tool_name(value);
            ThreadItem::Tool(ToolItem {
                id,
                kind: tool_kind_from_name(name.as_str()),
                name,
                raw: value.clone(),
            })
        }
        other => ThreadItem::Other(OtherItem {
            id,
            item_type: other.to_owned(),
            raw: value.clone(),
        }),
    };
    Some(item)
}

pub(crate) fn item_text(value: &Value) -> Option<String> {
    if let Some(text) = string_field(value, &["text", "content"]) {
        return Some(text.to_owned());
    }
    // Content-block form: [{ "type": "text", "text": "…" }, …]
    let blocks = value.get("content").and_then(Value::as_array)?;
    let joined = blocks
        .iter()
        .filter_map(|block| string_field(block, &["text"]))
        .collect::<Vec<_>>()
        .join("");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

pub(crate) fn tool_kind_from_name(name: &str) -> ToolCallKind {
    match name {
        "edit" | "write" | "applyPatch" | "apply_patch" | "fileChange" | "file_change" => {
            ToolCallKind::FileEdit
        }
        "bash" | "shell" | "exec" | "command" => ToolCallKind::CommandExecution,
        other => ToolCallKind::Other(other.to_owned()),
    }
}

fn tool_name(value: &Value) -> String {
    string_field(value, &["name", "tool", "toolName", "tool_name", "command"])
        .unwrap_or("tool")
        .to_owned()
}

fn message_role(value: &Value) -> MessageRole {
    match string_field(value, &["role"]) {
        Some("user") => MessageRole::User,
        Some("system") => MessageRole::System,
        _ => MessageRole::Assistant,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use turnbridge_protocol::{MessageRole, ThreadItem, ToolCallKind};

    use super::parse_thread_item;

    #[test]
    fn agent_message_items_parse_with_assistant_role() {
        let item = parse_thread_item(&json!({
            "id": "item-1",
            "type": "agentMessage",
            "text": "done"
        }))
        .expect("item");
        match item {
            ThreadItem::Message(message) => {
                assert_eq!(message.role, MessageRole::Assistant);
                assert_eq!(message.text, "done");
            }
            other => panic!("expected message item, got {other:?}"),
        }
    }

    #[test]
    fn content_block_text_is_joined() {
        let item = parse_thread_item(&json!({
            "item_id": "item-2",
            "item_type": "message",
            "role": "user",
            "content": [
                { "type": "text", "text": "hello " },
                { "type": "text", "text": "world" }
            ]
        }))
        .expect("item");
        match item {
            ThreadItem::Message(message) => {
                assert_eq!(message.role, MessageRole::User);
                assert_eq!(message.text, "hello world");
            }
            other => panic!("expected message item, got {other:?}"),
        }
    }

    #[test]
    fn tool_items_classify_file_edits_by_name() {
        let item = parse_thread_item(&json!({
            "id": "item-3",
            "type": "tool",
            "name": "edit"
        }))
        .expect("item");
        match item {
            ThreadItem::Tool(tool) => assert_eq!(tool.kind, ToolCallKind::FileEdit),
            other => panic!("expected tool item, got {other:?}"),
        }
    }

    #[test]
    fn items_without_an_id_are_not_mappable() {
        assert!(parse_thread_item(&json!({ "type": "agentMessage" })).is_none());
    }
}
