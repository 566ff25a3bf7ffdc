use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineClientResult;
use crate::ids::{ThreadId, TurnId, WorkspaceId};
use crate::types::{ImageAttachment, SendOptions};

/// Outcome of a message send. A turn may be accepted, or the engine may
/// report an rpc-level error inside an otherwise successful response; the
/// transport-level failure case is the `Err` arm of the surrounding result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendMessageResponse {
    Started { turn_id: TurnId },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ThreadStartOptions {
    pub model: Option<String>,
    pub instruction_prelude: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub thread_id: ThreadId,
    pub items: Vec<Value>,
}

/// Abstract engine client collaborator. The orchestration core never
/// performs network I/O itself; every outbound call goes through this
/// trait and its completion is observed later as an inbound-style event.
#[async_trait]
pub trait EngineClient: Send + Sync {
    async fn send_message(
        &self,
        workspace_id: &WorkspaceId,
        thread_id: &ThreadId,
        text: &str,
        images: &[ImageAttachment],
        options: &SendOptions,
    ) -> EngineClientResult<SendMessageResponse>;

    async fn interrupt(
        &self,
        workspace_id: &WorkspaceId,
        thread_id: &ThreadId,
        turn_id: &TurnId,
    ) -> EngineClientResult<()>;

    async fn start_thread(
        &self,
        workspace_id: &WorkspaceId,
        options: &ThreadStartOptions,
    ) -> EngineClientResult<ThreadId>;

    async fn resume_thread(
        &self,
        workspace_id: &WorkspaceId,
        thread_id: &ThreadId,
    ) -> EngineClientResult<ThreadSnapshot>;
}
