//! Shared turn orchestration protocol: identifiers, the raw notification
//! shape delivered by the transport, the canonical event model produced by
//! engine adapters, and the collaborator traits the core calls out through.

pub mod client;
pub mod error;
pub mod event;
pub mod fields;
pub mod ids;
pub mod notification;
pub mod observer;
pub mod types;

pub use client::{
    EngineClient, SendMessageResponse, ThreadSnapshot, ThreadStartOptions,
};
pub use error::{EngineClientError, EngineClientResult};
pub use event::{
    CanonicalEvent, MessageItem, MessageRole, OtherItem, ThreadItem, ToolCallKind, ToolItem,
};
pub use ids::{ItemId, MessageId, ThreadId, TurnId, WorkspaceId};
pub use notification::{RawNotification, RequestId};
pub use observer::{ApprovalKind, ApprovalRequest, NoopObserver, TurnObserver, UserInputRequest};
pub use types::{
    ImageAttachment, RateLimitSnapshot, RateLimitWindow, SendOptions, TokenUsage,
};
