use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::MemoryRecordId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("memory summarizer error: {0}")]
    Summarizer(String),
    #[error("memory classifier error: {0}")]
    Classifier(String),
    #[error("memory store error: {0}")]
    Store(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDigest {
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Conversation,
    Decision,
    Fact,
    Task,
    Preference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryImportance {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryClassification {
    pub kind: MemoryKind,
    pub importance: MemoryImportance,
}

impl Default for MemoryClassification {
    fn default() -> Self {
        Self {
            kind: MemoryKind::Conversation,
            importance: MemoryImportance::Medium,
        }
    }
}

/// The merged record handed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryWriteRecord {
    pub workspace_id: String,
    pub thread_id: String,
    pub title: String,
    pub detail: String,
    pub kind: MemoryKind,
    pub importance: MemoryImportance,
}

/// Produces the short digest/title for assistant output.
#[async_trait]
pub trait MemorySummarizer: Send + Sync {
    async fn digest(&self, text: &str) -> Result<MemoryDigest, MemoryError>;
}

/// Classifies merged detail into a memory kind and importance.
#[async_trait]
pub trait MemoryClassifier: Send + Sync {
    async fn classify(&self, detail: &str) -> Result<MemoryClassification, MemoryError>;
}

/// Persists memory records. Both paths are best-effort from the caller's
/// point of view.
#[async_trait]
pub trait MemoryWriter: Send + Sync {
    async fn create(&self, record: &MemoryWriteRecord) -> Result<MemoryRecordId, MemoryError>;

    async fn update(
        &self,
        id: &MemoryRecordId,
        record: &MemoryWriteRecord,
    ) -> Result<(), MemoryError>;
}
