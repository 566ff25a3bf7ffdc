//! Turn orchestration core.
//!
//! Normalizes the engines' notification dialects into one canonical event
//! model, tracks per-thread processing/review state, serializes outbound
//! user messages per thread, reconciles pending thread identities with
//! their backend-confirmed replacements, and drives memory write-backs.
//!
//! All mutable state is owned by one coordinator, fed by a single command
//! channel; ordering guarantees are per-thread only.

pub mod coordinator;
pub mod identity;
pub mod router;
pub mod runtime;
pub mod status;

pub use coordinator::{
    CoordinatorCommand, CoordinatorConfig, NoopSlashCommandHandler, SlashCommandHandler,
    TurnCoordinator,
};
pub use identity::{resolve_pending_thread, AliasTable, PendingThreadCandidate};
pub use router::{EventRouter, RouterConfig, RouterEffect};
pub use runtime::TurnRuntime;
pub use status::{StatusChange, ThreadStatus, ThreadStatusStore};
