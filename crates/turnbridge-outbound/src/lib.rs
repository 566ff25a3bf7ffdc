//! Per-thread outbound message serialization.
//!
//! User-authored messages wait in one FIFO per thread while a turn is
//! processing; an idle transition drains at most one message into the
//! single in-flight slot. The queue itself is a plain single-writer state
//! container; dispatching, watchdog timers, and engine gating live with
//! the coordinator.

pub mod commands;
pub mod queue;

pub use commands::{parse_slash_command, ParsedCommand, SlashCommand};
pub use queue::{OutboundQueue, QueuedMessage};
