use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use turnbridge_memory::{InputCapturedPayload, MemoryClassifier, MemorySummarizer, MemoryWriter};
use turnbridge_protocol::{
    EngineClient, ImageAttachment, RawNotification, SendOptions, ThreadId, TurnObserver,
};

use crate::coordinator::{
    CoordinatorCommand, CoordinatorConfig, SlashCommandHandler, TurnCoordinator,
};

/// Owns the coordinator on a single task and feeds it through one command
/// channel: notifications from the transport, user actions from the
/// embedding layer, and the completions of spawned engine calls all drain
/// in arrival order, so no shared structure ever has two writers.
pub struct TurnRuntime {
    commands: mpsc::UnboundedSender<CoordinatorCommand>,
    task: JoinHandle<()>,
}

impl TurnRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        config: CoordinatorConfig,
        client: Arc<dyn EngineClient>,
        observer: Arc<dyn TurnObserver>,
        summarizer: Arc<dyn MemorySummarizer>,
        classifier: Arc<dyn MemoryClassifier>,
        writer: Arc<dyn MemoryWriter>,
        slash_handler: Arc<dyn SlashCommandHandler>,
    ) -> Self {
        let (commands, mut receiver) = mpsc::unbounded_channel();
        let mut coordinator = TurnCoordinator::new(
            config,
            client,
            observer,
            summarizer,
            classifier,
            writer,
            slash_handler,
            commands.clone(),
        );
        let task = tokio::spawn(async move {
            while let Some(command) = receiver.recv().await {
                coordinator.handle_command(command);
            }
        });
        Self { commands, task }
    }

    /// Deliver one raw notification from the transport.
    pub fn notify(&self, notification: RawNotification) {
        let _ = self
            .commands
            .send(CoordinatorCommand::Notification(notification));
    }

    pub fn send_user_message(
        &self,
        text: impl Into<String>,
        images: Vec<ImageAttachment>,
        options: SendOptions,
    ) {
        let _ = self.commands.send(CoordinatorCommand::Send {
            text: text.into(),
            images,
            options,
        });
    }

    pub fn interrupt(&self, thread_id: ThreadId) {
        let _ = self
            .commands
            .send(CoordinatorCommand::Interrupt { thread_id });
    }

    pub fn set_active_thread(&self, thread_id: Option<ThreadId>) {
        let _ = self
            .commands
            .send(CoordinatorCommand::SetActiveThread { thread_id });
    }

    pub fn set_reviewing(&self, thread_id: ThreadId, is_reviewing: bool) {
        let _ = self.commands.send(CoordinatorCommand::SetReviewing {
            thread_id,
            is_reviewing,
        });
    }

    /// The "input captured" half of the memory write-back.
    pub fn input_captured(&self, payload: InputCapturedPayload) {
        let _ = self
            .commands
            .send(CoordinatorCommand::InputCaptured(payload));
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}
