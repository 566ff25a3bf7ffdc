use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use turnbridge_adapters::EngineKind;
use turnbridge_memory::{
    merge_and_write, AssistantCompletedPayload, InputCapturedPayload, MemoryClassifier,
    MemoryRaceResolver, MemorySummarizer, MemoryWriter,
};
use turnbridge_outbound::{parse_slash_command, OutboundQueue, QueuedMessage, SlashCommand};
use turnbridge_protocol::{
    EngineClient, EngineClientResult, ImageAttachment, RawNotification, SendMessageResponse,
    SendOptions, ThreadId, ThreadSnapshot, ThreadStartOptions, TurnObserver, WorkspaceId,
};

use crate::identity::{resolve_pending_thread, AliasTable, PendingThreadCandidate};
use crate::router::{EventRouter, RouterConfig, RouterEffect};
use crate::status::{StatusChange, ThreadStatusStore};

/// One engine family occasionally fails to emit a processing-start event
/// after accepting a send; this is how long an in-flight message waits for
/// one before it is requeued.
pub const STALL_WATCHDOG_TIMEOUT: Duration = Duration::from_secs(18);

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub workspace_id: WorkspaceId,
    pub router: RouterConfig,
    pub stall_watchdog_timeout: Duration,
    pub memory_staleness_window: Duration,
}

impl CoordinatorConfig {
    pub fn new(workspace_id: WorkspaceId) -> Self {
        Self {
            workspace_id,
            router: RouterConfig::default(),
            stall_watchdog_timeout: STALL_WATCHDOG_TIMEOUT,
            memory_staleness_window: turnbridge_memory::DEFAULT_STALENESS_WINDOW,
        }
    }
}

/// Receives slash commands other than `/new`, which the coordinator
/// handles itself.
#[allow(unused_variables)]
pub trait SlashCommandHandler: Send + Sync {
    fn handle_command(&self, command: SlashCommand, rest: &str, active_thread: Option<&ThreadId>) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSlashCommandHandler;

impl SlashCommandHandler for NoopSlashCommandHandler {}

/// Everything that can reach the coordinator: inbound notifications, user
/// actions, and the completions of previously spawned engine calls. All
/// of it drains through one channel, so the shared maps have a single
/// writer by construction.
#[derive(Debug)]
pub enum CoordinatorCommand {
    Notification(RawNotification),
    Send {
        text: String,
        images: Vec<ImageAttachment>,
        options: SendOptions,
    },
    Interrupt {
        thread_id: ThreadId,
    },
    SetActiveThread {
        thread_id: Option<ThreadId>,
    },
    SetReviewing {
        thread_id: ThreadId,
        is_reviewing: bool,
    },
    InputCaptured(InputCapturedPayload),
    SendOutcome {
        thread_id: ThreadId,
        result: EngineClientResult<SendMessageResponse>,
    },
    StartThreadOutcome {
        result: EngineClientResult<ThreadId>,
        followup_text: Option<String>,
        options: SendOptions,
    },
    ResumeThreadOutcome {
        result: EngineClientResult<ThreadSnapshot>,
    },
    InterruptOutcome {
        thread_id: ThreadId,
        result: EngineClientResult<()>,
    },
    WatchdogExpired {
        thread_id: ThreadId,
    },
}

pub struct TurnCoordinator {
    config: CoordinatorConfig,
    router: EventRouter,
    status: ThreadStatusStore,
    aliases: AliasTable,
    queue: OutboundQueue,
    memory: MemoryRaceResolver,
    threads_with_items: HashSet<ThreadId>,
    active_thread: Option<ThreadId>,
    watchdogs: HashMap<ThreadId, JoinHandle<()>>,
    client: Arc<dyn EngineClient>,
    observer: Arc<dyn TurnObserver>,
    summarizer: Arc<dyn MemorySummarizer>,
    classifier: Arc<dyn MemoryClassifier>,
    writer: Arc<dyn MemoryWriter>,
    slash_handler: Arc<dyn SlashCommandHandler>,
    commands: mpsc::UnboundedSender<CoordinatorCommand>,
}

impl TurnCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: CoordinatorConfig,
        client: Arc<dyn EngineClient>,
        observer: Arc<dyn TurnObserver>,
        summarizer: Arc<dyn MemorySummarizer>,
        classifier: Arc<dyn MemoryClassifier>,
        writer: Arc<dyn MemoryWriter>,
        slash_handler: Arc<dyn SlashCommandHandler>,
        commands: mpsc::UnboundedSender<CoordinatorCommand>,
    ) -> Self {
        let router = EventRouter::new(config.router, Arc::clone(&observer));
        let memory = MemoryRaceResolver::new(config.memory_staleness_window);
        Self {
            config,
            router,
            status: ThreadStatusStore::new(),
            aliases: AliasTable::new(),
            queue: OutboundQueue::new(),
            memory,
            threads_with_items: HashSet::new(),
            active_thread: None,
            watchdogs: HashMap::new(),
            client,
            observer,
            summarizer,
            classifier,
            writer,
            slash_handler,
            commands,
        }
    }

    pub fn handle_command(&mut self, command: CoordinatorCommand) {
        match command {
            CoordinatorCommand::Notification(raw) => self.handle_notification(&raw),
            CoordinatorCommand::Send {
                text,
                images,
                options,
            } => self.handle_send(text, images, options),
            CoordinatorCommand::Interrupt { thread_id } => self.handle_interrupt(&thread_id),
            CoordinatorCommand::SetActiveThread { thread_id } => {
                self.active_thread = thread_id;
                if let Some(thread_id) = self.active_thread.clone() {
                    self.reconcile_thread(&thread_id, Instant::now());
                }
            }
            CoordinatorCommand::SetReviewing {
                thread_id,
                is_reviewing,
            } => {
                if let Some(change) = self.status.mark_reviewing(&thread_id, is_reviewing) {
                    self.on_status_change(change, Instant::now());
                }
            }
            CoordinatorCommand::InputCaptured(payload) => {
                if let Some(matched) =
                    self.memory
                        .on_input_captured(payload, &self.aliases, Instant::now())
                {
                    self.spawn_memory_merge(matched);
                }
            }
            CoordinatorCommand::SendOutcome { thread_id, result } => {
                self.handle_send_outcome(&thread_id, result);
            }
            CoordinatorCommand::StartThreadOutcome {
                result,
                followup_text,
                options,
            } => self.handle_start_thread_outcome(result, followup_text, options),
            CoordinatorCommand::ResumeThreadOutcome { result } => match result {
                Ok(snapshot) => {
                    self.status.touch(&snapshot.thread_id);
                    if !snapshot.items.is_empty() {
                        self.threads_with_items.insert(snapshot.thread_id.clone());
                    }
                    self.active_thread = Some(snapshot.thread_id.clone());
                    self.reconcile_thread(&snapshot.thread_id, Instant::now());
                }
                Err(error) => {
                    warn!(error = %error, "thread resume failed");
                }
            },
            CoordinatorCommand::InterruptOutcome { thread_id, result } => {
                if let Err(error) = result {
                    warn!(
                        thread_id = thread_id.as_str(),
                        error = %error,
                        "interrupt request failed"
                    );
                    self.observer.on_turn_error(&thread_id, &error.to_string());
                }
            }
            CoordinatorCommand::WatchdogExpired { thread_id } => {
                self.watchdogs.remove(&thread_id);
                if self.queue.expire_stalled(&thread_id) {
                    self.reconcile_thread(&thread_id, Instant::now());
                }
            }
        }
    }

    fn handle_notification(&mut self, raw: &RawNotification) {
        let now = Instant::now();
        let effects = self.router.handle(raw, &mut self.status, now);
        for effect in effects {
            self.apply_effect(effect, now);
        }
    }

    fn apply_effect(&mut self, effect: RouterEffect, now: Instant) {
        match effect {
            RouterEffect::StatusChanged(change) => self.on_status_change(change, now),
            RouterEffect::ThreadRenamed { old_id, new_id } => {
                self.aliases.remember_alias(&old_id, &new_id);
                self.status.migrate(&old_id, &new_id);
                self.queue.migrate(&old_id, &new_id);
                self.memory.migrate(&old_id, &new_id);
                if self.threads_with_items.remove(&old_id) {
                    self.threads_with_items.insert(new_id.clone());
                }
                if self.active_thread.as_ref() == Some(&old_id) {
                    self.active_thread = Some(new_id);
                }
            }
            RouterEffect::AssistantCompleted {
                thread_id,
                item_id,
                text,
            } => {
                let payload = AssistantCompletedPayload {
                    workspace_id: self.config.workspace_id.clone(),
                    thread_id,
                    item_id,
                    text,
                };
                if let Some(matched) =
                    self.memory
                        .on_assistant_completed(payload, &self.aliases, now)
                {
                    self.spawn_memory_merge(matched);
                }
            }
            RouterEffect::TurnFailed { thread_id, message } => {
                debug!(
                    thread_id = thread_id.as_str(),
                    message, "turn reported an error"
                );
            }
            RouterEffect::ItemActivity { thread_id } => {
                self.threads_with_items.insert(thread_id);
            }
            RouterEffect::UnattributedTokenUsage { engine, usage } => {
                match self.resolve_unattributed_thread(engine.as_deref()) {
                    Some(thread_id) => {
                        self.observer.on_token_usage_updated(&thread_id, &usage);
                    }
                    None => {
                        debug!("unattributable session token usage; skipping");
                    }
                }
            }
        }
    }

    fn on_status_change(&mut self, change: StatusChange, now: Instant) {
        if change.is_processing {
            // The engine acknowledged the outstanding send; the watchdog
            // and the in-flight slot are both done.
            self.cancel_watchdog(&change.thread_id);
            self.queue.complete_in_flight(&change.thread_id);
        } else {
            self.reconcile_thread(&change.thread_id, now);
        }
    }

    fn handle_send(&mut self, text: String, images: Vec<ImageAttachment>, options: SendOptions) {
        if let Some(parsed) = parse_slash_command(&text) {
            if !images.is_empty() {
                debug!(
                    command = parsed.command.prefix(),
                    "stripping image attachments from a slash command"
                );
            }
            match parsed.command {
                SlashCommand::New => self.start_new_thread(parsed.rest, options),
                SlashCommand::Resume if !parsed.rest.is_empty() => {
                    self.resume_existing_thread(&parsed.rest);
                }
                other => {
                    self.slash_handler
                        .handle_command(other, &parsed.rest, self.active_thread.as_ref());
                }
            }
            return;
        }

        let Some(thread_id) = self.active_thread.clone() else {
            debug!("dropping send without an active thread");
            return;
        };
        let now = Instant::now();
        let message = self.queue.mint_message(text, images, options.clone(), now);
        let mid_turn = self.status.is_processing(&thread_id)
            || self.status.active_turn_id(&thread_id).is_some();

        if mid_turn && !options.steer {
            self.queue.enqueue(&thread_id, message);
            return;
        }
        if mid_turn {
            // Steer bypass: deliver immediately, leaving the queue alone.
            self.dispatch_send(thread_id, message);
            return;
        }
        if self.queue.begin_direct_send(&thread_id, message.clone(), now) {
            self.dispatch_send(thread_id, message);
        } else {
            // A send is already awaiting acknowledgement; fall back to the
            // queue so ordering holds.
            self.queue.enqueue(&thread_id, message);
        }
    }

    fn handle_interrupt(&mut self, thread_id: &ThreadId) {
        let Some(turn_id) = self.status.active_turn_id(thread_id).cloned() else {
            debug!(
                thread_id = thread_id.as_str(),
                "interrupt without an outstanding turn"
            );
            return;
        };
        self.router.mark_interrupted(thread_id);
        self.status.set_active_turn_id(thread_id, None);
        let now = Instant::now();
        if let Some(change) = self.status.mark_processing(thread_id, false, now) {
            self.on_status_change(change, now);
        }

        let client = Arc::clone(&self.client);
        let workspace_id = self.config.workspace_id.clone();
        let commands = self.commands.clone();
        let thread_id = thread_id.clone();
        tokio::spawn(async move {
            let result = client.interrupt(&workspace_id, &thread_id, &turn_id).await;
            let _ = commands.send(CoordinatorCommand::InterruptOutcome { thread_id, result });
        });
    }

    fn handle_send_outcome(
        &mut self,
        thread_id: &ThreadId,
        result: EngineClientResult<SendMessageResponse>,
    ) {
        match result {
            Ok(SendMessageResponse::Started { turn_id }) => {
                self.status.set_active_turn_id(thread_id, Some(turn_id));
            }
            Ok(SendMessageResponse::Error { message }) => {
                // Rpc-level rejection: surface as an assistant error and
                // drop the message; only transport failures retry.
                self.cancel_watchdog(thread_id);
                self.queue.complete_in_flight(thread_id);
                self.observer.on_turn_error(thread_id, &message);
                let now = Instant::now();
                self.status.set_active_turn_id(thread_id, None);
                if let Some(change) = self.status.mark_processing(thread_id, false, now) {
                    self.on_status_change(change, now);
                }
                self.reconcile_thread(thread_id, now);
            }
            Err(error) => {
                warn!(
                    thread_id = thread_id.as_str(),
                    error = %error,
                    "send failed; message returns to the front of its queue"
                );
                self.cancel_watchdog(thread_id);
                // No immediate retry: the next idle transition for this
                // thread redispatches, so a persistent failure cannot spin.
                self.queue.fail_in_flight(thread_id);
            }
        }
    }

    fn handle_start_thread_outcome(
        &mut self,
        result: EngineClientResult<ThreadId>,
        followup_text: Option<String>,
        options: SendOptions,
    ) {
        let thread_id = match result {
            Ok(thread_id) => thread_id,
            Err(error) => {
                warn!(error = %error, "thread start failed");
                return;
            }
        };
        self.status.touch(&thread_id);
        self.active_thread = Some(thread_id.clone());

        if let Some(text) = followup_text {
            let now = Instant::now();
            let message = self.queue.mint_message(text, Vec::new(), options, now);
            if self.queue.begin_direct_send(&thread_id, message.clone(), now) {
                self.dispatch_send(thread_id, message);
            }
        }
    }

    fn resume_existing_thread(&mut self, rest: &str) {
        let Some(token) = rest.split_whitespace().next() else {
            return;
        };
        let thread_id = ThreadId::new(token);
        let client = Arc::clone(&self.client);
        let workspace_id = self.config.workspace_id.clone();
        let commands = self.commands.clone();
        tokio::spawn(async move {
            let result = client.resume_thread(&workspace_id, &thread_id).await;
            let _ = commands.send(CoordinatorCommand::ResumeThreadOutcome { result });
        });
    }

    fn start_new_thread(&mut self, rest: String, options: SendOptions) {
        let client = Arc::clone(&self.client);
        let workspace_id = self.config.workspace_id.clone();
        let commands = self.commands.clone();
        let start_options = ThreadStartOptions {
            model: options.model.clone(),
            instruction_prelude: None,
        };
        let followup_text = if rest.is_empty() { None } else { Some(rest) };
        tokio::spawn(async move {
            let result = client.start_thread(&workspace_id, &start_options).await;
            let _ = commands.send(CoordinatorCommand::StartThreadOutcome {
                result,
                followup_text,
                options,
            });
        });
    }

    fn reconcile_thread(&mut self, thread_id: &ThreadId, now: Instant) {
        let (is_processing, is_reviewing) = self
            .status
            .status(thread_id)
            .map(|status| (status.is_processing, status.is_reviewing))
            .unwrap_or((false, false));
        if let Some(message) = self.queue.reconcile(
            thread_id,
            is_processing,
            is_reviewing,
            self.active_thread.as_ref(),
            now,
        ) {
            self.dispatch_send(thread_id.clone(), message);
        }
    }

    fn dispatch_send(&mut self, thread_id: ThreadId, message: QueuedMessage) {
        let client = Arc::clone(&self.client);
        let workspace_id = self.config.workspace_id.clone();
        let commands = self.commands.clone();
        let send_thread = thread_id.clone();
        tokio::spawn(async move {
            let result = client
                .send_message(
                    &workspace_id,
                    &send_thread,
                    &message.text,
                    &message.images,
                    &message.options,
                )
                .await;
            let _ = commands.send(CoordinatorCommand::SendOutcome {
                thread_id: send_thread,
                result,
            });
        });

        if self.queue.has_in_flight(&thread_id)
            && EngineKind::from_thread_id(&thread_id) == EngineKind::OpenCode
        {
            self.arm_watchdog(thread_id);
        }
    }

    fn arm_watchdog(&mut self, thread_id: ThreadId) {
        let commands = self.commands.clone();
        let timeout = self.config.stall_watchdog_timeout;
        let timer_thread = thread_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = commands.send(CoordinatorCommand::WatchdogExpired {
                thread_id: timer_thread,
            });
        });
        if let Some(previous) = self.watchdogs.insert(thread_id, handle) {
            previous.abort();
        }
    }

    fn cancel_watchdog(&mut self, thread_id: &ThreadId) {
        if let Some(handle) = self.watchdogs.remove(thread_id) {
            handle.abort();
        }
    }

    fn spawn_memory_merge(&self, matched: turnbridge_memory::MatchedTurn) {
        let summarizer = Arc::clone(&self.summarizer);
        let classifier = Arc::clone(&self.classifier);
        let writer = Arc::clone(&self.writer);
        tokio::spawn(async move {
            merge_and_write(
                matched,
                summarizer.as_ref(),
                classifier.as_ref(),
                writer.as_ref(),
            )
            .await;
        });
    }

    fn resolve_unattributed_thread(&self, engine_hint: Option<&str>) -> Option<ThreadId> {
        let engine = engine_hint.and_then(|hint| {
            EngineKind::ALL
                .into_iter()
                .find(|engine| engine.pending_prefix() == hint)
        });
        let candidates: Vec<PendingThreadCandidate> = self
            .status
            .threads()
            .filter(|(thread_id, _)| thread_id.is_pending())
            .filter(|(thread_id, _)| {
                engine.map_or(true, |engine| EngineKind::from_thread_id(thread_id) == engine)
            })
            .map(|(thread_id, status)| PendingThreadCandidate {
                thread_id: thread_id.clone(),
                is_processing: status.is_processing,
                is_active: self.active_thread.as_ref() == Some(thread_id),
                has_active_turn: status.active_turn_id.is_some(),
                has_history: self.threads_with_items.contains(thread_id),
            })
            .collect();
        resolve_pending_thread(&candidates)
    }
}
