//! The chat screen: one actor task that owns a conversation session.
//!
//! Every mutation of the session happens on the actor. History fetches
//! and media uploads run in a `JoinSet` owned by the actor, so closing the
//! screen aborts them and their results never reach a dropped session.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};
use url::Url;

use crate::backend::{ConversationStore, MediaSource, MediaStorage, TextCipher};
use crate::composer::{Composer, PendingMedia};
use crate::config::ChatConfig;
use crate::dispatcher::{DeliveryOutcome, Dispatcher};
use crate::error::{ChatError, ChatResult};
use crate::identity::SelfIdentity;
use crate::input::OpenChatInput;
use crate::listener::{HistoryUpdate, Listener};
use crate::message::{MediaKind, Message, MessageContent};
use crate::session::ConversationSession;

const COMMAND_CAPACITY: usize = 32;
const UNDECRYPTABLE_TEXT: &str = "[Encrypted message - unable to decrypt]";

/// Collaborators a screen talks to
#[derive(Clone)]
pub struct ScreenServices {
    pub store: Arc<dyn ConversationStore>,
    pub media: Arc<dyn MediaStorage>,
    pub cipher: Arc<dyn TextCipher>,
}

/// Notifications for whatever renders the screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenEvent {
    MessagesReloaded { count: usize, scroll_to_bottom: bool },
    ConversationCreated { conversation_id: String },
    MessageSent { message_id: String },
    DeliveryFailed { message_id: String, reason: String },
    MediaFailed { message_id: String, reason: String },
    Closed,
}

/// Copy of the session state at one point in time
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub peer: String,
    pub title: String,
    pub conversation_id: Option<String>,
    pub is_new_conversation: bool,
    pub messages: Vec<Message>,
}

/// One rendered row of the thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub message_id: String,
    pub sender_id: String,
    pub kind: &'static str,
    pub text: String,
}

enum ScreenCommand {
    SendText {
        body: String,
        reply: oneshot::Sender<ChatResult<DeliveryOutcome>>,
    },
    AttachMedia {
        kind: MediaKind,
        source: MediaSource,
        reply: oneshot::Sender<String>,
    },
    Refresh,
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Transcript {
        reply: oneshot::Sender<Vec<TranscriptLine>>,
    },
    PhotoUrlAt {
        index: usize,
        reply: oneshot::Sender<Option<Url>>,
    },
    Close {
        done: oneshot::Sender<()>,
    },
}

enum TaskResult {
    History {
        generation: u64,
        result: ChatResult<Vec<Message>>,
        scroll_to_bottom: bool,
    },
    Upload {
        pending: PendingMedia,
        result: ChatResult<String>,
    },
}

/// Opens chat screens
pub struct ChatScreen;

impl ChatScreen {
    /// Open a screen and start its actor.
    ///
    /// Screens for an existing conversation load its history right away.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, since the actor is
    /// started with `tokio::spawn`.
    pub fn open(
        input: OpenChatInput,
        identity: SelfIdentity,
        services: ScreenServices,
        config: ChatConfig,
    ) -> ChatResult<ScreenHandle> {
        config.validate()?;
        let peer = input.peer_id()?;
        let title = input
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(config.default_title.as_str())
            .to_string();

        let session = match input.conversation_id {
            Some(conversation_id) => ConversationSession::existing(&peer, title, conversation_id),
            None => ConversationSession::new_conversation(&peer, title),
        };

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (event_tx, _) = broadcast::channel(config.event_capacity);

        let actor = ScreenActor {
            composer: Composer::new(identity, &peer, services.cipher.clone(), &config),
            dispatcher: Dispatcher::new(services.store.clone()),
            listener: Listener::new(services.store),
            media: services.media,
            cipher: services.cipher,
            encryption_key: config.encryption_key,
            session,
            tasks: JoinSet::new(),
            fetch_generation: 0,
            applied_generation: 0,
            events: event_tx.clone(),
        };

        info!(peer = %peer, "Opening chat screen");
        tokio::spawn(actor.run(command_rx));

        Ok(ScreenHandle {
            commands: command_tx,
            events: event_tx,
        })
    }
}

/// Cloneable handle to a running screen
#[derive(Clone)]
pub struct ScreenHandle {
    commands: mpsc::Sender<ScreenCommand>,
    events: broadcast::Sender<ScreenEvent>,
}

impl ScreenHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ScreenEvent> {
        self.events.subscribe()
    }

    /// Compose and send a text message, waiting for the store's answer
    pub async fn send_text(&self, body: impl Into<String>) -> ChatResult<DeliveryOutcome> {
        let (reply, rx) = oneshot::channel();
        self.request(ScreenCommand::SendText {
            body: body.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| ChatError::ScreenClosed)?
    }

    /// Start uploading a photo or video.
    ///
    /// Returns the id the message will carry; the outcome arrives as a
    /// [`ScreenEvent`].
    pub async fn attach_media(&self, kind: MediaKind, source: MediaSource) -> ChatResult<String> {
        let (reply, rx) = oneshot::channel();
        self.request(ScreenCommand::AttachMedia {
            kind,
            source,
            reply,
        })
        .await?;
        rx.await.map_err(|_| ChatError::ScreenClosed)
    }

    /// Reload history without scrolling
    pub async fn refresh(&self) -> ChatResult<()> {
        self.request(ScreenCommand::Refresh).await
    }

    pub async fn snapshot(&self) -> ChatResult<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.request(ScreenCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| ChatError::ScreenClosed)
    }

    /// Loaded messages with text bodies decrypted
    pub async fn transcript(&self) -> ChatResult<Vec<TranscriptLine>> {
        let (reply, rx) = oneshot::channel();
        self.request(ScreenCommand::Transcript { reply }).await?;
        rx.await.map_err(|_| ChatError::ScreenClosed)
    }

    /// Remote location of the photo at `index`, for opening it full screen
    pub async fn photo_url_at(&self, index: usize) -> ChatResult<Option<Url>> {
        let (reply, rx) = oneshot::channel();
        self.request(ScreenCommand::PhotoUrlAt { index, reply }).await?;
        rx.await.map_err(|_| ChatError::ScreenClosed)
    }

    /// Close the screen, cancelling in-flight fetches and uploads
    pub async fn close(&self) -> ChatResult<()> {
        let (done, rx) = oneshot::channel();
        self.request(ScreenCommand::Close { done }).await?;
        rx.await.map_err(|_| ChatError::ScreenClosed)
    }

    async fn request(&self, command: ScreenCommand) -> ChatResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ChatError::ScreenClosed)
    }
}

struct ScreenActor {
    composer: Composer,
    dispatcher: Dispatcher,
    listener: Listener,
    media: Arc<dyn MediaStorage>,
    cipher: Arc<dyn TextCipher>,
    encryption_key: String,
    session: ConversationSession,
    tasks: JoinSet<TaskResult>,
    /// Generation of the most recently spawned history fetch
    fetch_generation: u64,
    /// Generation of the newest history result applied to the session
    applied_generation: u64,
    events: broadcast::Sender<ScreenEvent>,
}

impl ScreenActor {
    async fn run(mut self, mut commands: mpsc::Receiver<ScreenCommand>) {
        self.spawn_history_fetch(true);

        let mut done = None;
        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(ScreenCommand::Close { done: ack }) => {
                            done = Some(ack);
                            break;
                        }
                        Some(command) => self.handle_command(command).await,
                        None => {
                            debug!("All screen handles dropped");
                            break;
                        }
                    }
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.handle_task(joined).await;
                }
            }
        }

        // Cancel in-flight work before the session goes away
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}

        info!(peer = %self.session.peer(), "Chat screen closed");
        let _ = self.events.send(ScreenEvent::Closed);
        if let Some(ack) = done {
            let _ = ack.send(());
        }
    }

    async fn handle_command(&mut self, command: ScreenCommand) {
        match command {
            ScreenCommand::SendText { body, reply } => {
                let result = match self.composer.compose_text(&body) {
                    Ok(message) => Ok(self.deliver(message).await),
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            ScreenCommand::AttachMedia {
                kind,
                source,
                reply,
            } => {
                let pending = self.composer.prepare_media(kind);
                let _ = reply.send(pending.id.clone());
                self.spawn_upload(pending, source);
            }
            ScreenCommand::Refresh => self.spawn_history_fetch(false),
            ScreenCommand::Snapshot { reply } => {
                let _ = reply.send(SessionSnapshot {
                    peer: self.session.peer().to_string(),
                    title: self.session.title().to_string(),
                    conversation_id: self.session.conversation_id().map(String::from),
                    is_new_conversation: self.session.is_new_conversation(),
                    messages: self.session.loaded_messages().to_vec(),
                });
            }
            ScreenCommand::Transcript { reply } => {
                let _ = reply.send(self.transcript());
            }
            ScreenCommand::PhotoUrlAt { index, reply } => {
                let url = self
                    .session
                    .loaded_messages()
                    .get(index)
                    .and_then(|message| match message.content() {
                        MessageContent::Photo(media) => media.remote_location().cloned(),
                        _ => None,
                    });
                let _ = reply.send(url);
            }
            // Handled by the run loop
            ScreenCommand::Close { .. } => {}
        }
    }

    async fn handle_task(&mut self, joined: Result<TaskResult, JoinError>) {
        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                if !e.is_cancelled() {
                    warn!("Screen task failed: {}", e);
                }
                return;
            }
        };

        match result {
            TaskResult::History {
                generation,
                result,
                scroll_to_bottom,
            } => {
                // Fetches overlap; an older one must not overwrite newer history
                if generation < self.applied_generation {
                    debug!(
                        generation,
                        applied = self.applied_generation,
                        "Dropping stale history fetch"
                    );
                    return;
                }
                self.applied_generation = generation;

                if let HistoryUpdate::Replaced { count } = Listener::apply(&mut self.session, result) {
                    let _ = self.events.send(ScreenEvent::MessagesReloaded {
                        count,
                        scroll_to_bottom,
                    });
                }
            }
            TaskResult::Upload { pending, result } => {
                let message_id = pending.id.clone();
                let composed = result.and_then(|location| self.composer.compose_media(pending, &location));
                match composed {
                    Ok(message) => {
                        self.deliver(message).await;
                    }
                    Err(e) => {
                        warn!("Message media upload error for {}: {}", message_id, e);
                        let _ = self.events.send(ScreenEvent::MediaFailed {
                            message_id,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    /// Dispatch a composed message and publish the outcome
    async fn deliver(&mut self, message: Message) -> DeliveryOutcome {
        let was_new = self.session.is_new_conversation();
        let outcome = self.dispatcher.send(&mut self.session, &message).await;

        match &outcome {
            DeliveryOutcome::Delivered => {
                if was_new {
                    if let Some(conversation_id) = self.session.conversation_id() {
                        let _ = self.events.send(ScreenEvent::ConversationCreated {
                            conversation_id: conversation_id.to_string(),
                        });
                    }
                }
                let _ = self.events.send(ScreenEvent::MessageSent {
                    message_id: message.id().to_string(),
                });
                self.spawn_history_fetch(true);
            }
            DeliveryOutcome::Failed { reason } => {
                let _ = self.events.send(ScreenEvent::DeliveryFailed {
                    message_id: message.id().to_string(),
                    reason: reason.clone(),
                });
            }
        }
        outcome
    }

    fn spawn_history_fetch(&mut self, scroll_to_bottom: bool) {
        let Some(conversation_id) = self.session.conversation_id().map(String::from) else {
            return;
        };
        self.fetch_generation += 1;
        let generation = self.fetch_generation;
        let listener = self.listener.clone();
        self.tasks.spawn(async move {
            TaskResult::History {
                generation,
                result: listener.fetch_history(&conversation_id).await,
                scroll_to_bottom,
            }
        });
    }

    fn spawn_upload(&mut self, pending: PendingMedia, source: MediaSource) {
        let media = self.media.clone();
        self.tasks.spawn(async move {
            let result = media
                .upload_media(source, &pending.filename, pending.kind)
                .await;
            TaskResult::Upload { pending, result }
        });
    }

    fn transcript(&self) -> Vec<TranscriptLine> {
        self.session
            .loaded_messages()
            .iter()
            .map(|message| {
                let text = match message.content() {
                    MessageContent::Text { .. } => message
                        .decrypted_text(self.cipher.as_ref(), &self.encryption_key)
                        .and_then(Result::ok)
                        .unwrap_or_else(|| UNDECRYPTABLE_TEXT.to_string()),
                    MessageContent::Photo(media) | MessageContent::Video(media) => media
                        .remote_location()
                        .map(|url| url.to_string())
                        .unwrap_or_default(),
                    MessageContent::Location {
                        latitude,
                        longitude,
                    } => format!("{}, {}", latitude, longitude),
                    MessageContent::Audio { url, .. } => url.to_string(),
                    MessageContent::Contact { display_name, .. } => display_name.clone(),
                    MessageContent::Link { url, .. } => url.to_string(),
                    MessageContent::Custom { payload } => payload.to_string(),
                };
                TranscriptLine {
                    message_id: message.id().to_string(),
                    sender_id: message.sender_id().to_string(),
                    kind: message.kind(),
                    text,
                }
            })
            .collect()
    }
}
