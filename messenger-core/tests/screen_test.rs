//! Integration tests for the chat screen actor
//!
//! Each test opens a real screen over the in-memory backend and drives it
//! through its handle, observing the published events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use messenger_core::input::OpenChatInput;
use messenger_core::{
    AesGcmCipher, ChatConfig, ChatError, ChatResult, ChatScreen, Composer, ConversationStore,
    DeliveryOutcome, InMemoryBackend, MediaKind, MediaSource, Message, ScreenEvent, ScreenHandle,
    ScreenServices, SelfIdentity,
};
use tokio::sync::broadcast;
use tokio::time::timeout;

const KEY: &str = "screen-secret";
const ME: &str = "me@home.net";
const FRIEND: &str = "friend@mail.com";

fn config() -> ChatConfig {
    ChatConfig::default().with_encryption_key(KEY)
}

fn services(backend: &Arc<InMemoryBackend>) -> ScreenServices {
    ScreenServices {
        store: backend.clone(),
        media: backend.clone(),
        cipher: Arc::new(AesGcmCipher::new()),
    }
}

fn open_screen(backend: &Arc<InMemoryBackend>, conversation_id: Option<&str>) -> ScreenHandle {
    ChatScreen::open(
        OpenChatInput {
            peer_email: FRIEND.to_string(),
            title: Some("Friend".to_string()),
            conversation_id: conversation_id.map(String::from),
        },
        SelfIdentity::from_email(ME).unwrap(),
        services(backend),
        config(),
    )
    .unwrap()
}

/// Messages written by the friend, encrypted with the shared key
fn friend_messages(bodies: &[&str]) -> Vec<Message> {
    let composer = Composer::new(
        SelfIdentity::from_email(FRIEND).unwrap(),
        "me-home-net",
        Arc::new(AesGcmCipher::new()),
        &config(),
    );
    bodies
        .iter()
        .map(|body| composer.compose_text(body).unwrap())
        .collect()
}

/// Wait until an event matching `predicate` arrives
async fn wait_for(
    events: &mut broadcast::Receiver<ScreenEvent>,
    predicate: impl Fn(&ScreenEvent) -> bool,
) -> ScreenEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => continue,
                Err(e) => panic!("Event stream failed: {}", e),
            }
        }
    })
    .await
    .expect("Timeout waiting for screen event")
}

#[tokio::test]
async fn test_first_send_creates_conversation() {
    let backend = Arc::new(InMemoryBackend::new());
    let screen = open_screen(&backend, None);
    let mut events = screen.subscribe();

    let before = screen.snapshot().await.unwrap();
    assert!(before.is_new_conversation);
    assert_eq!(before.conversation_id, None);
    assert_eq!(before.peer, "friend-mail-com");
    assert_eq!(before.title, "Friend");

    let outcome = screen.send_text("hi").await.unwrap();
    assert_eq!(outcome, DeliveryOutcome::Delivered);

    let created = wait_for(&mut events, |e| {
        matches!(e, ScreenEvent::ConversationCreated { .. })
    })
    .await;
    let reloaded = wait_for(&mut events, |e| {
        matches!(e, ScreenEvent::MessagesReloaded { .. })
    })
    .await;
    assert_eq!(
        reloaded,
        ScreenEvent::MessagesReloaded {
            count: 1,
            scroll_to_bottom: true
        }
    );

    let after = screen.snapshot().await.unwrap();
    assert!(!after.is_new_conversation);
    if let ScreenEvent::ConversationCreated { conversation_id } = created {
        assert_eq!(after.conversation_id, Some(conversation_id));
    }

    // Second send must not take the create path again
    screen.send_text("again").await.unwrap();
    assert_eq!(backend.create_calls(), 1);
    assert_eq!(backend.append_calls(), 1);

    screen.close().await.unwrap();
}

#[tokio::test]
async fn test_blank_text_is_rejected() {
    let backend = Arc::new(InMemoryBackend::new());
    let screen = open_screen(&backend, None);

    assert_eq!(screen.send_text("").await, Err(ChatError::EmptyBody));
    assert_eq!(screen.send_text("    ").await, Err(ChatError::EmptyBody));
    assert_eq!(backend.create_calls(), 0);
    assert!(screen.snapshot().await.unwrap().is_new_conversation);
}

#[tokio::test]
async fn test_failed_create_stays_new() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.set_fail_creates(true);
    let screen = open_screen(&backend, None);
    let mut events = screen.subscribe();

    let outcome = screen.send_text("hello?").await.unwrap();
    assert!(matches!(outcome, DeliveryOutcome::Failed { .. }));

    let failed = wait_for(&mut events, |e| matches!(e, ScreenEvent::DeliveryFailed { .. })).await;
    if let ScreenEvent::DeliveryFailed { reason, .. } = failed {
        assert!(reason.contains("create conversation failed"));
    }
    assert!(screen.snapshot().await.unwrap().is_new_conversation);
}

#[tokio::test]
async fn test_existing_conversation_loads_on_open() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.seed_conversation("c1", friend_messages(&["hey", "long time"]));

    let screen = open_screen(&backend, Some("c1"));
    let mut events = screen.subscribe();

    let reloaded = wait_for(&mut events, |e| {
        matches!(e, ScreenEvent::MessagesReloaded { .. })
    })
    .await;
    assert_eq!(
        reloaded,
        ScreenEvent::MessagesReloaded {
            count: 2,
            scroll_to_bottom: true
        }
    );

    let transcript = screen.transcript().await.unwrap();
    let texts: Vec<&str> = transcript.iter().map(|line| line.text.as_str()).collect();
    assert_eq!(texts, vec!["hey", "long time"]);
    assert!(transcript.iter().all(|line| line.sender_id == "friend-mail-com"));
}

#[tokio::test]
async fn test_transcript_marks_undecryptable_text() {
    let backend = Arc::new(InMemoryBackend::new());
    let foreign = Composer::new(
        SelfIdentity::from_email(FRIEND).unwrap(),
        "me-home-net",
        Arc::new(AesGcmCipher::new()),
        &ChatConfig::default().with_encryption_key("some other key"),
    )
    .compose_text("you cannot read this")
    .unwrap();
    backend.seed_conversation("c1", vec![foreign]);

    let screen = open_screen(&backend, Some("c1"));
    let mut events = screen.subscribe();
    wait_for(&mut events, |e| matches!(e, ScreenEvent::MessagesReloaded { .. })).await;

    let transcript = screen.transcript().await.unwrap();
    assert_eq!(transcript[0].text, "[Encrypted message - unable to decrypt]");
}

#[tokio::test]
async fn test_refresh_with_empty_history_keeps_messages() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.seed_conversation("c1", friend_messages(&["one", "two"]));

    let screen = open_screen(&backend, Some("c1"));
    let mut events = screen.subscribe();
    wait_for(&mut events, |e| matches!(e, ScreenEvent::MessagesReloaded { .. })).await;

    backend.seed_conversation("c1", vec![]);
    screen.refresh().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(screen.snapshot().await.unwrap().messages.len(), 2);

    backend.set_fail_fetches(true);
    screen.refresh().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(screen.snapshot().await.unwrap().messages.len(), 2);

    backend.set_fail_fetches(false);
    backend.seed_conversation("c1", friend_messages(&["three"]));
    screen.refresh().await.unwrap();
    let reloaded = wait_for(&mut events, |e| {
        matches!(e, ScreenEvent::MessagesReloaded { .. })
    })
    .await;
    assert_eq!(
        reloaded,
        ScreenEvent::MessagesReloaded {
            count: 1,
            scroll_to_bottom: false
        }
    );
    assert_eq!(screen.transcript().await.unwrap()[0].text, "three");
}

#[tokio::test]
async fn test_attach_photo() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.seed_conversation("c1", friend_messages(&["send me a picture"]));

    let screen = open_screen(&backend, Some("c1"));
    let mut events = screen.subscribe();
    wait_for(&mut events, |e| matches!(e, ScreenEvent::MessagesReloaded { .. })).await;

    let message_id = screen
        .attach_media(MediaKind::Photo, MediaSource::Bytes(vec![1, 2, 3]))
        .await
        .unwrap();

    let expected = message_id.clone();
    wait_for(&mut events, move |e| {
        matches!(e, ScreenEvent::MessageSent { message_id } if *message_id == expected)
    })
    .await;
    wait_for(&mut events, |e| {
        matches!(e, ScreenEvent::MessagesReloaded { count: 2, .. })
    })
    .await;

    let snapshot = screen.snapshot().await.unwrap();
    assert_eq!(snapshot.messages[1].id(), message_id);
    assert_eq!(snapshot.messages[1].kind(), "photo");

    let url = screen.photo_url_at(1).await.unwrap().unwrap();
    assert!(url.as_str().starts_with("memory://media/photo_message_"));
    assert!(url.as_str().ends_with(".png"));

    // Text rows have no photo to open
    assert_eq!(screen.photo_url_at(0).await.unwrap(), None);
    assert_eq!(screen.photo_url_at(9).await.unwrap(), None);
}

#[tokio::test]
async fn test_failed_upload_reports_media_failure() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.seed_conversation("c1", friend_messages(&["hi"]));
    backend.set_fail_uploads(true);

    let screen = open_screen(&backend, Some("c1"));
    let mut events = screen.subscribe();

    let message_id = screen
        .attach_media(MediaKind::Video, MediaSource::Bytes(vec![0; 16]))
        .await
        .unwrap();

    let failed = wait_for(&mut events, |e| matches!(e, ScreenEvent::MediaFailed { .. })).await;
    assert_eq!(
        failed,
        ScreenEvent::MediaFailed {
            message_id,
            reason: "Media upload error: video upload failed".to_string(),
        }
    );
    assert_eq!(backend.message_count("c1"), 1);
}

#[tokio::test]
async fn test_malformed_upload_location_is_not_sent() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.seed_conversation("c1", friend_messages(&["hi"]));
    backend.set_upload_location_override(Some("not a uri"));

    let screen = open_screen(&backend, Some("c1"));
    let mut events = screen.subscribe();

    screen
        .attach_media(MediaKind::Photo, MediaSource::Bytes(vec![5]))
        .await
        .unwrap();

    let failed = wait_for(&mut events, |e| matches!(e, ScreenEvent::MediaFailed { .. })).await;
    if let ScreenEvent::MediaFailed { reason, .. } = failed {
        assert!(reason.contains("invalid remote location"));
    }
    assert_eq!(backend.append_calls(), 0);
}

#[tokio::test]
async fn test_close_cancels_in_flight_fetch() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.seed_conversation("c1", friend_messages(&["slow"]));
    backend.set_fetch_delay(Duration::from_secs(3600));

    let screen = open_screen(&backend, Some("c1"));
    let other = screen.clone();
    let mut events = screen.subscribe();

    timeout(Duration::from_secs(2), screen.close())
        .await
        .expect("Close blocked on an in-flight fetch")
        .unwrap();

    // The only event is the close itself: the fetch never landed
    assert_eq!(events.recv().await.unwrap(), ScreenEvent::Closed);
    assert!(events.try_recv().is_err());

    assert_eq!(other.snapshot().await.unwrap_err(), ChatError::ScreenClosed);
    assert_eq!(other.send_text("late").await, Err(ChatError::ScreenClosed));
}

#[tokio::test]
async fn test_default_title_and_bad_input() {
    let backend = Arc::new(InMemoryBackend::new());

    let screen = ChatScreen::open(
        OpenChatInput {
            peer_email: FRIEND.to_string(),
            title: None,
            conversation_id: None,
        },
        SelfIdentity::from_email(ME).unwrap(),
        services(&backend),
        config(),
    )
    .unwrap();
    assert_eq!(screen.snapshot().await.unwrap().title, "User");

    let result = ChatScreen::open(
        OpenChatInput {
            peer_email: String::new(),
            title: None,
            conversation_id: None,
        },
        SelfIdentity::from_email(ME).unwrap(),
        services(&backend),
        config(),
    );
    assert!(matches!(result, Err(ChatError::InvalidInput(_))));

    let result = ChatScreen::open(
        OpenChatInput {
            peer_email: FRIEND.to_string(),
            title: None,
            conversation_id: None,
        },
        SelfIdentity::from_email(ME).unwrap(),
        services(&backend),
        ChatConfig::default(),
    );
    assert!(matches!(result, Err(ChatError::Config(_))));
}

/// Store whose first history fetch reads its snapshot, then stalls
struct SlowFirstFetch {
    inner: Arc<InMemoryBackend>,
    stalled: AtomicBool,
}

#[async_trait]
impl ConversationStore for SlowFirstFetch {
    async fn fetch_conversation_history(&self, conversation_id: &str) -> ChatResult<Vec<Message>> {
        let history = self.inner.fetch_conversation_history(conversation_id).await;
        if !self.stalled.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        history
    }

    async fn create_conversation(
        &self,
        peer: &str,
        title: &str,
        first_message: &Message,
    ) -> ChatResult<String> {
        self.inner.create_conversation(peer, title, first_message).await
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        peer: &str,
        title: &str,
        message: &Message,
    ) -> ChatResult<()> {
        self.inner
            .append_message(conversation_id, peer, title, message)
            .await
    }
}

#[tokio::test]
async fn test_slow_open_fetch_does_not_overwrite_newer_history() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.seed_conversation("c1", friend_messages(&["hi"]));
    let store = Arc::new(SlowFirstFetch {
        inner: backend.clone(),
        stalled: AtomicBool::new(false),
    });

    let screen = ChatScreen::open(
        OpenChatInput {
            peer_email: FRIEND.to_string(),
            title: Some("Friend".to_string()),
            conversation_id: Some("c1".to_string()),
        },
        SelfIdentity::from_email(ME).unwrap(),
        ScreenServices {
            store,
            media: backend.clone(),
            cipher: Arc::new(AesGcmCipher::new()),
        },
        config(),
    )
    .unwrap();
    let mut events = screen.subscribe();

    // Opening fetch is still stalled with a one-message snapshot
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(screen.send_text("new").await.unwrap(), DeliveryOutcome::Delivered);
    wait_for(&mut events, |e| {
        matches!(e, ScreenEvent::MessagesReloaded { count: 2, .. })
    })
    .await;

    // Let the opening fetch land
    tokio::time::sleep(Duration::from_millis(400)).await;
    let snapshot = screen.snapshot().await.unwrap();
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(backend.message_count("c1"), 2);
}

#[test]
#[should_panic]
fn test_open_outside_runtime_panics() {
    let backend = Arc::new(InMemoryBackend::new());
    let _ = open_screen(&backend, None);
}
