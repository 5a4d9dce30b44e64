mod commands;

use std::sync::Arc;

use messenger_core::input::OpenChatInput;
use messenger_core::{
    AesGcmCipher, ChatConfig, ChatResult, ChatScreen, DeliveryOutcome, InMemoryBackend, MediaSource,
    ScreenEvent, ScreenHandle, ScreenServices, SelfIdentity,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use commands::{parse_line, ConsoleCommand, HELP};

const DEFAULT_PEER_EMAIL: &str = "friend@example.com";
const LOG_FILE_PREFIX: &str = "messenger.log";

/// Console logging, plus a daily rolling file when `MESSENGER_LOG_DIR` is set
fn init_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match std::env::var("MESSENGER_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() {
    // Missing .env is fine, the environment may already be set
    let _ = dotenvy::dotenv();
    let _log_guard = init_logging();

    let config = match ChatConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Get the signed-in account from env
    let self_email = std::env::var("MESSENGER_SELF_EMAIL").ok();
    let identity = match SelfIdentity::from_cached(self_email.as_deref()) {
        Ok(identity) => identity,
        Err(e) => {
            error!("MESSENGER_SELF_EMAIL must be set: {}", e);
            std::process::exit(1);
        }
    };

    let input = OpenChatInput {
        peer_email: std::env::var("MESSENGER_PEER_EMAIL")
            .unwrap_or_else(|_| DEFAULT_PEER_EMAIL.to_string()),
        title: std::env::var("MESSENGER_TITLE").ok(),
        conversation_id: std::env::var("MESSENGER_CONVERSATION_ID").ok(),
    };

    let backend = Arc::new(InMemoryBackend::new());
    let services = ScreenServices {
        store: backend.clone(),
        media: backend,
        cipher: Arc::new(AesGcmCipher::new()),
    };

    let screen = match ChatScreen::open(input, identity, services, config) {
        Ok(screen) => screen,
        Err(e) => {
            error!("Failed to open chat screen: {}", e);
            std::process::exit(1);
        }
    };

    let mut events = screen.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ScreenEvent::MessagesReloaded { count, .. } => {
                    println!("-- {} messages loaded", count)
                }
                ScreenEvent::ConversationCreated { conversation_id } => {
                    println!("-- conversation {} created", conversation_id)
                }
                ScreenEvent::MessageSent { message_id } => println!("-- sent {}", message_id),
                ScreenEvent::DeliveryFailed { reason, .. } => {
                    println!("!! failed to send: {}", reason)
                }
                ScreenEvent::MediaFailed { reason, .. } => {
                    println!("!! failed to attach media: {}", reason)
                }
                ScreenEvent::Closed => break,
            }
        }
    });

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        };

        match parse_line(&line) {
            Ok(ConsoleCommand::Quit) => break,
            Ok(command) => {
                if let Err(e) = run_command(&screen, command).await {
                    warn!("{}", e);
                }
            }
            Err(e) => println!("{}", e),
        }
    }

    if let Err(e) = screen.close().await {
        warn!("Screen already closed: {}", e);
    }
    let _ = printer.await;
    info!("Bye");
}

async fn run_command(screen: &ScreenHandle, command: ConsoleCommand) -> ChatResult<()> {
    match command {
        ConsoleCommand::Send(body) => {
            if let DeliveryOutcome::Failed { reason } = screen.send_text(body).await? {
                println!("!! not delivered: {}", reason);
            }
        }
        ConsoleCommand::Attach { kind, path } => {
            let id = screen.attach_media(kind, MediaSource::File(path)).await?;
            println!("-- uploading {} {}", kind.as_str(), id);
        }
        ConsoleCommand::Refresh => screen.refresh().await?,
        ConsoleCommand::Show => {
            let snapshot = screen.snapshot().await?;
            println!("== {} ({})", snapshot.title, snapshot.peer);
            for (index, line) in screen.transcript().await?.iter().enumerate() {
                println!("[{}] {} <{}> {}", index, line.sender_id, line.kind, line.text);
            }
        }
        ConsoleCommand::OpenPhoto(index) => match screen.photo_url_at(index).await? {
            Some(url) => println!("photo: {}", url),
            None => println!("message {} is not a photo", index),
        },
        ConsoleCommand::Help => println!("{}", HELP),
        // Handled by the input loop
        ConsoleCommand::Quit => {}
    }
    Ok(())
}
