//! Chrome extension integration via Native Messaging.
//!
//! The content script pushes page snapshots, change notifications and
//! overlay button presses; the host answers with render models, state
//! changes and notifications. Every message is a native-endian `u32` length
//! followed by that many bytes of JSON.

use crate::engine::{ControlCommand, EngineEvent, EngineHandle, LatestSnapshot};
use crate::presenter::RenderModel;
use crate::types::{PageEvent, PageSnapshot, SyncState};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

/// Largest inbound frame processed; bigger frames are skipped.
/// Chrome applies the same 1 MiB limit to messages sent by the host.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Message from the content script
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// Full page markup, no probe implied
    Snapshot { html: String },
    /// DOM mutation batch, optionally with fresh markup
    Mutation { html: Option<String> },
    /// URL changed inside the page
    Navigation { url: String, html: Option<String> },
    Enable,
    Disable,
    /// Manual solve button
    Solve,
    Ping,
}

/// Message to the content script
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostResponse {
    Render { model: RenderModel },
    State { state: SyncState, auto_enabled: bool },
    Notify { message: String },
    Pong,
}

impl From<EngineEvent> for HostResponse {
    fn from(event: EngineEvent) -> Self {
        match event {
            EngineEvent::Render(model) => HostResponse::Render { model },
            EngineEvent::StateChanged {
                state,
                auto_enabled,
            } => HostResponse::State {
                state,
                auto_enabled,
            },
            EngineEvent::Notify(message) => HostResponse::Notify { message },
        }
    }
}

/// Errors on the native messaging channel
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message too large: {0} bytes")]
    TooLarge(usize),

    #[error("Invalid message JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read one message. Returns `Ok(None)` when the browser closed the channel.
///
/// An oversized frame is consumed before `TooLarge` is returned, so the
/// stream stays aligned on the next length prefix.
pub fn read_message<R: Read>(reader: &mut R) -> Result<Option<HostMessage>, MessagingError> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_ne_bytes(len_bytes) as usize;
    if len > MAX_MESSAGE_BYTES {
        std::io::copy(&mut reader.by_ref().take(len as u64), &mut std::io::sink())?;
        return Err(MessagingError::TooLarge(len));
    }

    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer)?;

    Ok(Some(serde_json::from_slice(&buffer)?))
}

/// Write one message and flush
pub fn write_message<W: Write>(
    writer: &mut W,
    response: &HostResponse,
) -> Result<(), MessagingError> {
    let json = serde_json::to_vec(response)?;
    let len = (json.len() as u32).to_ne_bytes();

    writer.write_all(&len)?;
    writer.write_all(&json)?;
    writer.flush()?;

    Ok(())
}

/// Run the inbound loop (blocking, run in a separate thread).
///
/// Snapshots update `snapshots` before the matching notification reaches the
/// engine, so a probe always sees markup at least as new as its trigger.
pub fn run_native_messaging_loop<R: Read>(
    mut reader: R,
    snapshots: LatestSnapshot,
    handle: EngineHandle,
    replies: mpsc::Sender<HostResponse>,
) {
    debug!("Starting native messaging loop");

    loop {
        let message = match read_message(&mut reader) {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("Browser disconnected");
                break;
            }
            Err(MessagingError::Json(e)) => {
                warn!("Skipping malformed message: {}", e);
                continue;
            }
            Err(MessagingError::TooLarge(len)) => {
                warn!("Skipping oversized message ({} bytes)", len);
                continue;
            }
            Err(e) => {
                error!("Error reading browser message: {}", e);
                break;
            }
        };

        trace!("Received browser message: {:?}", message_kind(&message));

        let delivered = match message {
            HostMessage::Snapshot { html } => {
                snapshots.update(PageSnapshot::new(html));
                Ok(())
            }
            HostMessage::Mutation { html } => {
                if let Some(html) = html {
                    snapshots.update(PageSnapshot::new(html));
                }
                handle.blocking_page_changed(PageEvent::Mutation)
            }
            HostMessage::Navigation { url, html } => {
                debug!("Page navigated to {}", url);
                if let Some(html) = html {
                    snapshots.update(PageSnapshot::new(html));
                }
                handle.blocking_page_changed(PageEvent::Navigation)
            }
            HostMessage::Enable => handle.blocking_control(ControlCommand::Enable),
            HostMessage::Disable => handle.blocking_control(ControlCommand::Disable),
            HostMessage::Solve => handle.blocking_control(ControlCommand::ManualSolve),
            HostMessage::Ping => {
                if replies.blocking_send(HostResponse::Pong).is_err() {
                    warn!("Reply channel closed, dropping pong");
                }
                Ok(())
            }
        };

        if let Err(e) = delivered {
            error!("{}, exiting native messaging loop", e);
            break;
        }
    }
}

/// Drain outbound responses to `writer` until every sender is dropped (blocking)
pub fn run_writer_loop<W: Write>(mut writer: W, mut replies: mpsc::Receiver<HostResponse>) {
    while let Some(response) = replies.blocking_recv() {
        if let Err(e) = write_message(&mut writer, &response) {
            error!("Failed to write browser message: {}", e);
            break;
        }
    }
    debug!("Native messaging writer stopped");
}

fn message_kind(message: &HostMessage) -> &'static str {
    match message {
        HostMessage::Snapshot { .. } => "snapshot",
        HostMessage::Mutation { .. } => "mutation",
        HostMessage::Navigation { .. } => "navigation",
        HostMessage::Enable => "enable",
        HostMessage::Disable => "disable",
        HostMessage::Solve => "solve",
        HostMessage::Ping => "ping",
    }
}
