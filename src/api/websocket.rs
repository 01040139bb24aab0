use crate::api::types::ClientMessage;
use crate::engine::{CommandReceiver, EngineCommand};
use crate::event_manager::EventManager;
use crate::service::{StatusStream, TransferService};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Connection point for the engine process. Only one engine may be attached at a time.
#[derive(Clone)]
pub struct EngineLink {
    pub event_manager: Arc<EventManager>,
    pub commands: Arc<Mutex<CommandReceiver>>,
}

impl EngineLink {
    pub fn new(event_manager: Arc<EventManager>, commands: CommandReceiver) -> Self {
        Self {
            event_manager,
            commands: Arc::new(Mutex::new(commands)),
        }
    }
}

fn json_frame<T: Serialize>(value: &T) -> Option<Message> {
    match serde_json::to_string(value) {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            warn!(error = %e, "Failed to serialize frame");
            None
        }
    }
}

fn start_call(service: &TransferService, text: &str) -> Result<StatusStream, String> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Send(req)) => Ok(service.send(req)),
        Ok(ClientMessage::Accept(req)) => Ok(service.accept(req)),
        Err(e) => Err(e.to_string()),
    }
}

/// Streaming calls: every text frame starts a send or an accept whose status
/// updates are written back until the transfer ends
pub async fn client_websocket_handler(
    ws: WebSocketUpgrade,
    State(service): State<Arc<TransferService>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_client_socket(socket, service))
}

async fn handle_client_socket(mut socket: WebSocket, service: Arc<TransferService>) {
    while let Some(Ok(message)) = socket.recv().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        if text == "ping" {
            if socket.send(Message::Text("pong".to_string())).await.is_err() {
                return;
            }
            continue;
        }

        let mut stream = match start_call(&service, &text) {
            Ok(stream) => stream,
            Err(e) => {
                let frame = serde_json::json!({ "error": e, "code": "INVALID_REQUEST" });
                if socket.send(Message::Text(frame.to_string())).await.is_err() {
                    return;
                }
                continue;
            }
        };

        loop {
            tokio::select! {
                status = stream.recv() => {
                    let Some(status) = status else { break };
                    if let Some(frame) = json_frame(&status) {
                        if socket.send(frame).await.is_err() {
                            return;
                        }
                    }
                }
                message = socket.recv() => {
                    // The transfer keeps going without a follower
                    match message {
                        Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                        _ => {}
                    }
                }
            }
        }
    }
}

pub async fn engine_websocket_handler(
    ws: WebSocketUpgrade,
    State(link): State<EngineLink>,
) -> Response {
    ws.on_upgrade(move |socket| handle_engine_socket(socket, link))
}

async fn handle_engine_socket(mut socket: WebSocket, link: EngineLink) {
    let Ok(mut commands) = link.commands.clone().try_lock_owned() else {
        warn!("Engine already attached, refusing connection");
        let _ = socket.send(Message::Close(None)).await;
        return;
    };
    info!("Engine attached");

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                if !forward_command(&mut socket, &command).await {
                    break;
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        let event_manager = link.event_manager.clone();
                        // Notifications may block on the session bus
                        let handled = tokio::task::spawn_blocking(move || {
                            event_manager.on_event_json(&text)
                        })
                        .await;
                        if let Err(e) = handled {
                            warn!(error = %e, "Event handler panicked");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(error = %e, "Engine socket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
    info!("Engine detached");
}

async fn forward_command(socket: &mut WebSocket, command: &EngineCommand) -> bool {
    match json_frame(command) {
        Some(frame) => socket.send(frame).await.is_ok(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{AcceptRequest, SendRequest, StatusResponse};
    use crate::transfer::Status;

    #[test]
    fn test_client_message_parsing() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type": "Send", "data": {"peer": "laptop.nord", "paths": ["/tmp/a"]}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Send(SendRequest { peer, paths, silent }) => {
                assert_eq!(peer, "laptop.nord");
                assert_eq!(paths, vec!["/tmp/a".to_string()]);
                assert!(!silent);
            }
            other => panic!("unexpected message {other:?}"),
        }

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type": "Accept", "data": {"transfer_id": "t1", "dst_path": "/downloads"}}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Accept(AcceptRequest { ref transfer_id, ref files, .. })
                if transfer_id == "t1" && files.is_empty()
        ));
    }

    #[test]
    fn test_status_frame() {
        let frame = json_frame(&StatusResponse::status("t1", Status::Ongoing, 42)).unwrap();
        let Message::Text(text) = frame else {
            panic!("expected a text frame");
        };
        assert!(text.contains("t1"));
        assert!(text.contains("42"));
    }

    #[tokio::test]
    async fn test_single_engine_attachment() {
        let (_, rx) = crate::engine::EngineBridge::new("/nonexistent");
        let commands = Arc::new(Mutex::new(rx));

        let first = commands.clone().try_lock_owned();
        assert!(first.is_ok());
        assert!(commands.clone().try_lock_owned().is_err());

        drop(first);
        assert!(commands.try_lock_owned().is_ok());
    }
}
