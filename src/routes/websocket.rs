use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, info};

use crate::{
    models::announcement::AnnouncementRecord, services::metrics::PUSH_SUBSCRIBERS, AppState,
};

/// GET /api/announcements/ws: push channel for slot mutations.
///
/// The current record is sent on connect, then every create/disable as it
/// happens. Clients treat each push exactly like a poll result.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn push_frame(record: &AnnouncementRecord) -> Message {
    let frame = json!({ "type": "announcement", "payload": record });
    Message::Text(frame.to_string().into())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    // Subscribe before reading the snapshot so no mutation falls in between.
    let updates = BroadcastStream::new(state.store.subscribe());

    if sender.send(push_frame(&state.store.get())).await.is_err() {
        return;
    }

    PUSH_SUBSCRIBERS.inc();
    info!("announcement push subscriber connected");

    let store = state.store.clone();
    let mut push_task = tokio::spawn(async move {
        let mut updates = updates;
        while let Some(update) = updates.next().await {
            let record = match update {
                Ok(record) => record,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    debug!("push subscriber lagged by {skipped} updates; resending latest");
                    store.get()
                }
            };
            if sender.send(push_frame(&record)).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames are only watched for close.
    let mut client_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut push_task) => client_task.abort(),
        _ = (&mut client_task) => push_task.abort(),
    }

    PUSH_SUBSCRIBERS.dec();
    info!("announcement push subscriber disconnected");
}
