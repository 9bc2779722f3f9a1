use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use crate::engine::events::ClientCommand;

use super::app_state::AppState;

/// GET /ws
///
/// Upgrades to a WebSocket carrying JSON `{"event", "data"}` frames.
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one client from upgrade to close: a writer task drains the
/// engine's outbound queue while this task feeds decoded commands in.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let engine = state.engine.clone();
    let (connection_id, mut outbound) = engine.connect();
    info!(%connection_id, "WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();

    let write_handle = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    error!(error = %e, "failed to encode outbound event");
                    continue;
                }
            };
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        let frame = tokio::select! {
            _ = state.shutdown.cancelled() => break,
            frame = receiver.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                match serde_json::from_str::<ClientCommand>(text.as_str()) {
                    Ok(command) => engine.handle(connection_id, command),
                    Err(e) => warn!(%connection_id, error = %e, "ignoring undecodable frame"),
                }
            }
            Some(Ok(Message::Binary(_))) => {
                debug!(%connection_id, "ignoring binary frame");
            }
            // Pings are answered by axum; pongs need nothing.
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                debug!(%connection_id, error = %e, "WebSocket read error");
                break;
            }
        }
    }

    engine.disconnect(connection_id);
    write_handle.abort();

    info!(%connection_id, "WebSocket client disconnected");
}
