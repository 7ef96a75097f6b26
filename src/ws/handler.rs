//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::session::{SessionCommand, SessionHandle, SessionInput};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    // The connection id doubles as the participant id
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();
    let session = state.session.clone();

    // Subscribe before anything can be broadcast about this connection
    let broadcast_rx = session.subscribe();

    let welcome = ServerMsg::Welcome {
        id: connection_id,
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(connection_id = %connection_id, error = %e, "Failed to send welcome");
        return;
    }

    session.register_connection(connection_id);

    run_session(connection_id, ws_sink, ws_stream, &session, broadcast_rx).await;

    session.unregister_connection(connection_id);

    info!(connection_id = %connection_id, "WebSocket connection closed");
}

/// How the broadcast writer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriterExit {
    /// Socket send failed
    SendFailed,
    /// Fell behind the broadcast backlog; the socket was closed
    Lagged,
    /// Coordinator went away
    Closed,
}

/// Forward session broadcasts to one socket until something breaks.
///
/// `GameStart` and `GameEnd` are sent once per cycle, so a receiver that
/// lags cannot recover from the next snapshot. It is closed instead, which
/// turns into an implicit leave.
pub(crate) async fn pump_broadcasts<S>(
    connection_id: Uuid,
    mut broadcast_rx: broadcast::Receiver<ServerMsg>,
    mut sink: S,
) -> WriterExit
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    loop {
        match broadcast_rx.recv().await {
            Ok(msg) => {
                if let Err(e) = send_msg(&mut sink, &msg).await {
                    debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
                    return WriterExit::SendFailed;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(
                    connection_id = %connection_id,
                    lagged_count = n,
                    "Client lagged behind session broadcasts, closing"
                );
                let close = Message::Close(Some(CloseFrame {
                    code: close_code::AGAIN,
                    reason: "lagged behind session broadcasts".into(),
                }));
                let _ = sink.send(close).await;
                return WriterExit::Lagged;
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(connection_id = %connection_id, "Broadcast channel closed");
                return WriterExit::Closed;
            }
        }
    }
}

/// Per-connection inbound throttle.
///
/// Only score updates count against the quota. A throttled score is held
/// and sent ahead of the next message that gets through, so lifecycle
/// messages are never dropped and the last score always lands before
/// `gameOver`.
pub(crate) struct InboundGate {
    limiter: ConnectionRateLimiter,
    pending_score: Option<u32>,
}

impl InboundGate {
    pub(crate) fn new(limiter: ConnectionRateLimiter) -> Self {
        Self {
            limiter,
            pending_score: None,
        }
    }

    /// Messages to forward, in order, for one inbound message
    pub(crate) fn admit(&mut self, msg: ClientMsg) -> Vec<ClientMsg> {
        match msg {
            ClientMsg::UpdateScore { score } => {
                if self.limiter.check_message() {
                    self.pending_score = None;
                    vec![msg]
                } else {
                    self.pending_score = Some(score);
                    Vec::new()
                }
            }
            // A join starts from zero, a held score would be stale
            ClientMsg::JoinGame { .. } => {
                self.pending_score = None;
                vec![msg]
            }
            other => {
                let mut out = Vec::with_capacity(2);
                if let Some(score) = self.pending_score.take() {
                    out.push(ClientMsg::UpdateScore { score });
                }
                out.push(other);
                out
            }
        }
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.pending_score.is_some()
    }
}

/// Run the WebSocket session with read/write split
async fn run_session(
    connection_id: Uuid,
    ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    session: &SessionHandle,
    broadcast_rx: broadcast::Receiver<ServerMsg>,
) {
    let mut gate = InboundGate::new(ConnectionRateLimiter::new());

    // Spawn writer task: session broadcasts -> WebSocket
    let mut writer_handle = tokio::spawn(pump_broadcasts(connection_id, broadcast_rx, ws_sink));

    // Reader loop: WebSocket -> coordinator, until either side stops
    loop {
        let result = tokio::select! {
            next = ws_stream.next() => match next {
                Some(result) => result,
                None => break,
            },
            exit = &mut writer_handle => {
                debug!(connection_id = %connection_id, ?exit, "Writer stopped, ending session");
                break;
            }
        };

        match result {
            Ok(Message::Text(text)) => {
                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                let admitted = gate.admit(client_msg);
                if admitted.is_empty() {
                    debug!(connection_id = %connection_id, "Score update throttled, holding latest");
                }

                let mut closed = false;
                for msg in admitted {
                    let input = SessionInput {
                        connection_id,
                        command: SessionCommand::Client(msg),
                        received_at: unix_millis(),
                    };
                    if !session.send(input).await {
                        closed = true;
                        break;
                    }
                }
                if closed {
                    debug!(connection_id = %connection_id, "Session channel closed");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(connection_id = %connection_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(connection_id = %connection_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    if gate.has_pending() {
        debug!(connection_id = %connection_id, "Dropping held score on disconnect");
    }

    // Disconnect is an implicit leave
    let _ = session
        .send(SessionInput {
            connection_id,
            command: SessionCommand::Disconnect,
            received_at: unix_millis(),
        })
        .await;

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg<S>(sink: &mut S, msg: &ServerMsg) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
