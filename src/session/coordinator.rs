//! Session coordinator task and its shared handle

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, Participant, ServerMsg};

use super::state::Session;

/// Capacity of the command queue feeding the coordinator
const COMMAND_QUEUE: usize = 256;
/// Broadcast backlog per subscriber before it starts lagging
const BROADCAST_BACKLOG: usize = 64;

/// What a connection asked the coordinator to do
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Client(ClientMsg),
    /// Transport closed, implicit leave
    Disconnect,
}

/// Command tagged with the connection it came from
#[derive(Debug, Clone)]
pub struct SessionInput {
    pub connection_id: Uuid,
    pub command: SessionCommand,
    pub received_at: u64,
}

impl SessionInput {
    /// Milliseconds between the frame arriving and `now`
    pub fn queued_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.received_at)
    }
}

/// Latest replicated view of the session, readable without the task
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSnapshot {
    pub started: bool,
    pub players: Vec<Participant>,
}

/// Cloneable handle to the running coordinator
#[derive(Clone)]
pub struct SessionHandle {
    pub input_tx: mpsc::Sender<SessionInput>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    snapshot: Arc<RwLock<SessionSnapshot>>,
    connections: Arc<DashMap<Uuid, Instant>>,
    participant_count: Arc<AtomicUsize>,
}

impl SessionHandle {
    /// Receive every broadcast from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.broadcast_tx.subscribe()
    }

    /// Forward a command; false when the coordinator is gone
    pub async fn send(&self, input: SessionInput) -> bool {
        self.input_tx.send(input).await.is_ok()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.read().clone()
    }

    pub fn register_connection(&self, connection_id: Uuid) {
        self.connections.insert(connection_id, Instant::now());
    }

    pub fn unregister_connection(&self, connection_id: Uuid) {
        if let Some((_, connected_at)) = self.connections.remove(&connection_id) {
            debug!(
                connection_id = %connection_id,
                connected_secs = connected_at.elapsed().as_secs(),
                "Connection unregistered"
            );
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn participant_count(&self) -> usize {
        self.participant_count.load(Ordering::Relaxed)
    }
}

/// Owns the session and applies commands in arrival order
pub struct SessionCoordinator {
    session: Session,
    input_rx: mpsc::Receiver<SessionInput>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    snapshot: Arc<RwLock<SessionSnapshot>>,
    participant_count: Arc<AtomicUsize>,
}

impl SessionCoordinator {
    pub fn new() -> (Self, SessionHandle) {
        let (input_tx, input_rx) = mpsc::channel(COMMAND_QUEUE);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_BACKLOG);
        let snapshot = Arc::new(RwLock::new(SessionSnapshot::default()));
        let participant_count = Arc::new(AtomicUsize::new(0));

        let handle = SessionHandle {
            input_tx,
            broadcast_tx: broadcast_tx.clone(),
            snapshot: snapshot.clone(),
            connections: Arc::new(DashMap::new()),
            participant_count: participant_count.clone(),
        };

        let coordinator = Self {
            session: Session::new(),
            input_rx,
            broadcast_tx,
            snapshot,
            participant_count,
        };

        (coordinator, handle)
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        info!("Session coordinator started");

        while let Some(input) = self.input_rx.recv().await {
            self.apply(input);
        }

        info!("Session coordinator stopped");
    }

    fn apply(&mut self, input: SessionInput) {
        let id = input.connection_id;
        let queued_ms = input.queued_ms(unix_millis());
        let result = match input.command {
            SessionCommand::Client(ClientMsg::JoinGame { name }) => self.session.join(id, &name),
            SessionCommand::Client(ClientMsg::PlayerReady) => self.session.set_ready(id),
            SessionCommand::Client(ClientMsg::UpdateScore { score }) => {
                self.session.report_score(id, score)
            }
            SessionCommand::Client(ClientMsg::GameOver) => self.session.report_finished(id),
            SessionCommand::Disconnect => Ok(self.session.leave(id)),
        };

        match result {
            Ok(messages) => {
                self.publish_snapshot();
                for msg in messages {
                    // No subscribers is fine, nobody is listening yet
                    let _ = self.broadcast_tx.send(msg);
                }
            }
            Err(e) => {
                warn!(
                    connection_id = %id,
                    queued_ms,
                    error = %e,
                    "Rejected session command"
                );
            }
        }
    }

    fn publish_snapshot(&self) {
        let mut snapshot = self.snapshot.write();
        snapshot.started = self.session.started();
        snapshot.players = self.session.participants().to_vec();
        self.participant_count
            .store(self.session.len(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(connection_id: Uuid, msg: ClientMsg) -> SessionInput {
        SessionInput {
            connection_id,
            command: SessionCommand::Client(msg),
            received_at: unix_millis(),
        }
    }

    async fn next(rx: &mut broadcast::Receiver<ServerMsg>) -> ServerMsg {
        tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("broadcast timed out")
            .expect("broadcast closed")
    }

    #[tokio::test]
    async fn commands_are_applied_and_broadcast_in_order() {
        let (coordinator, handle) = SessionCoordinator::new();
        let mut rx = handle.subscribe();
        tokio::spawn(coordinator.run());

        let a = Uuid::new_v4();
        assert!(handle.send(input(a, ClientMsg::JoinGame { name: "A".into() })).await);
        assert!(handle.send(input(a, ClientMsg::PlayerReady)).await);

        assert!(matches!(next(&mut rx).await, ServerMsg::Players { players } if players.len() == 1));
        assert!(matches!(next(&mut rx).await, ServerMsg::Players { players } if players[0].ready));
        assert_eq!(next(&mut rx).await, ServerMsg::GameStart);

        let snapshot = handle.snapshot();
        assert!(snapshot.started);
        assert_eq!(handle.participant_count(), 1);
    }

    #[tokio::test]
    async fn rejected_commands_broadcast_nothing() {
        let (coordinator, handle) = SessionCoordinator::new();
        let mut rx = handle.subscribe();
        tokio::spawn(coordinator.run());

        let a = Uuid::new_v4();
        handle.send(input(a, ClientMsg::PlayerReady)).await;
        handle.send(input(a, ClientMsg::JoinGame { name: "A".into() })).await;

        // The first message seen is the join snapshot, not a ready one
        match next(&mut rx).await {
            ServerMsg::Players { players } => {
                assert_eq!(players.len(), 1);
                assert!(!players[0].ready);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn disconnect_removes_participant() {
        let (coordinator, handle) = SessionCoordinator::new();
        let mut rx = handle.subscribe();
        tokio::spawn(coordinator.run());

        let a = Uuid::new_v4();
        handle.send(input(a, ClientMsg::JoinGame { name: "A".into() })).await;
        handle
            .send(SessionInput {
                connection_id: a,
                command: SessionCommand::Disconnect,
                received_at: unix_millis(),
            })
            .await;

        next(&mut rx).await;
        assert_eq!(next(&mut rx).await, ServerMsg::Players { players: vec![] });
        assert_eq!(handle.participant_count(), 0);
    }

    #[test]
    fn queue_delay_is_measured_from_receipt() {
        let mut sample = input(Uuid::new_v4(), ClientMsg::PlayerReady);
        sample.received_at = 1_000;
        assert_eq!(sample.queued_ms(1_250), 250);
        // Clock stepping backwards reads as no delay
        assert_eq!(sample.queued_ms(900), 0);
    }

    #[test]
    fn connection_registry_counts() {
        let (_coordinator, handle) = SessionCoordinator::new();
        let id = Uuid::new_v4();
        handle.register_connection(id);
        assert_eq!(handle.connection_count(), 1);
        handle.unregister_connection(id);
        assert_eq!(handle.connection_count(), 0);
    }
}
