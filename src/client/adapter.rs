//! Bridge between the local simulation and the session coordinator
//!
//! Outbound: join/ready requests and simulation events become [`ClientMsg`]s.
//! Inbound: [`ServerMsg`]s update the replicated participant list and drive
//! the simulation through session-level transitions.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::{RunState, SimEvent, Simulation};
use crate::ws::protocol::{ClientMsg, Participant, ServerMsg};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Name must not be empty")]
    EmptyName,

    #[error("Connection to coordinator closed")]
    Disconnected,

    #[error("WebSocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
}

/// What the runtime should do after an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Session started; run the pre-run countdown
    StartCountdown,
    /// Session ended; show standings, then restart
    ShowResults(Vec<Participant>),
}

pub struct SessionClient {
    outbound: mpsc::UnboundedSender<ClientMsg>,
    id: Option<Uuid>,
    name: Option<String>,
    players: Vec<Participant>,
    results: Vec<Participant>,
}

impl SessionClient {
    pub fn new(outbound: mpsc::UnboundedSender<ClientMsg>) -> Self {
        Self {
            outbound,
            id: None,
            name: None,
            players: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Ask to join under `name`. Blank names are rejected without sending.
    pub fn join(&mut self, name: &str) -> Result<(), ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::EmptyName);
        }
        self.send(ClientMsg::JoinGame {
            name: name.to_string(),
        })?;
        self.name = Some(name.to_string());
        info!(name, "Joining session");
        Ok(())
    }

    /// Rejoin with the last accepted name
    pub fn rejoin(&mut self) -> Result<(), ClientError> {
        let name = self.name.clone().ok_or(ClientError::EmptyName)?;
        self.join(&name)
    }

    pub fn set_ready(&mut self) -> Result<(), ClientError> {
        self.send(ClientMsg::PlayerReady)
    }

    /// Translate simulation events into coordinator messages
    pub fn forward(&mut self, events: &[SimEvent]) -> Result<(), ClientError> {
        for event in events {
            match *event {
                SimEvent::ScoreChanged { score } => {
                    self.send(ClientMsg::UpdateScore { score })?;
                }
                SimEvent::Terminal { reason, score } => {
                    debug!(%reason, score, "Reporting finished run");
                    self.send(ClientMsg::UpdateScore { score })?;
                    self.send(ClientMsg::GameOver)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Apply one coordinator message
    pub fn handle(&mut self, msg: ServerMsg, sim: &mut Simulation) -> Option<Directive> {
        match msg {
            ServerMsg::Welcome { id, server_time } => {
                debug!(participant_id = %id, server_time, "Welcome received");
                self.id = Some(id);
                None
            }
            ServerMsg::Players { players } => {
                self.players = players;
                None
            }
            ServerMsg::GameStart => {
                // A run left over from a previous cycle must not block the new one
                if !sim.reset() && sim.state() != RunState::Idle {
                    sim.end_session();
                }
                if sim.start() {
                    Some(Directive::StartCountdown)
                } else {
                    warn!(state = ?sim.state(), "Game start ignored by simulation");
                    None
                }
            }
            ServerMsg::GameEnd { mut players } => {
                sim.end_session();
                players.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
                info!(
                    winner = players.first().map(|p| p.name.as_str()).unwrap_or(""),
                    "Session ended"
                );
                self.results = players.clone();
                Some(Directive::ShowResults(players))
            }
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn players(&self) -> &[Participant] {
        &self.players
    }

    /// This client's own entry in the replicated list
    pub fn me(&self) -> Option<&Participant> {
        let id = self.id?;
        self.players.iter().find(|p| p.id == id)
    }

    /// Final standings of the last session, best first
    pub fn results(&self) -> &[Participant] {
        &self.results
    }

    fn send(&self, msg: ClientMsg) -> Result<(), ClientError> {
        self.outbound.send(msg).map_err(|_| ClientError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{NullRenderer, TerminalReason, Tuning, Viewport};

    fn client() -> (SessionClient, mpsc::UnboundedReceiver<ClientMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionClient::new(tx), rx)
    }

    fn sim() -> Simulation {
        let mut sim = Simulation::new(Tuning::default(), 0, 7);
        sim.resize(Viewport::default());
        sim
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ClientMsg>) -> Vec<ClientMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn participant(name: &str, score: u32) -> Participant {
        let mut p = Participant::new(Uuid::new_v4(), name.to_string());
        p.score = score;
        p.finished = true;
        p
    }

    #[test]
    fn blank_name_is_rejected_locally() {
        let (mut client, mut rx) = client();
        assert!(matches!(client.join("   "), Err(ClientError::EmptyName)));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn join_sends_trimmed_name() {
        let (mut client, mut rx) = client();
        client.join("  Ada ").unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![ClientMsg::JoinGame {
                name: "Ada".to_string()
            }]
        );
        assert_eq!(client.name(), Some("Ada"));
    }

    #[test]
    fn terminal_sends_final_score_then_game_over() {
        let (mut client, mut rx) = client();
        client
            .forward(&[
                SimEvent::ScoreChanged { score: 1 },
                SimEvent::ScoreChanged { score: 2 },
                SimEvent::Terminal {
                    reason: TerminalReason::Obstacle,
                    score: 2,
                },
                SimEvent::NewHighScore { score: 2 },
            ])
            .unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                ClientMsg::UpdateScore { score: 1 },
                ClientMsg::UpdateScore { score: 2 },
                ClientMsg::UpdateScore { score: 2 },
                ClientMsg::GameOver,
            ]
        );
    }

    #[test]
    fn closed_channel_reports_disconnect() {
        let (mut client, rx) = client();
        drop(rx);
        assert!(matches!(client.set_ready(), Err(ClientError::Disconnected)));
    }

    #[test]
    fn welcome_and_players_are_recorded() {
        let (mut client, _rx) = client();
        let mut sim = sim();
        let id = Uuid::new_v4();

        assert_eq!(client.handle(ServerMsg::Welcome { id, server_time: 1 }, &mut sim), None);
        let players = vec![Participant::new(id, "Ada".to_string())];
        assert_eq!(client.handle(ServerMsg::Players { players }, &mut sim), None);

        assert_eq!(client.id(), Some(id));
        assert_eq!(client.me().map(|p| p.name.as_str()), Some("Ada"));
    }

    #[test]
    fn game_start_arms_the_countdown() {
        let (mut client, _rx) = client();
        let mut sim = sim();

        assert_eq!(
            client.handle(ServerMsg::GameStart, &mut sim),
            Some(Directive::StartCountdown)
        );
        assert!(matches!(sim.state(), RunState::Countdown { .. }));
    }

    #[test]
    fn game_start_after_a_finished_run_resets_first() {
        let (mut client, _rx) = client();
        let mut sim = sim();
        sim.start();
        while sim.countdown_step() != Some(SimEvent::RunStarted) {}
        sim.trigger_impulse();
        for _ in 0..10_000 {
            sim.tick(&mut NullRenderer);
            if matches!(sim.state(), RunState::Over { .. }) {
                break;
            }
        }
        assert!(matches!(sim.state(), RunState::Over { .. }));

        assert_eq!(
            client.handle(ServerMsg::GameStart, &mut sim),
            Some(Directive::StartCountdown)
        );
        assert_eq!(sim.score(), 0);
    }

    #[test]
    fn game_end_idles_the_simulation_and_sorts_results() {
        let (mut client, _rx) = client();
        let mut sim = sim();
        sim.start();

        let players = vec![participant("Bo", 3), participant("Ada", 9), participant("Cy", 5)];
        let directive = client.handle(ServerMsg::GameEnd { players }, &mut sim);

        let Some(Directive::ShowResults(results)) = directive else {
            panic!("expected results, got {directive:?}");
        };
        let names: Vec<_> = results.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ada", "Cy", "Bo"]);
        assert_eq!(client.results().len(), 3);
        assert_eq!(sim.state(), RunState::Idle);
    }

    #[test]
    fn rejoin_uses_the_last_name() {
        let (mut client, mut rx) = client();
        client.join("Ada").unwrap();
        drain(&mut rx);

        client.rejoin().unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![ClientMsg::JoinGame {
                name: "Ada".to_string()
            }]
        );
    }
}
