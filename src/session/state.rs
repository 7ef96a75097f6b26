//! The session aggregate: participants, readiness and lifecycle

use tracing::info;
use uuid::Uuid;

use crate::ws::protocol::{Participant, ServerMsg};

/// Rejected session commands
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Display name must not be empty")]
    EmptyName,

    #[error("Unknown participant {0}")]
    UnknownParticipant(Uuid),
}

/// The single multiplayer session.
///
/// Every mutating operation returns the messages to broadcast. A full
/// `Players` snapshot always comes first, even when nothing actually
/// changed, followed by any lifecycle transition it caused.
#[derive(Debug, Default)]
pub struct Session {
    /// Join order is preserved; a re-join keeps its slot
    participants: Vec<Participant>,
    started: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the participant for a connection
    pub fn join(&mut self, id: Uuid, name: &str) -> Result<Vec<ServerMsg>, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }

        let participant = Participant::new(id, name.to_string());
        match self.position(id) {
            Some(pos) => self.participants[pos] = participant,
            None => self.participants.push(participant),
        }

        info!(participant_id = %id, name, count = self.participants.len(), "Participant joined");

        let mut out = vec![self.players_msg()];
        if self.started {
            // Newcomer is not ready, so the session no longer counts as started
            self.started = false;
            info!(participant_id = %id, "Join interrupted a started session");
        }
        out.extend(self.try_start());
        Ok(out)
    }

    pub fn set_ready(&mut self, id: Uuid) -> Result<Vec<ServerMsg>, SessionError> {
        self.participant_mut(id)?.ready = true;

        let mut out = vec![self.players_msg()];
        out.extend(self.try_start());
        Ok(out)
    }

    pub fn report_score(&mut self, id: Uuid, score: u32) -> Result<Vec<ServerMsg>, SessionError> {
        self.participant_mut(id)?.score = score;
        Ok(vec![self.players_msg()])
    }

    pub fn report_finished(&mut self, id: Uuid) -> Result<Vec<ServerMsg>, SessionError> {
        self.participant_mut(id)?.finished = true;

        let mut out = vec![self.players_msg()];
        out.extend(self.try_end());
        Ok(out)
    }

    /// Remove a participant. Always rebroadcasts, even for unknown ids.
    pub fn leave(&mut self, id: Uuid) -> Vec<ServerMsg> {
        if let Some(pos) = self.position(id) {
            let participant = self.participants.remove(pos);
            info!(participant_id = %id, name = %participant.name, "Participant left");
        }

        let mut out = vec![self.players_msg()];
        if self.participants.is_empty() {
            if self.started {
                info!("Session emptied, resetting");
            }
            self.started = false;
            return out;
        }

        out.extend(self.try_end());
        out.extend(self.try_start());
        out
    }

    /// Start once every current participant is ready
    fn try_start(&mut self) -> Option<ServerMsg> {
        if self.started || self.participants.is_empty() {
            return None;
        }
        if !self.participants.iter().all(|p| p.ready) {
            return None;
        }

        self.started = true;
        for participant in &mut self.participants {
            participant.finished = false;
        }
        info!(count = self.participants.len(), "All participants ready, starting session");
        Some(ServerMsg::GameStart)
    }

    /// End once every current participant has finished. Readiness is
    /// cleared so the next start needs a fresh ready round.
    fn try_end(&mut self) -> Vec<ServerMsg> {
        if !self.started || self.participants.is_empty() {
            return Vec::new();
        }
        if !self.participants.iter().all(|p| p.finished) {
            return Vec::new();
        }

        self.started = false;
        let standings = self.participants.clone();
        for participant in &mut self.participants {
            participant.ready = false;
        }
        info!(count = standings.len(), "All participants finished, ending session");

        vec![
            ServerMsg::GameEnd { players: standings },
            self.players_msg(),
        ]
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.participants.iter().position(|p| p.id == id)
    }

    fn participant_mut(&mut self, id: Uuid) -> Result<&mut Participant, SessionError> {
        self.participants
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(SessionError::UnknownParticipant(id))
    }

    fn players_msg(&self) -> ServerMsg {
        ServerMsg::Players {
            players: self.participants.clone(),
        }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
