//! WebSocket protocol message definitions
//! These are the wire types for client-coordinator communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Enter the lobby (or replace this connection's participant)
    JoinGame {
        /// Display name
        name: String,
    },

    /// Participant is ready to start
    PlayerReady,

    /// Latest local score, overwrites the stored one
    UpdateScore {
        score: u32,
    },

    /// Local run ended
    GameOver,
}

/// Messages sent from coordinator to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Sent once on connect, carries this connection's participant id
    Welcome {
        id: Uuid,
        #[serde(rename = "serverTime")]
        server_time: u64,
    },

    /// Full participant snapshot, sent after every mutation
    Players {
        players: Vec<Participant>,
    },

    /// Every participant is ready
    GameStart,

    /// Every participant has finished; final standings
    GameEnd {
        players: Vec<Participant>,
    },
}

/// Session-level identity of one connected player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub name: String,
    pub score: u32,
    #[serde(rename = "isReady")]
    pub ready: bool,
    #[serde(rename = "isFinished")]
    pub finished: bool,
}

impl Participant {
    pub fn new(id: Uuid, name: String) -> Self {
        Self {
            id,
            name,
            score: 0,
            ready: false,
            finished: false,
        }
    }
}
