// Wire protocol. Events are JSON objects with a single key naming the event, e.g.
//   {"playerRole": "white"}
//   {"move": {"from": "e2", "to": "e4"}}
// The one exception is the spectator greeting, which carries the position alongside:
//   {"spectatorRole": true, "boardState": "<FEN>"}

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::rules::GameOutcome;
use crate::side::Side;


#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerEvent {
    // Unicast on attach: the seat this connection got.
    PlayerRole(Side),
    // Side to move after the latest accepted move.
    Turn(Side),
    // The accepted proposal, exactly as the mover sent it.
    Move(serde_json::Value),
    BoardState(String),
    // Human-readable session news: players ready, player gone, server going down.
    Connection(String),
    // Unicast to the proposer only. Echoes the payload exactly as it was received.
    InvalidMove(serde_json::Value),
    GameOver(GameOutcome),
    // Unicast on attach when both seats are taken.
    #[serde(untagged)]
    SpectatorRole(SpectatorGreeting),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SpectatorGreeting {
    pub board_state: String,
}

impl Serialize for SpectatorGreeting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("spectatorRole", &true)?;
        map.serialize_entry("boardState", &self.board_state)?;
        map.end()
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientEvent {
    // Kept as raw JSON: validation happens in the session coordinator, which needs the
    // original payload to echo it back on rejection.
    Move(serde_json::Value),
}
