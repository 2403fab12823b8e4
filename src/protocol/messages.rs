//! Messages exchanged with the local game process
//!
//! The outbound payload is owned by whoever produces it; the connector only
//! needs it to be serializable. The inbound response must carry a `Name`
//! string. Everything else in it is passed through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Item list sent to the game each cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsPayload {
    /// Item identifiers
    pub items: Vec<i64>,
}

/// Response frame emitted by the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResponse {
    /// Player name reported by the game
    #[serde(rename = "Name")]
    pub name: String,

    /// Remaining fields, untouched
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}
