//! Multiworld server packets
//!
//! Every websocket text message carries a JSON array of packets, each an
//! object discriminated by its `cmd` field. Only the packets needed to get a
//! slot connected are modelled; anything else decodes as
//! [`ServerPacket::Unhandled`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Game name announced to the server
pub const GAME_NAME: &str = "AM2R";

/// Items handling flags: remote items from other worlds only
pub const ITEMS_HANDLING: u8 = 0b001;

// ─────────────────────────────────────────────────────────────────
// Client → Server
// ─────────────────────────────────────────────────────────────────

/// Protocol version triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    #[serde(default = "version_class")]
    pub class: String,
}

fn version_class() -> String {
    "Version".to_string()
}

impl Default for NetworkVersion {
    fn default() -> Self {
        Self {
            major: 0,
            minor: 4,
            build: 4,
            class: version_class(),
        }
    }
}

/// Packets sent by the connector
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "cmd")]
pub enum ClientPacket {
    /// Slot connection request
    Connect(ConnectPacket),
}

/// Body of a `Connect` packet
#[derive(Debug, Clone, Serialize)]
pub struct ConnectPacket {
    pub password: String,
    pub game: String,
    pub name: String,
    pub uuid: Uuid,
    pub version: NetworkVersion,
    pub items_handling: u8,
    pub tags: Vec<String>,
    pub slot_data: bool,
}

impl ConnectPacket {
    /// Build a connect request for the given slot
    pub fn new(slot_name: impl Into<String>, password: Option<&str>, uuid: Uuid) -> Self {
        Self {
            password: password.unwrap_or_default().to_string(),
            game: GAME_NAME.to_string(),
            name: slot_name.into(),
            uuid,
            version: NetworkVersion::default(),
            items_handling: ITEMS_HANDLING,
            tags: vec![],
            slot_data: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Server → Client
// ─────────────────────────────────────────────────────────────────

/// Packets received from the server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd")]
pub enum ServerPacket {
    /// First packet after the websocket opens
    RoomInfo {
        /// Whether the room requires a password
        #[serde(default)]
        password: bool,
        #[serde(default)]
        seed_name: Option<String>,
    },

    /// Slot accepted
    Connected { team: i64, slot: i64 },

    /// Slot rejected
    ConnectionRefused {
        #[serde(default)]
        errors: Vec<String>,
    },

    /// Anything this client does not act on
    #[serde(other)]
    Unhandled,
}

impl ServerPacket {
    /// Short name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            ServerPacket::RoomInfo { .. } => "RoomInfo",
            ServerPacket::Connected { .. } => "Connected",
            ServerPacket::ConnectionRefused { .. } => "ConnectionRefused",
            ServerPacket::Unhandled => "Unhandled",
        }
    }
}

/// Encode a batch of client packets as one websocket message
pub fn encode_packets(packets: &[ClientPacket]) -> serde_json::Result<String> {
    serde_json::to_string(packets)
}

/// Decode one websocket message into its packets
pub fn decode_packets(text: &str) -> serde_json::Result<Vec<ServerPacket>> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_connect_packet_encoding() {
        let uuid = Uuid::new_v4();
        let packet = ClientPacket::Connect(ConnectPacket::new("Samus", None, uuid));
        let text = encode_packets(&[packet]).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value[0]["cmd"], "Connect");
        assert_eq!(value[0]["game"], "AM2R");
        assert_eq!(value[0]["name"], "Samus");
        assert_eq!(value[0]["password"], "");
        assert_eq!(value[0]["items_handling"], 1);
        assert_eq!(value[0]["uuid"], uuid.to_string());
        assert_eq!(value[0]["version"]["class"], "Version");
    }

    #[test]
    fn test_decode_room_info_and_unknown() {
        let text = json!([
            { "cmd": "RoomInfo", "password": true, "seed_name": "abc", "tags": [] },
            { "cmd": "PrintJSON", "data": [] }
        ])
        .to_string();

        let packets = decode_packets(&text).unwrap();
        assert_eq!(packets.len(), 2);
        assert!(matches!(packets[0], ServerPacket::RoomInfo { password: true, .. }));
        assert!(matches!(packets[1], ServerPacket::Unhandled));
    }

    #[test]
    fn test_decode_connection_refused() {
        let text = r#"[{"cmd":"ConnectionRefused","errors":["InvalidSlot"]}]"#;
        let packets = decode_packets(text).unwrap();
        match &packets[0] {
            ServerPacket::ConnectionRefused { errors } => assert_eq!(errors, &["InvalidSlot"]),
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_non_array() {
        assert!(decode_packets(r#"{"cmd":"RoomInfo"}"#).is_err());
    }
}
