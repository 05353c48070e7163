use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Server-assigned identifier for one connection's lifetime.
///
/// Always carried as a string, both as a map key and as a field value, so
/// clients compare ids in a single representation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Last reported position of a player.
///
/// The floor variant (`{x, z}`) is used by the 3D viewer, the canvas variant
/// (`{x, y}`) by the 2D game. Whatever a client reports is stored and echoed
/// back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Position {
    Floor { x: f64, z: f64 },
    Canvas { x: f64, y: f64 },
}

impl Position {
    pub fn x(&self) -> f64 {
        match *self {
            Position::Floor { x, .. } | Position::Canvas { x, .. } => x,
        }
    }

    /// Second horizontal coordinate (`z` on the floor, `y` on the canvas).
    pub fn depth(&self) -> f64 {
        match *self {
            Position::Floor { z, .. } => z,
            Position::Canvas { y, .. } => y,
        }
    }

    /// Same variant, new coordinates.
    pub fn moved_to(&self, x: f64, depth: f64) -> Self {
        match self {
            Position::Floor { .. } => Position::Floor { x, z: depth },
            Position::Canvas { .. } => Position::Canvas { x, y: depth },
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x().is_finite() && self.depth().is_finite()
    }
}

/// Full id → position mapping as sent in every snapshot.
pub type Players = BTreeMap<ConnectionId, Position>;

// === Server -> Client ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once, right after the socket opens.
    Init { id: ConnectionId },
    /// Full snapshot of every connected player.
    Update { players: Players },
}

// === Client -> Server ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    Update {
        /// Echo of the client's own id. The server ignores it and uses the
        /// id bound to the connection.
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "lenient_id"
        )]
        id: Option<ConnectionId>,
        #[serde(flatten)]
        position: Position,
    },
    #[serde(other)]
    Unknown,
}

/// Older clients send the id back as a JSON number.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<ConnectionId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(ConnectionId(s)),
        serde_json::Value::Number(n) => Some(ConnectionId(n.to_string())),
        _ => None,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("malformed JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("invalid message: {0}")]
    Invalid(#[source] serde_json::Error),
    #[error("non-finite coordinates")]
    NonFinite,
}

/// Parse a text frame from a client.
///
/// Text that is not JSON at all is [`InboundError::Malformed`]. JSON that
/// does not fit the message schema, including an `update` without numeric
/// coordinates, is [`InboundError::Invalid`]. An unrecognized `type` parses
/// to [`ClientMsg::Unknown`].
pub fn parse_client_msg(text: &str) -> Result<ClientMsg, InboundError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(InboundError::Malformed)?;
    let msg = ClientMsg::deserialize(value).map_err(InboundError::Invalid)?;
    if let ClientMsg::Update { position, .. } = &msg {
        if !position.is_finite() {
            return Err(InboundError::NonFinite);
        }
    }
    Ok(msg)
}

/// Parse a text frame from the server.
pub fn parse_server_msg(text: &str) -> Result<ServerMsg, InboundError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(InboundError::Malformed)?;
    ServerMsg::deserialize(value).map_err(InboundError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn init_wire_shape() {
        let msg = ServerMsg::Init {
            id: ConnectionId::new("1001"),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"type": "init", "id": "1001"}));
    }

    #[test]
    fn update_snapshot_wire_shape() {
        let mut players = Players::new();
        players.insert(ConnectionId::new("1001"), Position::Floor { x: 5.0, z: -3.0 });
        players.insert(ConnectionId::new("1002"), Position::Canvas { x: 1.0, y: 2.0 });
        let value = serde_json::to_value(&ServerMsg::Update { players }).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "update",
                "players": {
                    "1001": {"x": 5.0, "z": -3.0},
                    "1002": {"x": 1.0, "y": 2.0}
                }
            })
        );
    }

    #[test]
    fn parses_floor_update_with_numeric_id() {
        let msg = parse_client_msg(r#"{"type":"update","id":1001,"x":5,"z":-3}"#).unwrap();
        assert_eq!(
            msg,
            ClientMsg::Update {
                id: Some(ConnectionId::new("1001")),
                position: Position::Floor { x: 5.0, z: -3.0 },
            }
        );
    }

    #[test]
    fn parses_canvas_update_without_id() {
        let msg = parse_client_msg(r#"{"type":"update","x":0.5,"y":12}"#).unwrap();
        assert_eq!(
            msg,
            ClientMsg::Update {
                id: None,
                position: Position::Canvas { x: 0.5, y: 12.0 },
            }
        );
    }

    #[test]
    fn client_update_serializes_flat() {
        let msg = ClientMsg::Update {
            id: Some(ConnectionId::new("7")),
            position: Position::Floor { x: 1.5, z: 2.0 },
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"type": "update", "id": "7", "x": 1.5, "z": 2.0}));
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let msg = parse_client_msg(r#"{"type":"chat","text":"hi"}"#).unwrap();
        assert_eq!(msg, ClientMsg::Unknown);
    }

    #[test]
    fn garbage_is_malformed() {
        let err = parse_client_msg("not valid json").unwrap_err();
        assert!(matches!(err, InboundError::Malformed(_)));
    }

    #[test]
    fn update_missing_coordinate_is_invalid() {
        let err = parse_client_msg(r#"{"type":"update","x":1}"#).unwrap_err();
        assert!(matches!(err, InboundError::Invalid(_)));
    }

    #[test]
    fn update_with_string_coordinates_is_invalid() {
        let err = parse_client_msg(r#"{"type":"update","x":"1","z":"2"}"#).unwrap_err();
        assert!(matches!(err, InboundError::Invalid(_)));
    }

    #[test]
    fn missing_type_is_invalid() {
        let err = parse_client_msg(r#"{"x":1,"z":2}"#).unwrap_err();
        assert!(matches!(err, InboundError::Invalid(_)));
    }

    #[test]
    fn server_msgs_parse_back() {
        let msg = parse_server_msg(r#"{"type":"update","players":{"42":{"x":1,"z":2}}}"#).unwrap();
        match msg {
            ServerMsg::Update { players } => {
                assert_eq!(
                    players.get(&ConnectionId::new("42")),
                    Some(&Position::Floor { x: 1.0, z: 2.0 })
                );
            }
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn moved_to_keeps_variant() {
        let p = Position::Canvas { x: 0.0, y: 0.0 }.moved_to(3.0, 4.0);
        assert_eq!(p, Position::Canvas { x: 3.0, y: 4.0 });
        assert_eq!(p.x(), 3.0);
        assert_eq!(p.depth(), 4.0);
    }
}
