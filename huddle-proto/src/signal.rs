//! Signaling wire protocol types for the Huddle relay server.
//!
//! Defines the [`ClientEvent`] and [`ServerEvent`] enums that are exchanged
//! as JSON text frames over WebSocket between browser clients and the relay.
//! Every frame is one envelope of the form `{"event": <name>, "data": {...}}`;
//! the serde renames below pin the exact wire names the dashboard emits.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events sent by a client to the relay.
///
/// Payload fields the relay never interprets (user profiles, chat messages,
/// SDP descriptors, ICE candidates) are carried as opaque [`Value`]s — the
/// relay only reads routing metadata. Disconnect has no wire representation;
/// it is the transport closing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Join a named room, implicitly creating it on first join.
    #[serde(rename = "joinRoom")]
    JoinRoom {
        /// Opaque room key; rooms are not pre-registered.
        #[serde(rename = "roomId")]
        room_id: String,
        /// Caller-supplied profile, forwarded verbatim to existing members.
        user: Value,
    },

    /// Broadcast a chat message to a room.
    #[serde(rename = "sendMessage")]
    SendMessage {
        #[serde(rename = "roomId")]
        room_id: String,
        message: Value,
    },

    /// Relay a WebRTC session offer to the other members of a room.
    #[serde(rename = "webrtc-offer")]
    Offer {
        #[serde(rename = "roomId")]
        room_id: String,
        offer: Value,
    },

    /// Relay a WebRTC session answer to the other members of a room.
    #[serde(rename = "webrtc-answer")]
    Answer {
        #[serde(rename = "roomId")]
        room_id: String,
        answer: Value,
    },

    /// Relay an ICE candidate to the other members of a room.
    #[serde(rename = "webrtc-ice-candidate")]
    IceCandidate {
        #[serde(rename = "roomId")]
        room_id: String,
        candidate: Value,
    },
}

/// Events sent by the relay to a client.
///
/// The `from` field on the peer-signaling variants is stamped by the relay
/// with the sender's registry-assigned connection id; clients never supply
/// it, so it cannot be spoofed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// A new member joined the room. Delivered to the existing members only.
    #[serde(rename = "user-joined")]
    UserJoined {
        /// Connection id of the joiner.
        #[serde(rename = "socketId")]
        socket_id: String,
        user: Value,
    },

    /// A chat message. Delivered to the whole room, sender included.
    #[serde(rename = "receiveMessage")]
    ReceiveMessage { message: Value },

    /// A WebRTC offer from the peer identified by `from`.
    #[serde(rename = "webrtc-offer")]
    Offer { offer: Value, from: String },

    /// A WebRTC answer from the peer identified by `from`.
    #[serde(rename = "webrtc-answer")]
    Answer { answer: Value, from: String },

    /// An ICE candidate from the peer identified by `from`.
    #[serde(rename = "webrtc-ice-candidate")]
    IceCandidate { candidate: Value, from: String },
}

impl ClientEvent {
    /// Returns the room the event addresses.
    #[must_use]
    pub fn room_id(&self) -> &str {
        match self {
            Self::JoinRoom { room_id, .. }
            | Self::SendMessage { room_id, .. }
            | Self::Offer { room_id, .. }
            | Self::Answer { room_id, .. }
            | Self::IceCandidate { room_id, .. } => room_id,
        }
    }
}
