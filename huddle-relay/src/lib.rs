//! Huddle relay server library.
//!
//! Exposes the relay server for use in tests and embedding. The relay
//! accepts WebSocket connections, tracks room membership, and fans chat and
//! WebRTC signaling events out to room members; a small HTTP collaborator
//! handles file uploads alongside it.

pub mod config;
pub mod registry;
pub mod relay;
pub mod upload;
