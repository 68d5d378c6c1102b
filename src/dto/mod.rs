/// Health response.
pub mod health;
/// Lobby state as seen by viewers.
pub mod lobby;
/// Presence payloads pushed by the chat bridge.
pub mod presence;
/// Validation helpers.
pub mod validation;
/// WebSocket envelope and actions.
pub mod ws;
