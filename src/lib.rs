//! Library crate for loi-back: a live lobby that assigns random roles and
//! champions to the members of a voice channel and keeps every viewer in sync.

pub mod config;
/// Persistence layer.
pub mod dao;
/// Wire types for HTTP and WebSocket payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
pub mod presence;
/// HTTP route trees.
pub mod routes;
/// Lobby logic and background tasks.
pub mod services;
/// Shared application state.
pub mod state;
