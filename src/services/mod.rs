/// OpenAPI documentation generation.
pub mod documentation;
/// Role and champion assignment for one roll.
pub mod draft;
/// Health check service.
pub mod health_service;
/// League reference data refresh.
pub mod league_sync;
/// Lobby actions: roster edits, rolls, cancel, reset and the roll timer.
pub mod lobby_service;
/// Presence event consumer feeding the roster.
pub mod presence_listener;
/// Validation and publication of presence pushed over HTTP.
pub mod presence_service;
/// Roster reconciliation against voice-channel membership.
pub mod roster;
/// Lobby state messages for viewers.
pub mod state_events;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
