use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the lobby backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::presence::publish_snapshot,
        crate::routes::presence::publish_voice_state,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::lobby::GameStateView,
            crate::dto::ws::Envelope,
            crate::dto::ws::SlotRequest,
            crate::dto::presence::ChannelSnapshotPayload,
            crate::dto::presence::VoiceStatePayload,
            crate::dto::presence::PresenceAck,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "lobby", description = "WebSocket session for lobby viewers"),
        (name = "presence", description = "Voice-channel presence fed by the chat bridge"),
    )
)]
/// OpenAPI document of the HTTP API.
pub struct ApiDoc;
