use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::presence::{ChannelSnapshotPayload, PresenceAck, VoiceStatePayload},
    error::AppError,
    services::presence_service,
    state::SharedState,
};

#[utoipa::path(
    post,
    path = "/presence/snapshot",
    tag = "presence",
    request_body = ChannelSnapshotPayload,
    responses(
        (status = 200, description = "Snapshot published", body = PresenceAck),
        (status = 400, description = "Invalid snapshot")
    )
)]
/// Publish the full membership of a voice channel.
pub async fn publish_snapshot(
    State(state): State<SharedState>,
    Json(payload): Json<ChannelSnapshotPayload>,
) -> Result<Json<PresenceAck>, AppError> {
    Ok(Json(presence_service::ingest_snapshot(&state, payload).await?))
}

#[utoipa::path(
    post,
    path = "/presence/voice-state",
    tag = "presence",
    request_body = VoiceStatePayload,
    responses(
        (status = 200, description = "Voice-state change published", body = PresenceAck),
        (status = 400, description = "Invalid voice-state change")
    )
)]
/// Publish a member joining, leaving or moving between voice channels.
pub async fn publish_voice_state(
    State(state): State<SharedState>,
    Json(payload): Json<VoiceStatePayload>,
) -> Result<Json<PresenceAck>, AppError> {
    Ok(Json(
        presence_service::ingest_voice_state(&state, payload).await?,
    ))
}

/// Configure the presence ingestion routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/presence/snapshot", post(publish_snapshot))
        .route("/presence/voice-state", post(publish_voice_state))
}
