use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

use crate::dto::lobby::GameStateView;

const UPDATE_PLAYERS: &str = "updatePlayers";
const ROLL: &str = "roll";
const CANCEL: &str = "cancel";
const RESET: &str = "reset";
const REFRESH_DISCORD: &str = "refreshDiscord";
const UPDATE_STATE: &str = "updateState";

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
/// Symmetric `{action, content}` envelope exchanged over the viewer socket.
///
/// `content` travels as a JSON-encoded string; inbound messages may also carry
/// it as a raw JSON value.
pub struct Envelope {
    /// Message type, e.g. `roll` or `updateState`.
    pub action: String,
    /// Action payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub content: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
/// One entry of an `updatePlayers` request.
pub struct SlotRequest {
    /// Requested occupant id; empty for an unfilled slot.
    #[serde(default)]
    pub id: String,
    /// Ignored by the server; names come from the voice-channel roster.
    #[serde(default)]
    pub name: Option<String>,
}

/// Actions a viewer may submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Rebuild the slots from the given list.
    UpdatePlayers(Vec<SlotRequest>),
    /// Draft roles and champions.
    Roll,
    /// Delete the current game and reset the lobby.
    Cancel,
    /// Close the current game and unlock rolling.
    Reset,
    /// Re-read the voice channel.
    RefreshDiscord,
}

/// Reasons an inbound frame is dropped.
#[derive(Debug, Error)]
pub enum InboundError {
    /// Frame is not a valid envelope.
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),
    /// Action name not supported.
    #[error("unsupported action `{0}`")]
    UnknownAction(String),
    /// Content required but absent.
    #[error("`updatePlayers` message without content")]
    MissingContent,
    /// Content does not match the action.
    #[error("invalid `{action}` content: {source}")]
    InvalidContent {
        /// Action being decoded.
        action: &'static str,
        /// Decoding error.
        #[source]
        source: serde_json::Error,
    },
}

impl ClientAction {
    /// Parse a text frame received from a viewer.
    pub fn from_json_str(text: &str) -> Result<Self, InboundError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(InboundError::Malformed)?;

        match envelope.action.as_str() {
            UPDATE_PLAYERS => {
                let content = envelope.content.ok_or(InboundError::MissingContent)?;
                let entries = match content {
                    Value::String(raw) => serde_json::from_str(&raw),
                    other => serde_json::from_value(other),
                }
                .map_err(|source| InboundError::InvalidContent {
                    action: UPDATE_PLAYERS,
                    source,
                })?;
                Ok(ClientAction::UpdatePlayers(entries))
            }
            ROLL => Ok(ClientAction::Roll),
            CANCEL => Ok(ClientAction::Cancel),
            RESET => Ok(ClientAction::Reset),
            REFRESH_DISCORD => Ok(ClientAction::RefreshDiscord),
            other => Err(InboundError::UnknownAction(other.to_owned())),
        }
    }

    /// Wire name of the action.
    pub fn name(&self) -> &'static str {
        match self {
            ClientAction::UpdatePlayers(_) => UPDATE_PLAYERS,
            ClientAction::Roll => ROLL,
            ClientAction::Cancel => CANCEL,
            ClientAction::Reset => RESET,
            ClientAction::RefreshDiscord => REFRESH_DISCORD,
        }
    }
}

/// Encode an `updateState` message carrying `view`.
pub fn update_state_message(view: &GameStateView) -> Result<String, serde_json::Error> {
    let content = serde_json::to_string(view)?;
    serde_json::to_string(&Envelope {
        action: UPDATE_STATE.to_owned(),
        content: Some(Value::String(content)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::GameState;

    #[test]
    fn update_players_accepts_string_encoded_content() {
        let text = r#"{"action":"updatePlayers","content":"[{\"id\":\"p1\"},{\"id\":\"p2\",\"name\":\"Bob\"}]"}"#;
        let action = ClientAction::from_json_str(text).unwrap();
        assert_eq!(
            action,
            ClientAction::UpdatePlayers(vec![
                SlotRequest {
                    id: "p1".into(),
                    name: None
                },
                SlotRequest {
                    id: "p2".into(),
                    name: Some("Bob".into())
                },
            ])
        );
    }

    #[test]
    fn update_players_accepts_raw_array_content() {
        let text = r#"{"action":"updatePlayers","content":[{"id":"p1"}]}"#;
        assert!(matches!(
            ClientAction::from_json_str(text).unwrap(),
            ClientAction::UpdatePlayers(entries) if entries.len() == 1
        ));
    }

    #[test]
    fn bare_actions_need_no_content() {
        for (text, expected) in [
            (r#"{"action":"roll"}"#, ClientAction::Roll),
            (r#"{"action":"cancel"}"#, ClientAction::Cancel),
            (r#"{"action":"reset","content":""}"#, ClientAction::Reset),
            (r#"{"action":"refreshDiscord"}"#, ClientAction::RefreshDiscord),
        ] {
            assert_eq!(ClientAction::from_json_str(text).unwrap(), expected);
        }
    }

    #[test]
    fn noise_is_reported_not_accepted() {
        assert!(matches!(
            ClientAction::from_json_str("not json"),
            Err(InboundError::Malformed(_))
        ));
        assert!(matches!(
            ClientAction::from_json_str(r#"{"action":"updateState"}"#),
            Err(InboundError::UnknownAction(action)) if action == "updateState"
        ));
        assert!(matches!(
            ClientAction::from_json_str(r#"{"action":"updatePlayers"}"#),
            Err(InboundError::MissingContent)
        ));
        assert!(matches!(
            ClientAction::from_json_str(r#"{"action":"updatePlayers","content":"{oops"}"#),
            Err(InboundError::InvalidContent { .. })
        ));
    }

    #[test]
    fn update_state_wraps_view_as_string_content() {
        let view = GameStateView::from(&GameState::default());
        let message = update_state_message(&view).unwrap();
        let envelope: Envelope = serde_json::from_str(&message).unwrap();
        assert_eq!(envelope.action, "updateState");

        let Some(Value::String(content)) = envelope.content else {
            panic!("content should be a JSON string");
        };
        let decoded: GameStateView = serde_json::from_str(&content).unwrap();
        assert_eq!(decoded, view);
    }
}
