//! JSON codec for the persisted conversation blob.
//!
//! The blob shape is the one the browser client wrote to local storage:
//!
//! ```json
//! {"version":1,"messages":[{"id":"…","content":"…","role":"user","timestamp":"2024-05-01T09:00:00.000Z"}],
//!  "isLoading":false,"isDarkMode":true}
//! ```
//!
//! Timestamps travel as RFC 3339 strings and are parsed back into instants one
//! message at a time; a blob without `version` is treated as version 1.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::conversation::ids::MessageId;
use crate::conversation::message::{Message, Role};
use crate::conversation::state::{ConversationState, Theme};
use crate::persistence::error::DecodeError;

/// Schema version written by [`encode`].
pub const STATE_VERSION: u32 = 1;

const fn legacy_version() -> u32 {
    1
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    #[serde(default = "legacy_version")]
    version: u32,
    messages: Vec<PersistedMessage>,
    #[serde(default)]
    is_loading: bool,
    #[serde(default)]
    is_dark_mode: Option<bool>,
}

#[derive(Serialize, Deserialize)]
struct PersistedMessage {
    id: String,
    content: String,
    role: String,
    timestamp: String,
}

/// Serialize the full state. Image references are left out.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn encode(state: &ConversationState) -> Result<String, serde_json::Error> {
    let persisted = PersistedState {
        version: STATE_VERSION,
        messages: state
            .messages()
            .iter()
            .map(|message| PersistedMessage {
                id: message.id().to_string(),
                content: message.content().to_string(),
                role: message.role().as_str().to_string(),
                timestamp: message
                    .timestamp()
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            })
            .collect(),
        is_loading: state.is_loading(),
        is_dark_mode: Some(state.theme().is_dark()),
    };
    serde_json::to_string(&persisted)
}

/// Parse a blob back into state, rehydrating every message timestamp.
///
/// A leftover in-flight flag is dropped: the exchange it described died with the
/// previous process. `fallback_theme` applies when the blob has no theme flag.
///
/// # Errors
/// Returns an error if the blob is malformed or from an unknown schema version.
pub fn decode(raw: &str, fallback_theme: Theme) -> Result<ConversationState, DecodeError> {
    let persisted: PersistedState = serde_json::from_str(raw)?;

    if persisted.version != STATE_VERSION {
        return Err(DecodeError::UnsupportedVersion(persisted.version));
    }

    if persisted.is_loading {
        info!("clearing stale in-flight flag left by a previous session");
    }

    let mut seen = HashSet::with_capacity(persisted.messages.len());
    let mut messages = Vec::with_capacity(persisted.messages.len());
    for entry in persisted.messages {
        let message = rehydrate(entry)?;
        if seen.insert(message.id()) {
            messages.push(message);
        } else {
            warn!(id = %message.id(), "dropping duplicate message id from stored state");
        }
    }

    let theme = persisted
        .is_dark_mode
        .map_or(fallback_theme, Theme::from_dark_flag);

    Ok(ConversationState::restore(messages, theme))
}

fn rehydrate(entry: PersistedMessage) -> Result<Message, DecodeError> {
    let id: MessageId = entry
        .id
        .parse()
        .map_err(|_| DecodeError::InvalidId(entry.id.clone()))?;
    let role: Role = entry.role.parse().map_err(DecodeError::InvalidRole)?;
    let timestamp = DateTime::parse_from_rfc3339(&entry.timestamp)
        .map_err(|_| DecodeError::InvalidTimestamp {
            id: entry.id.clone(),
            value: entry.timestamp.clone(),
        })?
        .with_timezone(&Utc);

    Ok(Message::restore(id, entry.content, role, timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::message::ImageRef;
    use chrono::TimeZone;

    fn sample_state() -> ConversationState {
        let messages = vec![
            Message::restore(
                MessageId::new(),
                "hello",
                Role::User,
                Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            ),
            Message::restore(
                MessageId::new(),
                "# Hi\n\n```rust\nfn main() {}\n```",
                Role::Assistant,
                Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 3).unwrap(),
            ),
        ];
        ConversationState::restore(messages, Theme::Dark)
    }

    #[test]
    fn test_round_trip_preserves_state() {
        let state = sample_state();
        let raw = encode(&state).unwrap();
        let restored = decode(&raw, Theme::Light).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_round_trip_preserves_subsecond_timestamps() {
        let mut state = ConversationState::new(Theme::Light);
        state.push(Message::user("now", None));
        let restored = decode(&encode(&state).unwrap(), Theme::Light).unwrap();
        assert_eq!(
            restored.messages()[0].timestamp(),
            state.messages()[0].timestamp()
        );
    }

    #[test]
    fn test_images_are_not_persisted() {
        let mut state = ConversationState::new(Theme::Light);
        state.push(Message::user("look", Some(ImageRef::ephemeral("image/png"))));

        let raw = encode(&state).unwrap();
        assert!(!raw.contains("blob:"));

        let restored = decode(&raw, Theme::Light).unwrap();
        assert!(restored.messages()[0].image().is_none());
        assert_eq!(restored.messages()[0], state.messages()[0].without_image());
    }

    #[test]
    fn test_decodes_legacy_browser_blob() {
        let raw = r#"{
            "messages": [
                {"id": "0b5f3a52-8d0e-4c55-9a43-6d1f0f1f2a10", "content": "hi", "role": "user",
                 "timestamp": "2024-05-01T09:00:00.000Z", "image": "blob:http://localhost/abc"},
                {"id": "6c0f3a52-8d0e-4c55-9a43-6d1f0f1f2a11", "content": "hey bestie", "role": "assistant",
                 "timestamp": "2024-05-01T09:00:02.500Z"}
            ],
            "isLoading": true,
            "isDarkMode": false
        }"#;

        let state = decode(raw, Theme::Dark).unwrap();
        assert_eq!(state.messages().len(), 2);
        assert!(!state.is_loading());
        assert_eq!(state.theme(), Theme::Light);
        assert_eq!(
            state.messages()[1].timestamp(),
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 2).unwrap() + chrono::Duration::milliseconds(500)
        );
        assert!(state.messages()[0].image().is_none());
    }

    #[test]
    fn test_missing_theme_uses_fallback() {
        let state = decode(r#"{"messages": []}"#, Theme::Dark).unwrap();
        assert_eq!(state.theme(), Theme::Dark);
    }

    #[test]
    fn test_rejects_unparsable_timestamp() {
        let raw = r#"{"messages": [{"id": "0b5f3a52-8d0e-4c55-9a43-6d1f0f1f2a10",
            "content": "x", "role": "user", "timestamp": "yesterday"}]}"#;
        assert!(matches!(
            decode(raw, Theme::Light),
            Err(DecodeError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_role_and_version() {
        let bad_role = r#"{"messages": [{"id": "0b5f3a52-8d0e-4c55-9a43-6d1f0f1f2a10",
            "content": "x", "role": "system", "timestamp": "2024-05-01T09:00:00Z"}]}"#;
        assert!(matches!(
            decode(bad_role, Theme::Light),
            Err(DecodeError::InvalidRole(_))
        ));

        let future = r#"{"version": 2, "messages": []}"#;
        assert!(matches!(
            decode(future, Theme::Light),
            Err(DecodeError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_rejects_non_json() {
        assert!(matches!(
            decode("{not json", Theme::Light),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_keep_first_occurrence() {
        let raw = r#"{"messages": [
            {"id": "0b5f3a52-8d0e-4c55-9a43-6d1f0f1f2a10", "content": "first", "role": "user", "timestamp": "2024-05-01T09:00:00Z"},
            {"id": "0b5f3a52-8d0e-4c55-9a43-6d1f0f1f2a10", "content": "second", "role": "assistant", "timestamp": "2024-05-01T09:00:01Z"}
        ]}"#;
        let state = decode(raw, Theme::Light).unwrap();
        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.messages()[0].content(), "first");
    }
}
