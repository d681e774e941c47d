//! Transcript message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::conversation::ids::MessageId;

/// Author of a transcript message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Text typed by the person using the client.
    User,
    /// Reply produced by the model, or a formatted exchange error.
    Assistant,
}

impl Role {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(value.to_string()),
        }
    }
}

/// Ephemeral locator for an image attached to a user message.
///
/// The handle only resolves while the session that created it is alive, so it is
/// never written to durable storage.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ImageRef {
    handle: String,
    media_type: String,
}

impl ImageRef {
    /// Mint a fresh `blob:` style handle for an image of the given media type.
    #[must_use]
    pub fn ephemeral(media_type: impl Into<String>) -> Self {
        Self {
            handle: format!("blob:{}", uuid::Uuid::new_v4()),
            media_type: media_type.into(),
        }
    }

    /// Opaque handle string.
    #[must_use]
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Declared media type, e.g. `image/png`.
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }
}

/// One transcript entry.
///
/// Fields are private: identifier, role and timestamp are fixed at creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    content: String,
    role: Role,
    timestamp: DateTime<Utc>,
    image: Option<ImageRef>,
}

impl Message {
    /// Build a user message stamped with the current time.
    #[must_use]
    pub fn user(content: impl Into<String>, image: Option<ImageRef>) -> Self {
        Self {
            id: MessageId::new(),
            content: content.into(),
            role: Role::User,
            timestamp: Utc::now(),
            image,
        }
    }

    /// Build an assistant message stamped with the current time.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            content: content.into(),
            role: Role::Assistant,
            timestamp: Utc::now(),
            image: None,
        }
    }

    /// Rebuild a message from stored parts. Restored messages carry no image.
    #[must_use]
    pub fn restore(
        id: MessageId,
        content: impl Into<String>,
        role: Role,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            content: content.into(),
            role,
            timestamp,
            image: None,
        }
    }

    /// Message identifier.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Raw content; assistant content may contain markdown.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Author role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Creation instant.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Attached image, if any.
    #[must_use]
    pub const fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    /// Whether the message was authored by the user.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Copy of this message without its image reference.
    #[must_use]
    pub fn without_image(&self) -> Self {
        Self {
            image: None,
            ..self.clone()
        }
    }
}
