//! Root conversation aggregate.

use serde::{Deserialize, Serialize};

use crate::conversation::message::Message;

/// Colour scheme flag shown by the view layer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    /// Light background.
    #[default]
    Light,
    /// Dark background.
    Dark,
}

impl Theme {
    /// The opposite theme.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    /// Whether this is the dark theme.
    #[must_use]
    pub const fn is_dark(self) -> bool {
        matches!(self, Self::Dark)
    }

    /// Map the persisted boolean flag back to a theme.
    #[must_use]
    pub const fn from_dark_flag(dark: bool) -> Self {
        if dark { Self::Dark } else { Self::Light }
    }
}

/// Ordered transcript plus the derived UI flags.
///
/// Messages are kept in creation order and are never re-sorted. Mutation goes
/// through [`crate::conversation::store::ConversationStore`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationState {
    messages: Vec<Message>,
    loading: bool,
    theme: Theme,
}

impl ConversationState {
    /// Fresh, empty state.
    #[must_use]
    pub const fn new(theme: Theme) -> Self {
        Self {
            messages: Vec::new(),
            loading: false,
            theme,
        }
    }

    /// Rebuild a state from hydrated parts. The loading flag always starts cleared.
    #[must_use]
    pub const fn restore(messages: Vec<Message>, theme: Theme) -> Self {
        Self {
            messages,
            loading: false,
            theme,
        }
    }

    /// Transcript in display order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// True while an exchange is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Current theme.
    #[must_use]
    pub const fn theme(&self) -> Theme {
        self.theme
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub(crate) const fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub(crate) const fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
    }

    pub(crate) fn clear_messages(&mut self) {
        self.messages.clear();
    }

    /// Drop the oldest messages so at most `max` remain. Returns the evicted messages.
    pub(crate) fn evict_oldest(&mut self, max: usize) -> Vec<Message> {
        let excess = self.messages.len().saturating_sub(max);
        self.messages.drain(..excess).collect()
    }
}
