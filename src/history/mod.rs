//! History panel view-model: recency buckets, relative ages and previews.

pub mod grouping;
pub mod relative;

use chrono::{DateTime, TimeZone};

use crate::conversation::ids::MessageId;
use crate::conversation::message::{Message, Role};

pub use grouping::{HistoryBucket, HistoryGroup, group_by_recency};
pub use relative::{describe_age, preview};

/// Default preview length for history rows.
pub const DEFAULT_PREVIEW_CHARS: usize = 80;

/// One row of the history panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Message the row points at.
    pub id: MessageId,
    /// Author of the message.
    pub role: Role,
    /// Single-line content preview.
    pub preview: String,
    /// Relative age, e.g. `"5 minutes ago"`.
    pub age: String,
}

/// Rows of one bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistorySection {
    /// Bucket label.
    pub label: &'static str,
    /// Rows in transcript order.
    pub entries: Vec<HistoryEntry>,
}

/// Full history panel for `messages` as seen at `now`.
#[must_use]
pub fn history_sections<Tz>(
    messages: &[Message],
    now: &DateTime<Tz>,
    preview_chars: usize,
) -> Vec<HistorySection>
where
    Tz: TimeZone,
{
    group_by_recency(messages, now)
        .into_iter()
        .map(|group| HistorySection {
            label: group.label(),
            entries: group
                .messages
                .into_iter()
                .map(|message| HistoryEntry {
                    id: message.id(),
                    role: message.role(),
                    preview: preview(message.content(), preview_chars),
                    age: describe_age(&message.timestamp(), now),
                })
                .collect(),
        })
        .collect()
}
