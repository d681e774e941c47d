//! Date buckets for the history panel.

use std::fmt;

use chrono::{DateTime, TimeZone};

use crate::conversation::message::Message;

/// Recency bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HistoryBucket {
    /// Same calendar date as `now`.
    Today,
    /// The calendar date before `now`.
    Yesterday,
    /// Any other date, including dates after `now`.
    Older,
}

impl HistoryBucket {
    /// Buckets in display order.
    pub const ORDER: [Self; 3] = [Self::Today, Self::Yesterday, Self::Older];

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Today => "Today",
            Self::Yesterday => "Yesterday",
            Self::Older => "Older",
        }
    }

    /// Bucket of `timestamp`, using calendar dates in the time zone of `now`.
    #[must_use]
    pub fn classify<Tz, Tz2>(timestamp: &DateTime<Tz2>, now: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz2: TimeZone,
    {
        let today = now.date_naive();
        let date = timestamp.with_timezone(&now.timezone()).date_naive();
        if date == today {
            Self::Today
        } else if today.pred_opt() == Some(date) {
            Self::Yesterday
        } else {
            Self::Older
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Today => 0,
            Self::Yesterday => 1,
            Self::Older => 2,
        }
    }
}

impl fmt::Display for HistoryBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Messages of one bucket, in transcript order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryGroup<'a> {
    /// Bucket of every message in the group.
    pub bucket: HistoryBucket,
    /// Messages in transcript order.
    pub messages: Vec<&'a Message>,
}

impl HistoryGroup<'_> {
    /// Display label of the bucket.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.bucket.label()
    }
}

/// Partition `messages` into recency buckets relative to `now`.
///
/// Groups come out in `Today, Yesterday, Older` order and empty groups are
/// omitted. Every message lands in exactly one group.
#[must_use]
pub fn group_by_recency<'a, Tz>(
    messages: &'a [Message],
    now: &DateTime<Tz>,
) -> Vec<HistoryGroup<'a>>
where
    Tz: TimeZone,
{
    let mut buckets: [Vec<&'a Message>; 3] = Default::default();
    for message in messages {
        let bucket = HistoryBucket::classify(&message.timestamp(), now);
        buckets[bucket.index()].push(message);
    }

    HistoryBucket::ORDER
        .into_iter()
        .zip(buckets)
        .filter(|(_, messages)| !messages.is_empty())
        .map(|(bucket, messages)| HistoryGroup { bucket, messages })
        .collect()
}
