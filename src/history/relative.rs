//! Human-readable message ages and one-line previews.

use chrono::{DateTime, TimeZone};

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 1_440;
const MINUTES_PER_MONTH: i64 = 43_200;

/// Relative age of `timestamp` seen from `now`, e.g. `"about 2 hours ago"`.
///
/// Thresholds follow the common "distance to now" wording: under a minute,
/// minutes up to 45, "about N hours" up to a day, days up to a month, then
/// months and years. Months are counted as 30 days.
#[must_use]
pub fn describe_age<Tz, Tz2>(timestamp: &DateTime<Tz>, now: &DateTime<Tz2>) -> String
where
    Tz: TimeZone,
    Tz2: TimeZone,
{
    let seconds = now.clone().signed_duration_since(timestamp).num_seconds();
    let distance = distance_words(seconds.unsigned_abs());
    if seconds >= 0 {
        format!("{distance} ago")
    } else {
        format!("in {distance}")
    }
}

fn distance_words(seconds: u64) -> String {
    let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
    let minutes = (seconds + 30) / 60;

    if minutes < 1 {
        return "less than a minute".to_string();
    }
    if minutes < 45 {
        return plural(minutes, "minute");
    }
    if minutes < 90 {
        return "about 1 hour".to_string();
    }
    if minutes < MINUTES_PER_DAY {
        let hours = (minutes + MINUTES_PER_HOUR / 2) / MINUTES_PER_HOUR;
        return format!("about {}", plural(hours, "hour"));
    }
    if minutes < 2_520 {
        return "1 day".to_string();
    }
    if minutes < MINUTES_PER_MONTH {
        let days = (minutes + MINUTES_PER_DAY / 2) / MINUTES_PER_DAY;
        return plural(days, "day");
    }
    if minutes < 2 * MINUTES_PER_MONTH {
        let months = (minutes + MINUTES_PER_MONTH / 2) / MINUTES_PER_MONTH;
        return format!("about {}", plural(months, "month"));
    }

    let months = minutes / MINUTES_PER_MONTH;
    if months < 12 {
        return plural(months, "month");
    }

    let years = months / 12;
    match months % 12 {
        0..=2 => format!("about {}", plural(years, "year")),
        3..=8 => format!("over {}", plural(years, "year")),
        _ => format!("almost {}", plural(years + 1, "year")),
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// Single-line preview of `content`, at most `max_chars` characters.
///
/// Whitespace runs collapse to one space; truncated previews end with `…`.
#[must_use]
pub fn preview(content: &str, max_chars: usize) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    if max_chars == 0 {
        return String::new();
    }

    let mut out: String = collapsed.chars().take(max_chars - 1).collect();
    out.truncate(out.trim_end().len());
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn ago(delta: Duration) -> String {
        let now = Utc::now();
        describe_age(&(now - delta), &now)
    }

    #[test]
    fn test_short_distances() {
        assert_eq!(ago(Duration::seconds(10)), "less than a minute ago");
        assert_eq!(ago(Duration::seconds(60)), "1 minute ago");
        assert_eq!(ago(Duration::minutes(5)), "5 minutes ago");
        assert_eq!(ago(Duration::minutes(50)), "about 1 hour ago");
    }

    #[test]
    fn test_hours_and_days() {
        assert_eq!(ago(Duration::hours(2)), "about 2 hours ago");
        assert_eq!(ago(Duration::hours(30)), "1 day ago");
        assert_eq!(ago(Duration::days(3)), "3 days ago");
    }

    #[test]
    fn test_months_and_years() {
        assert_eq!(ago(Duration::days(45)), "about 2 months ago");
        assert_eq!(ago(Duration::days(100)), "3 months ago");
        assert_eq!(ago(Duration::days(370)), "about 1 year ago");
        assert_eq!(ago(Duration::days(365 + 150)), "over 1 year ago");
        assert_eq!(ago(Duration::days(365 + 320)), "almost 2 years ago");
    }

    #[test]
    fn test_future_timestamps_use_in() {
        let now = Utc::now();
        assert_eq!(describe_age(&(now + Duration::minutes(5)), &now), "in 5 minutes");
    }

    #[test]
    fn test_preview_collapses_and_truncates() {
        assert_eq!(preview("hello\n\n  world", 40), "hello world");
        assert_eq!(preview("abcdef ghijkl", 8), "abcdef…");
        assert_eq!(preview("éééééé", 3), "éé…");
        assert_eq!(preview("anything", 0), "");
    }
}
