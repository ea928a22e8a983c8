//! Opening-hours status resolver.
//!
//! Turns a place's weekly hours (one `"<Weekday>: <description>"` line per
//! day, as published by the places API) into a live status such as
//! "Open" or "Closing Soon". Wall-clock comparison happens in the timezone
//! of the instant passed in, so a `DateTime<Utc>` compares against UTC and
//! a `DateTime<Tz>` against the place's local clock.
//!
//! Never fails: anything it cannot read resolves to
//! [`OpenStatus::Unavailable`].

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// En dash between the opening and closing time (not a hyphen).
const RANGE_SEPARATOR: char = '\u{2013}';

/// How far ahead "Opening Soon" / "Closing Soon" look.
const SOON_WINDOW_MINUTES: i64 = 60;

const OPEN_ALL_DAY: &str = "Open 24 hours";
const CLOSED_ALL_DAY: &str = "Closed";

// ─── Status ──────────────────────────────────────────────────────

/// The derived "open now" status of a place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpenStatus {
    #[serde(rename = "Open")]
    Open,
    #[serde(rename = "Closed")]
    Closed,
    #[serde(rename = "Opening Soon")]
    OpeningSoon,
    #[serde(rename = "Closing Soon")]
    ClosingSoon,
    #[serde(rename = "Open 24 hours")]
    Open24Hours,
    #[serde(rename = "Daily hours not available")]
    Unavailable,
}

impl OpenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Closed => "Closed",
            Self::OpeningSoon => "Opening Soon",
            Self::ClosingSoon => "Closing Soon",
            Self::Open24Hours => "Open 24 hours",
            Self::Unavailable => "Daily hours not available",
        }
    }

    /// Precedence when several ranges disagree. A range about to close wins
    /// over one about to open, even when the next shift starts right after.
    fn rank(&self) -> u8 {
        match self {
            Self::Open24Hours => 5,
            Self::Open => 4,
            Self::ClosingSoon => 3,
            Self::OpeningSoon => 2,
            Self::Closed => 1,
            Self::Unavailable => 0,
        }
    }
}

impl Default for OpenStatus {
    fn default() -> Self {
        Self::Unavailable
    }
}

impl fmt::Display for OpenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Weekly hours ────────────────────────────────────────────────

/// Weekday-prefixed hour descriptions, e.g. `"Monday: 9:00 AM – 5:00 PM"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklyHours(Vec<String>);

impl WeeklyHours {
    pub fn new(lines: Vec<String>) -> Self {
        Self(lines)
    }

    pub fn lines(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first line starting with the full English weekday name (case-sensitive).
    pub fn entry_for(&self, weekday: Weekday) -> Option<&str> {
        let name = weekday_name(weekday);
        self.0
            .iter()
            .map(String::as_str)
            .find(|line| line.starts_with(name))
    }
}

impl<S: Into<String>> FromIterator<S> for WeeklyHours {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Text after the first colon, trimmed.
fn description_of(line: &str) -> Option<&str> {
    line.split_once(':').map(|(_, rest)| rest.trim())
}

// ─── Resolution ──────────────────────────────────────────────────

/// Resolve the status of a place at `now`, read on the clock of `now`'s timezone.
pub fn resolve<Tz: TimeZone>(hours: Option<&WeeklyHours>, now: &DateTime<Tz>) -> OpenStatus {
    let Some(hours) = hours else {
        return OpenStatus::Unavailable;
    };
    let local = now.naive_local();
    let today = local.date();

    let status = match hours.entry_for(today.weekday()).and_then(description_of) {
        Some(description) => resolve_description(description, today, local),
        None => return OpenStatus::Unavailable,
    };
    if matches!(status, OpenStatus::Open24Hours | OpenStatus::Unavailable) {
        return status;
    }

    // A range that started yesterday and runs past midnight competes with today's.
    match overnight_carry(hours, today, local) {
        Some(carried) if carried.rank() > status.rank() => carried,
        _ => status,
    }
}

/// Resolve a single day's description (`"9:00 AM – 5:00 PM"`, `"Closed"`, ...)
/// whose times are anchored on `date`.
pub fn resolve_description(description: &str, date: NaiveDate, now: NaiveDateTime) -> OpenStatus {
    match description.trim() {
        OPEN_ALL_DAY => OpenStatus::Open24Hours,
        CLOSED_ALL_DAY => OpenStatus::Closed,
        ranges => {
            let mut best: Option<OpenStatus> = None;
            for range in ranges.split(',') {
                let Some((open, close)) = parse_range(range, date) else {
                    return OpenStatus::Unavailable;
                };
                let status = range_status(open, close, now);
                best = match best {
                    Some(current) if current.rank() >= status.rank() => Some(current),
                    _ => Some(status),
                };
            }
            best.unwrap_or(OpenStatus::Unavailable)
        }
    }
}

fn range_status(open: NaiveDateTime, close: NaiveDateTime, now: NaiveDateTime) -> OpenStatus {
    let soon = now + Duration::minutes(SOON_WINDOW_MINUTES);
    if now < open {
        if soon > open {
            OpenStatus::OpeningSoon
        } else {
            OpenStatus::Closed
        }
    } else if now > close {
        OpenStatus::Closed
    } else if soon > close {
        OpenStatus::ClosingSoon
    } else {
        OpenStatus::Open
    }
}

fn overnight_carry(hours: &WeeklyHours, today: NaiveDate, now: NaiveDateTime) -> Option<OpenStatus> {
    let yesterday = today.pred_opt()?;
    let description = hours
        .entry_for(yesterday.weekday())
        .and_then(description_of)?;
    description
        .split(',')
        .filter_map(|range| parse_range(range, yesterday))
        .find(|&(open, close)| close.date() > yesterday && open <= now && now < close)
        .map(|(open, close)| range_status(open, close, now))
}

/// Parse `"<open> – <close>"` into datetimes on `date`. A closing time at or
/// before the opening time (e.g. `12:00 AM`) falls on the following day.
fn parse_range(range: &str, date: NaiveDate) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let (open_token, close_token) = range.split_once(RANGE_SEPARATOR)?;
    let close_time = parse_clock(close_token)?;
    let open_time = match meridiem(open_token) {
        Some(_) => parse_clock(open_token)?,
        // "5:00 – 10:00 PM": the opening time borrows the closing meridiem
        None => {
            let borrowed = meridiem(close_token)?;
            parse_clock(&format!("{} {}", normalize(open_token), borrowed))?
        }
    };

    let open = date.and_time(open_time);
    let mut close = date.and_time(close_time);
    if close <= open {
        close += Duration::days(1);
    }
    Some((open, close))
}

/// Collapse any run of whitespace (including the narrow no-break spaces the
/// places API puts before AM/PM) into a single ASCII space.
fn normalize(token: &str) -> String {
    token.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn meridiem(token: &str) -> Option<&'static str> {
    let upper = normalize(token).to_ascii_uppercase();
    if upper.ends_with("AM") {
        Some("AM")
    } else if upper.ends_with("PM") {
        Some("PM")
    } else {
        None
    }
}

/// 12-hour clock `h:mm AM/PM`.
fn parse_clock(token: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(&normalize(token), "%I:%M %p").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chrono_tz::America::New_York;

    fn week(overrides: &[(&str, &str)]) -> WeeklyHours {
        ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"]
            .iter()
            .map(|day| {
                let description = overrides
                    .iter()
                    .find(|(d, _)| d == day)
                    .map(|(_, desc)| *desc)
                    .unwrap_or("Closed");
                format!("{}: {}", day, description)
            })
            .collect()
    }

    // 2024-01-01 is a Monday.
    fn monday(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn nine_to_five() -> WeeklyHours {
        week(&[("Monday", "9:00 AM \u{2013} 5:00 PM")])
    }

    #[test]
    fn test_missing_hours_unavailable() {
        assert_eq!(resolve(None, &monday(10, 0)), OpenStatus::Unavailable);
        assert_eq!(resolve(None, &monday(23, 59)), OpenStatus::Unavailable);
    }

    #[test]
    fn test_empty_hours_unavailable() {
        let hours = WeeklyHours::default();
        assert!(hours.is_empty());
        assert_eq!(resolve(Some(&hours), &monday(10, 0)), OpenStatus::Unavailable);
    }

    #[test]
    fn test_no_entry_for_today() {
        let hours: WeeklyHours = ["Tuesday: Open 24 hours", "Wednesday: Closed"].into_iter().collect();
        assert_eq!(resolve(Some(&hours), &monday(12, 0)), OpenStatus::Unavailable);
    }

    #[test]
    fn test_weekday_match_is_case_sensitive() {
        let hours: WeeklyHours = ["monday: Open 24 hours"].into_iter().collect();
        assert_eq!(resolve(Some(&hours), &monday(12, 0)), OpenStatus::Unavailable);
    }

    #[test]
    fn test_open_24_hours() {
        let hours = week(&[("Monday", "Open 24 hours")]);
        for h in [0, 6, 12, 23] {
            assert_eq!(resolve(Some(&hours), &monday(h, 15)), OpenStatus::Open24Hours);
        }
    }

    #[test]
    fn test_closed_all_day() {
        let hours = week(&[]);
        assert_eq!(resolve(Some(&hours), &monday(12, 0)), OpenStatus::Closed);
    }

    #[test]
    fn test_nine_to_five_through_the_day() {
        let hours = nine_to_five();
        assert_eq!(resolve(Some(&hours), &monday(7, 30)), OpenStatus::Closed);
        assert_eq!(resolve(Some(&hours), &monday(8, 30)), OpenStatus::OpeningSoon);
        assert_eq!(resolve(Some(&hours), &monday(10, 0)), OpenStatus::Open);
        assert_eq!(resolve(Some(&hours), &monday(16, 30)), OpenStatus::ClosingSoon);
        assert_eq!(resolve(Some(&hours), &monday(18, 0)), OpenStatus::Closed);
    }

    #[test]
    fn test_boundaries_are_exclusive() {
        let hours = nine_to_five();
        // Exactly one hour before opening is not yet "soon".
        assert_eq!(resolve(Some(&hours), &monday(8, 0)), OpenStatus::Closed);
        assert_eq!(resolve(Some(&hours), &monday(9, 0)), OpenStatus::Open);
        assert_eq!(resolve(Some(&hours), &monday(16, 0)), OpenStatus::Open);
        assert_eq!(resolve(Some(&hours), &monday(17, 0)), OpenStatus::ClosingSoon);
    }

    #[test]
    fn test_midnight_close_same_evening() {
        // 2024-01-05 is a Friday.
        let hours = week(&[("Friday", "10:00 PM \u{2013} 12:00 AM")]);
        let at = |h, m| Utc.with_ymd_and_hms(2024, 1, 5, h, m, 0).unwrap();
        assert_eq!(resolve(Some(&hours), &at(21, 30)), OpenStatus::OpeningSoon);
        assert_eq!(resolve(Some(&hours), &at(22, 45)), OpenStatus::Open);
        assert_eq!(resolve(Some(&hours), &at(23, 30)), OpenStatus::ClosingSoon);
    }

    #[test]
    fn test_midnight_close_after_rollover() {
        let friday = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let saturday_half_past = NaiveDate::from_ymd_opt(2024, 1, 6)
            .unwrap()
            .and_hms_opt(0, 30, 0)
            .unwrap();
        assert_eq!(
            resolve_description("10:00 PM \u{2013} 12:00 AM", friday, saturday_half_past),
            OpenStatus::Closed
        );

        let hours = week(&[("Friday", "10:00 PM \u{2013} 12:00 AM")]);
        let saturday = Utc.with_ymd_and_hms(2024, 1, 6, 0, 30, 0).unwrap();
        assert_eq!(resolve(Some(&hours), &saturday), OpenStatus::Closed);
    }

    #[test]
    fn test_overnight_range_carries_into_next_day() {
        let hours = week(&[("Friday", "6:00 PM \u{2013} 2:00 AM")]);
        let sat = |h, m| Utc.with_ymd_and_hms(2024, 1, 6, h, m, 0).unwrap();
        assert_eq!(resolve(Some(&hours), &sat(0, 30)), OpenStatus::Open);
        assert_eq!(resolve(Some(&hours), &sat(1, 30)), OpenStatus::ClosingSoon);
        assert_eq!(resolve(Some(&hours), &sat(3, 0)), OpenStatus::Closed);
    }

    #[test]
    fn test_overnight_range_open_on_its_first_evening() {
        // 2024-01-05 is a Friday; the close falls on Saturday.
        let hours = week(&[("Friday", "6:00 PM \u{2013} 2:00 AM")]);
        let fri = |h, m| Utc.with_ymd_and_hms(2024, 1, 5, h, m, 0).unwrap();
        assert_eq!(resolve(Some(&hours), &fri(17, 30)), OpenStatus::OpeningSoon);
        assert_eq!(resolve(Some(&hours), &fri(19, 0)), OpenStatus::Open);
        assert_eq!(resolve(Some(&hours), &fri(23, 30)), OpenStatus::Open);
    }

    #[test]
    fn test_carried_range_never_overrides_open_today() {
        let sat = |h, m| Utc.with_ymd_and_hms(2024, 1, 6, h, m, 0).unwrap();

        let all_day = week(&[("Friday", "6:00 PM \u{2013} 2:00 AM"), ("Saturday", "Open 24 hours")]);
        assert_eq!(resolve(Some(&all_day), &sat(1, 30)), OpenStatus::Open24Hours);
        assert_eq!(resolve(Some(&all_day), &sat(3, 0)), OpenStatus::Open24Hours);

        let from_midnight = week(&[
            ("Friday", "6:00 PM \u{2013} 2:00 AM"),
            ("Saturday", "12:00 AM \u{2013} 11:00 PM"),
        ]);
        assert_eq!(resolve(Some(&from_midnight), &sat(1, 30)), OpenStatus::Open);
    }

    #[test]
    fn test_carried_range_against_later_opening() {
        let sat = |h, m| Utc.with_ymd_and_hms(2024, 1, 6, h, m, 0).unwrap();
        let hours = week(&[
            ("Friday", "6:00 PM \u{2013} 1:00 AM"),
            ("Saturday", "1:30 AM \u{2013} 5:00 AM"),
        ]);
        // Friday's range is open, Saturday's is not yet.
        assert_eq!(resolve(Some(&hours), &sat(0, 0)), OpenStatus::Open);
        // Closing beats opening within the same window.
        assert_eq!(resolve(Some(&hours), &sat(0, 45)), OpenStatus::ClosingSoon);
        // Friday's range is over; Saturday's opens within the hour.
        assert_eq!(resolve(Some(&hours), &sat(1, 15)), OpenStatus::OpeningSoon);
        assert_eq!(resolve(Some(&hours), &sat(2, 0)), OpenStatus::Open);
    }

    #[test]
    fn test_api_spacing_characters() {
        let hours = week(&[("Monday", "9:00\u{202f}AM\u{2009}\u{2013}\u{2009}5:00\u{202f}PM")]);
        assert_eq!(resolve(Some(&hours), &monday(10, 0)), OpenStatus::Open);
        assert_eq!(resolve(Some(&hours), &monday(16, 30)), OpenStatus::ClosingSoon);
    }

    #[test]
    fn test_split_shift() {
        let hours = week(&[("Monday", "11:00 AM \u{2013} 2:30 PM, 5:00 \u{2013} 10:00 PM")]);
        assert_eq!(resolve(Some(&hours), &monday(12, 0)), OpenStatus::Open);
        assert_eq!(resolve(Some(&hours), &monday(14, 0)), OpenStatus::ClosingSoon);
        assert_eq!(resolve(Some(&hours), &monday(15, 0)), OpenStatus::Closed);
        assert_eq!(resolve(Some(&hours), &monday(16, 30)), OpenStatus::OpeningSoon);
        assert_eq!(resolve(Some(&hours), &monday(19, 0)), OpenStatus::Open);
        assert_eq!(resolve(Some(&hours), &monday(22, 30)), OpenStatus::Closed);
    }

    #[test]
    fn test_malformed_ranges_unavailable() {
        for description in [
            "9 to 5",
            "9:00 AM - 5:00 PM",
            "9:00 AM \u{2013} late",
            "noon \u{2013} 5:00 PM",
            "",
        ] {
            let hours = week(&[("Monday", description)]);
            assert_eq!(
                resolve(Some(&hours), &monday(10, 0)),
                OpenStatus::Unavailable,
                "description {:?}",
                description
            );
        }
    }

    #[test]
    fn test_line_without_colon_unavailable() {
        let hours: WeeklyHours = ["Monday Open 24 hours"].into_iter().collect();
        assert_eq!(resolve(Some(&hours), &monday(10, 0)), OpenStatus::Unavailable);
    }

    #[test]
    fn test_local_clock_differs_from_utc() {
        let hours = week(&[("Monday", "6:00 PM \u{2013} 11:00 PM")]);
        // 03:00 UTC Tuesday is 22:00 Monday in New York.
        let instant = Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap();
        assert_eq!(resolve(Some(&hours), &instant), OpenStatus::Closed);
        assert_eq!(resolve(Some(&hours), &instant.with_timezone(&New_York)), OpenStatus::Open);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let hours = nine_to_five();
        let now = monday(16, 30);
        let first = resolve(Some(&hours), &now);
        for _ in 0..5 {
            assert_eq!(resolve(Some(&hours), &now), first);
        }
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(OpenStatus::OpeningSoon.to_string(), "Opening Soon");
        assert_eq!(OpenStatus::Unavailable.as_str(), "Daily hours not available");
        assert_eq!(serde_json::to_string(&OpenStatus::ClosingSoon).unwrap(), "\"Closing Soon\"");
        let parsed: OpenStatus = serde_json::from_str("\"Open 24 hours\"").unwrap();
        assert_eq!(parsed, OpenStatus::Open24Hours);
    }

    #[test]
    fn test_weekly_hours_serde_transparent() {
        let hours: WeeklyHours = serde_json::from_str(r#"["Monday: Closed"]"#).unwrap();
        assert_eq!(hours.entry_for(Weekday::Mon), Some("Monday: Closed"));
        assert_eq!(serde_json::to_string(&hours).unwrap(), r#"["Monday: Closed"]"#);
    }
}
