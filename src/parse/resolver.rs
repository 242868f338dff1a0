//! Temporal resolver — maps Korean/English natural-language time expressions
//! to absolute timestamps in a fixed calendar zone.
//!
//! Matching is regex/keyword based, first rule wins. A date cue is required;
//! a time-of-day cue alone never fabricates a timestamp.

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveTime, TimeZone, Weekday};
use regex::Regex;

/// Clock time assumed when a date cue has no accompanying time cue.
const DEFAULT_HOUR: u32 = 9;

/// Weekday keywords, checked in order. Korean single characters first, then
/// English day names; the first one contained in the text wins.
const WEEKDAYS: &[(&str, Weekday)] = &[
    ("월", Weekday::Mon),
    ("화", Weekday::Tue),
    ("수", Weekday::Wed),
    ("목", Weekday::Thu),
    ("금", Weekday::Fri),
    ("토", Weekday::Sat),
    ("일", Weekday::Sun),
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

/// Resolver for free-text date/time phrases.
///
/// The calendar zone is injected at construction so resolution is
/// deterministic regardless of the machine's ambient timezone. Stateless and
/// reentrant once built.
pub struct TimeResolver {
    zone: FixedOffset,
    colon_time: Regex,
    meridiem_en: Regex,
    meridiem_ko: Regex,
    hour_ko: Regex,
    next_week_weekday_ko: Regex,
    next_week_weekday_en: Regex,
}

/// The production zone: KST (UTC+9, no DST).
pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("KST offset is valid")
}

impl TimeResolver {
    /// Build a resolver for the given fixed zone.
    pub fn new(zone: FixedOffset) -> Self {
        Self {
            zone,
            colon_time: Regex::new(r"(\d{1,2}):(\d{2})").unwrap(),
            meridiem_en: Regex::new(r"(am|pm)\s*(\d{1,2})(?::(\d{2}))?").unwrap(),
            meridiem_ko: Regex::new(r"(오전|오후)\s*(\d{1,2})시(\d{1,2})?분?").unwrap(),
            hour_ko: Regex::new(r"(\d{1,2})시").unwrap(),
            next_week_weekday_ko: Regex::new(r"다음주\s*([월화수목금토일])").unwrap(),
            next_week_weekday_en: Regex::new(
                r"next week\s*(monday|tuesday|wednesday|thursday|friday|saturday|sunday)",
            )
            .unwrap(),
        }
    }

    /// Resolve `text` against a reference instant in the resolver's zone.
    ///
    /// Returns `None` when no date cue is present.
    pub fn resolve(
        &self,
        text: &str,
        reference: DateTime<FixedOffset>,
    ) -> Option<DateTime<FixedOffset>> {
        let normalized = text.to_lowercase();
        let date = self.resolve_date(&normalized, reference)?;
        let time = self
            .parse_time(&normalized)
            .unwrap_or_else(|| NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0).unwrap());
        self.zone.from_local_datetime(&date.and_time(time)).single()
    }

    /// Determine the calendar date. First matching rule wins.
    fn resolve_date(&self, text: &str, reference: DateTime<FixedOffset>) -> Option<NaiveDate> {
        let today = reference.date_naive();

        if text.contains("오늘") || text.contains("today") {
            return Some(today);
        }
        if text.contains("내일") || text.contains("tomorrow") {
            return today.checked_add_days(Days::new(1));
        }
        if text.contains("모레") {
            return today.checked_add_days(Days::new(2));
        }
        // "다음주 금" / "next week friday": the weekday is anchored one week
        // out, then advanced to its next occurrence. Checked before the bare
        // next-week words, which would otherwise shadow it.
        if let Some(date) = self.next_week_weekday(text, today) {
            return Some(date);
        }
        if text.contains("이번주") || text.contains("이번 주") || text.contains("this week") {
            return Some(today);
        }
        if text.contains("다음주") || text.contains("다음 주") || text.contains("next week") {
            return today.checked_add_days(Days::new(7));
        }
        if text.contains("이번달") || text.contains("이번 달") || text.contains("this month") {
            return Some(today);
        }
        if text.contains("다음달") || text.contains("다음 달") || text.contains("next month") {
            return first_of_next_month(today);
        }
        find_weekday(text).map(|day| next_or_same(today, day))
    }

    /// Resolve a weekday qualified by "다음주"/"next week" to the week after
    /// the reference week.
    fn next_week_weekday(&self, text: &str, today: NaiveDate) -> Option<NaiveDate> {
        let day = if let Some(caps) = self.next_week_weekday_ko.captures(text) {
            weekday_for(caps.get(1)?.as_str())?
        } else if let Some(caps) = self.next_week_weekday_en.captures(text) {
            weekday_for(caps.get(1)?.as_str())?
        } else {
            return None;
        };
        let anchored = today.checked_add_days(Days::new(7))?;
        Some(next_or_same(anchored, day))
    }

    /// Determine the clock time. First matching rule wins; a rule with
    /// out-of-range components is skipped, never an error.
    fn parse_time(&self, text: &str) -> Option<NaiveTime> {
        if let Some(caps) = self.colon_time.captures(text)
            && let Some(t) = clock(caps[1].parse().ok()?, caps[2].parse().ok()?)
        {
            return Some(t);
        }
        if let Some(caps) = self.meridiem_en.captures(text) {
            let hour: u32 = caps[2].parse().ok()?;
            let minute: u32 = caps
                .get(3)
                .map_or(Some(0), |m| m.as_str().parse().ok())?;
            if let Some(t) = clock(meridiem_hour(hour, &caps[1] == "pm"), minute) {
                return Some(t);
            }
        }
        if let Some(caps) = self.meridiem_ko.captures(text) {
            let hour: u32 = caps[2].parse().ok()?;
            let minute: u32 = caps
                .get(3)
                .map_or(Some(0), |m| m.as_str().parse().ok())?;
            if let Some(t) = clock(meridiem_hour(hour, &caps[1] == "오후"), minute) {
                return Some(t);
            }
        }
        if let Some(caps) = self.hour_ko.captures(text)
            && let Some(t) = clock(caps[1].parse().ok()?, 0)
        {
            return Some(t);
        }
        None
    }
}

/// Convert a 12-hour value to 24-hour given the meridiem.
fn meridiem_hour(hour: u32, is_pm: bool) -> u32 {
    match (is_pm, hour) {
        (true, 12) => 12,
        (true, h) => h + 12,
        (false, 12) => 0,
        (false, h) => h,
    }
}

fn clock(hour: u32, minute: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// The first weekday keyword contained in the text, if any.
fn find_weekday(text: &str) -> Option<Weekday> {
    WEEKDAYS
        .iter()
        .find(|(key, _)| text.contains(key))
        .map(|(_, day)| *day)
}

fn weekday_for(key: &str) -> Option<Weekday> {
    WEEKDAYS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, day)| *day)
}

/// Next occurrence of `target` on or after `from` (same-day counts).
fn next_or_same(from: NaiveDate, target: Weekday) -> NaiveDate {
    let ahead = (target.num_days_from_monday() as i64
        - from.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    from + Days::new(ahead as u64)
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn resolver() -> TimeResolver {
        TimeResolver::new(kst())
    }

    /// Wednesday 2024-05-01 09:00 KST.
    fn reference() -> DateTime<FixedOffset> {
        kst().with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn expect(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        kst().with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn today_defaults_to_nine() {
        assert_eq!(
            resolver().resolve("오늘", reference()),
            Some(expect(2024, 5, 1, 9, 0))
        );
        assert_eq!(
            resolver().resolve("today", reference()),
            Some(expect(2024, 5, 1, 9, 0))
        );
    }

    #[test]
    fn tomorrow_afternoon_korean() {
        assert_eq!(
            resolver().resolve("내일 오후 3시", reference()),
            Some(expect(2024, 5, 2, 15, 0))
        );
    }

    #[test]
    fn day_after_tomorrow() {
        assert_eq!(
            resolver().resolve("모레 제출", reference()),
            Some(expect(2024, 5, 3, 9, 0))
        );
    }

    #[test]
    fn this_week_is_reference_date() {
        assert_eq!(
            resolver().resolve("이번주", reference()),
            Some(expect(2024, 5, 1, 9, 0))
        );
        assert_eq!(
            resolver().resolve("this week", reference()),
            Some(expect(2024, 5, 1, 9, 0))
        );
    }

    #[test]
    fn next_week_adds_seven_days() {
        assert_eq!(
            resolver().resolve("다음주", reference()),
            Some(expect(2024, 5, 8, 9, 0))
        );
        assert_eq!(
            resolver().resolve("next week", reference()),
            Some(expect(2024, 5, 8, 9, 0))
        );
    }

    #[test]
    fn next_month_is_first_day() {
        assert_eq!(
            resolver().resolve("다음달", reference()),
            Some(expect(2024, 6, 1, 9, 0))
        );
        let december = kst().with_ymd_and_hms(2024, 12, 15, 9, 0, 0).unwrap();
        assert_eq!(
            resolver().resolve("next month", december),
            Some(expect(2025, 1, 1, 9, 0))
        );
    }

    #[test]
    fn weekday_next_or_same_includes_reference_day() {
        // Reference is a Wednesday; "수" resolves to the reference date itself.
        assert_eq!(
            resolver().resolve("수 회의", reference()),
            Some(expect(2024, 5, 1, 9, 0))
        );
        // Friday of the same week.
        assert_eq!(
            resolver().resolve("금 마감", reference()),
            Some(expect(2024, 5, 3, 9, 0))
        );
        assert_eq!(
            resolver().resolve("friday", reference()),
            Some(expect(2024, 5, 3, 9, 0))
        );
        // Monday already passed this week — next Monday.
        assert_eq!(
            resolver().resolve("monday", reference()),
            Some(expect(2024, 5, 6, 9, 0))
        );
    }

    #[test]
    fn next_week_qualified_weekday_lands_in_following_week() {
        // Reference Wed 2024-05-01; anchor +7 → Wed 05-08; next-or-same Friday → 05-10.
        assert_eq!(
            resolver().resolve("다음주 금 3시", reference()),
            Some(expect(2024, 5, 10, 3, 0))
        );
        assert_eq!(
            resolver().resolve("next week friday", reference()),
            Some(expect(2024, 5, 10, 9, 0))
        );
        // Monday qualified: anchor Wed 05-08 → next Monday 05-13.
        assert_eq!(
            resolver().resolve("next week monday", reference()),
            Some(expect(2024, 5, 13, 9, 0))
        );
    }

    #[test]
    fn colon_time_form() {
        assert_eq!(
            resolver().resolve("내일 14:30", reference()),
            Some(expect(2024, 5, 2, 14, 30))
        );
    }

    #[test]
    fn english_meridiem_before_hour() {
        assert_eq!(
            resolver().resolve("tomorrow pm 3", reference()),
            Some(expect(2024, 5, 2, 15, 0))
        );
        assert_eq!(
            resolver().resolve("tomorrow am 11:45", reference()),
            Some(expect(2024, 5, 2, 11, 45))
        );
    }

    #[test]
    fn meridiem_twelve_edge_cases() {
        assert_eq!(
            resolver().resolve("내일 오전 12시", reference()),
            Some(expect(2024, 5, 2, 0, 0))
        );
        assert_eq!(
            resolver().resolve("내일 오후 12시", reference()),
            Some(expect(2024, 5, 2, 12, 0))
        );
        assert_eq!(
            resolver().resolve("tomorrow pm 12", reference()),
            Some(expect(2024, 5, 2, 12, 0))
        );
    }

    #[test]
    fn korean_meridiem_with_minutes() {
        assert_eq!(
            resolver().resolve("오늘 오후 2시30분", reference()),
            Some(expect(2024, 5, 1, 14, 30))
        );
    }

    #[test]
    fn bare_hour_form() {
        assert_eq!(
            resolver().resolve("내일 15시", reference()),
            Some(expect(2024, 5, 2, 15, 0))
        );
    }

    #[test]
    fn time_without_date_resolves_to_nothing() {
        assert_eq!(resolver().resolve("오후 3시까지", reference()), None);
        assert_eq!(resolver().resolve("14:30", reference()), None);
    }

    #[test]
    fn no_cues_resolves_to_nothing() {
        assert_eq!(resolver().resolve("hello world", reference()), None);
        assert_eq!(resolver().resolve("", reference()), None);
    }

    #[test]
    fn out_of_range_hour_falls_back_to_default() {
        // "25시" matches the bare-hour rule but 25 is not a valid hour; the
        // rule is skipped and the date cue still resolves at the default time.
        assert_eq!(
            resolver().resolve("내일 25시", reference()),
            Some(expect(2024, 5, 2, 9, 0))
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            resolver().resolve("Tomorrow PM 3", reference()),
            Some(expect(2024, 5, 2, 15, 0))
        );
    }

    #[test]
    fn literal_day_word_outranks_weekday_character() {
        // "내일" contains the character "일" (Sunday); the literal day word
        // must win.
        assert_eq!(
            resolver().resolve("내일", reference()),
            Some(expect(2024, 5, 2, 9, 0))
        );
    }

    #[test]
    fn injected_zone_is_respected() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let resolver = TimeResolver::new(utc);
        let reference = utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let resolved = resolver.resolve("tomorrow", reference).unwrap();
        assert_eq!(resolved.offset().local_minus_utc(), 0);
        assert_eq!(
            resolved,
            utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap()
        );
    }
}
