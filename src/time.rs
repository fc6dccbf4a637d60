//! POSIX timezone rules and date/time formatting.
//!
//! `TZ_INFO` follows the POSIX `TZ` format with month rules, e.g.
//! `CET-1CEST,M3.5.0/2,M10.5.0/3`. Only the `Mm.w.d[/time]` rule form is
//! supported; Julian-day rules are rejected at startup. The weather document
//! carries plain unix timestamps, so this is all the device needs to show
//! local sunrise, sunset and observation times with DST applied.

use core::fmt::Write as _;

use heapless::String;
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset, Weekday};

/// One DST transition: week `week` of `month`, on `weekday`, `at_secs`
/// after local midnight. `week == 5` means the last occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Transition {
    month: Month,
    week: u8,
    weekday: Weekday,
    at_secs: i32,
}

impl Transition {
    fn parse(s: &str) -> Option<(Self, &str)> {
        let s = s.strip_prefix('M')?;
        let (month, s) = parse_int(s)?;
        let s = s.strip_prefix('.')?;
        let (week, s) = parse_int(s)?;
        let s = s.strip_prefix('.')?;
        let (weekday, mut s) = parse_int(s)?;
        if !(1..=12).contains(&month) || !(1..=5).contains(&week) || !(0..=6).contains(&weekday) {
            return None;
        }
        // transition time defaults to 02:00 local
        let mut at_secs = 2 * 3600;
        if let Some(rest) = s.strip_prefix('/') {
            let (secs, rest) = parse_posix_offset(rest)?;
            at_secs = secs;
            s = rest;
        }
        let month = Month::try_from(month as u8).ok()?;
        let transition = Self {
            month,
            week: week as u8,
            weekday: weekday_from_sunday(weekday as u8),
            at_secs,
        };
        Some((transition, s))
    }

    /// UTC instant of this transition in `year`, given the offset in force
    /// just before it.
    fn utc_instant(&self, year: i32, prevailing: UtcOffset) -> Option<OffsetDateTime> {
        let date = nth_weekday(year, self.month, self.week, self.weekday)?;
        let local =
            PrimitiveDateTime::new(date, Time::MIDNIGHT) + Duration::seconds(self.at_secs as i64);
        Some(local.assume_offset(prevailing))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DstRule {
    offset: UtcOffset,
    start: Transition,
    end: Transition,
}

/// A parsed POSIX timezone rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TzRule {
    std_offset: UtcOffset,
    dst: Option<DstRule>,
}

impl TzRule {
    /// Parse a POSIX `TZ` string. Returns `None` for anything outside the
    /// supported subset.
    pub fn parse(spec: &str) -> Option<Self> {
        let rest = skip_name(spec)?;
        let (std_secs, rest) = parse_posix_offset(rest)?;
        // POSIX offsets count west of Greenwich, the opposite of UTC offsets
        let std_offset = UtcOffset::from_whole_seconds(-std_secs).ok()?;
        if rest.is_empty() {
            return Some(Self {
                std_offset,
                dst: None,
            });
        }
        let rest = skip_name(rest)?;
        let (dst_secs, rest) = match rest.bytes().next() {
            Some(b'+' | b'-' | b'0'..=b'9') => parse_posix_offset(rest)?,
            // DST defaults to one hour ahead of standard time
            _ => (std_secs - 3600, rest),
        };
        let dst_offset = UtcOffset::from_whole_seconds(-dst_secs).ok()?;
        let rest = rest.strip_prefix(',')?;
        let (start, rest) = Transition::parse(rest)?;
        let rest = rest.strip_prefix(',')?;
        let (end, rest) = Transition::parse(rest)?;
        if !rest.is_empty() {
            return None;
        }
        Some(Self {
            std_offset,
            dst: Some(DstRule {
                offset: dst_offset,
                start,
                end,
            }),
        })
    }

    /// UTC offset in force at the given instant.
    pub fn offset_at(&self, utc: OffsetDateTime) -> UtcOffset {
        let Some(dst) = self.dst else {
            return self.std_offset;
        };
        let year = utc.to_offset(self.std_offset).year();
        let (Some(start), Some(end)) = (
            dst.start.utc_instant(year, self.std_offset),
            dst.end.utc_instant(year, dst.offset),
        ) else {
            return self.std_offset;
        };
        // start > end happens in the southern hemisphere, where DST spans
        // the turn of the year
        let in_dst = if start <= end {
            utc >= start && utc < end
        } else {
            utc >= start || utc < end
        };
        if in_dst { dst.offset } else { self.std_offset }
    }

    /// Local civil time for a unix timestamp under this rule.
    pub fn local(&self, unix_secs: i64) -> Option<OffsetDateTime> {
        let utc = OffsetDateTime::from_unix_timestamp(unix_secs).ok()?;
        Some(utc.to_offset(self.offset_at(utc)))
    }
}

/// Skip a zone name: either `<...>` or a run of letters.
fn skip_name(s: &str) -> Option<&str> {
    if let Some(rest) = s.strip_prefix('<') {
        let end = rest.find('>')?;
        Some(&rest[end + 1..])
    } else {
        let end = s
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(s.len());
        if end == 0 { None } else { Some(&s[end..]) }
    }
}

/// Parse `[+|-]h[h][:mm[:ss]]` into seconds, POSIX sign convention.
fn parse_posix_offset(s: &str) -> Option<(i32, &str)> {
    let (negative, s) = match s.bytes().next()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let (hours, s) = parse_int(s)?;
    if hours > 167 {
        return None;
    }
    let mut secs = hours * 3600;
    let mut s = s;
    for unit in [60, 1] {
        let Some(rest) = s.strip_prefix(':') else {
            break;
        };
        let (value, rest) = parse_int(rest)?;
        if value > 59 {
            return None;
        }
        secs += value * unit;
        s = rest;
    }
    Some((if negative { -secs } else { secs }, s))
}

fn parse_int(s: &str) -> Option<(i32, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 || end > 3 {
        return None;
    }
    s[..end].parse().ok().map(|value| (value, &s[end..]))
}

fn weekday_from_sunday(day: u8) -> Weekday {
    match day {
        1 => Weekday::Monday,
        2 => Weekday::Tuesday,
        3 => Weekday::Wednesday,
        4 => Weekday::Thursday,
        5 => Weekday::Friday,
        6 => Weekday::Saturday,
        _ => Weekday::Sunday,
    }
}

fn nth_weekday(year: i32, month: Month, week: u8, weekday: Weekday) -> Option<Date> {
    if week == 5 {
        let mut date = Date::from_calendar_date(year, month, month.length(year)).ok()?;
        while date.weekday() != weekday {
            date = date.previous_day()?;
        }
        Some(date)
    } else {
        let mut date = Date::from_calendar_date(year, month, 1).ok()?;
        while date.weekday() != weekday {
            date = date.next_day()?;
        }
        // every month has at least four of each weekday
        Some(date + Duration::weeks(week as i64 - 1))
    }
}

fn ordinal(n: u8) -> &'static str {
    match n {
        11..=13 => "th",
        _ => match n % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        },
    }
}

/// "Sunday March 29th, 2026"
pub fn format_date(date: Date) -> String<64> {
    let weekday = match date.weekday() {
        Weekday::Monday => "Monday",
        Weekday::Tuesday => "Tuesday",
        Weekday::Wednesday => "Wednesday",
        Weekday::Thursday => "Thursday",
        Weekday::Friday => "Friday",
        Weekday::Saturday => "Saturday",
        Weekday::Sunday => "Sunday",
    };

    let month_name = match date.month() {
        Month::January => "January",
        Month::February => "February",
        Month::March => "March",
        Month::April => "April",
        Month::May => "May",
        Month::June => "June",
        Month::July => "July",
        Month::August => "August",
        Month::September => "September",
        Month::October => "October",
        Month::November => "November",
        Month::December => "December",
    };

    let mut out = String::new();
    let _ = write!(
        out,
        "{} {} {}{}, {}",
        weekday,
        month_name,
        date.day(),
        ordinal(date.day()),
        date.year()
    );
    out
}

/// "07:42"
pub fn format_clock(dt: OffsetDateTime) -> String<8> {
    let mut out = String::new();
    let _ = write!(out, "{:02}:{:02}", dt.hour(), dt.minute());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROME: &str = "CET-1CEST,M3.5.0/2,M10.5.0/3";

    // 2025-01-15 12:00:00 UTC
    const WINTER: i64 = 1736942400;
    // 2025-07-01 00:00:00 UTC
    const SUMMER: i64 = 1751328000;

    fn offset_hours(rule: &TzRule, unix: i64) -> i32 {
        rule.offset_at(OffsetDateTime::from_unix_timestamp(unix).unwrap())
            .whole_seconds()
            / 3600
    }

    #[test]
    fn parses_fixed_offset_zone() {
        let rule = TzRule::parse("UTC0").unwrap();
        assert_eq!(offset_hours(&rule, WINTER), 0);
        assert_eq!(offset_hours(&rule, SUMMER), 0);

        let rule = TzRule::parse("<+0330>-3:30").unwrap();
        assert_eq!(
            rule.offset_at(OffsetDateTime::from_unix_timestamp(WINTER).unwrap())
                .whole_minutes(),
            210
        );
    }

    #[test]
    fn rome_rule_applies_dst() {
        let rule = TzRule::parse(ROME).unwrap();
        assert_eq!(offset_hours(&rule, WINTER), 1);
        assert_eq!(offset_hours(&rule, SUMMER), 2);
    }

    #[test]
    fn dst_transitions_are_exact() {
        let rule = TzRule::parse(ROME).unwrap();
        // last Sunday of March 2025 is the 30th; 02:00 CET == 01:00 UTC
        let spring = 1743296400;
        assert_eq!(offset_hours(&rule, spring - 1), 1);
        assert_eq!(offset_hours(&rule, spring), 2);
        // last Sunday of October 2025 is the 26th; 03:00 CEST == 01:00 UTC
        let autumn = 1761440400;
        assert_eq!(offset_hours(&rule, autumn - 1), 2);
        assert_eq!(offset_hours(&rule, autumn), 1);
    }

    #[test]
    fn southern_hemisphere_wraps_the_year() {
        let rule = TzRule::parse("AEST-10AEDT,M10.1.0,M4.1.0/3").unwrap();
        assert_eq!(offset_hours(&rule, WINTER), 11);
        assert_eq!(offset_hours(&rule, SUMMER), 10);
    }

    #[test]
    fn us_style_positive_offset() {
        let rule = TzRule::parse("CST6CDT,M3.2.0,M11.1.0").unwrap();
        assert_eq!(offset_hours(&rule, WINTER), -6);
        assert_eq!(offset_hours(&rule, SUMMER), -5);
    }

    #[test]
    fn rejects_unsupported_rules() {
        assert!(TzRule::parse("").is_none());
        assert!(TzRule::parse("CET").is_none());
        assert!(TzRule::parse("not a timezone").is_none());
        // DST named without transition rules
        assert!(TzRule::parse("EST5EDT").is_none());
        // Julian-day rules are out of scope
        assert!(TzRule::parse("CET-1CEST,J60,J300").is_none());
    }

    #[test]
    fn finds_nth_weekdays() {
        // first Sunday of October 2025
        assert_eq!(
            nth_weekday(2025, Month::October, 1, Weekday::Sunday),
            Date::from_calendar_date(2025, Month::October, 5).ok()
        );
        // last Sunday of March 2026
        assert_eq!(
            nth_weekday(2026, Month::March, 5, Weekday::Sunday),
            Date::from_calendar_date(2026, Month::March, 29).ok()
        );
        // second Sunday of March 2025 (US DST start)
        assert_eq!(
            nth_weekday(2025, Month::March, 2, Weekday::Sunday),
            Date::from_calendar_date(2025, Month::March, 9).ok()
        );
    }

    #[test]
    fn formats_dates_and_clocks() {
        let date = Date::from_calendar_date(2026, Month::August, 6).unwrap();
        assert_eq!(format_date(date).as_str(), "Thursday August 6th, 2026");

        let date = Date::from_calendar_date(2025, Month::March, 23).unwrap();
        assert_eq!(format_date(date).as_str(), "Sunday March 23rd, 2025");

        let rule = TzRule::parse(ROME).unwrap();
        let local = rule.local(WINTER).unwrap();
        assert_eq!(format_clock(local).as_str(), "13:00");
    }
}
