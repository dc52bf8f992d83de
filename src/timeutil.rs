//! Time zone, date and time string handling.
//!
//! Time zones are fixed offsets only: `UTC`, `GMT`, or `[UTC|GMT]±HH:MM[:SS]`.
//! Dates and times use ISO 8601 forms. Times render with minute precision
//! when seconds and microseconds are both zero.

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike,
};

use crate::error::{Error, Result};

/// A parsed clock reading, with its embedded offset if the string had one.
pub type MaybeAware<T> = (T, Option<FixedOffset>);

/// Parsing and formatting hooks used by the loader and dumper.
pub trait TimeCodec {
    /// # Errors
    ///
    /// Returns `InvalidTimeZone` for unrecognised strings.
    fn parse_timezone(&self, s: &str) -> Result<FixedOffset>;

    /// # Errors
    ///
    /// Returns `InvalidDate` for unrecognised strings.
    fn parse_date(&self, s: &str) -> Result<NaiveDate>;

    /// # Errors
    ///
    /// Returns `InvalidDateTime` for unrecognised strings.
    fn parse_datetime(&self, s: &str) -> Result<MaybeAware<NaiveDateTime>>;

    /// # Errors
    ///
    /// Returns `InvalidTime` for unrecognised strings.
    fn parse_time(&self, s: &str) -> Result<MaybeAware<NaiveTime>>;

    fn format_timezone(&self, tz: FixedOffset) -> String;

    fn format_date(&self, date: NaiveDate) -> String;

    /// Format a date-time; the offset is appended when given.
    fn format_datetime(&self, dt: NaiveDateTime, offset: Option<FixedOffset>) -> String;

    /// Format only the time part of a date-time.
    fn format_time(&self, dt: NaiveDateTime, offset: Option<FixedOffset>) -> String;
}

/// Attach a zone to a parsed reading.
///
/// An offset embedded in the string wins over `tz`; with neither the time
/// is naive and cannot be placed.
///
/// # Errors
///
/// Returns `TimeZoneNotProvided` when both are missing.
pub fn resolve(
    naive: NaiveDateTime,
    embedded: Option<FixedOffset>,
    tz: Option<FixedOffset>,
    original: &str,
) -> Result<DateTime<FixedOffset>> {
    let offset = embedded
        .or(tz)
        .ok_or_else(|| Error::TimeZoneNotProvided(original.to_string()))?;
    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| Error::InvalidDateTime(original.to_string()))
}

// ── ISO codec ─────────────────────────────────────────────────

/// ISO 8601 codec with optional fallback date formats.
#[derive(Debug, Clone, Default)]
pub struct IsoTimeCodec {
    /// chrono format strings tried, in order, after the ISO date form.
    pub date_formats: Vec<String>,
}

impl IsoTimeCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_date_formats(date_formats: Vec<String>) -> Self {
        Self { date_formats }
    }
}

fn two_digits(s: &str) -> Option<u32> {
    if s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

/// Parse `±HH:MM[:SS]` into signed seconds.
fn parse_offset_seconds(s: &str) -> Option<i32> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let mut parts = rest.split(':');
    let hours = two_digits(parts.next()?)?;
    let minutes = two_digits(parts.next()?)?;
    let seconds = match parts.next() {
        Some(sec) => two_digits(sec)?,
        None => 0,
    };
    if parts.next().is_some() || hours >= 24 || minutes >= 60 || seconds >= 60 {
        return None;
    }
    let total = i32::try_from(hours * 3600 + minutes * 60 + seconds).ok()?;
    Some(sign * total)
}

fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    if !s[..4].bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = s[..4].parse().ok()?;
    NaiveDate::from_ymd_opt(year, two_digits(&s[5..7])?, two_digits(&s[8..10])?)
}

/// Split a trailing `Z` or `±HH:MM[:SS]` offset off a time string.
fn split_offset(s: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(clock) = s.strip_suffix('Z') {
        return Some((clock, FixedOffset::east_opt(0)));
    }
    match s.find(['+', '-']) {
        Some(i) => {
            let secs = parse_offset_seconds(&s[i..])?;
            Some((&s[..i], Some(FixedOffset::east_opt(secs)?)))
        }
        None => Some((s, None)),
    }
}

/// Parse `HH[:MM[:SS[.f{1,6}]]]`.
fn parse_clock(s: &str) -> Option<NaiveTime> {
    let (hms, frac) = match s.split_once('.') {
        Some((hms, frac)) => (hms, Some(frac)),
        None => (s, None),
    };
    let mut parts = hms.split(':');
    let hour = two_digits(parts.next()?)?;
    let minute = parts.next().map_or(Some(0), two_digits)?;
    let second = parts.next().map_or(Some(0), two_digits)?;
    if parts.next().is_some() {
        return None;
    }
    let micro = match frac {
        None => 0,
        Some(f) => {
            // a fraction needs seconds
            if f.is_empty() || f.len() > 6 || !f.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            if hms.split(':').count() != 3 {
                return None;
            }
            let padded = format!("{f:0<6}");
            padded.parse().ok()?
        }
    };
    NaiveTime::from_hms_micro_opt(hour, minute, second, micro)
}

fn parse_time_with_offset(s: &str) -> Option<MaybeAware<NaiveTime>> {
    let (clock, offset) = split_offset(s)?;
    Some((parse_clock(clock)?, offset))
}

fn format_offset(offset: FixedOffset) -> String {
    let total = offset.local_minus_utc();
    let sign = if total < 0 { '-' } else { '+' };
    let total = total.unsigned_abs();
    let (hours, rest) = (total / 3600, total % 3600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    if seconds == 0 {
        format!("{sign}{hours:02}:{minutes:02}")
    } else {
        format!("{sign}{hours:02}:{minutes:02}:{seconds:02}")
    }
}

fn format_clock(time: NaiveTime) -> String {
    let micro = time.nanosecond() / 1_000;
    if time.second() == 0 && micro == 0 {
        time.format("%H:%M").to_string()
    } else if micro == 0 {
        time.format("%H:%M:%S").to_string()
    } else {
        format!("{}.{micro:06}", time.format("%H:%M:%S"))
    }
}

/// Parse an ISO date, then try each chrono format in `formats`.
///
/// # Errors
///
/// Returns `InvalidDate` when nothing matches.
pub fn parse_date_with_formats(s: &str, formats: &[String]) -> Result<NaiveDate> {
    if let Some(date) = parse_iso_date(s) {
        return Ok(date);
    }
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .ok_or_else(|| Error::InvalidDate(s.to_string()))
}

impl TimeCodec for IsoTimeCodec {
    fn parse_timezone(&self, s: &str) -> Result<FixedOffset> {
        if s == "UTC" || s == "GMT" {
            return FixedOffset::east_opt(0).ok_or_else(|| Error::InvalidTimeZone(s.to_string()));
        }
        let offset = s
            .strip_prefix("UTC")
            .or_else(|| s.strip_prefix("GMT"))
            .unwrap_or(s);
        parse_offset_seconds(offset)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| Error::InvalidTimeZone(s.to_string()))
    }

    fn parse_date(&self, s: &str) -> Result<NaiveDate> {
        parse_date_with_formats(s, &self.date_formats)
    }

    fn parse_datetime(&self, s: &str) -> Result<MaybeAware<NaiveDateTime>> {
        let invalid = || Error::InvalidDateTime(s.to_string());
        // date part, one separator character, then the time part
        let date = s.get(..10).and_then(parse_iso_date).ok_or_else(invalid)?;
        if s.len() == 10 {
            return Ok((date.and_time(NaiveTime::MIN), None));
        }
        if !matches!(s.as_bytes()[10], b' ' | b'T') {
            return Err(invalid());
        }
        let rest = s.get(11..).ok_or_else(invalid)?;
        let (time, offset) = parse_time_with_offset(rest).ok_or_else(invalid)?;
        Ok((date.and_time(time), offset))
    }

    fn parse_time(&self, s: &str) -> Result<MaybeAware<NaiveTime>> {
        parse_time_with_offset(s).ok_or_else(|| Error::InvalidTime(s.to_string()))
    }

    fn format_timezone(&self, tz: FixedOffset) -> String {
        if tz.local_minus_utc() == 0 {
            "UTC".to_string()
        } else {
            format_offset(tz)
        }
    }

    fn format_date(&self, date: NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    fn format_datetime(&self, dt: NaiveDateTime, offset: Option<FixedOffset>) -> String {
        format!("{} {}", self.format_date(dt.date()), self.format_time(dt, offset))
    }

    fn format_time(&self, dt: NaiveDateTime, offset: Option<FixedOffset>) -> String {
        let mut out = format_clock(dt.time());
        if let Some(offset) = offset {
            out.push_str(&format_offset(offset));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> IsoTimeCodec {
        IsoTimeCodec::new()
    }

    #[test]
    fn test_parse_timezone() {
        let c = codec();
        assert_eq!(c.parse_timezone("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(c.parse_timezone("+08:00").unwrap().local_minus_utc(), 8 * 3600);
        assert_eq!(c.parse_timezone("UTC-05:30").unwrap().local_minus_utc(), -(5 * 3600 + 1800));
        assert_eq!(c.parse_timezone("GMT+01:00:30").unwrap().local_minus_utc(), 3630);
        assert!(c.parse_timezone("08:00").is_err());
        assert!(c.parse_timezone("Europe/Paris").is_err());
        assert!(c.parse_timezone("+24:00").is_err());
    }

    #[test]
    fn test_format_timezone() {
        let c = codec();
        assert_eq!(c.format_timezone(FixedOffset::east_opt(0).unwrap()), "UTC");
        assert_eq!(c.format_timezone(FixedOffset::east_opt(-3 * 3600).unwrap()), "-03:00");
        assert_eq!(c.format_timezone(FixedOffset::east_opt(3630).unwrap()), "+01:00:30");
    }

    #[test]
    fn test_parse_date_with_fallback() {
        let c = IsoTimeCodec::with_date_formats(vec!["%d/%m/%Y".into()]);
        assert_eq!(c.parse_date("2022-02-02").unwrap(), NaiveDate::from_ymd_opt(2022, 2, 2).unwrap());
        assert_eq!(c.parse_date("03/02/2022").unwrap(), NaiveDate::from_ymd_opt(2022, 2, 3).unwrap());
        assert!(codec().parse_date("03/02/2022").is_err());
        assert!(codec().parse_date("2022-02-30").is_err());
    }

    #[test]
    fn test_parse_time_forms() {
        let c = codec();
        let (t, off) = c.parse_time("09:30").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert!(off.is_none());

        let (t, off) = c.parse_time("09:30:15.25+02:00").unwrap();
        assert_eq!(t, NaiveTime::from_hms_micro_opt(9, 30, 15, 250_000).unwrap());
        assert_eq!(off.unwrap().local_minus_utc(), 7200);

        assert!(c.parse_time("9:30").is_err());
        assert!(c.parse_time("09:30.5").is_err());
        assert!(c.parse_time("noon").is_err());
    }

    #[test]
    fn test_parse_datetime_forms() {
        let c = codec();
        let (dt, off) = c.parse_datetime("2022-02-02 10:00").unwrap();
        assert_eq!(dt.to_string(), "2022-02-02 10:00:00");
        assert!(off.is_none());

        let (_, off) = c.parse_datetime("2022-02-02T10:00:00-07:00").unwrap();
        assert_eq!(off.unwrap().local_minus_utc(), -7 * 3600);

        assert!(c.parse_datetime("2022-02-02 25:00").is_err());
        assert!(c.parse_datetime("yesterday").is_err());
    }

    #[test]
    fn test_resolve_prefers_embedded_offset() {
        let c = codec();
        let tz = c.parse_timezone("+08:00").ok();
        let (dt, off) = c.parse_datetime("2022-02-02 10:00+00:00").unwrap();
        let aware = resolve(dt, off, tz, "x").unwrap();
        assert_eq!(aware.offset().local_minus_utc(), 0);

        let (dt, off) = c.parse_datetime("2022-02-02 10:00").unwrap();
        assert_eq!(resolve(dt, off, tz, "x").unwrap().offset().local_minus_utc(), 8 * 3600);
        assert!(matches!(resolve(dt, off, None, "x"), Err(Error::TimeZoneNotProvided(_))));
    }

    #[test]
    fn test_format_minute_precision() {
        let c = codec();
        let dt = NaiveDate::from_ymd_opt(2022, 2, 2).unwrap().and_hms_opt(10, 5, 0).unwrap();
        assert_eq!(c.format_datetime(dt, None), "2022-02-02 10:05");
        let off = FixedOffset::east_opt(3600);
        assert_eq!(c.format_time(dt, off), "10:05+01:00");

        let dt = NaiveDate::from_ymd_opt(2022, 2, 2)
            .unwrap()
            .and_hms_micro_opt(10, 5, 7, 120)
            .unwrap();
        assert_eq!(c.format_datetime(dt, None), "2022-02-02 10:05:07.000120");
    }
}
